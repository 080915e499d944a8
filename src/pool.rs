//! Node storage
//!
//! All nodes live in a [`NodePool`], a fixed-size arena. Nodes are
//! handed out in order and never freed, so a pool lives as long as the
//! queues built from it, usually for the whole program.

use crate::{
    node::{Node, NodeHandle, NodeKind, NodeMeta, NODE_SIZE, PAYLOAD_OFFSET},
    queue::Queue,
    ral::{lli, Word},
    Error, Result,
};

const EMPTY: Node = Node::new();

/// Size of the window that a 16-bit link can reach
const LINK_WINDOW: u32 = 0x1_0000;

/// A fixed-size arena of LPBAM nodes
///
/// The DMA controller follows 16-bit links, so every node must sit in the
/// same 64 KiB window. Keep the pool in memory that the DMA controller
/// can reach in low-power modes (SRAM4 on STM32U5), and don't move it
/// after building queues.
///
/// ```
/// use stm32_lpbam::NodePool;
///
/// static mut POOL: NodePool<16> = NodePool::new();
/// ```
pub struct NodePool<const N: usize> {
    nodes: [Node; N],
    meta: [Option<NodeMeta>; N],
    next: usize,
    queues: u16,
    address: Option<u32>,
}

impl<const N: usize> NodePool<N> {
    /// Create an empty pool
    ///
    /// The DMA controller finds the pool at its memory location.
    pub const fn new() -> Self {
        NodePool {
            nodes: [EMPTY; N],
            meta: [None; N],
            next: 0,
            queues: 0,
            address: None,
        }
    }

    /// Create an empty pool that the DMA controller finds at `address`
    ///
    /// Use this when the DMA controller sees the pool through an alias,
    /// like the secure SRAM alias, or through a software model's bus.
    pub const fn with_address(address: u32) -> Self {
        let mut pool = Self::new();
        pool.address = Some(address);
        pool
    }

    /// Returns the pool's bus address
    pub fn address(&self) -> u32 {
        match self.address {
            Some(address) => address,
            None => self.nodes.as_ptr() as usize as u32,
        }
    }

    /// Returns the number of nodes the pool can hold
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns the number of nodes handed out
    pub fn used(&self) -> usize {
        self.meta.iter().filter(|meta| meta.is_some()).count()
    }

    /// Create a new, empty queue backed by this pool
    pub fn queue(&mut self) -> Queue {
        let id = self.queues;
        self.queues = self.queues.wrapping_add(1);
        Queue::new(id)
    }

    /// Returns the node named by `handle`
    ///
    /// # Panics
    ///
    /// Panics if `handle` did not come from this pool.
    pub fn node(&self, handle: NodeHandle) -> &Node {
        &self.nodes[handle.index()]
    }

    /// Returns the bus address of the node named by `handle`
    pub fn node_address(&self, handle: NodeHandle) -> u32 {
        self.address() + handle.index() as u32 * NODE_SIZE
    }

    /// Returns the operation that produced the node named by `handle`
    ///
    /// Returns `None` if the pool never handed out the node.
    pub fn kind(&self, handle: NodeHandle) -> Option<NodeKind> {
        self.meta(handle).map(|meta| meta.kind)
    }

    /// Returns the node found at the bus address `address`
    pub fn handle_at(&self, address: u32) -> Option<NodeHandle> {
        let offset = address.checked_sub(self.address())?;
        if offset % NODE_SIZE != 0 {
            return None;
        }
        let index = (offset / NODE_SIZE) as usize;
        if index < self.next && self.meta[index].is_some() {
            Some(NodeHandle(index as u16))
        } else {
            None
        }
    }

    /// Returns the node that a 16-bit link points at
    pub(crate) fn resolve_link(&self, link: u16) -> Option<NodeHandle> {
        self.handle_at((self.address() & !(LINK_WINDOW - 1)) | link as u32)
    }

    pub(crate) fn meta(&self, handle: NodeHandle) -> Option<&NodeMeta> {
        self.meta.get(handle.index())?.as_ref()
    }

    pub(crate) fn set_meta(&mut self, handle: NodeHandle, meta: NodeMeta) {
        self.meta[handle.index()] = Some(meta);
    }

    /// Returns the DMA-visible word at `address`, if it's inside the pool
    pub(crate) fn word_at(&self, address: u32) -> Option<&Word> {
        let offset = address.checked_sub(self.address())?;
        let node = self.nodes.get((offset / NODE_SIZE) as usize)?;
        match offset % NODE_SIZE {
            0 => Some(&node.lli.CTR1),
            4 => Some(&node.lli.CTR2),
            8 => Some(&node.lli.CBR1),
            12 => Some(&node.lli.CSAR),
            16 => Some(&node.lli.CDAR),
            20 => Some(&node.lli.CLLR),
            PAYLOAD_OFFSET => Some(&node.payload),
            _ => None,
        }
    }

    /// Reserve `count` consecutive nodes
    ///
    /// Either all nodes are reserved, or none are.
    pub(crate) fn reserve(&mut self, count: usize) -> Result<NodeHandle> {
        let base = self.address();
        let address = |index: usize| {
            u32::try_from(index)
                .ok()
                .and_then(|index| index.checked_mul(NODE_SIZE))
                .and_then(|offset| base.checked_add(offset))
                .ok_or(Error::OutOfLinkRange)
        };
        let mut first = self.next;
        // A zero link ends a list. Skip the node that would need one.
        if address(first)? % LINK_WINDOW == 0 {
            first += 1;
        }
        let end = first.checked_add(count).ok_or(Error::PoolExhausted)?;
        if count == 0 || end > N || end > u16::MAX as usize {
            return Err(Error::PoolExhausted);
        }
        let window = base / LINK_WINDOW;
        let last = address(end - 1)?
            .checked_add((lli::WORDS as u32 + 1) * 4)
            .ok_or(Error::OutOfLinkRange)?;
        if address(first)? / LINK_WINDOW != window || last / LINK_WINDOW != window {
            return Err(Error::OutOfLinkRange);
        }
        self.next = end;
        Ok(NodeHandle(first as u16))
    }
}

impl<const N: usize> Default for NodePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::NodePool;
    use crate::Error;

    #[test]
    fn reserve_all_or_nothing() {
        let mut pool = NodePool::<4>::with_address(0x2800_0040);
        let first = pool.reserve(3).unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(pool.reserve(2), Err(Error::PoolExhausted));
        let last = pool.reserve(1).unwrap();
        assert_eq!(last.index(), 3);
    }

    #[test]
    fn skip_zero_link() {
        let mut pool = NodePool::<4>::with_address(0x2800_0000);
        let first = pool.reserve(1).unwrap();
        assert_eq!(first.index(), 1);
        assert_eq!(pool.node_address(first), 0x2800_0020);
    }

    #[test]
    fn stay_in_link_window() {
        let mut pool = NodePool::<4>::with_address(0x2800_FFC0);
        assert!(pool.reserve(2).is_ok());
        assert_eq!(pool.reserve(1), Err(Error::OutOfLinkRange));
    }

    #[test]
    fn top_of_address_space() {
        let mut pool = NodePool::<4>::with_address(0xFFFF_FFE0);
        assert_eq!(pool.reserve(1).map(|node| node.index()), Ok(0));
        assert_eq!(pool.reserve(1), Err(Error::OutOfLinkRange));

        let mut pool = NodePool::<4>::with_address(0xFFFF_FFF0);
        assert_eq!(pool.reserve(1), Err(Error::OutOfLinkRange));
        assert_eq!(pool.used(), 0);
    }
}
