//! LPBAM queues
//!
//! A [`Queue`] is an ordered chain of nodes that one DMA channel walks
//! without the CPU. Builders append to a queue; a channel executes it.
//!
//! The chain lives in the nodes themselves: every node's link word
//! points at the next node, and the last node's link is zero. A circular
//! queue points its last node back into the chain, and never ends.

use crate::{
    builder::{Addressing, Placement},
    node::{NodeHandle, NodeKind, NodeMeta, NodeTag, Step, PAYLOAD_OFFSET},
    pool::NodePool,
    trigger::TriggerConfig,
    Error, Result,
};

/// The most nodes that a single operation produces
pub const MAX_OPERATION_NODES: usize = 5;

/// The nodes that one builder call appended
///
/// Use the descriptor to find a node by its [`NodeTag`] when attaching
/// a trigger, or when making the queue circular.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    kind: NodeKind,
    queue: u16,
    first: NodeHandle,
    tags: [NodeTag; MAX_OPERATION_NODES],
    len: u8,
}

impl Descriptor {
    /// Returns the operation that produced the nodes
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the number of nodes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always `false`; an operation has at least one node
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the first node with the tag `tag`
    pub fn node(&self, tag: NodeTag) -> Option<NodeHandle> {
        self.nodes()
            .find(|(candidate, _)| *candidate == tag)
            .map(|(_, handle)| handle)
    }

    /// Iterate over the operation's nodes, in queue order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeTag, NodeHandle)> + '_ {
        self.tags[..self.len()]
            .iter()
            .enumerate()
            .map(move |(offset, tag)| (*tag, NodeHandle(self.first.0 + offset as u16)))
    }
}

/// An ordered chain of nodes
///
/// Create queues with [`NodePool::queue`]. A queue may only use nodes of
/// the pool that created it.
#[derive(Debug)]
pub struct Queue {
    id: u16,
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
    len: usize,
    loop_start: Option<NodeHandle>,
    channel: Option<usize>,
}

impl Queue {
    pub(crate) const fn new(id: u16) -> Self {
        Queue {
            id,
            head: None,
            tail: None,
            len: 0,
            loop_start: None,
            channel: None,
        }
    }

    /// Returns the number of nodes in the queue
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the queue has no nodes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the first node
    pub fn head(&self) -> Option<NodeHandle> {
        self.head
    }

    /// Returns the last node
    pub fn tail(&self) -> Option<NodeHandle> {
        self.tail
    }

    /// Returns `true` if the queue repeats
    pub fn is_circular(&self) -> bool {
        self.loop_start.is_some()
    }

    /// Returns the node that the last node loops back to
    pub fn loop_start(&self) -> Option<NodeHandle> {
        self.loop_start
    }

    /// Returns the channel that owns this queue
    pub fn channel(&self) -> Option<usize> {
        self.channel
    }

    /// Returns `true` if `handle` is one of this queue's nodes
    pub fn contains<const N: usize>(&self, pool: &NodePool<N>, handle: NodeHandle) -> bool {
        pool.meta(handle).map_or(false, |meta| meta.queue == self.id)
    }

    /// Walk the chain from the head, following the DMA-visible links
    ///
    /// The walk of a circular queue never ends.
    pub fn walk<'p, const N: usize>(&self, pool: &'p NodePool<N>) -> Walk<'p, N> {
        Walk {
            pool,
            next: self.head,
        }
    }

    /// Check that every node can make progress
    ///
    /// Returns the first node that needs a trigger, but doesn't have one.
    pub fn validate<const N: usize>(&self, pool: &NodePool<N>) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyQueue);
        }
        for handle in self.walk(pool).take(self.len) {
            let stalls = pool.meta(handle).map_or(false, |meta| meta.needs_trigger);
            if stalls && !pool.node(handle).is_triggered() {
                return Err(Error::MissingTrigger(handle));
            }
        }
        Ok(())
    }

    /// Hold the node `tag` of `descriptor` until `trigger` fires
    ///
    /// Call this after building the operation, and before linking the
    /// queue. Nothing changes if the call fails.
    pub fn set_trigger<const N: usize>(
        &mut self,
        pool: &mut NodePool<N>,
        descriptor: &Descriptor,
        tag: NodeTag,
        trigger: &TriggerConfig,
    ) -> Result<()> {
        self.ensure_unlinked()?;
        let handle = self.resolve(pool, descriptor, tag)?;
        let node = pool.node(handle);
        if node.is_triggered() {
            return Err(Error::AlreadyTriggered);
        }
        node.set_trigger(trigger);
        Ok(())
    }

    /// Loop the last node back to the node `tag` of `descriptor`
    ///
    /// Once circular, the queue runs until its channel is aborted, and
    /// accepts no more nodes.
    pub fn set_circular<const N: usize>(
        &mut self,
        pool: &mut NodePool<N>,
        descriptor: &Descriptor,
        tag: NodeTag,
    ) -> Result<()> {
        self.ensure_unlinked()?;
        if self.is_circular() {
            return Err(Error::AlreadyCircular);
        }
        let target = self.resolve(pool, descriptor, tag)?;
        let tail = self.tail.ok_or(Error::EmptyQueue)?;
        pool.node(tail).set_next(pool.node_address(target));
        self.loop_start = Some(target);
        Ok(())
    }

    /// Append the nodes for one operation
    pub(crate) fn append<const N: usize>(
        &mut self,
        pool: &mut NodePool<N>,
        placement: Placement,
        kind: NodeKind,
        steps: &[Step],
    ) -> Result<Descriptor> {
        self.ensure_unlinked()?;
        if self.is_circular() {
            return Err(Error::AlreadyCircular);
        }
        if steps.is_empty() || steps.len() > MAX_OPERATION_NODES {
            return Err(Error::InvalidConfiguration);
        }

        let first = pool.reserve(steps.len())?;
        let mut tags = [NodeTag::Data; MAX_OPERATION_NODES];
        for (offset, step) in steps.iter().enumerate() {
            let handle = NodeHandle(first.0 + offset as u16);
            let address = pool.node_address(handle);
            pool.node(handle).program(step, address + PAYLOAD_OFFSET);
            pool.set_meta(
                handle,
                NodeMeta {
                    kind,
                    tag: step.tag,
                    queue: self.id,
                    needs_trigger: step.needs_trigger,
                },
            );
            match self.tail {
                Some(tail) => pool.node(tail).set_next(address),
                None => self.head = Some(handle),
            }
            self.tail = Some(handle);
            self.len += 1;
            tags[offset] = step.tag;
        }

        let descriptor = Descriptor {
            kind,
            queue: self.id,
            first,
            tags,
            len: steps.len() as u8,
        };
        if placement.addressing == Addressing::Circular {
            self.set_circular(pool, &descriptor, tags[0])?;
        }
        Ok(descriptor)
    }

    fn resolve<const N: usize>(
        &self,
        pool: &NodePool<N>,
        descriptor: &Descriptor,
        tag: NodeTag,
    ) -> Result<NodeHandle> {
        if descriptor.queue != self.id {
            return Err(Error::UnknownNode);
        }
        let handle = descriptor.node(tag).ok_or(Error::UnknownNode)?;
        match pool.meta(handle) {
            Some(meta) if meta.queue == self.id && meta.tag == tag => Ok(handle),
            _ => Err(Error::UnknownNode),
        }
    }

    fn ensure_unlinked(&self) -> Result<()> {
        if self.channel.is_some() {
            Err(Error::QueueLinked)
        } else {
            Ok(())
        }
    }

    /// Mark the queue as owned by `channel`
    pub(crate) fn claim(&mut self, channel: usize) -> Result<()> {
        match self.channel {
            None => {
                self.channel = Some(channel);
                Ok(())
            }
            Some(owner) if owner == channel => Err(Error::QueueLinked),
            Some(_) => Err(Error::QueueBusy),
        }
    }

    pub(crate) fn release(&mut self) {
        self.channel = None;
    }

    pub(crate) fn id(&self) -> u16 {
        self.id
    }
}

/// An iterator over a queue's nodes, in execution order
///
/// See [`Queue::walk`].
pub struct Walk<'p, const N: usize> {
    pool: &'p NodePool<N>,
    next: Option<NodeHandle>,
}

impl<const N: usize> Iterator for Walk<'_, N> {
    type Item = NodeHandle;
    fn next(&mut self) -> Option<NodeHandle> {
        let current = self.next?;
        self.next = self
            .pool
            .node(current)
            .next()
            .and_then(|link| self.pool.resolve_link(link));
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::Placement,
        gpio::{self, PinState, PinWrite},
        trigger::{TriggerConfig, TriggerSource},
        Error, NodePool, NodeTag,
    };

    fn pin(state: PinState) -> PinWrite {
        PinWrite {
            port: gpio::LPGPIO1,
            pin: 3,
            state,
        }
    }

    #[test]
    fn walk_follows_build_order() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let mut built = Vec::new();
        for state in [PinState::High, PinState::Low, PinState::High] {
            let desc = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(state)).unwrap();
            built.extend(desc.nodes().map(|(_, handle)| handle));
        }
        let walked: Vec<_> = queue.walk(&pool).collect();
        assert_eq!(walked, built);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn circular_revisits_loop_start() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let mut descs = Vec::new();
        for state in [PinState::High, PinState::Low, PinState::High, PinState::Low] {
            descs.push(gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(state)).unwrap());
        }
        let target = descs[1].node(NodeTag::Data).unwrap();
        queue.set_circular(&mut pool, &descs[1], NodeTag::Data).unwrap();

        let walked: Vec<_> = queue.walk(&pool).take(queue.len() + 1).collect();
        assert_eq!(walked[queue.len()], target);
        assert_eq!(
            queue.set_circular(&mut pool, &descs[0], NodeTag::Data),
            Err(Error::AlreadyCircular)
        );
        assert_eq!(
            gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::High)),
            Err(Error::AlreadyCircular)
        );
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn unknown_tag_changes_nothing() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let desc = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::High)).unwrap();
        let before: Vec<_> = queue.walk(&pool).map(|node| pool.node(node).image()).collect();

        let trigger = TriggerConfig::rising(TriggerSource::LPTIM1_CH1);
        assert_eq!(
            queue.set_trigger(&mut pool, &desc, NodeTag::Config, &trigger),
            Err(Error::UnknownNode)
        );
        let after: Vec<_> = queue.walk(&pool).map(|node| pool.node(node).image()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn descriptor_from_another_queue() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut first = pool.queue();
        let mut second = pool.queue();
        let desc = gpio::write(&mut pool, &mut first, Placement::LINEAR, &pin(PinState::High)).unwrap();
        let trigger = TriggerConfig::rising(TriggerSource::LPTIM1_CH1);
        assert_eq!(
            second.set_trigger(&mut pool, &desc, NodeTag::Data, &trigger),
            Err(Error::UnknownNode)
        );
        assert!(!pool.node(desc.node(NodeTag::Data).unwrap()).is_triggered());
    }

    #[test]
    fn trigger_only_once() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let desc = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::High)).unwrap();
        let trigger = TriggerConfig::rising(TriggerSource::LPTIM1_CH1);
        queue.set_trigger(&mut pool, &desc, NodeTag::Data, &trigger).unwrap();
        assert_eq!(
            queue.set_trigger(&mut pool, &desc, NodeTag::Data, &trigger),
            Err(Error::AlreadyTriggered)
        );
    }

    #[test]
    fn circular_placement_closes_queue() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let desc = gpio::write(&mut pool, &mut queue, Placement::CIRCULAR, &pin(PinState::High)).unwrap();
        assert!(queue.is_circular());
        assert_eq!(queue.loop_start(), desc.node(NodeTag::Data));
        let walked: Vec<_> = queue.walk(&pool).take(3).collect();
        assert!(walked.iter().all(|node| Some(*node) == queue.head()));
    }

    #[test]
    fn empty_queue_is_invalid() {
        let mut pool = NodePool::<2>::with_address(0x2800_0040);
        let queue = pool.queue();
        assert_eq!(queue.validate(&pool), Err(Error::EmptyQueue));
    }
}
