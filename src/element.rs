//! DMA data elements and memory buffers

use core::marker::PhantomData;

/// Width of a single DMA data beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Width {
    Byte = 0,
    HalfWord = 1,
    Word = 2,
}

impl Width {
    /// Returns the width in bytes
    pub const fn bytes(self) -> u32 {
        1 << (self as u32)
    }
    /// Decode the `SDW_LOG2` / `DDW_LOG2` value
    pub(crate) const fn from_log2(log2: u32) -> Option<Self> {
        match log2 {
            0 => Some(Width::Byte),
            1 => Some(Width::HalfWord),
            2 => Some(Width::Word),
            _ => None,
        }
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// An element that the DMA controller can move in one beat
///
/// This trait is sealed, and implemented for `u8`, `u16` and `u32`.
pub trait Element: private::Sealed + Copy + 'static {
    /// The beat width
    const WIDTH: Width;
}

impl Element for u8 {
    const WIDTH: Width = Width::Byte;
}

impl Element for u16 {
    const WIDTH: Width = Width::HalfWord;
}

impl Element for u32 {
    const WIDTH: Width = Width::Word;
}

/// A memory buffer, as the DMA controller sees it
///
/// A `Buffer` is a bus address and a number of elements. Queues are
/// built long before the DMA controller touches the memory, so the
/// buffer carries no lifetime. You're responsible for keeping the
/// memory valid while a queue that uses it is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer<E: Element> {
    address: u32,
    len: usize,
    _elem: PhantomData<E>,
}

impl<E: Element> Buffer<E> {
    /// Describe `len` elements at the bus address `address`
    ///
    /// # Safety
    ///
    /// `address` must be valid for `len` elements for as long as any
    /// queue that uses the buffer is linked to a DMA channel. The
    /// address must be aligned for `E`.
    pub const unsafe fn from_raw(address: u32, len: usize) -> Self {
        Buffer {
            address,
            len,
            _elem: PhantomData,
        }
    }

    /// Describe a static buffer
    ///
    /// Only available when pointers are bus addresses.
    #[cfg(target_pointer_width = "32")]
    pub fn from_static(buffer: &'static mut [E]) -> Self {
        // Safety: static memory, 32-bit pointers are bus addresses
        unsafe { Self::from_raw(buffer.as_ptr() as u32, buffer.len()) }
    }

    /// Returns the buffer's bus address
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// Returns the number of elements
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer has no elements
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the buffer's size in bytes
    pub const fn size(&self) -> usize {
        self.len * E::WIDTH.bytes() as usize
    }

    /// Returns a sub-buffer of `len` elements starting at `offset`
    ///
    /// Returns `None` if the range leaves the buffer.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(Buffer {
            address: self.address + (offset as u32) * E::WIDTH.bytes(),
            len,
            _elem: PhantomData,
        })
    }
}
