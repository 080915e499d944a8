//! Node builders
//!
//! Each peripheral module turns one operation into nodes, and appends them
//! to a queue. All builders share a shape:
//!
//! ```text
//! fn(pool, queue, placement, config) -> Result<Descriptor>
//! ```
//!
//! A builder checks its configuration, reserves every node it needs, and
//! only then appends. When a builder returns an error, the queue and the
//! pool are unchanged. Builders never touch hardware.
//!
//! Builders don't split large transfers. Use [`append_chunked`] to call a
//! builder once per chunk.

pub mod adc;
pub mod dma;
pub mod gpio;
pub mod i2c;
pub mod lptim;
pub mod spi;

use crate::{Descriptor, Error, Result};

/// How an operation joins its queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Append the operation, and leave the queue open
    Linear,
    /// Append the operation, then loop the queue back to the
    /// operation's first node
    ///
    /// This is the last operation the queue accepts.
    Circular,
}

/// Where a builder places its nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub addressing: Addressing,
}

impl Placement {
    /// Append to the end of the queue
    pub const LINEAR: Self = Placement {
        addressing: Addressing::Linear,
    };
    /// Append to the end of the queue, and close the loop
    pub const CIRCULAR: Self = Placement {
        addressing: Addressing::Circular,
    };
}

impl Default for Placement {
    fn default() -> Self {
        Self::LINEAR
    }
}

/// One piece of a transfer that's too large for a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Offset of the first element, in elements
    pub offset: usize,
    /// Number of elements in this chunk
    pub len: usize,
    /// `true` for the final chunk
    pub last: bool,
}

/// An iterator over the chunks of a transfer
///
/// See [`chunks`].
#[derive(Debug, Clone)]
pub struct Chunks {
    total: usize,
    max: usize,
    offset: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;
    fn next(&mut self) -> Option<Chunk> {
        if self.max == 0 || self.offset >= self.total {
            return None;
        }
        let len = self.max.min(self.total - self.offset);
        let chunk = Chunk {
            offset: self.offset,
            len,
            last: self.offset + len == self.total,
        };
        self.offset += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.max {
            0 => 0,
            max => (self.total.saturating_sub(self.offset) + max - 1) / max,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}

/// Split `total` elements into chunks of at most `max` elements
///
/// Every chunk is full, except maybe the last. Yields nothing if either
/// `total` or `max` is zero.
///
/// ```
/// use stm32_lpbam::builder::chunks;
///
/// let sizes: Vec<_> = chunks(600, 255).map(|chunk| chunk.len).collect();
/// assert_eq!(sizes, [255, 255, 90]);
/// ```
pub fn chunks(total: usize, max: usize) -> Chunks {
    Chunks {
        total,
        max,
        offset: 0,
    }
}

/// Call `build` once for each chunk of a `total`-element transfer
///
/// `build` appends one chunk, usually by calling a builder with a slice
/// of the caller's buffer. Returns the number of chunks appended.
///
/// Chunks that were appended before an error stay in the queue.
///
/// ```
/// use stm32_lpbam::{builder::{self, Placement}, i2c, Buffer, NodePool};
///
/// let mut pool = NodePool::<8>::with_address(0x2800_0040);
/// let mut queue = pool.queue();
/// // Safety: never handed to hardware.
/// let data = unsafe { Buffer::<u8>::from_raw(0x2800_4000, 600) };
///
/// let count = builder::append_chunked(data.len(), i2c::MAX_TRANSFER, |chunk| {
///     let config = i2c::MasterConfig::new(0x42, data).for_chunk(&chunk).unwrap();
///     i2c::master_transmit(&mut pool, &mut queue, Placement::LINEAR, &config)
/// })
/// .unwrap();
/// assert_eq!(count, 3);
/// ```
pub fn append_chunked<F>(total: usize, max: usize, mut build: F) -> Result<usize>
where
    F: FnMut(Chunk) -> Result<Descriptor>,
{
    if total == 0 || max == 0 {
        return Err(Error::InvalidConfiguration);
    }
    let mut count = 0;
    for chunk in chunks(total, max) {
        build(chunk)?;
        count += 1;
    }
    Ok(count)
}
