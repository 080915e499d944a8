//! LPBAM DMA queues for STM32U5 processors
//!
//! The low-power background autonomous mode (LPBAM) lets the LPDMA
//! controller run peripherals while the CPU sleeps. The DMA controller
//! walks a linked list of nodes. Each node moves a block of data: it may
//! write a peripheral register, or move data between a peripheral and
//! memory. `stm32-lpbam` builds those lists.
//!
//! - a [`NodePool`] holds the nodes, in memory that the DMA controller can
//!   reach.
//! - a [`Queue`] is an ordered list of nodes in a pool. You build a queue
//!   by appending operations from the [`builder`] modules, like
//!   [`lptim::pwm`] or [`i2c::master_transmit`]. Each operation returns a
//!   [`Descriptor`] that names its nodes.
//! - use the descriptors to attach hardware triggers to nodes, or to loop
//!   the queue back on itself.
//! - finally, link the queue to a DMA [`Channel`], and start the channel.
//!
//! A queue may start other channels on queues of their own; see
//! [`dma::start`].
//!
//! ```no_run
//! use stm32_lpbam::{lptim, NodePool, Placement};
//!
//! static mut POOL: NodePool<8> = NodePool::new();
//!
//! // Safety: the only reference to the pool.
//! let pool = unsafe { &mut *core::ptr::addr_of_mut!(POOL) };
//! let mut queue = pool.queue();
//!
//! let pwm = lptim::PwmConfig {
//!     lptim: lptim::LPTIM1,
//!     channel: lptim::Channel::One,
//!     period: 1000,
//!     pulse: 250,
//! };
//! lptim::pwm(pool, &mut queue, Placement::LINEAR, &pwm).unwrap();
//! lptim::stop(pool, &mut queue, Placement::LINEAR, &lptim::LPTIM1).unwrap();
//! assert_eq!(queue.len(), 3);
//! ```
//!
//! # Hosts
//!
//! The [`model`] module runs queues in software. Use it to test a queue
//! before you flash it.
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(test), no_std)]

pub mod builder;
mod channel;
mod element;
mod error;
mod interrupt;
pub mod model;
mod node;
mod policy;
mod pool;
mod queue;
mod ral;
mod trigger;

pub use builder::{adc, dma, gpio, i2c, lptim, spi, Addressing, Placement};
pub use channel::{
    Channel, Configuration, Dma, LinkPort, Priority, State, StepMode, TransferEvent,
};
pub use element::{Buffer, Element, Width};
pub use error::{Error, ErrorStatus};
pub use interrupt::{Completion, ErrorCallback};
pub use node::{Node, NodeHandle, NodeKind, NodeTag, NODE_SIZE};
pub use policy::Policy;
pub use pool::NodePool;
pub use queue::{Descriptor, Queue, Walk, MAX_OPERATION_NODES};
pub use trigger::{Polarity, TriggerConfig, TriggerMode, TriggerSource};

/// An LPBAM result
pub type Result<T> = core::result::Result<T, Error>;

/// The LPDMA1 controller's registers
pub const LPDMA1: *const () = 0x4602_5000 as *const ();

use core::{future::Future, pin::Pin, task::Poll};

/// Check on a future once, without an executor
///
/// The waker does nothing, so nothing runs the future again. Use this to
/// ask whether a channel's [`Completion`] already resolved, for instance
/// while the queue runs on the [`model`].
pub fn poll_no_wake<F>(future: Pin<&mut F>) -> Poll<F::Output>
where
    F: Future,
{
    use core::task::{Context, RawWaker, RawWakerVTable, Waker};

    fn clone(_: *const ()) -> RawWaker {
        NOOP
    }
    fn ignore(_: *const ()) {}
    const VTABLE: RawWakerVTable = RawWakerVTable::new(clone, ignore, ignore, ignore);
    const NOOP: RawWaker = RawWaker::new(core::ptr::null(), &VTABLE);

    // Safety: every vtable function ignores the null data pointer.
    let waker = unsafe { Waker::from_raw(NOOP) };
    future.poll(&mut Context::from_waker(&waker))
}

/// Spin on a future until it resolves
///
/// Useful for a [`Completion`] when there's no executor. A circular queue
/// only resolves on an error, so don't `block` on one that runs cleanly.
pub fn block<F>(mut future: Pin<&mut F>) -> F::Output
where
    F: Future,
{
    loop {
        if let Poll::Ready(result) = poll_no_wake(future.as_mut()) {
            return result;
        }
    }
}
