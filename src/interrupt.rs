//! DMA interrupt support

use crate::{
    channel::{Channel, Dma, State},
    ral::lpdma::ch::{CSR, CSR_ERRORS},
    Error, ErrorStatus,
};
use core::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use critical_section::Mutex;

/// Called from [`Dma::on_interrupt`] when a channel reports an error
///
/// The callback receives the channel number and the channel's status. It
/// runs in the interrupt handler.
pub type ErrorCallback = fn(usize, ErrorStatus);

/// Flags that the interrupt handler latches
const EVENTS: u32 =
    CSR::TCF::mask | CSR::HTF::mask | CSR_ERRORS | CSR::SUSPF::mask | CSR::TOF::mask;

/// State shared between a channel and its interrupt handler
pub(crate) struct Shared {
    waker: Mutex<RefCell<Option<Waker>>>,
    callback: Mutex<Cell<Option<ErrorCallback>>>,
    flags: Mutex<Cell<u32>>,
}

pub(crate) const IDLE: Shared = Shared {
    waker: Mutex::new(RefCell::new(None)),
    callback: Mutex::new(Cell::new(None)),
    flags: Mutex::new(Cell::new(0)),
};

impl Shared {
    /// Returns the flags latched since the last clear
    pub(crate) fn flags(&self) -> u32 {
        critical_section::with(|cs| self.flags.borrow(cs).get())
    }

    pub(crate) fn clear_flags(&self) {
        critical_section::with(|cs| self.flags.borrow(cs).set(0));
    }

    pub(crate) fn set_callback(&self, callback: Option<ErrorCallback>) {
        critical_section::with(|cs| self.callback.borrow(cs).set(callback));
    }

    fn register(&self, waker: &Waker) {
        critical_section::with(|cs| {
            let mut slot = self.waker.borrow(cs).borrow_mut();
            match slot.as_ref() {
                Some(registered) if registered.will_wake(waker) => {}
                _ => *slot = Some(waker.clone()),
            }
        });
    }

    fn forget_waker(&self) {
        critical_section::with(|cs| *self.waker.borrow(cs).borrow_mut() = None);
    }
}

impl<const CHANNELS: usize> Dma<CHANNELS> {
    /// Handle a DMA channel interrupt
    ///
    /// Latches and clears the channel's event flags, calls the channel's
    /// error callback on a DMA error, and wakes the channel's
    /// [`Completion`] future.
    ///
    /// Consider calling `on_interrupt` in the channel's interrupt handler:
    ///
    /// ```no_run
    /// use stm32_lpbam::{Dma, LPDMA1};
    ///
    /// static DMA: Dma<4> = unsafe { Dma::new(LPDMA1) };
    ///
    /// // #[cortex_m_rt::interrupt]
    /// fn LPDMA1_CH0() {
    ///     // Safety: channel 0's interrupt handler.
    ///     unsafe { DMA.on_interrupt(0) };
    /// }
    /// ```
    ///
    /// # Safety
    ///
    /// Caller must ensure that `on_interrupt` is called in the correct
    /// interrupt handler.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is greater than or equal to `CHANNELS`.
    pub unsafe fn on_interrupt(&self, channel: usize) {
        let shared = &self.shared[channel];
        let chan = &self.registers.CH[channel];
        let csr = chan.CSR.read();
        let events = csr & EVENTS;
        if events == 0 {
            return;
        }
        chan.CFCR.write(events);

        let (waker, callback) = critical_section::with(|cs| {
            let flags = shared.flags.borrow(cs);
            flags.set(flags.get() | events);
            let waker = shared.waker.borrow(cs).borrow_mut().take();
            (waker, shared.callback.borrow(cs).get())
        });

        if events & CSR_ERRORS != 0 {
            let status = ErrorStatus::new(csr);
            log::warn!("LPDMA channel {} error: {}", channel, status);
            if let Some(callback) = callback {
                callback(channel, status);
            }
        }
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Resolves when a channel's queue completes, or fails
///
/// Create a `Completion` with [`Channel::completion`]. The future doesn't
/// start the channel.
pub struct Completion<'a> {
    channel: &'a mut Channel,
}

impl<'a> Completion<'a> {
    pub(crate) fn new(channel: &'a mut Channel) -> Self {
        Completion { channel }
    }
}

impl Future for Completion<'_> {
    type Output = Result<(), Error>;
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.channel.shared.register(cx.waker());
        match self.channel.poll() {
            State::Started => Poll::Pending,
            State::Completed => Poll::Ready(Ok(())),
            State::Error(status) => Poll::Ready(Err(Error::Transfer(status))),
            State::Unlinked | State::Linked | State::Aborted => {
                Poll::Ready(Err(Error::InvalidState))
            }
        }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.channel.shared.forget_waker();
    }
}
