//! LPDMA channels
//!
//! A [`Channel`] executes one queue at a time. Its life cycle follows the
//! hardware:
//!
//! ```text
//! Unlinked -> Linked -> Started -> { Completed | Aborted | Error }
//!    ^                                          |
//!    +-------------------- unlink --------------+
//! ```
//!
//! Circular queues never complete; stop them with [`Channel::abort`].

use core::sync::atomic;

use crate::{
    interrupt::{Completion, ErrorCallback, Shared, IDLE},
    pool::NodePool,
    queue::Queue,
    ral::{
        self,
        lpdma::{self, ch, CHANNEL_BLOCKS, CHANNEL_OFFSET, CHANNEL_STRIDE},
        Static,
    },
    Error, ErrorStatus, Result,
};

/// Every flag that `CFCR` can clear
const ALL_FLAGS: u32 = ch::CFCR::TCF::mask
    | ch::CFCR::HTF::mask
    | ch::CFCR::DTEF::mask
    | ch::CFCR::ULEF::mask
    | ch::CFCR::USEF::mask
    | ch::CFCR::SUSPF::mask
    | ch::CFCR::TOF::mask;

/// Status reads before [`Channel::abort`] gives up on a suspend
const SUSPEND_POLLS: usize = 10_000;

/// An LPDMA (or GPDMA) controller
///
/// `Dma` allocates [`Channel`]s, and holds the state that a channel shares
/// with its interrupt handler. Keep the driver in a `static`.
///
/// `CHANNELS` is the number of channels that the controller implements:
/// 4 for LPDMA1, 16 for GPDMA1.
pub struct Dma<const CHANNELS: usize> {
    pub(crate) registers: Static<lpdma::RegisterBlock>,
    address: Option<u32>,
    pub(crate) shared: [Shared; CHANNELS],
}

// Safety: OK to allocate a DMA driver in a static context.
unsafe impl<const CHANNELS: usize> Sync for Dma<CHANNELS> {}

impl<const CHANNELS: usize> Dma<CHANNELS> {
    /// Create the DMA driver
    ///
    /// The nodes that start other channels address the controller at its
    /// memory location.
    ///
    /// # Safety
    ///
    /// `controller` must point at the start of the DMA controller register
    /// block. `CHANNELS` must not exceed the channels that the controller
    /// implements.
    pub const unsafe fn new(controller: *const ()) -> Self {
        Dma {
            registers: Static(controller.cast()),
            address: None,
            shared: [IDLE; CHANNELS],
        }
    }

    /// Create the DMA driver for a controller that the DMA bus sees at
    /// `address`
    ///
    /// # Safety
    ///
    /// See [`new`](Self::new).
    pub const unsafe fn with_address(controller: *const (), address: u32) -> Self {
        Dma {
            registers: Static(controller.cast()),
            address: Some(address),
            shared: [IDLE; CHANNELS],
        }
    }

    /// Returns the controller's bus address
    pub fn address(&self) -> u32 {
        match self.address {
            Some(address) => address,
            None => self.registers.0 as usize as u32,
        }
    }

    /// Creates the DMA channel described by `index`
    ///
    /// # Safety
    ///
    /// This will create a handle that may alias global, mutable state. You
    /// should only create one channel per index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than or equal to `CHANNELS`.
    pub unsafe fn channel(&'static self, index: usize) -> Channel {
        assert!(index < CHANNELS && index < CHANNEL_BLOCKS);
        Channel {
            index,
            registers: self.registers,
            address: self.address(),
            shared: &self.shared[index],
            state: State::Unlinked,
            configuration: None,
            circular: false,
            queue: None,
        }
    }
}

/// Channel arbitration priority (`PRIO`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Priority {
    /// Low priority, low weight
    Low = 0,
    /// Low priority, mid weight
    Medium = 1,
    /// Low priority, high weight
    High = 2,
    /// High priority
    Critical = 3,
}

/// The port that loads linked-list items (`LAP`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LinkPort {
    Port0 = 0,
    Port1 = 1,
}

/// How far the channel runs after each start (`LSM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Run the whole queue
    Full,
    /// Run one node, then pause
    Node,
}

/// When the channel signals a transfer complete event (`TCEM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TransferEvent {
    /// After every block
    Block = 0,
    /// After every node
    Node = 2,
    /// After the last node of the queue
    Queue = 3,
}

/// Channel-level policy, applied when you [`init`](Channel::init) a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub priority: Priority,
    pub link_port: LinkPort,
    pub step_mode: StepMode,
    /// Written into every node of the queue at link time
    pub transfer_event: TransferEvent,
    /// Interrupt on transfer complete events
    pub complete_interrupt: bool,
    /// Interrupt on transfer, link and user setting errors
    pub error_interrupts: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            priority: Priority::Low,
            link_port: LinkPort::Port0,
            step_mode: StepMode::Full,
            transfer_event: TransferEvent::Queue,
            complete_interrupt: true,
            error_interrupts: true,
        }
    }
}

impl Configuration {
    /// `CCR` without the interrupt enables
    fn control(&self) -> u32 {
        let lsm = match self.step_mode {
            StepMode::Full => 0,
            StepMode::Node => 1,
        };
        (self.priority as u32) << ch::CCR::PRIO::offset
            | (self.link_port as u32) << ch::CCR::LAP::offset
            | lsm << ch::CCR::LSM::offset
    }

    fn interrupts(&self) -> u32 {
        let mut ccr = 0;
        if self.complete_interrupt {
            ccr |= ch::CCR::TCIE::mask;
        }
        if self.error_interrupts {
            ccr |= ch::CCR::DTEIE::mask | ch::CCR::ULEIE::mask | ch::CCR::USEIE::mask;
        }
        ccr
    }

    /// The complete `CCR` value, without `EN`
    pub(crate) fn ccr(&self) -> u32 {
        self.control() | self.interrupts()
    }
}

/// A channel's place in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No queue
    Unlinked,
    /// Holds a queue, not yet running
    Linked,
    /// Running, or paused between nodes in step mode
    Started,
    /// Reached the end of a one-shot queue
    Completed,
    /// Aborted by software
    Aborted,
    /// Stopped by a DMA error
    Error(ErrorStatus),
}

/// A DMA channel
///
/// Allocate channels with [`Dma::channel`].
pub struct Channel {
    index: usize,
    registers: Static<lpdma::RegisterBlock>,
    /// Controller bus address
    address: u32,
    pub(crate) shared: &'static Shared,
    state: State,
    configuration: Option<Configuration>,
    circular: bool,
    queue: Option<u16>,
}

// It's OK to send a channel across an execution context.
// They can't be cloned or copied, so there's no chance of
// them being (mutably) shared.
unsafe impl Send for Channel {}

impl Channel {
    /// Returns the DMA channel number
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the bus address of the channel's registers
    pub fn address(&self) -> u32 {
        self.address + CHANNEL_OFFSET + self.index as u32 * CHANNEL_STRIDE
    }

    /// Returns the channel's state, as of the last poll
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the configuration from [`init`](Self::init)
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    fn registers(&self) -> &ch::RegisterBlock {
        &self.registers.CH[self.index]
    }

    /// Apply channel-level policy
    ///
    /// Only valid while unlinked. Interrupts stay disabled until a queue
    /// is linked.
    pub fn init(&mut self, configuration: &Configuration) -> Result<()> {
        if self.state != State::Unlinked {
            return Err(Error::InvalidState);
        }
        let chan = self.registers();
        chan.CCR.write(configuration.control());
        chan.CFCR.write(ALL_FLAGS);
        self.configuration = Some(*configuration);
        Ok(())
    }

    /// Hand `queue` to this channel
    ///
    /// The queue must be valid, and not linked elsewhere. Linking writes the
    /// transfer event mode into every node, points the channel at the
    /// queue's head, and enables the configured interrupts.
    pub fn link<const N: usize>(&mut self, pool: &NodePool<N>, queue: &mut Queue) -> Result<()> {
        let configuration = match (self.state, self.configuration) {
            (State::Unlinked, Some(configuration)) => configuration,
            _ => return Err(Error::InvalidState),
        };
        queue.validate(pool)?;
        let head = queue.head().ok_or(Error::EmptyQueue)?;
        queue.claim(self.index)?;

        for node in queue.walk(pool).take(queue.len()) {
            pool.node(node).set_transfer_event(configuration.transfer_event as u32);
        }

        let chan = self.registers();
        chan.CFCR.write(ALL_FLAGS);
        self.shared.clear_flags();
        ral::write_reg!(ral::lpdma::ch, chan, CLBAR, LBA: pool.address() >> 16);
        chan.CBR1.write(0);
        chan.CLLR.write(ch::CLLR_UPDATE_ALL | (pool.node_address(head) & ch::CLLR::LA::mask));
        chan.CCR.write(configuration.ccr());

        self.circular = queue.is_circular();
        self.queue = Some(queue.id());
        self.state = State::Linked;
        log::debug!(
            "LPDMA channel {} linked to a {} queue of {} nodes",
            self.index,
            if self.circular { "circular" } else { "one-shot" },
            queue.len()
        );
        Ok(())
    }

    /// Start executing the linked queue
    ///
    /// In node step mode, the channel pauses after every node; call
    /// `start` again to run the next one.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::Linked => {}
            State::Started if self.is_paused() => {}
            _ => return Err(Error::InvalidState),
        }
        atomic::fence(atomic::Ordering::SeqCst);
        #[cfg(target_arch = "arm")]
        cortex_m::asm::dsb();

        let chan = self.registers();
        ral::modify_reg!(ral::lpdma::ch, chan, CCR, EN: 1u32);
        self.state = State::Started;
        log::debug!("LPDMA channel {} started", self.index);
        Ok(())
    }

    /// Update the state from the channel's status
    pub fn poll(&mut self) -> State {
        if self.state == State::Started {
            let csr = self.registers().CSR.read() | self.shared.flags();
            if csr & ch::CSR_ERRORS != 0 {
                self.state = State::Error(ErrorStatus::new(csr));
            } else if !self.circular && self.is_finished(csr) {
                self.state = State::Completed;
            }
        }
        self.state
    }

    /// The channel is idle at the end of its list
    fn is_finished(&self, csr: u32) -> bool {
        let chan = self.registers();
        csr & ch::CSR::IDLEF::mask != 0
            && ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 0)
            && ral::read_reg!(ral::lpdma::ch, chan, CLLR, LA == 0)
    }

    /// The channel stopped between nodes in step mode
    fn is_paused(&self) -> bool {
        let chan = self.registers();
        let csr = chan.CSR.read() | self.shared.flags();
        csr & ch::CSR_ERRORS == 0
            && csr & ch::CSR::IDLEF::mask != 0
            && ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 0)
            && ral::read_reg!(ral::lpdma::ch, chan, CCR, LSM == 1)
            && ral::read_reg!(ral::lpdma::ch, chan, CLLR, LA != 0)
    }

    /// Stop the channel
    ///
    /// A one-shot queue that already completed stays `Completed`. Anything
    /// else, including every circular queue, is [aborted](Self::abort).
    /// Returns the resulting state.
    pub fn stop(&mut self) -> Result<State> {
        match self.state {
            State::Unlinked => Err(Error::InvalidState),
            State::Completed | State::Aborted | State::Error(_) => Ok(self.state),
            State::Linked | State::Started => {
                if !self.circular && self.poll() == State::Completed {
                    log::debug!("LPDMA channel {} stopped after completing", self.index);
                    return Ok(State::Completed);
                }
                self.abort()?;
                Ok(self.state)
            }
        }
    }

    /// Ask a running channel to suspend
    ///
    /// The channel finishes its current beat, then suspends. This call
    /// doesn't wait; check [`is_suspended`](Self::is_suspended).
    pub fn suspend(&mut self) -> Result<()> {
        if self.state != State::Started {
            return Err(Error::InvalidState);
        }
        let chan = self.registers();
        ral::modify_reg!(ral::lpdma::ch, chan, CCR, SUSP: 1u32);
        atomic::fence(atomic::Ordering::SeqCst);
        Ok(())
    }

    /// Returns `true` once the channel acknowledged a suspend
    pub fn is_suspended(&self) -> bool {
        let chan = self.registers();
        ral::read_reg!(ral::lpdma::ch, chan, CSR, SUSPF == 1)
    }

    /// The channel may be reset
    fn is_halted(&self) -> bool {
        let chan = self.registers();
        chan.CSR.read() & (ch::CSR::SUSPF::mask | ch::CSR::IDLEF::mask) != 0
    }

    /// Suspend and reset the channel, wherever it is in its queue
    ///
    /// An enabled channel must suspend before it's reset. If it doesn't
    /// suspend in time, `abort` returns [`Error::SuspendTimeout`] and leaves
    /// the channel suspending; call `abort` again later.
    pub fn abort(&mut self) -> Result<()> {
        if self.state == State::Unlinked {
            return Err(Error::InvalidState);
        }
        let chan = self.registers();
        if ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 1) {
            ral::modify_reg!(ral::lpdma::ch, chan, CCR, SUSP: 1u32);
            if !(0..SUSPEND_POLLS).any(|_| self.is_halted()) {
                log::warn!("LPDMA channel {} did not suspend", self.index);
                return Err(Error::SuspendTimeout);
            }
        }
        ral::modify_reg!(ral::lpdma::ch, chan, CCR, RESET: 1u32, EN: 0u32);
        self.state = State::Aborted;
        log::warn!("LPDMA channel {} aborted", self.index);
        Ok(())
    }

    /// Release `queue`, the queue linked to this channel
    ///
    /// Only valid once the channel completed, aborted, or failed.
    pub fn unlink(&mut self, queue: &mut Queue) -> Result<()> {
        match self.state {
            State::Completed | State::Aborted | State::Error(_) => {}
            _ => return Err(Error::InvalidState),
        }
        match queue.channel() {
            Some(owner) if owner == self.index && self.queue == Some(queue.id()) => {}
            Some(_) => return Err(Error::QueueBusy),
            None => return Err(Error::InvalidState),
        }
        queue.release();

        let chan = self.registers();
        let control = self.configuration.map_or(0, |configuration| configuration.control());
        chan.CCR.write(control);
        chan.CLLR.write(0);
        chan.CBR1.write(0);
        chan.CFCR.write(ALL_FLAGS);
        self.shared.clear_flags();

        self.state = State::Unlinked;
        self.circular = false;
        self.queue = None;
        log::debug!("LPDMA channel {} unlinked", self.index);
        Ok(())
    }

    /// Drop the channel's configuration and error callback
    ///
    /// Only valid while unlinked.
    pub fn deinit(&mut self) -> Result<()> {
        if self.state != State::Unlinked {
            return Err(Error::InvalidState);
        }
        self.registers().CCR.write(0);
        self.shared.set_callback(None);
        self.configuration = None;
        Ok(())
    }

    /// Call `callback` from [`Dma::on_interrupt`] when this channel
    /// reports a DMA error
    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.shared.set_callback(Some(callback));
    }

    /// Returns a future that resolves when the queue completes, or fails
    ///
    /// Route the channel's interrupt to [`Dma::on_interrupt`] to wake the
    /// future. A circular queue only resolves on an error.
    pub fn completion(&mut self) -> Completion<'_> {
        Completion::new(self)
    }
}
