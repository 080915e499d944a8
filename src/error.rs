//! LPBAM errors and DMA error status

use core::fmt::{self, Debug, Display};

use crate::node::NodeHandle;
use crate::ral::lpdma::ch::{CSR, CSR_ERRORS};

/// A wrapper around a DMA channel status value
///
/// The wrapper contains a copy of the channel's status register at
/// the point of an error. The wrapper implements both `Debug` and
/// `Display`. The type may be printed to understand why there was a
/// DMA error.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ErrorStatus {
    /// The raw channel status
    csr: u32,
}

impl ErrorStatus {
    pub(crate) const fn new(csr: u32) -> Self {
        ErrorStatus { csr }
    }
    /// Returns the raw status value
    pub const fn raw(self) -> u32 {
        self.csr
    }
    /// Returns `true` if the status holds a transfer, link or user setting error
    pub const fn is_error(self) -> bool {
        self.csr & CSR_ERRORS != 0
    }
    /// A data transfer error occurred
    pub const fn is_transfer_error(self) -> bool {
        self.csr & CSR::DTEF::mask != 0
    }
    /// The channel couldn't load the next LLI
    pub const fn is_link_error(self) -> bool {
        self.csr & CSR::ULEF::mask != 0
    }
    /// The channel found an invalid setting when loading a block
    pub const fn is_user_setting_error(self) -> bool {
        self.csr & CSR::USEF::mask != 0
    }
}

impl Debug for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LPDMA_CSR({:#010X})", self.csr)
    }
}

impl Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LPDMA_CSR: IDLEF {idlef} TCF {tcf} DTEF {dtef} ULEF {ulef} USEF {usef} SUSPF {suspf} TOF {tof}",
            idlef = self.csr & 0x1,
            tcf = (self.csr >> 8) & 0x1,
            dtef = (self.csr >> 10) & 0x1,
            ulef = (self.csr >> 11) & 0x1,
            usef = (self.csr >> 12) & 0x1,
            suspf = (self.csr >> 13) & 0x1,
            tof = (self.csr >> 14) & 0x1,
        )
    }
}

/// Errors from queue construction and execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The operation and its configuration can't be expressed as nodes
    InvalidConfiguration,
    /// The node pool has no room for the operation's nodes
    PoolExhausted,
    /// A node would fall outside of the pool's 64 KiB link window
    OutOfLinkRange,
    /// The tag does not name a node of this queue
    UnknownNode,
    /// The node already has a trigger
    AlreadyTriggered,
    /// The queue is already circular, and accepts no more nodes
    AlreadyCircular,
    /// The queue has no nodes
    EmptyQueue,
    /// The node needs a trigger, but has none
    MissingTrigger(NodeHandle),
    /// The queue is linked to a channel, and can't change
    QueueLinked,
    /// The queue is linked to another channel
    QueueBusy,
    /// The channel can't perform this action in its current state
    InvalidState,
    /// The channel did not suspend, so it can't be reset
    SuspendTimeout,
    /// The DMA channel reported an error
    Transfer(ErrorStatus),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration => f.write_str("invalid operation configuration"),
            Error::PoolExhausted => f.write_str("node pool exhausted"),
            Error::OutOfLinkRange => f.write_str("node outside of the link window"),
            Error::UnknownNode => f.write_str("no such node in this queue"),
            Error::AlreadyTriggered => f.write_str("node already has a trigger"),
            Error::AlreadyCircular => f.write_str("queue is already circular"),
            Error::EmptyQueue => f.write_str("queue is empty"),
            Error::MissingTrigger(node) => write!(f, "node {} needs a trigger", node.index()),
            Error::QueueLinked => f.write_str("queue is linked to a channel"),
            Error::QueueBusy => f.write_str("queue is linked to another channel"),
            Error::InvalidState => f.write_str("invalid channel state"),
            Error::SuspendTimeout => f.write_str("channel did not suspend"),
            Error::Transfer(status) => Display::fmt(status, f),
        }
    }
}

impl From<ErrorStatus> for Error {
    fn from(status: ErrorStatus) -> Self {
        Error::Transfer(status)
    }
}
