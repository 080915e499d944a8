//! LPBAM nodes
//!
//! A node is one step that the DMA controller executes without the CPU.
//! Its header is a linked-list item; the controller reads nothing else.
//! Configuration nodes also carry a payload word, the register value that
//! the node copies into its peripheral.

use crate::{
    element::Width,
    ral::{self, lli, Word},
    trigger::TriggerConfig,
};

/// Size of a node in bytes
pub const NODE_SIZE: u32 = core::mem::size_of::<Node>() as u32;

/// Offset of the payload word within a node
pub(crate) const PAYLOAD_OFFSET: u32 = (lli::WORDS * 4) as u32;

/// A DMA-walkable node
#[repr(C, align(32))]
pub struct Node {
    pub(crate) lli: lli::RegisterBlock,
    pub(crate) payload: Word,
    _reserved: u32,
}

const _: () = assert!(NODE_SIZE == 32);

impl Node {
    pub(crate) const fn new() -> Self {
        // Safety: register image and plain words.
        unsafe { ral::zeroed() }
    }

    /// Write the header and payload for `step`
    pub(crate) fn program(&self, step: &Step, payload_address: u32) {
        let (source, source_increment) = match step.source {
            Endpoint::Payload(value) => {
                self.payload.write(value);
                (payload_address, false)
            }
            Endpoint::Register(address) => (address, false),
            Endpoint::Memory(address) => (address, true),
        };
        let (destination, destination_increment) = match step.destination {
            Endpoint::Payload(_) => (payload_address, false),
            Endpoint::Register(address) => (address, false),
            Endpoint::Memory(address) => (address, true),
        };

        let lli = &self.lli;
        ral::write_reg!(
            ral::lli,
            lli,
            CTR1,
            SDW_LOG2: step.width as u32,
            SINC: source_increment as u32,
            DDW_LOG2: step.width as u32,
            DINC: destination_increment as u32
        );
        match step.request {
            Request::Software => ral::write_reg!(ral::lli, lli, CTR2, SWREQ: 1u32),
            Request::Hardware(line) => {
                ral::write_reg!(ral::lli, lli, CTR2, REQSEL: line as u32)
            }
        }
        ral::write_reg!(ral::lli, lli, CBR1, BNDT: step.bytes as u32);
        lli.CSAR.write(source);
        lli.CDAR.write(destination);
        lli.CLLR.write(0);
    }

    /// Point this node at the node found at `address`
    ///
    /// An `address` of zero ends the list.
    pub(crate) fn set_next(&self, address: u32) {
        let link = if address == 0 {
            0
        } else {
            lli::CLLR_UPDATE_ALL | (address & lli::CLLR::LA::mask)
        };
        self.lli.CLLR.write(link);
    }

    /// Returns the low 16 bits of the next node's address, or `None` at the end of a list
    pub fn next(&self) -> Option<u16> {
        let lli = &self.lli;
        let la = ral::read_reg!(ral::lli, lli, CLLR, LA);
        if la == 0 {
            None
        } else {
            Some((la << 2) as u16)
        }
    }

    /// Returns the number of bytes the node moves
    pub fn bytes(&self) -> u16 {
        let lli = &self.lli;
        ral::read_reg!(ral::lli, lli, CBR1, BNDT) as u16
    }

    /// Returns the raw control words `CTR1`, `CTR2`
    pub fn control(&self) -> (u32, u32) {
        (self.lli.CTR1.read(), self.lli.CTR2.read())
    }

    /// Returns the source and destination addresses
    pub fn addresses(&self) -> (u32, u32) {
        (self.lli.CSAR.read(), self.lli.CDAR.read())
    }

    /// Returns the payload word
    pub fn payload(&self) -> u32 {
        self.payload.read()
    }

    /// Returns `true` if a trigger gates this node
    pub fn is_triggered(&self) -> bool {
        let lli = &self.lli;
        ral::read_reg!(ral::lli, lli, CTR2, TRIGPOL) != 0
    }

    pub(crate) fn set_trigger(&self, trigger: &TriggerConfig) {
        let lli = &self.lli;
        ral::modify_reg!(
            ral::lli,
            lli,
            CTR2,
            TRIGSEL: trigger.source.raw() as u32,
            TRIGPOL: trigger.polarity as u32,
            TRIGM: trigger.mode as u32
        );
    }

    pub(crate) fn set_transfer_event(&self, tcem: u32) {
        let lli = &self.lli;
        ral::modify_reg!(ral::lli, lli, CTR2, TCEM: tcem);
    }

    /// Copy of every DMA-visible word, payload included
    pub fn image(&self) -> [u32; lli::WORDS + 1] {
        let lli = &self.lli;
        [
            lli.CTR1.read(),
            lli.CTR2.read(),
            lli.CBR1.read(),
            lli.CSAR.read(),
            lli.CDAR.read(),
            lli.CLLR.read(),
            self.payload.read(),
        ]
    }
}

/// Identifies a node within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(pub(crate) u16);

impl NodeHandle {
    /// Returns the node's index in the pool
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The operation that produced a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NodeKind {
    AdcConversion,
    AdcData,
    AdcStop,
    I2cMasterTransmit,
    I2cMasterReceive,
    I2cSlaveTransmit,
    I2cSlaveReceive,
    SpiTransmit,
    SpiReceive,
    GpioWrite,
    GpioSequence,
    LptimStart,
    LptimPwm,
    LptimStop,
    DmaStart,
}

/// Which node of an operation
///
/// One operation may expand into several nodes. The tag selects one of
/// them when attaching triggers, or when choosing a loop point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    /// Writes a configuration register
    Config,
    /// Enables the peripheral
    Enable,
    /// Starts the peripheral, or another DMA channel
    Start,
    /// Moves data between memory and the peripheral
    Data,
    /// Stops the peripheral, or resets another DMA channel
    Stop,
    /// Suspends another DMA channel
    Suspend,
    /// Points another DMA channel at its queue
    Link,
}

/// Bookkeeping that the DMA controller never sees
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeMeta {
    pub kind: NodeKind,
    pub tag: NodeTag,
    pub queue: u16,
    /// The node stalls without a trigger
    pub needs_trigger: bool,
}

/// One end of a node's transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    /// The node's own payload word, holding this value
    Payload(u32),
    /// A fixed register address
    Register(u32),
    /// An incrementing memory address
    Memory(u32),
}

/// What paces a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    /// Memory-to-memory, runs as soon as the node loads
    Software,
    /// Paced by the peripheral's request line
    Hardware(u8),
}

/// A node that a builder wants appended
#[derive(Debug, Clone, Copy)]
pub(crate) struct Step {
    pub tag: NodeTag,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub width: Width,
    pub bytes: u16,
    pub request: Request,
    pub needs_trigger: bool,
}

impl Step {
    /// Copy `value` into the register at `register`
    pub(crate) const fn write(tag: NodeTag, register: u32, value: u32) -> Self {
        Step {
            tag,
            source: Endpoint::Payload(value),
            destination: Endpoint::Register(register),
            width: Width::Word,
            bytes: 4,
            request: Request::Software,
            needs_trigger: false,
        }
    }

    /// Move `bytes` between memory and a peripheral, paced by `request`
    pub(crate) const fn data(
        source: Endpoint,
        destination: Endpoint,
        width: Width,
        bytes: u16,
        request: Request,
    ) -> Self {
        Step {
            tag: NodeTag::Data,
            source,
            destination,
            width,
            bytes,
            request,
            needs_trigger: false,
        }
    }
}
