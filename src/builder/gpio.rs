//! LPGPIO operations
//!
//! Pin writes go through `BSRR`, so a node only touches the pins it names.

use crate::{
    element::Width,
    node::{Endpoint, NodeKind, NodeTag, Request, Step},
    Buffer, Descriptor, Error, NodePool, Placement, Queue, Result,
};

/// Offset of the bit set / reset register
pub const BSRR: u32 = 0x18;

const PINS: u8 = 16;

/// A GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    address: u32,
}

impl Port {
    /// Describe a GPIO port at `address`
    pub const fn new(address: u32) -> Self {
        Port { address }
    }

    /// Returns the bus address of the port's `BSRR`
    pub const fn bsrr(&self) -> u32 {
        self.address + BSRR
    }
}

/// LPGPIO1
pub const LPGPIO1: Port = Port::new(0x4602_0000);

/// A pin level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Low,
    High,
}

impl PinState {
    /// Returns the `BSRR` value that drives `pin` to this level
    pub const fn bsrr(self, pin: u8) -> u32 {
        match self {
            PinState::High => 1 << pin,
            PinState::Low => 1 << (pin + PINS),
        }
    }
}

/// Drive one pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub port: Port,
    pub pin: u8,
    pub state: PinState,
}

/// Write a sequence of `BSRR` values
///
/// Without a trigger, the node writes the whole sequence back to back.
/// Attach a [`Burst`](crate::TriggerMode::Burst) trigger to write one
/// value per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceConfig {
    pub port: Port,
    pub values: Buffer<u32>,
}

/// Drive a pin high or low
///
/// Appends a `Data` node.
pub fn write<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &PinWrite,
) -> Result<Descriptor> {
    if config.pin >= PINS {
        return Err(Error::InvalidConfiguration);
    }
    queue.append(
        pool,
        placement,
        NodeKind::GpioWrite,
        &[Step::write(
            NodeTag::Data,
            config.port.bsrr(),
            config.state.bsrr(config.pin),
        )],
    )
}

/// Write each value of a sequence to `BSRR`
///
/// Appends a `Data` node.
pub fn sequence<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &SequenceConfig,
) -> Result<Descriptor> {
    let bytes = match u16::try_from(config.values.size()) {
        Ok(0) | Err(_) => return Err(Error::InvalidConfiguration),
        Ok(bytes) => bytes,
    };
    queue.append(
        pool,
        placement,
        NodeKind::GpioSequence,
        &[Step::data(
            Endpoint::Memory(config.values.address()),
            Endpoint::Register(config.port.bsrr()),
            Width::Word,
            bytes,
            Request::Software,
        )],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bsrr_values() {
        assert_eq!(PinState::High.bsrr(5), 1 << 5);
        assert_eq!(PinState::Low.bsrr(5), 1 << 21);
    }

    #[test]
    fn pin_out_of_range() {
        let mut pool = NodePool::<2>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let config = PinWrite {
            port: LPGPIO1,
            pin: 16,
            state: PinState::High,
        };
        assert_eq!(
            write(&mut pool, &mut queue, Placement::LINEAR, &config),
            Err(Error::InvalidConfiguration)
        );
    }

    #[test]
    fn sequence_node() {
        let mut pool = NodePool::<2>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        // Safety: never handed to hardware.
        let values = unsafe { Buffer::from_raw(0x2800_4000, 8) };
        let config = SequenceConfig {
            port: LPGPIO1,
            values,
        };
        let desc = sequence(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();
        let node = pool.node(desc.node(NodeTag::Data).unwrap());
        assert_eq!(node.bytes(), 32);
        assert_eq!(node.addresses(), (0x2800_4000, 0x4602_0018));
    }
}
