//! SPI3 operations
//!
//! Each transfer sets its own size, enables the peripheral, starts it,
//! and moves the frames. The peripheral's frame format comes from its
//! initialization; the buffer's element type must match the frame size.

use crate::{
    node::{Endpoint, NodeKind, NodeTag, Request, Step},
    Buffer, Descriptor, Element, Error, NodePool, Placement, Queue, Result,
};

const CR1: u32 = 0x00;
const CR2: u32 = 0x04;
const TXDR: u32 = 0x20;
const RXDR: u32 = 0x30;

const CR1_SPE: u32 = 1 << 0;
const CR1_CSTART: u32 = 1 << 9;

/// An SPI instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spi {
    address: u32,
    rx_request: u8,
    tx_request: u8,
}

impl Spi {
    /// Describe an SPI peripheral at `address`, and its DMA requests
    pub const fn new(address: u32, rx_request: u8, tx_request: u8) -> Self {
        Spi {
            address,
            rx_request,
            tx_request,
        }
    }
}

/// SPI3 on LPDMA1
pub const SPI3: Spi = Spi::new(0x4600_2000, 1, 2);

/// A transfer of `buffer.len()` frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig<E: Element> {
    pub spi: Spi,
    pub buffer: Buffer<E>,
}

/// Send the buffer
///
/// Appends `Config`, `Enable`, `Start` and `Data` nodes.
pub fn transmit<E: Element, const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &TransferConfig<E>,
) -> Result<Descriptor> {
    let bytes = check_size(&config.buffer)?;
    let spi = &config.spi;
    let data = Step::data(
        Endpoint::Memory(config.buffer.address()),
        Endpoint::Register(spi.address + TXDR),
        E::WIDTH,
        bytes,
        Request::Hardware(spi.tx_request),
    );
    queue.append(
        pool,
        placement,
        NodeKind::SpiTransmit,
        &steps(spi, config.buffer.len() as u32, data),
    )
}

/// Fill the buffer
///
/// Appends `Config`, `Enable`, `Start` and `Data` nodes.
pub fn receive<E: Element, const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &TransferConfig<E>,
) -> Result<Descriptor> {
    let bytes = check_size(&config.buffer)?;
    let spi = &config.spi;
    let data = Step::data(
        Endpoint::Register(spi.address + RXDR),
        Endpoint::Memory(config.buffer.address()),
        E::WIDTH,
        bytes,
        Request::Hardware(spi.rx_request),
    );
    queue.append(
        pool,
        placement,
        NodeKind::SpiReceive,
        &steps(spi, config.buffer.len() as u32, data),
    )
}

fn check_size<E: Element>(buffer: &Buffer<E>) -> Result<u16> {
    match u16::try_from(buffer.size()) {
        Ok(0) | Err(_) => Err(Error::InvalidConfiguration),
        Ok(bytes) => Ok(bytes),
    }
}

fn steps(spi: &Spi, frames: u32, data: Step) -> [Step; 4] {
    [
        Step::write(NodeTag::Config, spi.address + CR2, frames),
        Step::write(NodeTag::Enable, spi.address + CR1, CR1_SPE),
        Step::write(NodeTag::Start, spi.address + CR1, CR1_SPE | CR1_CSTART),
        data,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Width;

    #[test]
    fn receive_nodes_in_order() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        // Safety: never handed to hardware.
        let buffer = unsafe { Buffer::<u16>::from_raw(0x2800_4000, 12) };
        let config = TransferConfig { spi: SPI3, buffer };
        let desc = receive(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();

        let tags: Vec<_> = desc.nodes().map(|(tag, _)| tag).collect();
        assert_eq!(tags, [NodeTag::Config, NodeTag::Enable, NodeTag::Start, NodeTag::Data]);
        assert_eq!(pool.node(desc.node(NodeTag::Config).unwrap()).payload(), 12);

        let data = pool.node(desc.node(NodeTag::Data).unwrap());
        assert_eq!(data.bytes(), 24);
        assert_eq!(data.addresses(), (SPI3.address + RXDR, 0x2800_4000));
        let (ctr1, ctr2) = data.control();
        assert_eq!(ctr1 & 0b11, Width::HalfWord as u32);
        assert_eq!(ctr2 & 0x7F, SPI3.rx_request as u32);
    }

    #[test]
    fn transfer_size_limits() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        for len in [0, 0x8000] {
            // Safety: never handed to hardware.
            let buffer = unsafe { Buffer::<u16>::from_raw(0x2800_4000, len) };
            let config = TransferConfig { spi: SPI3, buffer };
            assert_eq!(
                transmit(&mut pool, &mut queue, Placement::LINEAR, &config),
                Err(Error::InvalidConfiguration)
            );
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn pool_too_small() {
        let mut pool = NodePool::<3>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        // Safety: never handed to hardware.
        let buffer = unsafe { Buffer::<u8>::from_raw(0x2800_4000, 4) };
        let config = TransferConfig { spi: SPI3, buffer };
        assert_eq!(
            transmit(&mut pool, &mut queue, Placement::LINEAR, &config),
            Err(Error::PoolExhausted)
        );
        assert!(queue.is_empty());
        assert_eq!(pool.used(), 0);
    }
}
