//! I2C3 operations
//!
//! An I2C node moves at most [`MAX_TRANSFER`] bytes, the largest `NBYTES`
//! value. Split larger transfers with [`append_chunked`](crate::builder::append_chunked)
//! and [`MasterConfig::for_chunk`].

use crate::{
    builder::Chunk,
    element::Width,
    node::{Endpoint, NodeKind, NodeTag, Request, Step},
    Buffer, Descriptor, Error, NodePool, Placement, Queue, Result,
};

const CR2: u32 = 0x04;
const OAR1: u32 = 0x08;
const RXDR: u32 = 0x24;
const TXDR: u32 = 0x28;

const CR2_RD_WRN: u32 = 1 << 10;
const CR2_START: u32 = 1 << 13;
const CR2_NBYTES_OFFSET: u32 = 16;
const CR2_RELOAD: u32 = 1 << 24;
const CR2_AUTOEND: u32 = 1 << 25;

const OAR1_OA1EN: u32 = 1 << 15;

/// Largest transfer for a single node
pub const MAX_TRANSFER: usize = 255;

/// Largest 7-bit address
const MAX_ADDRESS: u8 = 0x7F;

/// An I2C instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2c {
    address: u32,
    rx_request: u8,
    tx_request: u8,
}

impl I2c {
    /// Describe an I2C peripheral at `address`, and its DMA requests
    pub const fn new(address: u32, rx_request: u8, tx_request: u8) -> Self {
        I2c {
            address,
            rx_request,
            tx_request,
        }
    }
}

/// I2C3 on LPDMA1
pub const I2C3: I2c = I2c::new(0x4600_2800, 3, 4);

/// A controller (master) transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    pub i2c: I2c,
    /// 7-bit target address
    pub address: u8,
    /// At most [`MAX_TRANSFER`] bytes
    pub buffer: Buffer<u8>,
    /// Generate a (re)start condition before the transfer
    pub start: bool,
    /// More bytes follow in the next node (`RELOAD`)
    ///
    /// Otherwise, the peripheral generates a stop condition after the
    /// last byte.
    pub reload: bool,
}

impl MasterConfig {
    /// A complete transfer on I2C3: start, all bytes, stop
    pub const fn new(address: u8, buffer: Buffer<u8>) -> Self {
        MasterConfig {
            i2c: I2C3,
            address,
            buffer,
            start: true,
            reload: false,
        }
    }

    /// Narrow this transfer down to one chunk
    ///
    /// Only the first chunk generates a start condition, and only the last
    /// chunk ends the transfer. Returns `None` if the chunk leaves the
    /// buffer.
    pub fn for_chunk(&self, chunk: &Chunk) -> Option<Self> {
        Some(MasterConfig {
            buffer: self.buffer.slice(chunk.offset, chunk.len)?,
            start: self.start && chunk.offset == 0,
            reload: self.reload || !chunk.last,
            ..*self
        })
    }

    fn validate(&self) -> Result<()> {
        check_size(&self.buffer)?;
        if self.address > MAX_ADDRESS {
            return Err(Error::InvalidConfiguration);
        }
        Ok(())
    }

    fn cr2(&self, read: bool) -> u32 {
        let mut cr2 = (self.address as u32) << 1;
        cr2 |= (self.buffer.len() as u32) << CR2_NBYTES_OFFSET;
        if read {
            cr2 |= CR2_RD_WRN;
        }
        if self.start {
            cr2 |= CR2_START;
        }
        cr2 |= if self.reload {
            CR2_RELOAD
        } else {
            CR2_AUTOEND
        };
        cr2
    }
}

/// A target (slave) transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    pub i2c: I2c,
    /// 7-bit own address
    pub own_address: u8,
    /// At most [`MAX_TRANSFER`] bytes
    pub buffer: Buffer<u8>,
}

impl SlaveConfig {
    fn validate(&self) -> Result<()> {
        check_size(&self.buffer)?;
        if self.own_address > MAX_ADDRESS {
            return Err(Error::InvalidConfiguration);
        }
        Ok(())
    }
}

fn check_size(buffer: &Buffer<u8>) -> Result<()> {
    if (1..=MAX_TRANSFER).contains(&buffer.len()) {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration)
    }
}

/// Write `config.buffer` to a target
///
/// Appends a `Config` node and a `Data` node.
pub fn master_transmit<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &MasterConfig,
) -> Result<Descriptor> {
    config.validate()?;
    let base = config.i2c.address;
    queue.append(
        pool,
        placement,
        NodeKind::I2cMasterTransmit,
        &[
            Step::write(NodeTag::Config, base + CR2, config.cr2(false)),
            transmit(&config.i2c, &config.buffer),
        ],
    )
}

/// Read `config.buffer` from a target
///
/// Appends a `Config` node and a `Data` node.
pub fn master_receive<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &MasterConfig,
) -> Result<Descriptor> {
    config.validate()?;
    let base = config.i2c.address;
    queue.append(
        pool,
        placement,
        NodeKind::I2cMasterReceive,
        &[
            Step::write(NodeTag::Config, base + CR2, config.cr2(true)),
            receive(&config.i2c, &config.buffer),
        ],
    )
}

/// Answer a controller's read with `config.buffer`
///
/// Appends a `Config` node and a `Data` node.
pub fn slave_transmit<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &SlaveConfig,
) -> Result<Descriptor> {
    config.validate()?;
    queue.append(
        pool,
        placement,
        NodeKind::I2cSlaveTransmit,
        &[own_address(config), transmit(&config.i2c, &config.buffer)],
    )
}

/// Accept a controller's write into `config.buffer`
///
/// Appends a `Config` node and a `Data` node.
pub fn slave_receive<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &SlaveConfig,
) -> Result<Descriptor> {
    config.validate()?;
    queue.append(
        pool,
        placement,
        NodeKind::I2cSlaveReceive,
        &[own_address(config), receive(&config.i2c, &config.buffer)],
    )
}

fn own_address(config: &SlaveConfig) -> Step {
    Step::write(
        NodeTag::Config,
        config.i2c.address + OAR1,
        OAR1_OA1EN | ((config.own_address as u32) << 1),
    )
}

fn transmit(i2c: &I2c, buffer: &Buffer<u8>) -> Step {
    Step::data(
        Endpoint::Memory(buffer.address()),
        Endpoint::Register(i2c.address + TXDR),
        Width::Byte,
        buffer.size() as u16,
        Request::Hardware(i2c.tx_request),
    )
}

fn receive(i2c: &I2c, buffer: &Buffer<u8>) -> Step {
    Step::data(
        Endpoint::Register(i2c.address + RXDR),
        Endpoint::Memory(buffer.address()),
        Width::Byte,
        buffer.size() as u16,
        Request::Hardware(i2c.rx_request),
    )
}
