//! ADC4 operations
//!
//! ADC4 stays powered in Stop 2. These builders select channels, start
//! and stop conversions, and collect the converted data.

use crate::{
    element::Width,
    node::{Endpoint, NodeKind, NodeTag, Request, Step},
    Buffer, Descriptor, Error, NodePool, Placement, Queue, Result,
};

const CR: u32 = 0x08;
const CFGR1: u32 = 0x0C;
const CHSELR: u32 = 0x28;
const DR: u32 = 0x40;

const CR_ADSTART: u32 = 1 << 2;
const CR_ADSTP: u32 = 1 << 4;
const CR_ADVREGEN: u32 = 1 << 28;

const CFGR1_DMAEN: u32 = 1 << 0;
const CFGR1_DMACFG: u32 = 1 << 1;
const CFGR1_CONT: u32 = 1 << 13;

/// Highest channel selection bit
const CHANNELS: u32 = 24;

/// An ADC instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adc {
    address: u32,
    request: u8,
}

impl Adc {
    /// Describe an ADC at `address`, served by the DMA request `request`
    pub const fn new(address: u32, request: u8) -> Self {
        Adc { address, request }
    }
}

/// ADC4 on LPDMA1
pub const ADC4: Adc = Adc::new(0x4602_1000, 0);

/// Channel selection, and conversion start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionConfig {
    pub adc: Adc,
    /// One bit per ADC channel (`CHSELR`)
    pub channels: u32,
}

/// DMA settings for converted data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConfig {
    pub adc: Adc,
    /// Receives one half-word per conversion
    pub buffer: Buffer<u16>,
    /// `CFGR1` bits other than the DMA and continuous bits, like the
    /// resolution and the alignment
    pub settings: u32,
    /// Convert continuously (`CONT`)
    pub continuous: bool,
    /// Keep requesting DMA after the buffer fills (`DMACFG`)
    ///
    /// Without continuous requests, the data node needs a trigger.
    pub continuous_requests: bool,
}

/// Select channels, then start converting
///
/// Appends a `Config` node and a `Start` node.
pub fn conversion<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &ConversionConfig,
) -> Result<Descriptor> {
    if config.channels == 0 || config.channels >> CHANNELS != 0 {
        return Err(Error::InvalidConfiguration);
    }
    let base = config.adc.address;
    queue.append(
        pool,
        placement,
        NodeKind::AdcConversion,
        &[
            Step::write(NodeTag::Config, base + CHSELR, config.channels),
            Step::write(NodeTag::Start, base + CR, CR_ADVREGEN | CR_ADSTART),
        ],
    )
}

/// Enable DMA requests, then move the converted data into the buffer
///
/// Appends a `Config` node and a `Data` node.
pub fn data<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &DataConfig,
) -> Result<Descriptor> {
    let bytes = config.buffer.size();
    if bytes == 0 || bytes > u16::MAX as usize {
        return Err(Error::InvalidConfiguration);
    }
    let managed = CFGR1_DMAEN | CFGR1_DMACFG | CFGR1_CONT;
    if config.settings & managed != 0 {
        return Err(Error::InvalidConfiguration);
    }

    let mut cfgr1 = config.settings | CFGR1_DMAEN;
    if config.continuous_requests {
        cfgr1 |= CFGR1_DMACFG;
    }
    if config.continuous {
        cfgr1 |= CFGR1_CONT;
    }

    let base = config.adc.address;
    let mut transfer = Step::data(
        Endpoint::Register(base + DR),
        Endpoint::Memory(config.buffer.address()),
        Width::HalfWord,
        bytes as u16,
        Request::Hardware(config.adc.request),
    );
    transfer.needs_trigger = !config.continuous_requests;

    queue.append(
        pool,
        placement,
        NodeKind::AdcData,
        &[Step::write(NodeTag::Config, base + CFGR1, cfgr1), transfer],
    )
}

/// Stop converting
///
/// Appends a `Stop` node.
pub fn stop<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    adc: &Adc,
) -> Result<Descriptor> {
    queue.append(
        pool,
        placement,
        NodeKind::AdcStop,
        &[Step::write(NodeTag::Stop, adc.address + CR, CR_ADVREGEN | CR_ADSTP)],
    )
}
