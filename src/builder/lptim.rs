//! LPTIM1 operations
//!
//! LPTIM1 paces LPBAM queues: its compare events are common trigger
//! sources. These builders start and stop the counter, and change its
//! PWM output.

use crate::{
    node::{NodeKind, NodeTag, Step},
    Descriptor, Error, NodePool, Placement, Queue, Result,
};

const CR: u32 = 0x10;
const CCR1: u32 = 0x14;
const ARR: u32 = 0x18;
const CCR2: u32 = 0x24;

const CR_ENABLE: u32 = 1 << 0;
const CR_SNGSTRT: u32 = 1 << 1;
const CR_CNTSTRT: u32 = 1 << 2;

/// An LPTIM instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lptim {
    address: u32,
}

impl Lptim {
    /// Describe a low-power timer at `address`
    pub const fn new(address: u32) -> Self {
        Lptim { address }
    }
}

/// LPTIM1
pub const LPTIM1: Lptim = Lptim::new(0x4600_4400);

/// How the counter runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Count one period, then stop
    Single,
    /// Count until stopped
    Continuous,
}

/// Start the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartConfig {
    pub lptim: Lptim,
    pub mode: Mode,
}

/// A compare output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    One,
    Two,
}

/// Change the PWM period and pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmConfig {
    pub lptim: Lptim,
    pub channel: Channel,
    /// Auto-reload value (`ARR`), in counter ticks
    pub period: u16,
    /// Compare value (`CCRx`), at most `period`
    pub pulse: u16,
}

/// Enable the timer, then start counting
///
/// Appends an `Enable` node and a `Start` node.
pub fn start<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &StartConfig,
) -> Result<Descriptor> {
    let cr = config.lptim.address + CR;
    let start = match config.mode {
        Mode::Single => CR_SNGSTRT,
        Mode::Continuous => CR_CNTSTRT,
    };
    queue.append(
        pool,
        placement,
        NodeKind::LptimStart,
        &[
            Step::write(NodeTag::Enable, cr, CR_ENABLE),
            Step::write(NodeTag::Start, cr, CR_ENABLE | start),
        ],
    )
}

/// Set the period, then the pulse
///
/// Appends a `Config` node and a `Data` node.
pub fn pwm<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &PwmConfig,
) -> Result<Descriptor> {
    if config.period == 0 || config.pulse > config.period {
        return Err(Error::InvalidConfiguration);
    }
    let base = config.lptim.address;
    let compare = match config.channel {
        Channel::One => CCR1,
        Channel::Two => CCR2,
    };
    queue.append(
        pool,
        placement,
        NodeKind::LptimPwm,
        &[
            Step::write(NodeTag::Config, base + ARR, config.period as u32),
            Step::write(NodeTag::Data, base + compare, config.pulse as u32),
        ],
    )
}

/// Disable the timer
///
/// Appends a `Stop` node.
pub fn stop<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    lptim: &Lptim,
) -> Result<Descriptor> {
    queue.append(
        pool,
        placement,
        NodeKind::LptimStop,
        &[Step::write(NodeTag::Stop, lptim.address + CR, 0)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_modes() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        for (mode, bit) in [(Mode::Single, CR_SNGSTRT), (Mode::Continuous, CR_CNTSTRT)] {
            let config = StartConfig {
                lptim: LPTIM1,
                mode,
            };
            let desc = start(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();
            let enable = pool.node(desc.node(NodeTag::Enable).unwrap());
            assert_eq!(enable.payload(), CR_ENABLE);
            let start = pool.node(desc.node(NodeTag::Start).unwrap());
            assert_eq!(start.payload(), CR_ENABLE | bit);
            assert_eq!(start.addresses().1, 0x4600_4410);
        }
    }

    #[test]
    fn pwm_limits() {
        let mut pool = NodePool::<8>::with_address(0x2800_0040);
        let mut queue = pool.queue();
        let config = PwmConfig {
            lptim: LPTIM1,
            channel: Channel::Two,
            period: 100,
            pulse: 101,
        };
        assert_eq!(
            pwm(&mut pool, &mut queue, Placement::LINEAR, &config),
            Err(Error::InvalidConfiguration)
        );
        let config = PwmConfig { pulse: 25, ..config };
        let desc = pwm(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();
        let pulse = pool.node(desc.node(NodeTag::Data).unwrap());
        assert_eq!(pulse.payload(), 25);
        assert_eq!(pulse.addresses().1, 0x4600_4400 + CCR2);
    }
}
