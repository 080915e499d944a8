//! A software model of the LPDMA controller
//!
//! [`Lpdma`] walks queues the way the DMA controller does, using the
//! register images that the builders produce. It lets you run a queue on
//! a host: link and start channels with the usual [`Channel`](crate::Channel)
//! API, then [`run`](Lpdma::run) the model and fire
//! [`trigger`](Lpdma::trigger)s.
//!
//! The model knows about the node pool and the controller's registers.
//! Every other access goes to a [`Bus`] that you provide. Hardware
//! requests are always ready.
//!
//! ```
//! use stm32_lpbam::{gpio, model, Configuration, Dma, NodePool, Placement, Width};
//!
//! const LPDMA1: u32 = 0x4602_5000;
//!
//! #[derive(Default)]
//! struct Pins(Vec<u32>);
//! impl model::Bus for Pins {
//!     fn read(&mut self, _: u32, _: Width) -> u32 { 0 }
//!     fn write(&mut self, _: u32, _: Width, value: u32) { self.0.push(value) }
//! }
//!
//! let registers: &'static model::Registers = Box::leak(Box::new(model::Registers::new()));
//! // Safety: the model's registers live forever.
//! let dma: &'static Dma<4> =
//!     Box::leak(Box::new(unsafe { Dma::with_address(registers.as_ptr(), LPDMA1) }));
//!
//! let mut pool = NodePool::<4>::with_address(0x2800_0040);
//! let mut queue = pool.queue();
//! let high = gpio::PinWrite { port: gpio::LPGPIO1, pin: 2, state: gpio::PinState::High };
//! gpio::write(&mut pool, &mut queue, Placement::LINEAR, &high).unwrap();
//!
//! // Safety: only channel 0 handle.
//! let mut channel = unsafe { dma.channel(0) };
//! channel.init(&Configuration::default()).unwrap();
//! channel.link(&pool, &mut queue).unwrap();
//! channel.start().unwrap();
//!
//! let mut lpdma = model::Lpdma::new(registers, LPDMA1, &pool, Pins::default());
//! assert_eq!(lpdma.run(), 1);
//! assert_eq!(lpdma.bus().0, [1 << 2]);
//! ```

use crate::{
    element::Width,
    node::{NodeHandle, NODE_SIZE},
    pool::NodePool,
    ral::{
        self,
        lpdma::{self, ch, CHANNEL_BLOCKS, CHANNEL_OFFSET, CHANNEL_STRIDE},
        Word,
    },
    trigger::{TriggerMode, TriggerSource},
};

/// Memory and peripherals outside of the pool and the DMA controller
pub trait Bus {
    /// Read `width` at `address`
    fn read(&mut self, address: u32, width: Width) -> u32;
    /// Write the low `width` of `value` to `address`
    fn write(&mut self, address: u32, width: Width, value: u32);
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn read(&mut self, address: u32, width: Width) -> u32 {
        (**self).read(address, width)
    }
    fn write(&mut self, address: u32, width: Width, value: u32) {
        (**self).write(address, width, value)
    }
}

/// Register storage for a modeled controller
///
/// Hand [`as_ptr`](Self::as_ptr) to [`Dma::with_address`](crate::Dma::with_address),
/// and the registers themselves to [`Lpdma::new`].
pub struct Registers(lpdma::RegisterBlock);

impl Registers {
    /// Registers at their reset value
    pub const fn new() -> Self {
        // Safety: a register block.
        Registers(unsafe { ral::zeroed() })
    }

    /// Returns a pointer to the register block
    pub fn as_ptr(&self) -> *const () {
        (&self.0 as *const lpdma::RegisterBlock).cast()
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel model state that isn't in a register
#[derive(Debug, Clone, Copy)]
struct Progress {
    current: Option<NodeHandle>,
    executed: usize,
    pulse: bool,
    /// `EN` as the controller last left it
    enabled: bool,
}

const IDLE: Progress = Progress {
    current: None,
    executed: 0,
    pulse: false,
    enabled: false,
};

/// Nodes that one `run` may execute, unless changed
const DEFAULT_BUDGET: usize = 1024;

/// An LPDMA controller, in software
pub struct Lpdma<'a, B, const N: usize> {
    registers: &'a lpdma::RegisterBlock,
    address: u32,
    pool: &'a NodePool<N>,
    bus: B,
    channels: [Progress; CHANNEL_BLOCKS],
    budget: usize,
    remaining: usize,
}

impl<'a, B: Bus, const N: usize> Lpdma<'a, B, N> {
    /// Model the controller that owns `registers`, at the bus address
    /// `address`
    ///
    /// LLIs may only come from `pool`.
    pub fn new(registers: &'a Registers, address: u32, pool: &'a NodePool<N>, bus: B) -> Self {
        Lpdma {
            registers: &registers.0,
            address,
            pool,
            bus,
            channels: [IDLE; CHANNEL_BLOCKS],
            budget: DEFAULT_BUDGET,
            remaining: 0,
        }
    }

    /// Returns the bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Returns the bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Limit the nodes that a single [`run`](Self::run) executes
    ///
    /// Circular queues without triggers never stall; the budget stops them.
    pub fn set_budget(&mut self, nodes: usize) {
        self.budget = nodes;
    }

    /// Returns the node that `channel` last loaded
    pub fn current_node(&self, channel: usize) -> Option<NodeHandle> {
        self.channels[channel].current
    }

    /// Returns the number of nodes that `channel` executed
    pub fn executed(&self, channel: usize) -> usize {
        self.channels[channel].executed
    }

    /// Returns `true` if `channel` is enabled
    pub fn is_enabled(&self, channel: usize) -> bool {
        let chan = &self.registers.CH[channel];
        ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 1)
    }

    /// Run every enabled channel until it stalls
    ///
    /// Returns the number of nodes executed.
    pub fn run(&mut self) -> usize {
        self.remaining = self.budget;
        let mut total = 0;
        loop {
            let mut executed = 0;
            for channel in 0..CHANNEL_BLOCKS {
                executed += self.service(channel);
            }
            total += executed;
            if executed == 0 || self.remaining == 0 {
                return total;
            }
        }
    }

    /// Fire one pulse on the trigger input `source`, then run
    ///
    /// The pulse releases every channel that waits on `source`. Returns the
    /// number of nodes executed.
    pub fn trigger(&mut self, source: TriggerSource) -> usize {
        let settled = self.run();
        let registers = self.registers;
        for channel in 0..CHANNEL_BLOCKS {
            let chan = &registers.CH[channel];
            let waiting = ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 1)
                && ral::read_reg!(ral::lpdma::ch, chan, CBR1, BNDT != 0)
                && ral::read_reg!(ral::lpdma::ch, chan, CTR2, TRIGPOL != 0)
                && ral::read_reg!(ral::lpdma::ch, chan, CTR2, TRIGSEL) == source.raw() as u32;
            if !waiting {
                continue;
            }
            let progress = &mut self.channels[channel];
            if progress.pulse {
                ral::modify_reg!(ral::lpdma::ch, chan, CSR, TOF: 1u32);
            }
            progress.pulse = true;
        }
        settled + self.run()
    }

    /// Apply software's register writes
    ///
    /// Software can't clear `EN` on an enabled channel. It may only reset
    /// a channel that is disabled, or suspended.
    fn sync(&mut self, channel: usize) {
        let registers = self.registers;
        let chan = &registers.CH[channel];
        let clear = chan.CFCR.read();
        if clear != 0 {
            chan.CSR.write(chan.CSR.read() & !clear);
            chan.CFCR.write(0);
        }
        if self.channels[channel].enabled {
            ral::modify_reg!(ral::lpdma::ch, chan, CCR, EN: 1u32);
        }
        let enabled = ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 1);
        let suspending = ral::read_reg!(ral::lpdma::ch, chan, CCR, SUSP == 1);
        if enabled && suspending {
            ral::modify_reg!(ral::lpdma::ch, chan, CSR, SUSPF: 1u32, IDLEF: 1u32);
        }

        if ral::read_reg!(ral::lpdma::ch, chan, CCR, RESET == 1) {
            if enabled && ral::read_reg!(ral::lpdma::ch, chan, CSR, SUSPF == 0) {
                ral::modify_reg!(ral::lpdma::ch, chan, CCR, RESET: 0u32);
                self.fail(channel, ch::CSR::USEF::mask);
            } else {
                self.reset(channel);
            }
        } else if !enabled {
            ral::modify_reg!(ral::lpdma::ch, chan, CSR, IDLEF: 1u32);
        } else if !suspending {
            ral::modify_reg!(ral::lpdma::ch, chan, CSR, IDLEF: 0u32);
        }
        self.channels[channel].enabled = ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 1);
    }

    /// Clear `EN` on behalf of the controller
    fn disable(&mut self, channel: usize) {
        let chan = &self.registers.CH[channel];
        ral::modify_reg!(ral::lpdma::ch, chan, CCR, EN: 0u32);
        self.channels[channel].enabled = false;
    }

    fn reset(&mut self, channel: usize) {
        let registers = self.registers;
        let chan = &registers.CH[channel];
        ral::modify_reg!(ral::lpdma::ch, chan, CCR, EN: 0u32, RESET: 0u32, SUSP: 0u32);
        chan.CBR1.write(0);
        chan.CSR.write(ch::CSR::IDLEF::mask);
        let progress = &mut self.channels[channel];
        progress.current = None;
        progress.pulse = false;
        progress.enabled = false;
    }

    /// Stop `channel` with the status flag `flag`
    fn fail(&mut self, channel: usize, flag: u32) {
        self.disable(channel);
        let chan = &self.registers.CH[channel];
        chan.CSR.write(chan.CSR.read() | flag | ch::CSR::IDLEF::mask);
        log::debug!("modeled channel {} failed: {:#010X}", channel, flag);
    }

    /// Run `channel` until it stalls, and return the nodes it executed
    fn service(&mut self, channel: usize) -> usize {
        self.sync(channel);
        let registers = self.registers;
        let chan = &registers.CH[channel];
        let mut executed = 0;
        while self.remaining > 0 && ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 1) {
            if ral::read_reg!(ral::lpdma::ch, chan, CCR, SUSP == 1) {
                ral::modify_reg!(ral::lpdma::ch, chan, CSR, SUSPF: 1u32, IDLEF: 1u32);
                break;
            }
            if ral::read_reg!(ral::lpdma::ch, chan, CBR1, BNDT == 0) {
                if !self.load(channel) {
                    break;
                }
                continue;
            }

            let gated = ral::read_reg!(ral::lpdma::ch, chan, CTR2, TRIGPOL != 0);
            if gated {
                if !self.channels[channel].pulse {
                    break;
                }
                self.channels[channel].pulse = false;
            }
            let mode = TriggerMode::from_raw(ral::read_reg!(ral::lpdma::ch, chan, CTR2, TRIGM));
            let burst = gated && mode == TriggerMode::Burst;

            if let Err(flag) = self.transfer(channel, burst) {
                self.fail(channel, flag);
                break;
            }
            if ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 0) {
                // The node reset its own channel
                break;
            }
            if ral::read_reg!(ral::lpdma::ch, chan, CBR1, BNDT != 0) {
                continue;
            }

            executed += 1;
            self.remaining -= 1;
            self.channels[channel].executed += 1;
            let tcem = ral::read_reg!(ral::lpdma::ch, chan, CTR2, TCEM);
            if tcem == 0 || tcem == 2 {
                ral::modify_reg!(ral::lpdma::ch, chan, CSR, TCF: 1u32);
            }
            if ral::read_reg!(ral::lpdma::ch, chan, CCR, LSM == 1) {
                self.disable(channel);
                ral::modify_reg!(ral::lpdma::ch, chan, CSR, IDLEF: 1u32);
                break;
            }
        }
        executed
    }

    /// Load the next LLI into `channel`
    ///
    /// Returns `false` if the channel stopped: at the end of its list, or
    /// on a link or user setting error.
    fn load(&mut self, channel: usize) -> bool {
        let registers = self.registers;
        let chan = &registers.CH[channel];
        let cllr = chan.CLLR.read();
        let link = cllr & ch::CLLR::LA::mask;
        if link == 0 {
            self.disable(channel);
            ral::modify_reg!(ral::lpdma::ch, chan, CSR, TCF: 1u32, IDLEF: 1u32);
            self.channels[channel].current = None;
            return false;
        }

        let address = (chan.CLBAR.read() & ch::CLBAR::LBA::mask) | link;
        let targets: [(u32, &Word); 6] = [
            (ch::CLLR::UT1::mask, &chan.CTR1),
            (ch::CLLR::UT2::mask, &chan.CTR2),
            (ch::CLLR::UB1::mask, &chan.CBR1),
            (ch::CLLR::USA::mask, &chan.CSAR),
            (ch::CLLR::UDA::mask, &chan.CDAR),
            (ch::CLLR::ULL::mask, &chan.CLLR),
        ];
        let mut words = [None; 6];
        let mut next = address;
        for (word, (update, _)) in words.iter_mut().zip(targets.iter()) {
            if cllr & update == 0 {
                continue;
            }
            match self.pool.word_at(next) {
                Some(value) => *word = Some(value.read()),
                None => {
                    self.fail(channel, ch::CSR::ULEF::mask);
                    return false;
                }
            }
            next += 4;
        }
        for (word, (_, register)) in words.iter().zip(targets.iter()) {
            if let Some(value) = word {
                register.write(*value);
            }
        }
        if cllr & ch::CLLR::ULL::mask == 0 {
            chan.CLLR.write(0);
        }
        self.channels[channel].current = self.pool.handle_at(address);

        let source = ral::read_reg!(ral::lpdma::ch, chan, CTR1, SDW_LOG2);
        let destination = ral::read_reg!(ral::lpdma::ch, chan, CTR1, DDW_LOG2);
        let valid = Width::from_log2(source).is_some()
            && source == destination
            && ral::read_reg!(ral::lpdma::ch, chan, CBR1, BNDT != 0);
        if !valid {
            self.fail(channel, ch::CSR::USEF::mask);
        }
        valid
    }

    /// Move data for the loaded node
    ///
    /// Moves one beat in `burst` mode, otherwise the whole block. Returns
    /// the status flag of a failure.
    fn transfer(&mut self, channel: usize, burst: bool) -> Result<(), u32> {
        let registers = self.registers;
        let chan = &registers.CH[channel];
        let log2 = ral::read_reg!(ral::lpdma::ch, chan, CTR1, SDW_LOG2);
        let width = Width::from_log2(log2).ok_or(ch::CSR::USEF::mask)?;
        let step = width.bytes();
        loop {
            let remaining = ral::read_reg!(ral::lpdma::ch, chan, CBR1, BNDT);
            if remaining == 0 {
                return Ok(());
            }
            if remaining < step {
                return Err(ch::CSR::USEF::mask);
            }
            let source = chan.CSAR.read();
            let destination = chan.CDAR.read();
            let value = self.read(source, width).ok_or(ch::CSR::DTEF::mask)?;
            self.write(destination, width, value)
                .ok_or(ch::CSR::DTEF::mask)?;
            if ral::read_reg!(ral::lpdma::ch, chan, CCR, EN == 0) {
                return Ok(());
            }
            if ral::read_reg!(ral::lpdma::ch, chan, CTR1, SINC == 1) {
                chan.CSAR.write(source + step);
            }
            if ral::read_reg!(ral::lpdma::ch, chan, CTR1, DINC == 1) {
                chan.CDAR.write(destination + step);
            }
            ral::modify_reg!(ral::lpdma::ch, chan, CBR1, BNDT: remaining - step);
            if burst {
                return Ok(());
            }
        }
    }

    fn in_pool(&self, address: u32) -> bool {
        address
            .checked_sub(self.pool.address())
            .map_or(false, |offset| offset < N as u32 * NODE_SIZE)
    }

    /// Returns the controller register at `address`, if it's in the
    /// controller's window
    fn register(&self, address: u32) -> Option<(usize, u32, &'a Word)> {
        let registers = self.registers;
        let offset = address.checked_sub(self.address)?;
        if offset < CHANNEL_OFFSET {
            let register = match offset {
                0x00 => &registers.SECCFGR,
                0x04 => &registers.PRIVCFGR,
                0x08 => &registers.RCFGLOCKR,
                0x0C => &registers.MISR,
                0x10 => &registers.SMISR,
                _ => return None,
            };
            return Some((usize::MAX, offset, register));
        }
        let channel = ((offset - CHANNEL_OFFSET) / CHANNEL_STRIDE) as usize;
        let chan = registers.CH.get(channel)?;
        let offset = (offset - CHANNEL_OFFSET) % CHANNEL_STRIDE;
        let register = match offset {
            ch::offsets::CLBAR => &chan.CLBAR,
            ch::offsets::CFCR => &chan.CFCR,
            ch::offsets::CSR => &chan.CSR,
            ch::offsets::CCR => &chan.CCR,
            ch::offsets::CTR1 => &chan.CTR1,
            ch::offsets::CTR2 => &chan.CTR2,
            ch::offsets::CBR1 => &chan.CBR1,
            ch::offsets::CSAR => &chan.CSAR,
            ch::offsets::CDAR => &chan.CDAR,
            ch::offsets::CLLR => &chan.CLLR,
            _ => return None,
        };
        Some((channel, offset, register))
    }

    fn in_controller(&self, address: u32) -> bool {
        address
            .checked_sub(self.address)
            .map_or(false, |offset| {
                (offset as usize) < core::mem::size_of::<lpdma::RegisterBlock>()
            })
    }

    fn read(&mut self, address: u32, width: Width) -> Option<u32> {
        if self.in_pool(address) {
            let pool = self.pool;
            return match width {
                Width::Word => pool.word_at(address).map(Word::read),
                _ => None,
            };
        }
        if self.in_controller(address) {
            let (_, _, register) = self.register(address)?;
            return match width {
                Width::Word => Some(register.read()),
                _ => None,
            };
        }
        Some(self.bus.read(address, width))
    }

    fn write(&mut self, address: u32, width: Width, value: u32) -> Option<()> {
        if self.in_pool(address) {
            let pool = self.pool;
            let word = pool.word_at(address).filter(|_| width == Width::Word)?;
            word.write(value);
            return Some(());
        }
        if self.in_controller(address) {
            let (channel, offset, register) = self.register(address)?;
            if width != Width::Word {
                return None;
            }
            if channel == usize::MAX {
                register.write(value);
            } else if offset != ch::offsets::CSR {
                register.write(value);
                self.sync(channel);
            }
            return Some(());
        }
        self.bus.write(address, width, value);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Bus, Lpdma, Registers};
    use crate::{
        element::Width,
        gpio::{self, PinState, PinWrite},
        ral::lpdma::ch,
        Buffer, NodePool, NodeTag, Placement, Polarity, TriggerConfig, TriggerMode, TriggerSource,
    };

    const CONTROLLER: u32 = 0x4602_5000;
    const POOL: u32 = 0x2800_0100;
    const BSRR: u32 = 0x4602_0018;

    /// Reads return the low half of the address
    #[derive(Default)]
    struct Recorder {
        writes: Vec<(u32, u32)>,
    }

    impl Bus for Recorder {
        fn read(&mut self, address: u32, _: Width) -> u32 {
            address & 0xFFFF
        }
        fn write(&mut self, address: u32, _: Width, value: u32) {
            self.writes.push((address, value));
        }
    }

    fn enable(registers: &Registers, channel: usize, head: u32) {
        let chan = &registers.0.CH[channel];
        chan.CLBAR.write(head & ch::CLBAR::LBA::mask);
        chan.CLLR.write(ch::CLLR_UPDATE_ALL | (head & ch::CLLR::LA::mask));
        chan.CCR.write(ch::CCR::EN::mask);
    }

    fn pin(state: PinState) -> PinWrite {
        PinWrite {
            port: gpio::LPGPIO1,
            pin: 4,
            state,
        }
    }

    #[test]
    fn burst_moves_one_value_per_pulse() {
        let mut pool = NodePool::<2>::with_address(POOL);
        let mut queue = pool.queue();
        // Safety: the bus model backs this memory.
        let values = unsafe { Buffer::<u32>::from_raw(0x2000_0010, 3) };
        let config = gpio::SequenceConfig {
            port: gpio::LPGPIO1,
            values,
        };
        let sequence = gpio::sequence(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();
        let trigger = TriggerConfig {
            source: TriggerSource::LPTIM1_CH2,
            polarity: Polarity::Rising,
            mode: TriggerMode::Burst,
        };
        queue
            .set_trigger(&mut pool, &sequence, NodeTag::Data, &trigger)
            .unwrap();

        let registers = Registers::new();
        enable(&registers, 0, POOL);
        let mut lpdma = Lpdma::new(&registers, CONTROLLER, &pool, Recorder::default());
        assert_eq!(lpdma.run(), 0);
        assert_eq!(lpdma.current_node(0), queue.head());

        assert_eq!(lpdma.trigger(TriggerSource::LPTIM1_CH2), 0);
        assert_eq!(lpdma.trigger(TriggerSource::LPTIM1_CH1), 0);
        assert_eq!(lpdma.trigger(TriggerSource::LPTIM1_CH2), 0);
        assert_eq!(lpdma.bus().writes.len(), 2);
        assert_eq!(lpdma.trigger(TriggerSource::LPTIM1_CH2), 1);
        assert_eq!(
            lpdma.bus().writes,
            [(BSRR, 0x0010), (BSRR, 0x0014), (BSRR, 0x0018)]
        );
        assert!(!lpdma.is_enabled(0));
        assert_ne!(registers.0.CH[0].CSR.read() & ch::CSR::TCF::mask, 0);
    }

    #[test]
    fn link_outside_pool() {
        let pool = NodePool::<2>::with_address(POOL);
        let registers = Registers::new();
        enable(&registers, 1, 0x3000_0100);
        let mut lpdma = Lpdma::new(&registers, CONTROLLER, &pool, Recorder::default());
        assert_eq!(lpdma.run(), 0);
        assert!(!lpdma.is_enabled(1));
        let csr = registers.0.CH[1].CSR.read();
        assert_ne!(csr & ch::CSR::ULEF::mask, 0);
        assert_ne!(csr & ch::CSR::IDLEF::mask, 0);
    }

    #[test]
    fn reset_forgets_the_queue() {
        let mut pool = NodePool::<2>::with_address(POOL);
        let mut queue = pool.queue();
        let high = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::High))
            .unwrap();
        queue
            .set_trigger(
                &mut pool,
                &high,
                NodeTag::Data,
                &TriggerConfig::rising(TriggerSource::EXTI0),
            )
            .unwrap();

        let registers = Registers::new();
        enable(&registers, 2, POOL);
        let mut lpdma = Lpdma::new(&registers, CONTROLLER, &pool, Recorder::default());
        assert_eq!(lpdma.run(), 0);
        assert!(lpdma.current_node(2).is_some());

        let chan = &registers.0.CH[2];
        chan.CCR.write(ch::CCR::EN::mask | ch::CCR::SUSP::mask);
        assert_eq!(lpdma.run(), 0);
        assert_ne!(chan.CSR.read() & ch::CSR::SUSPF::mask, 0);

        chan.CCR.write(ch::CCR::RESET::mask);
        assert_eq!(lpdma.trigger(TriggerSource::EXTI0), 0);
        assert_eq!(lpdma.current_node(2), None);
        assert!(!lpdma.is_enabled(2));
        assert_eq!(chan.CSR.read(), ch::CSR::IDLEF::mask);
        assert!(lpdma.bus().writes.is_empty());
    }

    #[test]
    fn reset_needs_a_suspended_channel() {
        let mut pool = NodePool::<2>::with_address(POOL);
        let mut queue = pool.queue();
        let high = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::High))
            .unwrap();
        queue
            .set_trigger(
                &mut pool,
                &high,
                NodeTag::Data,
                &TriggerConfig::rising(TriggerSource::EXTI0),
            )
            .unwrap();

        let registers = Registers::new();
        enable(&registers, 2, POOL);
        let mut lpdma = Lpdma::new(&registers, CONTROLLER, &pool, Recorder::default());
        assert_eq!(lpdma.run(), 0);

        // Clearing EN doesn't stop an active channel
        let chan = &registers.0.CH[2];
        chan.CCR.write(0);
        assert_eq!(lpdma.run(), 0);
        assert!(lpdma.is_enabled(2));

        chan.CCR.write(ch::CCR::RESET::mask);
        assert_eq!(lpdma.run(), 0);
        assert!(!lpdma.is_enabled(2));
        assert_eq!(chan.CCR.read() & ch::CCR::RESET::mask, 0);
        let csr = chan.CSR.read();
        assert_ne!(csr & ch::CSR::USEF::mask, 0);
        assert_eq!(csr & ch::CSR::SUSPF::mask, 0);
        assert_eq!(lpdma.current_node(2), queue.head());
        assert_eq!(lpdma.trigger(TriggerSource::EXTI0), 0);
        assert!(lpdma.bus().writes.is_empty());
    }

    #[test]
    fn budget_stops_free_running_loops() {
        let mut pool = NodePool::<2>::with_address(POOL);
        let mut queue = pool.queue();
        let high = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::High))
            .unwrap();
        gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(PinState::Low)).unwrap();
        queue.set_circular(&mut pool, &high, NodeTag::Data).unwrap();

        let registers = Registers::new();
        enable(&registers, 0, POOL);
        let mut lpdma = Lpdma::new(&registers, CONTROLLER, &pool, Recorder::default());
        lpdma.set_budget(5);
        assert_eq!(lpdma.run(), 5);
        assert_eq!(lpdma.executed(0), 5);
        let values: Vec<u32> = lpdma.bus().writes.iter().map(|&(_, value)| value).collect();
        assert_eq!(values, [1 << 4, 1 << 20, 1 << 4, 1 << 20, 1 << 4]);
        assert!(lpdma.is_enabled(0));
    }
}
