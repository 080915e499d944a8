//! Hardware triggers
//!
//! A trigger holds a node until a hardware event arrives, instead of
//! letting the DMA controller pace the node.

/// A trigger input selection (`TRIGSEL`)
///
/// The value is passed to the hardware as-is. The constants name
/// some LPDMA1 inputs that LPBAM applications commonly use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerSource(u8);

impl TriggerSource {
    pub const EXTI0: Self = Self(0);
    pub const EXTI1: Self = Self(1);
    pub const TAMP_TRG1: Self = Self(8);
    pub const LPTIM1_CH1: Self = Self(10);
    pub const LPTIM1_CH2: Self = Self(11);
    pub const LPTIM3_CH1: Self = Self(12);
    pub const LPTIM4_OUT: Self = Self(13);
    pub const COMP1_OUT: Self = Self(14);
    pub const RTC_ALRA_TRG: Self = Self(16);
    pub const RTC_WUT_TRG: Self = Self(18);
    pub const ADC4_AWD1: Self = Self(19);
    pub const LPDMA1_CH0_TC: Self = Self(20);
    pub const LPDMA1_CH1_TC: Self = Self(21);
    pub const LPDMA1_CH2_TC: Self = Self(22);
    pub const LPDMA1_CH3_TC: Self = Self(23);

    /// Highest selection that `TRIGSEL` can hold
    pub const MAX: u8 = 0x3F;

    /// Use the trigger input `raw`
    ///
    /// Returns `None` if `raw` doesn't fit in `TRIGSEL`.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= Self::MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Returns the raw selection
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Trigger edge (`TRIGPOL`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Polarity {
    Rising = 1,
    Falling = 2,
}

/// What a single trigger event releases (`TRIGM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TriggerMode {
    /// The node's whole block
    Block = 0,
    /// The node, including the next link load
    Node = 2,
    /// One burst (one data beat) of the node
    Burst = 3,
}

impl TriggerMode {
    pub(crate) const fn from_raw(raw: u32) -> Self {
        match raw {
            2 => TriggerMode::Node,
            3 => TriggerMode::Burst,
            _ => TriggerMode::Block,
        }
    }
}

/// A hardware trigger for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    pub source: TriggerSource,
    pub polarity: Polarity,
    pub mode: TriggerMode,
}

impl TriggerConfig {
    /// A rising-edge trigger that releases a whole node
    pub const fn rising(source: TriggerSource) -> Self {
        TriggerConfig {
            source,
            polarity: Polarity::Rising,
            mode: TriggerMode::Block,
        }
    }
}
