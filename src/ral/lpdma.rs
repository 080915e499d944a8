//! LPDMA / GPDMA register blocks and fields
//!
//! LPDMA1 and GPDMA1 share the channel layout. LPDMA1 implements the
//! first four channels, and only linear addressing.

use super::RWRegister;

/// Number of channel register blocks in the controller
pub const CHANNEL_BLOCKS: usize = 16;

/// Offset of channel 0 in the controller block
pub const CHANNEL_OFFSET: u32 = 0x50;

/// Distance between two channel blocks
pub const CHANNEL_STRIDE: u32 = 0x80;

/// DMA controller registers
#[repr(C)]
pub struct RegisterBlock {
    /// Secure configuration register
    pub SECCFGR: RWRegister<u32>,
    /// Privileged configuration register
    pub PRIVCFGR: RWRegister<u32>,
    /// Configuration lock register
    pub RCFGLOCKR: RWRegister<u32>,
    /// Non-secure masked interrupt status register
    pub MISR: RWRegister<u32>,
    /// Secure masked interrupt status register
    pub SMISR: RWRegister<u32>,
    _reserved0: [u32; 15],
    /// Channel registers
    pub CH: [ch::RegisterBlock; CHANNEL_BLOCKS],
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, CH) == CHANNEL_OFFSET as usize);
const _: () = assert!(core::mem::size_of::<ch::RegisterBlock>() == CHANNEL_STRIDE as usize);

/// DMA channel registers and fields
pub mod ch {
    use super::RWRegister;

    /// One DMA channel
    ///
    /// `CSR` is read-only to software. It's a read-write register here so
    /// that a software model can play the hardware's part.
    #[repr(C)]
    pub struct RegisterBlock {
        /// Linked-list base address register
        pub CLBAR: RWRegister<u32>,
        _reserved0: [u32; 2],
        /// Flag clear register
        pub CFCR: RWRegister<u32>,
        /// Status register
        pub CSR: RWRegister<u32>,
        /// Control register
        pub CCR: RWRegister<u32>,
        _reserved1: [u32; 10],
        /// Transfer register 1
        pub CTR1: RWRegister<u32>,
        /// Transfer register 2
        pub CTR2: RWRegister<u32>,
        /// Block register 1
        pub CBR1: RWRegister<u32>,
        /// Source address register
        pub CSAR: RWRegister<u32>,
        /// Destination address register
        pub CDAR: RWRegister<u32>,
        /// Transfer register 3 (2D channels)
        pub CTR3: RWRegister<u32>,
        /// Block register 2 (2D channels)
        pub CBR2: RWRegister<u32>,
        _reserved2: [u32; 8],
        /// Linked-list address register
        pub CLLR: RWRegister<u32>,
    }

    const _: () = assert!(core::mem::offset_of!(RegisterBlock, CSR) == 0x10);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, CTR1) == 0x40);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, CLLR) == 0x7C);

    /// Register offsets within the channel block, for bus routing
    pub mod offsets {
        pub const CLBAR: u32 = 0x00;
        pub const CFCR: u32 = 0x0C;
        pub const CSR: u32 = 0x10;
        pub const CCR: u32 = 0x14;
        pub const CTR1: u32 = 0x40;
        pub const CTR2: u32 = 0x44;
        pub const CBR1: u32 = 0x48;
        pub const CSAR: u32 = 0x4C;
        pub const CDAR: u32 = 0x50;
        pub const CLLR: u32 = 0x7C;
    }

    pub mod CLBAR {
        field!(
            /// Linked-list base address (upper 16 bits)
            LBA, 16, 16
        );
    }

    /// Status flags. `CFCR` uses the same positions.
    pub mod CSR {
        field!(IDLEF, 0, 1);
        field!(TCF, 8, 1);
        field!(HTF, 9, 1);
        field!(DTEF, 10, 1);
        field!(ULEF, 11, 1);
        field!(USEF, 12, 1);
        field!(SUSPF, 13, 1);
        field!(TOF, 14, 1);
    }

    pub use CSR as CFCR;

    pub mod CCR {
        field!(EN, 0, 1);
        field!(RESET, 1, 1);
        field!(SUSP, 2, 1);
        field!(TCIE, 8, 1);
        field!(HTIE, 9, 1);
        field!(DTEIE, 10, 1);
        field!(ULEIE, 11, 1);
        field!(USEIE, 12, 1);
        field!(SUSPIE, 13, 1);
        field!(TOIE, 14, 1);
        field!(
            /// Link step mode
            LSM, 16, 1
        );
        field!(
            /// Linked-list allocated port
            LAP, 17, 1
        );
        field!(PRIO, 22, 2);
    }

    pub mod CTR1 {
        field!(SDW_LOG2, 0, 2);
        field!(SINC, 3, 1);
        field!(SBL_1, 4, 6);
        field!(PAM, 11, 2);
        field!(SAP, 14, 1);
        field!(DDW_LOG2, 16, 2);
        field!(DINC, 19, 1);
        field!(DBL_1, 20, 6);
        field!(DAP, 30, 1);
    }

    pub mod CTR2 {
        field!(REQSEL, 0, 7);
        field!(SWREQ, 9, 1);
        field!(DREQ, 10, 1);
        field!(BREQ, 11, 1);
        field!(TRIGM, 14, 2);
        field!(TRIGSEL, 16, 6);
        field!(TRIGPOL, 24, 2);
        field!(TCEM, 30, 2);
    }

    pub mod CBR1 {
        field!(
            /// Block number of data bytes
            BNDT, 0, 16
        );
    }

    pub mod CLLR {
        field!(
            /// Pointer (16-bit low part) to the next LLI
            LA, 2, 14
        );
        field!(ULL, 16, 1);
        field!(UDA, 27, 1);
        field!(USA, 28, 1);
        field!(UB1, 29, 1);
        field!(UT2, 30, 1);
        field!(UT1, 31, 1);
    }

    /// Update bits for a full linear-addressing LLI load
    pub const CLLR_UPDATE_ALL: u32 = CLLR::UT1::mask
        | CLLR::UT2::mask
        | CLLR::UB1::mask
        | CLLR::USA::mask
        | CLLR::UDA::mask
        | CLLR::ULL::mask;

    /// Flags that report a channel error
    pub const CSR_ERRORS: u32 = CSR::DTEF::mask | CSR::ULEF::mask | CSR::USEF::mask;
}
