//! A RAL-like module to support LPDMA register access
//!
//! The STM32U5 SVDs describe each DMA channel as a flat run of registers.
//! Here, each channel is a struct, and the controller holds an array of
//! them. Linked-list items (LLIs) reuse the channel's field definitions,
//! since the hardware copies LLI words straight into the channel registers.
//!
//! The layout still works with the RAL macros.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals, // Field `offset` and `mask`
    clippy::identity_op,
)]

/// Define a register field for the RAL macros
macro_rules! field {
    ($(#[$attr:meta])* $name:ident, $offset:expr, $width:expr) => {
        $(#[$attr])*
        pub mod $name {
            pub const offset: u32 = $offset;
            pub const mask: u32 = (((1u64 << $width) - 1) as u32) << offset;
            pub mod R {}
            pub mod W {}
            pub mod RW {}
        }
    };
}

pub mod lli;
pub mod lpdma;

pub use ral_registers::{modify_reg, read_reg, write_reg};
use ral_registers::RWRegister;

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory, or
        // memory that outlives the driver)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

/// Produce an all-zero register block
///
/// # Safety
///
/// `T` must be a register block, made only of registers and reserved words.
pub(crate) const unsafe fn zeroed<T>() -> T {
    core::mem::zeroed()
}

/// A single 32-bit register that isn't part of a block
pub(crate) type Word = RWRegister<u32>;
