//! Linked-list item (LLI) register image
//!
//! The words appear in the order that the channel loads them during a full
//! linear-addressing update. Fields are the channel's fields.

use super::RWRegister;

pub use super::lpdma::ch::{CBR1, CLLR, CTR1, CTR2, CLLR_UPDATE_ALL};

/// A linear-addressing LLI
#[repr(C)]
pub struct RegisterBlock {
    pub CTR1: RWRegister<u32>,
    pub CTR2: RWRegister<u32>,
    pub CBR1: RWRegister<u32>,
    pub CSAR: RWRegister<u32>,
    pub CDAR: RWRegister<u32>,
    pub CLLR: RWRegister<u32>,
}

/// Number of words in an LLI
pub const WORDS: usize = 6;

const _: () = assert!(core::mem::size_of::<RegisterBlock>() == WORDS * 4);
