//! RP2040-specific HAL for the minipanel firmware
//!
//! Provides the RP2040 implementation of the shared `minipanel-hal`
//! flash storage trait.

#![no_std]

pub mod flash;

// Re-export shared traits from minipanel-hal for convenience
pub use minipanel_hal::{FlashStorage as FlashStorageTrait, StorageKey};
