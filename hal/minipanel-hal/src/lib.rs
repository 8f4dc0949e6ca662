//! Minipanel Hardware Abstraction Layer
//!
//! Traits the panel logic needs from the board, implemented by the firmware
//! for the RP2040 and by test doubles on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  minipanel-core (panel logic)           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  minipanel-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  minipanel-firmware (embassy-rp)        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Non-blocking serial link to the simulator
//! - [`settings::SettingsStore`] - Byte/float addressed settings store
//! - [`flash::FlashStorage`] - Persistent key-value storage

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod settings;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, StorageKey};
pub use settings::{SettingsImage, SettingsStore, StoreError, SETTINGS_IMAGE_SIZE};
pub use uart::{Uart, UartRx, UartTx};
