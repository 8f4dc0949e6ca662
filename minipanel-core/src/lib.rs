//! Board-agnostic core logic for the minipanel firmware
//!
//! This crate contains all panel logic that does not depend on specific
//! hardware implementations:
//!
//! - Catalog of nodes, pages and profiles, loaded from TOML text
//! - Simulator links (serial packets or dataref registration)
//! - Command dispatch and value transforms
//! - Display scheduling and formatting
//! - Paging, focus groups and the backlight scheduler
//! - Persistent settings and the configuration page operations
//! - Modal programs (keypad, test pad, data monitor)
//! - The [`panel::Panel`] controller tying it all together

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod dispatch;
pub mod display;
pub mod modal;
pub mod node;
pub mod page;
pub mod paging;
pub mod panel;
pub mod power;
pub mod settings;
pub mod sim;
pub mod state;
pub mod value;

#[cfg(test)]
mod testutil;
