//! Modal programs
//!
//! A modal replaces normal page scheduling until its exit key. It is a
//! poll-and-resume state machine: the panel feeds it display keys through
//! [`Modal::on_key`] and lets it run background work in [`Modal::poll`].
//! When a key returns [`ModalStep::Exit`] the panel restores the previous
//! user page.

pub mod datamon;
pub mod keypad;
pub mod testpad;

pub use datamon::DataMonitor;
pub use keypad::{Keypad, KeypadKind, KEYPAD_SURFACE};
pub use testpad::TestPad;

use core::fmt::Write;
use heapless::String;

use crate::catalog::Catalog;
use crate::dispatch::{CommandDispatcher, Dispatched};
use crate::display::DisplaySink;
use crate::node::{NodeId, OpSlot};
use crate::page::ModalKind;
use crate::settings::Settings;
use crate::sim::{Operand, SimError, SimLink};

/// Cancel / exit key
pub const KEY_CANCEL: u8 = 0x0A;
pub const KEY_BACKSPACE: u8 = 0x0C;
/// Accept / send / pause key
pub const KEY_ENTER: u8 = 0x0D;
pub const KEY_MINUS: u8 = 0x0F;
/// Field selection keys
pub const KEY_FIELD_1: u8 = 0x12;
pub const KEY_FIELD_2: u8 = 0x13;
pub const KEY_FIELD_3: u8 = 0x14;

/// Background of the field being edited
pub const FIELD_ACTIVE: u16 = 65535;
/// Background of the other fields
pub const FIELD_INACTIVE: u16 = 50712;

/// Digit value of a key
pub fn digit(key: u8) -> Option<char> {
    (key <= 9).then(|| (b'0' + key) as char)
}

/// Whether the modal keeps running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModalStep {
    Stay,
    Exit,
}

/// Collaborators a modal works on
pub struct ModalContext<'a> {
    pub catalog: &'a mut Catalog,
    pub settings: &'a mut Settings,
    pub sim: &'a mut dyn SimLink,
    pub sink: &'a mut dyn DisplaySink,
}

impl ModalContext<'_> {
    /// Dispatch a node operation through the normal routing
    pub fn dispatch(
        &mut self,
        id: NodeId,
        slot: OpSlot,
        operand: Operand,
    ) -> Result<Dispatched, SimError> {
        CommandDispatcher::new(
            &mut *self.catalog,
            &mut *self.settings,
            &mut *self.sim,
            &mut *self.sink,
        )
        .dispatch(id, slot, operand)
    }

    pub(crate) fn send_int(&mut self, tag: &str, value: impl core::fmt::Display) {
        let mut text = String::<12>::new();
        let _ = write!(text, "{}", value);
        self.sink.send_value(tag, &text);
    }

    /// Highlight `active` and dim `inactive`
    pub(crate) fn select_field(&mut self, active: &str, inactive: &str) {
        self.sink.send_number(active, FIELD_ACTIVE as i32);
        self.sink.send_number(inactive, FIELD_INACTIVE as i32);
    }
}

/// Running modal program
#[derive(Debug, Clone)]
pub enum Modal {
    Keypad(Keypad),
    TestPad(TestPad),
    DataMonitor(DataMonitor),
}

impl Modal {
    /// Program behind a modal catalog page
    pub fn for_page(kind: ModalKind) -> Self {
        match kind {
            ModalKind::TestPad => Modal::TestPad(TestPad::new()),
            ModalKind::DataMonitor => Modal::DataMonitor(DataMonitor::new()),
        }
    }

    /// Draw the initial field contents
    pub fn start(&mut self, ctx: &mut ModalContext<'_>) {
        match self {
            Modal::Keypad(k) => k.refresh(ctx),
            Modal::TestPad(t) => t.refresh(ctx),
            Modal::DataMonitor(d) => d.start(ctx),
        }
    }

    /// Handle one display key
    pub fn on_key(&mut self, key: u8, ctx: &mut ModalContext<'_>) -> ModalStep {
        match self {
            Modal::Keypad(k) => k.on_key(key, ctx),
            Modal::TestPad(t) => t.on_key(key, ctx),
            Modal::DataMonitor(d) => d.on_key(key, ctx),
        }
    }

    /// Background work between keys
    pub fn poll(&mut self, ctx: &mut ModalContext<'_>, quota: usize) {
        match self {
            Modal::DataMonitor(d) => d.poll(ctx, quota),
            Modal::Keypad(_) | Modal::TestPad(_) => {
                ctx.sim.collect(ctx.catalog, quota);
            }
        }
    }
}

/// Append `c` if the field holds fewer than `max` characters
pub(crate) fn push_limited<const N: usize>(field: &mut String<N>, c: char, max: usize) {
    if field.len() < max {
        let _ = field.push(c);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_keys() {
        assert_eq!(digit(0), Some('0'));
        assert_eq!(digit(9), Some('9'));
        assert_eq!(digit(KEY_CANCEL), None);
    }

    #[test]
    fn test_push_limited() {
        let mut field = String::<8>::new();
        for c in "123456".chars() {
            push_limited(&mut field, c, 5);
        }
        assert_eq!(field.as_str(), "12345");
    }
}
