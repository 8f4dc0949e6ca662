//! Frequency and code entry keypad

use heapless::String;

use super::{digit, ModalContext, ModalStep, KEY_BACKSPACE, KEY_CANCEL, KEY_ENTER};
use crate::catalog::Backend;
use crate::node::{NodeId, OpSlot};
use crate::sim::Operand;

/// Display surface of the keypad
pub const KEYPAD_SURFACE: &str = "FREQKEYPAD";

/// Entry field
pub const ENTRY_TAG: &str = "Tin.txt";

/// Longest entry (`123.456`)
pub const MAX_ENTRY: usize = 7;

/// What the keypad edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeypadKind {
    /// COM/NAV standby frequency in the given settings slot
    Frequency(u8),
    Adf,
    Xpdr,
}

impl KeypadKind {
    /// Parse the argument of a `keypad:` touch hook (`com:2`, `adf`, ...)
    pub fn from_hook_args(args: &str) -> Option<Self> {
        match args.split_once(':') {
            Some(("com" | "nav", slot)) => slot.trim().parse().ok().map(KeypadKind::Frequency),
            None if args == "adf" => Some(KeypadKind::Adf),
            None if args == "xpdr" => Some(KeypadKind::Xpdr),
            _ => None,
        }
    }

    /// Characters required before accept
    fn required(self) -> usize {
        match self {
            KeypadKind::Frequency(_) => 4,
            KeypadKind::Adf => 3,
            KeypadKind::Xpdr => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Keypad {
    kind: KeypadKind,
    node: NodeId,
    entry: String<8>,
}

impl Keypad {
    pub fn new(kind: KeypadKind, node: NodeId) -> Self {
        Self {
            kind,
            node,
            entry: String::new(),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub(super) fn refresh(&self, ctx: &mut ModalContext<'_>) {
        ctx.sink.send_value(ENTRY_TAG, &self.entry);
    }

    pub(super) fn on_key(&mut self, key: u8, ctx: &mut ModalContext<'_>) -> ModalStep {
        match key {
            KEY_ENTER => {
                if self.entry.len() < self.kind.required() {
                    return ModalStep::Stay;
                }
                self.accept(ctx);
                return ModalStep::Exit;
            }
            KEY_CANCEL => return ModalStep::Exit,
            KEY_BACKSPACE => self.backspace(),
            _ => {
                if let Some(d) = digit(key) {
                    self.push_digit(d);
                }
            }
        }
        self.refresh(ctx);
        ModalStep::Stay
    }

    fn push_digit(&mut self, d: char) {
        let len = self.entry.len();
        if len >= MAX_ENTRY {
            return;
        }
        let mut candidate = self.entry.clone();
        if candidate.push(d).is_err() {
            return;
        }
        let n = leading_int(&candidate);

        let accepted = match self.kind {
            KeypadKind::Frequency(_) => {
                (len == 0 && n == 1)
                    || (len == 1 && (10..=13).contains(&n))
                    || (108..=136).contains(&n)
            }
            KeypadKind::Adf => {
                (len == 0 && n > 0)
                    || (len == 1 && n != 18)
                    || (len == 2 && n <= 190)
                    || (190..=1750).contains(&n)
            }
            KeypadKind::Xpdr => len < 4 && d <= '7',
        };
        if !accepted {
            return;
        }
        self.entry = candidate;
        if matches!(self.kind, KeypadKind::Frequency(_)) && self.entry.len() == 3 {
            let _ = self.entry.push('.');
        }
    }

    fn backspace(&mut self) {
        if self.entry.ends_with('.') {
            self.entry.pop();
        }
        self.entry.pop();
    }

    fn accept(&mut self, ctx: &mut ModalContext<'_>) {
        match self.kind {
            KeypadKind::Frequency(slot) => {
                while self.entry.len() < MAX_ENTRY {
                    let _ = self.entry.push('0');
                }
                let Ok(freq) = self.entry.parse::<f32>() else {
                    return;
                };
                ctx.settings.set_standby(slot as usize, freq);
                if let Some(node) = ctx.catalog.node_mut(self.node) {
                    node.set_float(freq);
                }
            }
            KeypadKind::Adf | KeypadKind::Xpdr => match ctx.sim.backend() {
                Backend::Serial => {
                    let bcd = Operand::Value(to_bcd(&self.entry));
                    let sent = ctx.dispatch(self.node, OpSlot::Primary, bcd);
                    let result = match sent {
                        // Swap the new standby into the active frequency
                        Ok(_) if self.kind == KeypadKind::Adf => ctx
                            .dispatch(self.node, OpSlot::Decrement, Operand::None)
                            .map(|_| ()),
                        other => other.map(|_| ()),
                    };
                    if let Err(_e) = result {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Keypad entry not sent: {:?}", _e);
                    }
                }
                Backend::Registration => {
                    let value = leading_int(&self.entry) as i32;
                    if let Some(node) = ctx.catalog.node_mut(self.node) {
                        node.set_int(value);
                        if let Err(_e) = ctx.sim.write_node(node) {
                            #[cfg(feature = "defmt")]
                            defmt::warn!("Keypad write-back failed: {:?}", _e);
                        }
                    }
                }
            },
        }
    }
}

/// Integer formed by the leading digits
fn leading_int(text: &str) -> u32 {
    text.chars()
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(d))
}

/// One decimal digit per nibble: `"1750"` becomes `0x1750`
pub fn to_bcd(digits: &str) -> i32 {
    digits
        .chars()
        .filter_map(|c| c.to_digit(16))
        .fold(0i32, |acc, d| (acc << 4) | d as i32)
}
