//! Screen node: one on-screen control bound to one simulator quantity
//!
//! Behaviour is selected by capability flags rather than by type. The
//! per-backend hooks are resolved once at catalog load, so a node only
//! carries the variant for the active backend.

use heapless::String;

use crate::dispatch::Transform;
use crate::modal::KeypadKind;
use crate::page::PageId;
use crate::sim::{CommandHandle, DatarefHandle};
use crate::value::{Text, Value, ValueKind};

/// Maximum display tag length (e.g. `t12.txt`)
pub const MAX_TAG_LEN: usize = 12;

/// Maximum format string length
pub const MAX_FORMAT_LEN: usize = 8;

/// Maximum node name length in the catalog
pub const MAX_NAME_LEN: usize = 16;

/// Handle into the catalog node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(pub u16);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Capability bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Caps(u16);

impl Caps {
    pub const NONE: Caps = Caps(0);
    /// Receives simulator values
    pub const INPUT: Caps = Caps(1 << 0);
    /// Can be attached to an encoder (highlighted)
    pub const SELECTABLE: Caps = Caps(1 << 1);
    /// Registration command is triggered once
    pub const SEND_DIRECT: Caps = Caps(1 << 2);
    /// Registration command is started (held)
    pub const CMD_START: Caps = Caps(1 << 3);
    /// Registration command is ended (released)
    pub const CMD_END: Caps = Caps(1 << 4);
    /// Operand is written to the bound dataref
    pub const DATAREF_UPDATE: Caps = Caps(1 << 5);
    /// Touch opens a page
    pub const PAGING: Caps = Caps(1 << 6);
    /// Operations go to the configuration subsystem
    pub const SYSTEM_OP: Caps = Caps(1 << 7);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Caps) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Caps) {
        self.0 |= other.0;
    }

    /// Flag for a catalog name
    pub fn from_name(name: &str) -> Option<Caps> {
        Some(match name {
            "input" => Caps::INPUT,
            "selectable" => Caps::SELECTABLE,
            "send_direct" => Caps::SEND_DIRECT,
            "cmd_start" => Caps::CMD_START,
            "cmd_end" => Caps::CMD_END,
            "dataref_update" => Caps::DATAREF_UPDATE,
            "paging" => Caps::PAGING,
            "system_op" => Caps::SYSTEM_OP,
            _ => return None,
        })
    }
}

impl core::ops::BitOr for Caps {
    type Output = Caps;

    fn bitor(self, rhs: Caps) -> Caps {
        Caps(self.0 | rhs.0)
    }
}

/// Incoming serial packet key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimKey {
    pub id: u16,
    /// Sub-index, `NO_INDEX` when the packet carries none
    pub index: i16,
}

/// Operation slot of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpSlot {
    Primary = 0,
    Decrement = 1,
    Increment = 2,
}

impl OpSlot {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(OpSlot::Primary),
            1 => Some(OpSlot::Decrement),
            2 => Some(OpSlot::Increment),
            _ => None,
        }
    }
}

/// Registration-backend operation for one slot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegOp {
    #[default]
    None,
    Command(CommandHandle),
    /// Command picked from a key array by the touched key
    Keys(KeyArray),
    /// Write the operand to the bound dataref
    Write,
    Transform(Transform),
}

/// Run of registered commands in the catalog key table
///
/// A group serving two units holds `units * keys` handles; the selected
/// unit picks its half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyArray {
    /// First entry in the key table
    pub first: u16,
    /// Keys per unit
    pub keys: u8,
    pub units: u8,
}

impl KeyArray {
    /// Key table entry for `key` on `unit`; unknown units use the first
    pub fn entry(&self, key: i32, unit: u8) -> Option<u16> {
        let key = u8::try_from(key).ok().filter(|&k| k < self.keys)?;
        let unit = if unit < self.units { unit } else { 0 };
        Some(self.first + u16::from(unit) * u16::from(self.keys) + u16::from(key))
    }
}

/// Registered dataref behind a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DatarefBinding {
    pub handle: DatarefHandle,
    pub writable: bool,
}

/// Custom rendering callback
pub type RenderFn = fn(&Node) -> Text;

/// Display override
#[derive(Clone, Copy)]
pub enum DisplayHook {
    /// Index into a catalog label table by the int value
    Labels(u8),
    Custom(RenderFn),
}

impl core::fmt::Debug for DisplayHook {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DisplayHook::Labels(t) => write!(f, "Labels({})", t),
            DisplayHook::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Touch override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchHook {
    /// Send 1 when the value is 0, else 0
    ToggleBinary,
    /// Send (v + 1) % 3
    StepTristate,
    /// Apply page focus group n
    Focus(u8),
    /// Select the unit served by key arrays
    Unit(u8),
    Keypad(KeypadKind),
    DimNow,
    CycleProfile,
    AcceptProfile,
    Restart,
}

/// Screen node
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Catalog name
    pub name: String<MAX_NAME_LEN>,
    /// Display object id (touch op id)
    pub obj_id: u8,
    /// Display attribute address, empty when the node is never drawn
    pub tag: String<MAX_TAG_LEN>,
    pub caps: Caps,
    pub sim_key: Option<SimKey>,
    /// Serial opcodes per slot, 0 = unassigned
    pub opcodes: [u16; 3],
    pub reg_ops: [RegOp; 3],
    pub dataref: Option<DatarefBinding>,
    /// printf-style format
    pub format: String<MAX_FORMAT_LEN>,
    pub display_hook: Option<DisplayHook>,
    pub touch_hook: Option<TouchHook>,
    /// Paging target
    pub target_page: Option<PageId>,
    /// Base image for `.pic` tags
    pub pic_base: u16,
    value: Value,
    /// Last value shown; `None` forces a refresh
    shown: Option<Value>,
}

impl Node {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            value: Value::zero(kind),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Re-kind a node that has not been used yet
    pub(crate) fn set_kind(&mut self, kind: ValueKind) {
        self.value = Value::zero(kind);
        self.shown = None;
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn int_value(&self) -> i32 {
        self.value.as_int()
    }

    pub fn float_value(&self) -> f32 {
        self.value.as_float()
    }

    /// Store a value, coerced to the node's kind
    pub fn set_value(&mut self, value: Value) {
        let kind = self.kind();
        self.value = value.coerce(kind);
    }

    pub fn set_int(&mut self, v: i32) {
        self.set_value(Value::Int(v));
    }

    pub fn set_float(&mut self, v: f32) {
        self.set_value(Value::Float(v));
    }

    pub fn set_text(&mut self, v: &str) {
        let mut text = Text::new();
        for c in v.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        self.set_value(Value::Text(text));
    }

    pub fn has(&self, caps: Caps) -> bool {
        self.caps.contains(caps)
    }

    /// True if the value changed since it was last shown
    pub fn is_dirty(&self) -> bool {
        match &self.shown {
            Some(prev) => self.value.differs_from(prev),
            None => true,
        }
    }

    /// Dirty-check and record the current value as shown
    pub fn take_dirty(&mut self) -> bool {
        let dirty = self.is_dirty();
        if dirty {
            self.shown = Some(self.value.clone());
        }
        dirty
    }

    /// Force the next dirty-check to report a change
    pub fn invalidate(&mut self) {
        self.shown = None;
    }

    /// True if an incoming packet key addresses this node
    pub fn matches_key(&self, id: u16, index: i16) -> bool {
        self.has(Caps::INPUT)
            && matches!(self.sim_key, Some(key) if key.id == id && key.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_array_entry() {
        let keys = KeyArray {
            first: 10,
            keys: 3,
            units: 2,
        };
        assert_eq!(keys.entry(0, 0), Some(10));
        assert_eq!(keys.entry(2, 0), Some(12));
        assert_eq!(keys.entry(2, 1), Some(15));
        // Unknown unit falls back to the first half
        assert_eq!(keys.entry(1, 5), Some(11));
        assert_eq!(keys.entry(3, 0), None);
        assert_eq!(keys.entry(-1, 0), None);

        let single = KeyArray {
            first: 0,
            keys: 6,
            units: 1,
        };
        assert_eq!(single.entry(4, 1), Some(4));
    }

    #[test]
    fn test_kind_fixed_by_setters() {
        let mut node = Node::new(ValueKind::Int);
        node.set_float(3.7);
        assert_eq!(node.value(), &Value::Int(3));
        let mut node = Node::new(ValueKind::Float);
        node.set_int(4);
        assert_eq!(node.value(), &Value::Float(4.0));
    }

    #[test]
    fn test_dirty_then_clean() {
        let mut node = Node::new(ValueKind::Int);
        assert!(node.take_dirty());
        assert!(!node.take_dirty());
        node.set_int(5);
        assert!(node.take_dirty());
        node.set_int(5);
        assert!(!node.take_dirty());
    }

    #[test]
    fn test_invalidate_forces_change() {
        let mut node = Node::new(ValueKind::Float);
        node.set_float(1.5);
        assert!(node.take_dirty());
        node.invalidate();
        assert!(node.is_dirty());
        assert!(node.take_dirty());
    }

    #[test]
    fn test_matches_key_needs_input_cap() {
        let mut node = Node::new(ValueKind::Int);
        node.sim_key = Some(SimKey { id: 76, index: -1 });
        assert!(!node.matches_key(76, -1));
        node.caps.insert(Caps::INPUT);
        assert!(node.matches_key(76, -1));
        assert!(!node.matches_key(76, 0));
    }

    #[test]
    fn test_caps_names() {
        let caps = Caps::from_name("paging").unwrap() | Caps::SELECTABLE;
        assert!(caps.contains(Caps::PAGING));
        assert!(!caps.contains(Caps::INPUT));
        assert!(!caps.contains(Caps::NONE));
        assert_eq!(Caps::from_name("bogus"), None);
    }

    #[test]
    fn test_set_text_truncates() {
        let mut node = Node::new(ValueKind::Text);
        node.set_text("a very long label that does not fit");
        assert_eq!(node.value().to_text().len(), crate::value::MAX_TEXT_LEN);
    }
}
