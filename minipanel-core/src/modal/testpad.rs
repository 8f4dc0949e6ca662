//! Direct event entry for trying out simulator ids

use heapless::String;

use super::{
    digit, push_limited, ModalContext, ModalStep, KEY_BACKSPACE, KEY_CANCEL, KEY_ENTER,
    KEY_FIELD_1, KEY_FIELD_2, KEY_FIELD_3,
};
use crate::catalog::Backend;
use crate::node::{NodeId, OpSlot};
use crate::sim::Operand;
use crate::value::parse_int;

const ID_TAG: &str = "Tev.txt";
const INDEX_TAG: &str = "Tix.txt";
const VALUE_TAG: &str = "Tda.txt";

const MAX_ID_LEN: usize = 5;
const MAX_VALUE_LEN: usize = 7;

#[derive(Debug, Clone)]
pub struct TestPad {
    id: String<8>,
    index: u8,
    value: String<8>,
    id_selected: bool,
}

impl Default for TestPad {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPad {
    pub fn new() -> Self {
        let mut id = String::new();
        let _ = id.push_str("39");
        Self {
            id,
            index: 0,
            value: String::new(),
            id_selected: true,
        }
    }

    pub(super) fn refresh(&self, ctx: &mut ModalContext<'_>) {
        ctx.sink.send_value(ID_TAG, &self.id);
        ctx.send_int(INDEX_TAG, self.index);
        ctx.sink.send_value(VALUE_TAG, &self.value);
    }

    pub(super) fn on_key(&mut self, key: u8, ctx: &mut ModalContext<'_>) -> ModalStep {
        match key {
            KEY_CANCEL => return ModalStep::Exit,
            KEY_BACKSPACE => {
                if self.id_selected && !self.id.is_empty() {
                    self.id.pop();
                } else {
                    self.value.pop();
                }
            }
            KEY_ENTER => self.send(ctx),
            KEY_FIELD_1 => {
                self.id_selected = true;
                ctx.select_field("Tev.bco", "Tda.bco");
            }
            KEY_FIELD_2 => self.index = (self.index + 1) % 3,
            KEY_FIELD_3 => {
                self.id_selected = false;
                ctx.select_field("Tda.bco", "Tev.bco");
            }
            _ => {
                if let Some(d) = digit(key) {
                    if self.id_selected {
                        push_limited(&mut self.id, d, MAX_ID_LEN);
                    } else {
                        push_limited(&mut self.value, d, MAX_VALUE_LEN);
                    }
                }
            }
        }
        self.refresh(ctx);
        ModalStep::Stay
    }

    fn send(&self, ctx: &mut ModalContext<'_>) {
        let id = parse_int(&self.id).unwrap_or(0);
        if id <= 0 {
            return;
        }
        let value = parse_int(&self.value).unwrap_or(0);
        let Ok(id) = u16::try_from(id) else {
            return;
        };
        let result = match ctx.sim.backend() {
            Backend::Serial => ctx.sim.send_opcode(id, Operand::Value(value)),
            Backend::Registration => match OpSlot::from_index(self.index as usize) {
                Some(slot) => ctx
                    .dispatch(NodeId(id), slot, Operand::Value(value))
                    .map(|_| ()),
                None => Ok(()),
            },
        };
        if let Err(_e) = result {
            #[cfg(feature = "defmt")]
            defmt::warn!("Test send of {} failed: {:?}", id, _e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::Harness;
    use super::super::Modal;
    use super::*;
    use crate::node::{Caps, Node, RegOp};
    use crate::sim::{CommandHandle, SerialBackend, SimAdapter};
    use crate::testutil::{FakeHost, HostCall, ScriptedUart};
    use crate::value::ValueKind;

    #[test]
    fn test_defaults_drawn_on_start() {
        let mut h = Harness::new(SerialBackend::new(ScriptedUart::default()));
        let mut modal = Modal::TestPad(TestPad::new());
        modal.start(&mut h.ctx());
        assert_eq!(
            h.sink.pairs(),
            [("Tev.txt", "39"), ("Tix.txt", "0"), ("Tda.txt", "")]
        );
    }

    #[test]
    fn test_serial_send() {
        let mut h = Harness::new(SerialBackend::new(ScriptedUart::default()));
        let mut modal = Modal::TestPad(TestPad::new());
        let step = h.keys(
            &mut modal,
            &[KEY_BACKSPACE, KEY_BACKSPACE, 7, 1, KEY_FIELD_3, 2, 5, KEY_ENTER],
        );
        assert_eq!(step, ModalStep::Stay);
        assert_eq!(h.sim.port_mut().take_tx(), "@71/25$");
        assert_eq!(h.sink.last("Tda.bco"), Some("65535"));
        assert_eq!(h.sink.last("Tev.bco"), Some("50712"));
        assert_eq!(h.keys(&mut modal, &[KEY_CANCEL]), ModalStep::Exit);
    }

    #[test]
    fn test_zero_id_not_sent() {
        let mut h = Harness::new(SerialBackend::new(ScriptedUart::default()));
        let mut modal = Modal::TestPad(TestPad::new());
        h.keys(&mut modal, &[KEY_BACKSPACE, KEY_BACKSPACE, KEY_ENTER]);
        assert!(h.sim.port_mut().tx.is_empty());
        assert_eq!(h.sink.last("Tev.txt"), Some(""));
    }

    #[test]
    fn test_field_limits_and_index_cycle() {
        let mut h = Harness::new(SerialBackend::new(ScriptedUart::default()));
        let mut modal = Modal::TestPad(TestPad::new());
        h.keys(&mut modal, &[1, 2, 3, 4, KEY_FIELD_2, KEY_FIELD_2]);
        assert_eq!(h.sink.last("Tev.txt"), Some("39123"));
        assert_eq!(h.sink.last("Tix.txt"), Some("2"));
        h.keys(&mut modal, &[KEY_FIELD_2]);
        assert_eq!(h.sink.last("Tix.txt"), Some("0"));
        h.keys(&mut modal, &[KEY_FIELD_3, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(h.sink.last("Tda.txt"), Some("1234567"));
    }

    #[test]
    fn test_registration_dispatches_node() {
        let mut h = Harness::new(SimAdapter::new(FakeHost::default()));
        for _ in 0..2 {
            h.catalog.add_node(Node::new(ValueKind::Int)).unwrap();
        }
        let mut node = Node::new(ValueKind::Int);
        node.caps = Caps::SEND_DIRECT;
        node.reg_ops[1] = RegOp::Command(CommandHandle(4));
        h.catalog.add_node(node).unwrap();

        let mut modal = Modal::TestPad(TestPad::new());
        h.keys(
            &mut modal,
            &[KEY_BACKSPACE, KEY_BACKSPACE, 2, KEY_FIELD_2, KEY_ENTER],
        );
        assert_eq!(h.sim.host().calls, [HostCall::Trigger(CommandHandle(4), 1)]);
    }
}
