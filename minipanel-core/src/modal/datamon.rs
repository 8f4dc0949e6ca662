//! Live view of one simulator variable

use heapless::String;

use super::{
    digit, push_limited, ModalContext, ModalStep, KEY_BACKSPACE, KEY_CANCEL, KEY_ENTER,
    KEY_FIELD_1, KEY_FIELD_2, KEY_FIELD_3, KEY_MINUS,
};
use crate::catalog::Backend;
use crate::node::NodeId;
use crate::value::{parse_int, Text};

const VAR_TAG: &str = "Tva.txt";
const INDEX_TAG: &str = "Tix.txt";
const DATA_TAG: &str = "Tda.txt";
const COUNT_TAG: &str = "Tct.txt";

const MAX_VAR_LEN: usize = 5;
const MAX_INDEX_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct DataMonitor {
    var: String<8>,
    index: String<4>,
    var_selected: bool,
    paused: bool,
    count: u16,
}

impl Default for DataMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataMonitor {
    pub fn new() -> Self {
        let mut var = String::new();
        let _ = var.push_str("193");
        let mut index = String::new();
        let _ = index.push_str("-1");
        Self {
            var,
            index,
            var_selected: true,
            paused: false,
            count: 0,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub(super) fn start(&self, ctx: &mut ModalContext<'_>) {
        self.refresh(ctx);
        ctx.sink.send_value(DATA_TAG, "");
    }

    fn refresh(&self, ctx: &mut ModalContext<'_>) {
        ctx.sink.send_value(VAR_TAG, &self.var);
        ctx.sink.send_value(INDEX_TAG, &self.index);
    }

    pub(super) fn on_key(&mut self, key: u8, ctx: &mut ModalContext<'_>) -> ModalStep {
        match key {
            KEY_CANCEL => return ModalStep::Exit,
            KEY_BACKSPACE => {
                if self.var_selected && !self.var.is_empty() {
                    self.var.pop();
                } else {
                    self.index.pop();
                }
            }
            KEY_ENTER => self.paused = !self.paused,
            KEY_MINUS if !self.var_selected => {
                push_limited(&mut self.index, '-', MAX_INDEX_LEN);
            }
            KEY_FIELD_1 => {
                self.var_selected = true;
                ctx.select_field("Tva.bco", "Tix.bco");
            }
            KEY_FIELD_2 => {
                self.var_selected = false;
                ctx.select_field("Tix.bco", "Tva.bco");
            }
            KEY_FIELD_3 => self.count = 0,
            _ => {
                if let Some(d) = digit(key) {
                    if self.var_selected {
                        push_limited(&mut self.var, d, MAX_VAR_LEN);
                    } else {
                        push_limited(&mut self.index, d, MAX_INDEX_LEN);
                    }
                }
            }
        }
        self.refresh(ctx);
        ModalStep::Stay
    }

    /// Show the monitored variable when it arrives
    pub(super) fn poll(&mut self, ctx: &mut ModalContext<'_>, quota: usize) {
        if self.paused {
            return;
        }
        let shown: Option<Text> = match ctx.sim.backend() {
            Backend::Serial => self.watch_packets(ctx),
            Backend::Registration => {
                if ctx.sim.collect(ctx.catalog, quota) == 0 {
                    None
                } else {
                    parse_int(&self.var)
                        .and_then(|v| u16::try_from(v).ok())
                        .and_then(|v| ctx.catalog.node(NodeId(v)))
                        .map(|node| node.value().to_text())
                }
            }
        };
        if let Some(text) = shown.filter(|t| !t.is_empty()) {
            self.count = self.count.wrapping_add(1);
            ctx.sink.send_value(DATA_TAG, &text);
            ctx.send_int(COUNT_TAG, self.count);
        }
    }

    fn watch_packets(&self, ctx: &mut ModalContext<'_>) -> Option<Text> {
        let packet = ctx.sim.fetch_packet()?;
        let var = parse_int(&self.var)?;
        let index = parse_int(&self.index)?;
        let matches = packet.numeric_id().map(i32::from) == Some(var)
            && packet.numeric_index().map(i32::from) == Some(index);
        if !matches {
            return None;
        }
        let mut text = Text::new();
        for c in packet.value().chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::Harness;
    use super::super::Modal;
    use super::*;
    use crate::node::Node;
    use crate::sim::{DatarefHandle, RegistrationSink, SerialBackend, SimAdapter};
    use crate::testutil::{FakeHost, ScriptedUart};
    use crate::value::{Value, ValueKind};

    #[test]
    fn test_serial_matching_packets_counted() {
        let uart = ScriptedUart::with_rx(b"@193/1500$@194/7$@193/2=9$@193/1501$");
        let mut h = Harness::new(SerialBackend::new(uart));
        let mut modal = Modal::DataMonitor(DataMonitor::new());
        modal.start(&mut h.ctx());
        for _ in 0..5 {
            modal.poll(&mut h.ctx(), 8);
        }
        assert_eq!(h.sink.last("Tda.txt"), Some("1501"));
        assert_eq!(h.sink.last("Tct.txt"), Some("2"));
    }

    #[test]
    fn test_index_field_and_pause() {
        let uart = ScriptedUart::with_rx(b"@193/2=9$@193/-3=4$");
        let mut h = Harness::new(SerialBackend::new(uart));
        let mut m = DataMonitor::new();
        let mut modal = Modal::DataMonitor(m.clone());
        h.keys(
            &mut modal,
            &[KEY_FIELD_2, KEY_BACKSPACE, KEY_BACKSPACE, KEY_MINUS, 3, 4],
        );
        assert_eq!(h.sink.last("Tix.txt"), Some("-3"));
        assert_eq!(h.sink.last("Tix.bco"), Some("65535"));
        modal.poll(&mut h.ctx(), 8);
        modal.poll(&mut h.ctx(), 8);
        assert_eq!(h.sink.last("Tda.txt"), Some("4"));

        m.on_key(KEY_ENTER, &mut h.ctx());
        assert!(m.is_paused());
        m.on_key(KEY_FIELD_3, &mut h.ctx());
        assert_eq!(m.count(), 0);
        assert_eq!(h.keys(&mut modal, &[KEY_CANCEL]), ModalStep::Exit);
    }

    #[test]
    fn test_paused_leaves_packets() {
        let uart = ScriptedUart::with_rx(b"@193/1$");
        let mut h = Harness::new(SerialBackend::new(uart));
        let mut m = DataMonitor::new();
        m.on_key(KEY_ENTER, &mut h.ctx());
        m.poll(&mut h.ctx(), 8);
        assert_eq!(h.sink.last("Tct.txt"), None);
        m.on_key(KEY_ENTER, &mut h.ctx());
        m.poll(&mut h.ctx(), 8);
        assert_eq!(h.sink.last("Tct.txt"), Some("1"));
    }

    #[test]
    fn test_registration_shows_node_after_activity() {
        let mut h = Harness::new(SimAdapter::new(FakeHost::default()));
        let mut id = NodeId(0);
        for _ in 0..=193 {
            id = h.catalog.add_node(Node::new(ValueKind::Float)).unwrap();
        }
        let spec = crate::sim::DatarefSpec {
            name: "sim/flightmodel/position/indicated_airspeed",
            mode: crate::sim::AccessMode::Read,
            refresh: 1,
            divider: 1,
            index: None,
            kind: ValueKind::Float,
        };
        let handle = h.sim.bind_dataref(&spec, id).unwrap();
        assert_eq!(handle, DatarefHandle(0));

        let mut modal = Modal::DataMonitor(DataMonitor::new());
        modal.poll(&mut h.ctx(), 8);
        assert_eq!(h.sink.last("Tda.txt"), None);

        h.sim.host_mut().pending.push((handle, Value::Float(142.5)));
        modal.poll(&mut h.ctx(), 8);
        assert_eq!(h.sink.last("Tda.txt"), Some("142.5"));
        assert_eq!(h.sink.last("Tct.txt"), Some("1"));
    }
}
