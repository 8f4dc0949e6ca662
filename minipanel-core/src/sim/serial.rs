//! Polled ASCII serial backend

use minipanel_hal::Uart;
use minipanel_protocol::{compose, compose_bare, Packet, PacketFramer};

use super::{Operand, SimError, SimLink};
use crate::catalog::{Backend, Catalog};
use crate::node::Node;
use crate::value::ValueKind;

/// Serial simulator link over a UART
pub struct SerialBackend<P> {
    port: P,
    framer: PacketFramer,
}

impl<P: Uart> SerialBackend<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            framer: PacketFramer::new(),
        }
    }

    /// Next complete packet from the bytes already received
    pub fn fetch(&mut self) -> Option<Packet> {
        let Self { port, framer } = self;
        let mut bytes = core::iter::from_fn(|| port.try_read_byte());
        framer.fetch(&mut bytes)
    }

    /// Packets dropped for exceeding the maximum length
    pub fn overruns(&self) -> u16 {
        self.framer.overruns()
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

/// Store one packet into the nodes it addresses
///
/// Non-modal pages of the active profile are searched in order. All
/// matching nodes of the first page with a match are updated. The link
/// clock node is tried last, as it need not sit on any page.
pub fn apply_packet(catalog: &mut Catalog, packet: &Packet) -> bool {
    let (Some(id), Some(index)) = (packet.numeric_id(), packet.numeric_index()) else {
        return false;
    };

    let mut slot = 0;
    while let Some(page) = catalog.profile_page(slot) {
        slot += 1;
        if catalog.page(page).map_or(true, |p| p.is_modal()) {
            continue;
        }

        let mut matched = false;
        let mut i = 0;
        while let Some(node_id) = catalog.page_node(page, i) {
            i += 1;
            let Some(node) = catalog.node_mut(node_id) else {
                continue;
            };
            if !node.matches_key(id, index) {
                continue;
            }
            store(node, packet);
            matched = true;
        }
        if matched {
            return true;
        }
    }

    match catalog.link_clock().and_then(|clock| catalog.node_mut(clock)) {
        Some(node) if node.matches_key(id, index) => {
            store(node, packet);
            true
        }
        _ => false,
    }
}

fn store(node: &mut Node, packet: &Packet) {
    match node.kind() {
        ValueKind::Int => node.set_int(packet.int_value().unwrap_or(0)),
        ValueKind::Float => node.set_float(packet.float_value().unwrap_or(0.0)),
        ValueKind::Text => node.set_text(packet.value()),
    }
}

impl<P: Uart> SimLink for SerialBackend<P> {
    fn backend(&self) -> Backend {
        Backend::Serial
    }

    fn collect(&mut self, catalog: &mut Catalog, quota: usize) -> usize {
        let mut stored = 0;
        for _ in 0..quota {
            let Some(packet) = self.fetch() else {
                break;
            };
            if apply_packet(catalog, &packet) {
                stored += 1;
            }
        }
        stored
    }

    fn fetch_packet(&mut self) -> Option<Packet> {
        self.fetch()
    }

    fn send_opcode(&mut self, opcode: u16, operand: Operand) -> Result<(), SimError> {
        let packet = match operand {
            Operand::None => compose_bare(opcode),
            Operand::Value(v) => compose(opcode, v),
        }
        .map_err(|_| SimError::Compose)?;
        self.port
            .write_blocking(packet.as_bytes())
            .map_err(|_| SimError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Profile;
    use crate::node::{Caps, SimKey};
    use crate::page::{ModalKind, Page, PageKind};
    use crate::testutil::ScriptedUart;
    use minipanel_protocol::NO_INDEX;

    fn input_node(kind: ValueKind, id: u16, index: i16) -> Node {
        let mut node = Node::new(kind);
        node.caps = Caps::INPUT;
        node.sim_key = Some(SimKey { id, index });
        node
    }

    /// Two pages: a modal one and a user one, both holding key 76/-1
    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let a = catalog.add_node(input_node(ValueKind::Int, 76, NO_INDEX)).unwrap();
        let b = catalog.add_node(input_node(ValueKind::Float, 76, NO_INDEX)).unwrap();
        let c = catalog.add_node(input_node(ValueKind::Int, 76, NO_INDEX)).unwrap();
        let d = catalog.add_node(input_node(ValueKind::Text, 12, 2)).unwrap();

        let mut modal = Page::new();
        modal.kind = PageKind::Modal(ModalKind::TestPad);
        modal.add_node(c).unwrap();
        let mut user = Page::new();
        user.add_node(a).unwrap();
        user.add_node(b).unwrap();
        user.add_node(d).unwrap();
        let mut later = Page::new();
        later.add_node(c).unwrap();

        let mut profile = Profile::default();
        profile.pages.push(catalog.add_page(modal).unwrap()).unwrap();
        profile.pages.push(catalog.add_page(user).unwrap()).unwrap();
        profile.pages.push(catalog.add_page(later).unwrap()).unwrap();
        catalog.add_profile(profile).unwrap();
        catalog
    }

    #[test]
    fn test_collect_first_matching_page_only() {
        let mut catalog = catalog();
        let mut link = SerialBackend::new(ScriptedUart::with_rx(b"@76/4123.7$"));
        assert_eq!(link.collect(&mut catalog, 90), 1);
        assert_eq!(catalog.node(crate::node::NodeId(0)).unwrap().int_value(), 4123);
        assert_eq!(catalog.node(crate::node::NodeId(1)).unwrap().float_value(), 4123.7);
        // Node 2 sits on the modal page and on a later page only
        assert_eq!(catalog.node(crate::node::NodeId(2)).unwrap().int_value(), 0);
    }

    #[test]
    fn test_collect_indexed_text() {
        let mut catalog = catalog();
        let mut link = SerialBackend::new(ScriptedUart::with_rx(b"@12/2=GEAR DN$@12/1=X$"));
        assert_eq!(link.collect(&mut catalog, 90), 1);
        assert_eq!(
            catalog.node(crate::node::NodeId(3)).unwrap().value().to_text().as_str(),
            "GEAR DN"
        );
    }

    #[test]
    fn test_collect_honours_quota() {
        let mut catalog = catalog();
        let mut link = SerialBackend::new(ScriptedUart::with_rx(b"@76/1$@76/2$@76/3$"));
        assert_eq!(link.collect(&mut catalog, 2), 2);
        assert_eq!(catalog.node(crate::node::NodeId(0)).unwrap().int_value(), 2);
        assert_eq!(link.collect(&mut catalog, 2), 1);
        assert_eq!(catalog.node(crate::node::NodeId(0)).unwrap().int_value(), 3);
    }

    #[test]
    fn test_send_opcode_frames() {
        let mut link = SerialBackend::new(ScriptedUart::default());
        link.send_opcode(121, Operand::None).unwrap();
        link.send_opcode(7, Operand::Value(-40)).unwrap();
        assert_eq!(link.port_mut().tx.as_slice(), b"@121/$@7/-40$");
    }
}
