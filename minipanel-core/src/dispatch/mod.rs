//! Node operation routing
//!
//! A node operation is `(node, slot, operand)`. The dispatcher resolves it
//! to exactly one backend call:
//!
//! ```text
//! SystemOp node      -> configuration op (settings)
//! registration link  -> command handle (trigger/start/end/write), key array
//!                       entry or transform
//! serial link        -> framed opcode packet
//! ```
//!
//! Unassigned slots and stale node handles are silent no-ops.

pub mod transform;

pub use transform::{Step, Transform, TransformKind, TransformResult};

use crate::catalog::{Backend, Catalog};
use crate::display::DisplaySink;
use crate::node::{Caps, NodeId, OpSlot, RegOp};
use crate::settings::Settings;
use crate::sim::{CommandHandle, Operand, SimError, SimLink};

/// Outcome of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatched {
    /// Nothing to do for this slot
    Ignored,
    /// Handled by the configuration subsystem
    System,
    /// Opcode packet sent on the serial link
    Opcode,
    /// Registered command triggered, started or ended
    Command,
    /// Node value changed and written back
    NodeWritten,
    /// Auxiliary group or extra command adjusted
    Effect,
}

/// Routes node operations to the active backend
pub struct CommandDispatcher<'a> {
    catalog: &'a mut Catalog,
    settings: &'a mut Settings,
    sim: &'a mut dyn SimLink,
    sink: &'a mut dyn DisplaySink,
    /// Unit served by key arrays
    unit: u8,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(
        catalog: &'a mut Catalog,
        settings: &'a mut Settings,
        sim: &'a mut dyn SimLink,
        sink: &'a mut dyn DisplaySink,
    ) -> Self {
        Self {
            catalog,
            settings,
            sim,
            sink,
            unit: 0,
        }
    }

    /// Select the unit for key array lookups
    pub fn with_unit(mut self, unit: u8) -> Self {
        self.unit = unit;
        self
    }

    /// Execute one node operation
    pub fn dispatch(
        &mut self,
        id: NodeId,
        slot: OpSlot,
        operand: Operand,
    ) -> Result<Dispatched, SimError> {
        let Some(node) = self.catalog.node(id) else {
            return Ok(Dispatched::Ignored);
        };
        let i = slot.index();

        if node.has(Caps::SYSTEM_OP) {
            let opcode = node.opcodes[i];
            let Some(node) = self.catalog.node_mut(id) else {
                return Ok(Dispatched::Ignored);
            };
            let handled = opcode != 0 && self.settings.handle_config(opcode, node, self.sink);
            return Ok(if handled {
                Dispatched::System
            } else {
                Dispatched::Ignored
            });
        }

        match self.sim.backend() {
            Backend::Serial => {
                let opcode = node.opcodes[i];
                if opcode == 0 {
                    return Ok(Dispatched::Ignored);
                }
                self.sim.send_opcode(opcode, operand)?;
                Ok(Dispatched::Opcode)
            }
            Backend::Registration => match node.reg_ops[i] {
                RegOp::None => Ok(Dispatched::Ignored),
                RegOp::Command(cmd) => {
                    let caps = node.caps;
                    let flagged = [Caps::SEND_DIRECT, Caps::CMD_START, Caps::CMD_END]
                        .into_iter()
                        .any(|c| caps.contains(c));
                    if !flagged && caps.contains(Caps::DATAREF_UPDATE) {
                        return self.write_operand(id, operand);
                    }
                    self.run_command(caps, cmd)
                }
                RegOp::Keys(keys) => {
                    let Operand::Value(key) = operand else {
                        return Ok(Dispatched::Ignored);
                    };
                    let caps = node.caps;
                    match keys
                        .entry(key, self.unit)
                        .and_then(|entry| self.catalog.key_command(entry))
                    {
                        Some(cmd) => self.run_command(caps, cmd),
                        None => Ok(Dispatched::Ignored),
                    }
                }
                RegOp::Write => self.write_operand(id, operand),
                RegOp::Transform(t) => match t.apply(node.value()) {
                    TransformResult::NodeValue(value) => {
                        let Some(node) = self.catalog.node_mut(id) else {
                            return Ok(Dispatched::Ignored);
                        };
                        node.set_value(value);
                        self.sim.write_node(node)?;
                        Ok(Dispatched::NodeWritten)
                    }
                    TransformResult::Aux { group, step } => {
                        self.sim.adjust_aux(group, step)?;
                        Ok(Dispatched::Effect)
                    }
                    TransformResult::Trigger { command, times } => {
                        self.sim.extra_command(command, times)?;
                        Ok(Dispatched::Effect)
                    }
                },
            },
        }
    }

    /// Trigger, start or end `cmd` as the node's dispatch flags ask
    fn run_command(&mut self, caps: Caps, cmd: CommandHandle) -> Result<Dispatched, SimError> {
        if caps.contains(Caps::SEND_DIRECT) {
            self.sim.trigger(cmd, 1)?;
        } else if caps.contains(Caps::CMD_START) {
            self.sim.start(cmd)?;
        } else if caps.contains(Caps::CMD_END) {
            self.sim.end(cmd)?;
        } else {
            self.sim.trigger(cmd, 1)?;
        }
        Ok(Dispatched::Command)
    }

    fn write_operand(&mut self, id: NodeId, operand: Operand) -> Result<Dispatched, SimError> {
        let (Operand::Value(v), Some(node)) = (operand, self.catalog.node_mut(id)) else {
            return Ok(Dispatched::Ignored);
        };
        node.set_int(v);
        self.sim.write_node(node)?;
        Ok(Dispatched::NodeWritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DatarefBinding, KeyArray, Node};
    use crate::sim::{
        AuxGroup, CommandHandle, DatarefHandle, ExtraCommand, RegistrationSink, SerialBackend,
        SimAdapter,
    };
    use crate::testutil::{FakeHost, HostCall, RecordingSink, ScriptedUart};
    use crate::value::{Value, ValueKind};

    fn node_with(caps: Caps, opcodes: [u16; 3]) -> Node {
        let mut node = Node::new(ValueKind::Int);
        node.caps = caps;
        node.opcodes = opcodes;
        node
    }

    struct Rig {
        catalog: Catalog,
        settings: Settings,
        sink: RecordingSink,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                catalog: Catalog::new(),
                settings: Settings::default(),
                sink: RecordingSink::default(),
            }
        }

        fn run(
            &mut self,
            sim: &mut dyn SimLink,
            id: NodeId,
            slot: OpSlot,
            operand: Operand,
        ) -> Result<Dispatched, SimError> {
            CommandDispatcher::new(&mut self.catalog, &mut self.settings, sim, &mut self.sink)
                .dispatch(id, slot, operand)
        }
    }

    #[test]
    fn test_serial_sends_slot_opcode() {
        let mut rig = Rig::new();
        let id = rig
            .catalog
            .add_node(node_with(Caps::SELECTABLE, [301, 302, 303]))
            .unwrap();
        let mut sim = SerialBackend::new(ScriptedUart::default());
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Increment, Operand::None),
            Ok(Dispatched::Opcode)
        );
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::Value(1)),
            Ok(Dispatched::Opcode)
        );
        assert_eq!(sim.port_mut().take_tx(), "@303/$@301/1$");
    }

    #[test]
    fn test_unassigned_and_invalid_are_noops() {
        let mut rig = Rig::new();
        let id = rig.catalog.add_node(node_with(Caps::NONE, [0, 0, 0])).unwrap();
        let mut sim = SerialBackend::new(ScriptedUart::default());
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::None),
            Ok(Dispatched::Ignored)
        );
        assert_eq!(
            rig.run(&mut sim, NodeId(99), OpSlot::Primary, Operand::None),
            Ok(Dispatched::Ignored)
        );
        assert!(sim.port_mut().tx.is_empty());
    }

    #[test]
    fn test_system_op_goes_to_settings() {
        let mut rig = Rig::new();
        let mut node = node_with(Caps::SYSTEM_OP, [3, 1, 2]);
        node.tag = heapless::String::try_from("t5.txt").unwrap();
        let id = rig.catalog.add_node(node).unwrap();
        let mut sim = SerialBackend::new(ScriptedUart::default());
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Decrement, Operand::None),
            Ok(Dispatched::System)
        );
        assert_eq!(rig.settings.brightness, 96);
        assert!(rig.settings.save_required);
        assert!(sim.port_mut().tx.is_empty());
        assert_eq!(rig.sink.last("t5.txt"), Some("96%"));
    }

    #[test]
    fn test_registration_command_flags() {
        let mut rig = Rig::new();
        let mut sim = SimAdapter::new(FakeHost::default());
        let cmd = sim.bind_command("sim/autopilot/hdg_sync").unwrap();
        let mut ids = std::vec::Vec::new();
        for caps in [Caps::SEND_DIRECT, Caps::CMD_START, Caps::CMD_END, Caps::NONE] {
            let mut node = node_with(caps, [0; 3]);
            node.reg_ops[0] = RegOp::Command(cmd);
            ids.push(rig.catalog.add_node(node).unwrap());
        }
        for id in ids {
            assert_eq!(
                rig.run(&mut sim, id, OpSlot::Primary, Operand::None),
                Ok(Dispatched::Command)
            );
        }
        assert_eq!(
            sim.host().calls,
            [
                HostCall::Trigger(cmd, 1),
                HostCall::Start(cmd),
                HostCall::End(cmd),
                HostCall::Trigger(cmd, 1),
            ]
        );
    }

    #[test]
    fn test_registration_dataref_update_writes_operand() {
        let mut rig = Rig::new();
        let mut sim = SimAdapter::new(FakeHost::default());
        let mut node = node_with(Caps::DATAREF_UPDATE, [0; 3]);
        node.reg_ops[0] = RegOp::Command(CommandHandle(0));
        node.reg_ops[1] = RegOp::Write;
        node.dataref = Some(DatarefBinding {
            handle: DatarefHandle(4),
            writable: true,
        });
        let id = rig.catalog.add_node(node).unwrap();

        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::Value(1)),
            Ok(Dispatched::NodeWritten)
        );
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Decrement, Operand::None),
            Ok(Dispatched::Ignored)
        );
        assert_eq!(rig.catalog.node(id).unwrap().int_value(), 1);
        assert_eq!(
            sim.host().calls,
            [HostCall::Write(DatarefHandle(4), Value::Int(1))]
        );
    }

    #[test]
    fn test_registration_transform_writes_back() {
        let mut rig = Rig::new();
        let mut sim = SimAdapter::new(FakeHost::default());
        let mut node = node_with(Caps::SELECTABLE, [0; 3]);
        node.reg_ops[1] = RegOp::Transform(Transform::new(TransformKind::Heading, Step::Dec));
        node.reg_ops[2] = RegOp::Transform(Transform::new(TransformKind::Heading, Step::Inc));
        node.dataref = Some(DatarefBinding {
            handle: DatarefHandle(2),
            writable: true,
        });
        let id = rig.catalog.add_node(node).unwrap();

        rig.run(&mut sim, id, OpSlot::Decrement, Operand::None).unwrap();
        assert_eq!(rig.catalog.node(id).unwrap().int_value(), 359);
        rig.run(&mut sim, id, OpSlot::Increment, Operand::None).unwrap();
        assert_eq!(rig.catalog.node(id).unwrap().int_value(), 0);
        assert_eq!(
            sim.host().calls,
            [
                HostCall::Write(DatarefHandle(2), Value::Int(359)),
                HostCall::Write(DatarefHandle(2), Value::Int(0)),
            ]
        );
    }

    #[test]
    fn test_registration_effects() {
        let mut rig = Rig::new();
        let mut sim = SimAdapter::new(FakeHost::default());
        sim.bind_extra(ExtraCommand::TimeDownFast, "sim/operation/time_down_lots")
            .unwrap();
        let mut node = node_with(Caps::NONE, [0; 3]);
        node.reg_ops[1] = RegOp::Transform(Transform::new(TransformKind::TimeFast, Step::Dec));
        node.reg_ops[2] = RegOp::Transform(Transform::new(
            TransformKind::Brightness(AuxGroup { first: 0, count: 1 }),
            Step::Inc,
        ));
        let id = rig.catalog.add_node(node).unwrap();

        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Decrement, Operand::None),
            Ok(Dispatched::Effect)
        );
        assert_eq!(
            sim.host().calls.last(),
            Some(&HostCall::Trigger(CommandHandle(0), 13))
        );
        // No aux slot registered yet
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Increment, Operand::None),
            Err(SimError::Unregistered)
        );
    }

    #[test]
    fn test_key_array_picks_touched_key_and_unit() {
        let mut rig = Rig::new();
        let mut sim = SimAdapter::new(FakeHost::default());
        let handles: std::vec::Vec<_> = (0..6).map(|i| Some(CommandHandle(20 + i))).collect();
        let (first, _) = rig.catalog.add_key_group("knobs", &handles).unwrap();
        let mut node = node_with(Caps::CMD_START, [0; 3]);
        node.reg_ops[0] = RegOp::Keys(KeyArray {
            first,
            keys: 3,
            units: 2,
        });
        let id = rig.catalog.add_node(node).unwrap();

        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::Value(2)),
            Ok(Dispatched::Command)
        );
        let second_unit = CommandDispatcher::new(
            &mut rig.catalog,
            &mut rig.settings,
            &mut sim,
            &mut rig.sink,
        )
        .with_unit(1)
        .dispatch(id, OpSlot::Primary, Operand::Value(0));
        assert_eq!(second_unit, Ok(Dispatched::Command));

        // Out of range or missing key index
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::Value(3)),
            Ok(Dispatched::Ignored)
        );
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::None),
            Ok(Dispatched::Ignored)
        );
        assert_eq!(
            sim.host().calls,
            [
                HostCall::Start(CommandHandle(22)),
                HostCall::Start(CommandHandle(23)),
            ]
        );
    }

    #[test]
    fn test_key_array_skips_unregistered_entry() {
        let mut rig = Rig::new();
        let mut sim = SimAdapter::new(FakeHost::default());
        let (first, keys) = rig
            .catalog
            .add_key_group("softkeys", &[Some(CommandHandle(1)), None])
            .unwrap();
        let mut node = node_with(Caps::SEND_DIRECT, [0; 3]);
        node.reg_ops[0] = RegOp::Keys(KeyArray {
            first,
            keys,
            units: 1,
        });
        let id = rig.catalog.add_node(node).unwrap();
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::Value(1)),
            Ok(Dispatched::Ignored)
        );
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::Value(0)),
            Ok(Dispatched::Command)
        );
        assert_eq!(sim.host().calls, [HostCall::Trigger(CommandHandle(1), 1)]);
    }

    #[test]
    fn test_serial_link_ignores_registration_ops() {
        let mut rig = Rig::new();
        let mut node = node_with(Caps::NONE, [0; 3]);
        node.reg_ops[0] = RegOp::Command(CommandHandle(1));
        let id = rig.catalog.add_node(node).unwrap();
        let mut sim = SerialBackend::new(ScriptedUart::default());
        assert_eq!(
            rig.run(&mut sim, id, OpSlot::Primary, Operand::None),
            Ok(Dispatched::Ignored)
        );
    }
}
