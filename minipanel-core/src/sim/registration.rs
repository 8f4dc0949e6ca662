//! Dataref/command registration backend

use heapless::Vec;

use super::{
    AuxGroup, BindTarget, CommandHandle, DatarefHandle, DatarefSpec, ExtraCommand,
    RegistrationSink, SimError, SimLink,
};
use crate::catalog::{Backend, Catalog};
use crate::dispatch::{transform, Step};
use crate::node::{Node, NodeId};
use crate::value::Value;

/// Maximum registered dataref bindings
pub const MAX_BINDINGS: usize = 192;

/// Maximum auxiliary dataref slots
pub const MAX_AUX: usize = 16;

/// Host side of the registration interface
pub trait DatarefHost {
    fn register_dataref(&mut self, spec: &DatarefSpec<'_>) -> Option<DatarefHandle>;

    fn register_command(&mut self, name: &str) -> Option<CommandHandle>;

    /// Trigger a command `times` times
    fn command_trigger(&mut self, cmd: CommandHandle, times: u8);

    fn command_start(&mut self, cmd: CommandHandle);

    fn command_end(&mut self, cmd: CommandHandle);

    fn write_dataref(&mut self, handle: DatarefHandle, value: &Value);

    /// Deliver every pending update; returns the number delivered
    fn poll(&mut self, deliver: &mut dyn FnMut(DatarefHandle, Value)) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    handle: DatarefHandle,
    target: BindTarget,
}

#[derive(Debug, Clone, Copy)]
struct AuxSlot {
    handle: DatarefHandle,
    value: f32,
}

/// Registration adapter between the host and node storage
pub struct SimAdapter<H> {
    host: H,
    bindings: Vec<Binding, MAX_BINDINGS>,
    aux: Vec<AuxSlot, MAX_AUX>,
    extras: [Option<CommandHandle>; 2],
}

impl<H: DatarefHost> SimAdapter<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            bindings: Vec::new(),
            aux: Vec::new(),
            extras: [None; 2],
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Number of registered dataref bindings
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Last value received for an auxiliary slot
    pub fn aux_value(&self, slot: u8) -> Option<f32> {
        self.aux.get(slot as usize).map(|a| a.value)
    }

    fn register(&mut self, spec: &DatarefSpec<'_>) -> Result<DatarefHandle, SimError> {
        if self.bindings.is_full() {
            return Err(SimError::Capacity);
        }
        self.host
            .register_dataref(spec)
            .ok_or(SimError::Unregistered)
    }
}

impl<H: DatarefHost> RegistrationSink for SimAdapter<H> {
    fn bind_dataref(
        &mut self,
        spec: &DatarefSpec<'_>,
        node: NodeId,
    ) -> Result<DatarefHandle, SimError> {
        let handle = self.register(spec)?;
        self.bindings
            .push(Binding {
                handle,
                target: BindTarget::Node(node),
            })
            .map_err(|_| SimError::Capacity)?;
        Ok(handle)
    }

    fn bind_aux(&mut self, spec: &DatarefSpec<'_>) -> Result<u8, SimError> {
        if self.aux.is_full() {
            return Err(SimError::Capacity);
        }
        let handle = self.register(spec)?;
        let slot = self.aux.len() as u8;
        self.bindings
            .push(Binding {
                handle,
                target: BindTarget::Aux(slot),
            })
            .map_err(|_| SimError::Capacity)?;
        self.aux
            .push(AuxSlot { handle, value: 0.0 })
            .map_err(|_| SimError::Capacity)?;
        Ok(slot)
    }

    fn bind_command(&mut self, name: &str) -> Result<CommandHandle, SimError> {
        self.host
            .register_command(name)
            .ok_or(SimError::Unregistered)
    }

    fn bind_extra(&mut self, which: ExtraCommand, name: &str) -> Result<(), SimError> {
        let cmd = self.bind_command(name)?;
        self.extras[which as usize] = Some(cmd);
        Ok(())
    }
}

impl<H: DatarefHost> SimLink for SimAdapter<H> {
    fn backend(&self) -> Backend {
        Backend::Registration
    }

    fn registrar(&mut self) -> Option<&mut dyn RegistrationSink> {
        Some(self)
    }

    fn collect(&mut self, catalog: &mut Catalog, _quota: usize) -> usize {
        let Self {
            host,
            bindings,
            aux,
            ..
        } = self;
        host.poll(&mut |handle, value| {
            let Some(binding) = bindings.iter().find(|b| b.handle == handle) else {
                return;
            };
            match binding.target {
                BindTarget::Node(id) => {
                    if let Some(node) = catalog.node_mut(id) {
                        node.set_value(value);
                    }
                }
                BindTarget::Aux(slot) => {
                    if let Some(a) = aux.get_mut(slot as usize) {
                        a.value = value.as_float();
                    }
                }
            }
        })
    }

    fn trigger(&mut self, cmd: CommandHandle, times: u8) -> Result<(), SimError> {
        self.host.command_trigger(cmd, times);
        Ok(())
    }

    fn start(&mut self, cmd: CommandHandle) -> Result<(), SimError> {
        self.host.command_start(cmd);
        Ok(())
    }

    fn end(&mut self, cmd: CommandHandle) -> Result<(), SimError> {
        self.host.command_end(cmd);
        Ok(())
    }

    fn write_node(&mut self, node: &Node) -> Result<(), SimError> {
        match node.dataref {
            Some(binding) if binding.writable => {
                self.host.write_dataref(binding.handle, node.value());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn adjust_aux(&mut self, group: AuxGroup, step: Step) -> Result<(), SimError> {
        let first = group.first as usize;
        let last = first + group.count as usize;
        if last > self.aux.len() {
            return Err(SimError::Unregistered);
        }
        for slot in &mut self.aux[first..last] {
            slot.value = transform::step_brightness(slot.value, step);
            self.host
                .write_dataref(slot.handle, &Value::Float(slot.value));
        }
        Ok(())
    }

    fn extra_command(&mut self, which: ExtraCommand, times: u8) -> Result<(), SimError> {
        let cmd = self.extras[which as usize].ok_or(SimError::Unregistered)?;
        self.host.command_trigger(cmd, times);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DatarefBinding;
    use crate::sim::AccessMode;
    use crate::testutil::{FakeHost, HostCall};
    use crate::value::ValueKind;

    fn spec(name: &str) -> DatarefSpec<'_> {
        DatarefSpec {
            name,
            mode: AccessMode::ReadWrite,
            refresh: 1,
            divider: 1,
            index: None,
            kind: ValueKind::Float,
        }
    }

    #[test]
    fn test_collect_routes_to_node_and_aux() {
        let mut catalog = Catalog::new();
        let id = catalog.add_node(Node::new(ValueKind::Int)).unwrap();
        let mut adapter = SimAdapter::new(FakeHost::default());
        let h = adapter.bind_dataref(&spec("sim/heading"), id).unwrap();
        let slot = adapter.bind_aux(&spec("sim/panel_brightness")).unwrap();
        let aux_handle = DatarefHandle(1);

        adapter.host_mut().pending.push((h, Value::Float(271.6)));
        adapter.host_mut().pending.push((aux_handle, Value::Float(0.4)));
        adapter.host_mut().pending.push((DatarefHandle(77), Value::Int(1)));
        assert_eq!(adapter.collect(&mut catalog, 0), 3);
        assert_eq!(catalog.node(id).unwrap().value(), &Value::Int(271));
        assert_eq!(adapter.aux_value(slot), Some(0.4));
    }

    #[test]
    fn test_unregistered_node_never_updated() {
        let mut catalog = Catalog::new();
        let id = catalog.add_node(Node::new(ValueKind::Int)).unwrap();
        let mut adapter = SimAdapter::new(FakeHost::default());
        adapter.host_mut().pending.push((DatarefHandle(0), Value::Int(9)));
        adapter.collect(&mut catalog, 0);
        assert_eq!(catalog.node(id).unwrap().int_value(), 0);
    }

    #[test]
    fn test_refused_registration() {
        let mut adapter = SimAdapter::new(FakeHost::refusing());
        assert_eq!(
            adapter.bind_dataref(&spec("bogus"), NodeId(0)),
            Err(SimError::Unregistered)
        );
        assert_eq!(adapter.bind_command("bogus"), Err(SimError::Unregistered));
        assert_eq!(adapter.binding_count(), 0);
    }

    #[test]
    fn test_write_node_only_when_writable() {
        let mut adapter = SimAdapter::new(FakeHost::default());
        let mut node = Node::new(ValueKind::Int);
        node.set_int(4);
        adapter.write_node(&node).unwrap();
        node.dataref = Some(DatarefBinding {
            handle: DatarefHandle(3),
            writable: false,
        });
        adapter.write_node(&node).unwrap();
        assert!(adapter.host().calls.is_empty());
        node.dataref = Some(DatarefBinding {
            handle: DatarefHandle(3),
            writable: true,
        });
        adapter.write_node(&node).unwrap();
        assert_eq!(
            adapter.host().calls,
            [HostCall::Write(DatarefHandle(3), Value::Int(4))]
        );
    }

    #[test]
    fn test_adjust_aux_group_clamps() {
        let mut adapter = SimAdapter::new(FakeHost::default());
        for name in ["a", "b", "c"] {
            adapter.bind_aux(&spec(name)).unwrap();
        }
        let group = AuxGroup { first: 1, count: 2 };
        for _ in 0..12 {
            adapter.adjust_aux(group, Step::Inc).unwrap();
        }
        assert_eq!(adapter.aux_value(0), Some(0.0));
        assert_eq!(adapter.aux_value(1), Some(1.0));
        assert_eq!(adapter.aux_value(2), Some(1.0));
        assert_eq!(
            adapter.adjust_aux(AuxGroup { first: 2, count: 2 }, Step::Dec),
            Err(SimError::Unregistered)
        );
    }

    #[test]
    fn test_extra_command_needs_registration() {
        let mut adapter = SimAdapter::new(FakeHost::default());
        assert_eq!(
            adapter.extra_command(ExtraCommand::TimeUpFast, 13),
            Err(SimError::Unregistered)
        );
        adapter
            .bind_extra(ExtraCommand::TimeUpFast, "sim/operation/time_up_lots")
            .unwrap();
        adapter.extra_command(ExtraCommand::TimeUpFast, 13).unwrap();
        assert_eq!(
            adapter.host().calls.last(),
            Some(&HostCall::Trigger(CommandHandle(0), 13))
        );
    }
}
