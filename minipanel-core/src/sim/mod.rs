//! Simulator links
//!
//! Two backends feed the same node model:
//!
//! - [`SerialBackend`]: polled ASCII packets, values addressed by packet key
//! - [`SimAdapter`]: datarefs and commands registered at boot, values
//!   pushed back by the host on each poll
//!
//! The dispatcher and the panel only see the [`SimLink`] trait.

pub mod registration;
pub mod serial;

pub use registration::{DatarefHost, SimAdapter, MAX_AUX, MAX_BINDINGS};
pub use serial::SerialBackend;

use minipanel_protocol::Packet;

use crate::catalog::{Backend, Catalog};
use crate::dispatch::Step;
use crate::node::{Node, NodeId};
use crate::value::ValueKind;

/// Opaque host handle for a registered command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandHandle(pub u16);

/// Opaque host handle for a registered dataref
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DatarefHandle(pub u16);

/// Optional operand sent with an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operand {
    None,
    Value(i32),
}

/// Commands registered outside any node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtraCommand {
    TimeDownFast = 0,
    TimeUpFast = 1,
}

/// Consecutive auxiliary dataref slots adjusted together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuxGroup {
    pub first: u8,
    pub count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessMode {
    #[default]
    Read,
    ReadWrite,
}

/// Dataref registration request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatarefSpec<'a> {
    pub name: &'a str,
    pub mode: AccessMode,
    /// Refresh hint for the host
    pub refresh: u16,
    /// Update divider for the host
    pub divider: u16,
    /// Array element, `None` for scalars
    pub index: Option<u16>,
    pub kind: ValueKind,
}

/// Where a registered dataref stores its updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BindTarget {
    Node(NodeId),
    Aux(u8),
}

/// Simulator link errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimError {
    /// Transport write failed
    Transport,
    /// Outbound packet could not be composed
    Compose,
    /// Operation not offered by this backend
    Unsupported,
    /// Host refused a registration or the handle is unknown
    Unregistered,
    /// Binding table is full
    Capacity,
}

/// Receiver of boot-time registrations
pub trait RegistrationSink {
    /// Register a dataref that updates `node`
    fn bind_dataref(&mut self, spec: &DatarefSpec<'_>, node: NodeId)
        -> Result<DatarefHandle, SimError>;

    /// Register an auxiliary dataref; returns its slot
    fn bind_aux(&mut self, spec: &DatarefSpec<'_>) -> Result<u8, SimError>;

    fn bind_command(&mut self, name: &str) -> Result<CommandHandle, SimError>;

    fn bind_extra(&mut self, which: ExtraCommand, name: &str) -> Result<(), SimError>;
}

/// Backend-neutral simulator link
pub trait SimLink {
    fn backend(&self) -> Backend;

    /// Move pending simulator values into node storage
    ///
    /// Never blocks. Returns the number of updates applied.
    fn collect(&mut self, catalog: &mut Catalog, quota: usize) -> usize;

    /// Next raw packet, bypassing node storage
    fn fetch_packet(&mut self) -> Option<Packet> {
        None
    }

    /// Boot-time registration interface, if this backend has one
    fn registrar(&mut self) -> Option<&mut dyn RegistrationSink> {
        None
    }

    /// Send a numeric opcode (serial)
    fn send_opcode(&mut self, _opcode: u16, _operand: Operand) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }

    fn trigger(&mut self, _cmd: CommandHandle, _times: u8) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }

    fn start(&mut self, _cmd: CommandHandle) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }

    fn end(&mut self, _cmd: CommandHandle) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }

    /// Tell the host about a node value written locally
    fn write_node(&mut self, _node: &Node) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }

    fn adjust_aux(&mut self, _group: AuxGroup, _step: Step) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }

    fn extra_command(&mut self, _which: ExtraCommand, _times: u8) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }
}

/// The backend chosen by the active profile
pub enum SimBackends<P, H> {
    Serial(SerialBackend<P>),
    Registration(SimAdapter<H>),
}

impl<P, H> SimLink for SimBackends<P, H>
where
    P: minipanel_hal::Uart,
    H: DatarefHost,
{
    fn backend(&self) -> Backend {
        match self {
            SimBackends::Serial(s) => s.backend(),
            SimBackends::Registration(r) => r.backend(),
        }
    }

    fn collect(&mut self, catalog: &mut Catalog, quota: usize) -> usize {
        match self {
            SimBackends::Serial(s) => s.collect(catalog, quota),
            SimBackends::Registration(r) => r.collect(catalog, quota),
        }
    }

    fn fetch_packet(&mut self) -> Option<Packet> {
        match self {
            SimBackends::Serial(s) => s.fetch_packet(),
            SimBackends::Registration(r) => r.fetch_packet(),
        }
    }

    fn registrar(&mut self) -> Option<&mut dyn RegistrationSink> {
        match self {
            SimBackends::Serial(s) => s.registrar(),
            SimBackends::Registration(r) => r.registrar(),
        }
    }

    fn send_opcode(&mut self, opcode: u16, operand: Operand) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.send_opcode(opcode, operand),
            SimBackends::Registration(r) => r.send_opcode(opcode, operand),
        }
    }

    fn trigger(&mut self, cmd: CommandHandle, times: u8) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.trigger(cmd, times),
            SimBackends::Registration(r) => r.trigger(cmd, times),
        }
    }

    fn start(&mut self, cmd: CommandHandle) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.start(cmd),
            SimBackends::Registration(r) => r.start(cmd),
        }
    }

    fn end(&mut self, cmd: CommandHandle) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.end(cmd),
            SimBackends::Registration(r) => r.end(cmd),
        }
    }

    fn write_node(&mut self, node: &Node) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.write_node(node),
            SimBackends::Registration(r) => r.write_node(node),
        }
    }

    fn adjust_aux(&mut self, group: AuxGroup, step: Step) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.adjust_aux(group, step),
            SimBackends::Registration(r) => r.adjust_aux(group, step),
        }
    }

    fn extra_command(&mut self, which: ExtraCommand, times: u8) -> Result<(), SimError> {
        match self {
            SimBackends::Serial(s) => s.extra_command(which, times),
            SimBackends::Registration(r) => r.extra_command(which, times),
        }
    }
}
