//! Panel collaborators backed by the task channels
//!
//! The panel logic runs synchronously inside the panel task. These adapters
//! hand its output to the UART tasks without blocking and read whatever
//! simulator bytes have already arrived.

use core::sync::atomic::Ordering;

use defmt::{debug, warn};
use embedded_hal::delay::DelayNs;

use minipanel_core::display::DisplaySink;
use minipanel_core::paging::InputGate;
use minipanel_core::sim::registration::DatarefHost;
use minipanel_core::sim::{CommandHandle, DatarefHandle, DatarefSpec};
use minipanel_core::value::Value;
use minipanel_hal::{UartRx, UartTx};
use minipanel_protocol::{encode_assignment, encode_command, Command};

use crate::channels::{DisplayOut, DISPLAY_OUT, INPUT_SUSPENDED, SIM_RX, SIM_TX};

/// Simulator link errors seen by the serial backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Transmit pipe has no room for the packet
    Full,
}

/// Serial simulator port over the link pipes
pub struct PipeUart;

impl UartTx for PipeUart {
    type Error = LinkError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        // Packets are small; refuse rather than split one across a full pipe
        if SIM_TX.free_capacity() < data.len() {
            return Err(LinkError::Full);
        }
        let mut sent = 0;
        while sent < data.len() {
            match SIM_TX.try_write(&data[sent..]) {
                Ok(n) => sent += n,
                Err(_) => return Err(LinkError::Full),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl UartRx for PipeUart {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        SIM_RX.try_read(buf).unwrap_or(0)
    }
}

/// Touch display sink feeding the display transmitter
pub struct NextionSink {
    dropped: u32,
}

impl NextionSink {
    pub const fn new() -> Self {
        Self { dropped: 0 }
    }

    fn push(&mut self, out: DisplayOut) {
        if DISPLAY_OUT.try_send(out).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("Display queue full, dropping instruction ({} total)", self.dropped);
        }
    }

    fn push_command(&mut self, cmd: Result<Command, minipanel_protocol::CommandError>) {
        match cmd {
            Ok(cmd) => self.push(DisplayOut::Command(cmd)),
            Err(e) => warn!("Display instruction too long: {:?}", e),
        }
    }
}

impl DisplaySink for NextionSink {
    fn send_value(&mut self, tag: &str, value: &str) {
        self.push_command(encode_assignment(tag, value));
    }

    fn send_command(&mut self, command: &str) {
        self.push_command(encode_command(command));
    }
}

/// Settle delay that travels with the display output
///
/// A pause is queued behind the instructions already sent, so the display
/// link waits after them instead of stalling the panel loop.
pub struct SettleDelay;

impl DelayNs for SettleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let ms = ns.div_ceil(1_000_000);
        self.delay_ms(ms);
    }

    fn delay_ms(&mut self, ms: u32) {
        if ms == 0 {
            return;
        }
        if DISPLAY_OUT.try_send(DisplayOut::Pause(ms)).is_err() {
            warn!("Display queue full, dropping {} ms pause", ms);
        }
    }
}

/// Encoder gate shared with the encoder tasks
pub struct AtomicGate;

impl InputGate for AtomicGate {
    fn suspend(&self) {
        INPUT_SUSPENDED.store(true, Ordering::Release);
    }

    fn resume(&self) {
        INPUT_SUSPENDED.store(false, Ordering::Release);
    }
}

/// Registration host for boards without a plugin bridge
///
/// Accepts every registration with sequential handles and never reports
/// activity, so registration profiles boot and render offline.
pub struct HostStub {
    next_dataref: u16,
    next_command: u16,
}

impl HostStub {
    pub const fn new() -> Self {
        Self {
            next_dataref: 0,
            next_command: 0,
        }
    }
}

impl DatarefHost for HostStub {
    fn register_dataref(&mut self, spec: &DatarefSpec<'_>) -> Option<DatarefHandle> {
        debug!("Register dataref {}", spec.name);
        let handle = DatarefHandle(self.next_dataref);
        self.next_dataref = self.next_dataref.checked_add(1)?;
        Some(handle)
    }

    fn register_command(&mut self, name: &str) -> Option<CommandHandle> {
        debug!("Register command {}", name);
        let handle = CommandHandle(self.next_command);
        self.next_command = self.next_command.checked_add(1)?;
        Some(handle)
    }

    fn command_trigger(&mut self, cmd: CommandHandle, times: u8) {
        debug!("Command {} x{}", cmd.0, times);
    }

    fn command_start(&mut self, cmd: CommandHandle) {
        debug!("Command {} start", cmd.0);
    }

    fn command_end(&mut self, cmd: CommandHandle) {
        debug!("Command {} end", cmd.0);
    }

    fn write_dataref(&mut self, handle: DatarefHandle, _value: &Value) {
        debug!("Write dataref {}", handle.0);
    }

    fn poll(&mut self, _deliver: &mut dyn FnMut(DatarefHandle, Value)) -> usize {
        0
    }
}
