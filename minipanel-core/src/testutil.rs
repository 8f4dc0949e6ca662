//! Test doubles shared by the unit tests

use std::cell::Cell;
use std::collections::VecDeque;
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use minipanel_hal::{UartRx, UartTx};

use crate::display::DisplaySink;
use crate::paging::InputGate;
use crate::sim::{CommandHandle, DatarefHandle, DatarefHost, DatarefSpec};
use crate::value::Value;

/// UART with a canned receive script and a captured transmit log
#[derive(Debug, Default)]
pub struct ScriptedUart {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    /// Number of upcoming writes to refuse
    pub fail_writes: usize,
}

impl ScriptedUart {
    pub fn with_rx(bytes: &[u8]) -> Self {
        Self {
            rx: bytes.iter().copied().collect(),
            tx: Vec::new(),
            fail_writes: 0,
        }
    }

    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn take_tx(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.tx).into_owned();
        self.tx.clear();
        text
    }
}

impl UartTx for ScriptedUart {
    type Error = ();

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), ()> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(());
        }
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

impl UartRx for ScriptedUart {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

/// Display sink that records everything sent to it
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub values: Vec<(String, String)>,
    pub commands: Vec<String>,
}

impl RecordingSink {
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.values
            .iter()
            .map(|(t, v)| (t.as_str(), v.as_str()))
            .collect()
    }

    /// Last value sent to `tag`
    pub fn last(&self, tag: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.commands.clear();
    }
}

impl DisplaySink for RecordingSink {
    fn send_value(&mut self, tag: &str, value: &str) {
        self.values.push((tag.to_string(), value.to_string()));
    }

    fn send_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}

/// Calls made on a [`FakeHost`]
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Trigger(CommandHandle, u8),
    Start(CommandHandle),
    End(CommandHandle),
    Write(DatarefHandle, Value),
}

/// Dataref host handing out sequential handles
#[derive(Debug, Default)]
pub struct FakeHost {
    refuse: bool,
    datarefs: Vec<String>,
    commands: Vec<String>,
    /// Updates delivered on the next poll
    pub pending: Vec<(DatarefHandle, Value)>,
    pub calls: Vec<HostCall>,
}

impl FakeHost {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn dataref_names(&self) -> &[String] {
        &self.datarefs
    }

    pub fn command_names(&self) -> &[String] {
        &self.commands
    }
}

impl DatarefHost for FakeHost {
    fn register_dataref(&mut self, spec: &DatarefSpec<'_>) -> Option<DatarefHandle> {
        if self.refuse {
            return None;
        }
        self.datarefs.push(spec.name.to_string());
        Some(DatarefHandle(self.datarefs.len() as u16 - 1))
    }

    fn register_command(&mut self, name: &str) -> Option<CommandHandle> {
        if self.refuse {
            return None;
        }
        self.commands.push(name.to_string());
        Some(CommandHandle(self.commands.len() as u16 - 1))
    }

    fn command_trigger(&mut self, cmd: CommandHandle, times: u8) {
        self.calls.push(HostCall::Trigger(cmd, times));
    }

    fn command_start(&mut self, cmd: CommandHandle) {
        self.calls.push(HostCall::Start(cmd));
    }

    fn command_end(&mut self, cmd: CommandHandle) {
        self.calls.push(HostCall::End(cmd));
    }

    fn write_dataref(&mut self, handle: DatarefHandle, value: &Value) {
        self.calls.push(HostCall::Write(handle, value.clone()));
    }

    fn poll(&mut self, deliver: &mut dyn FnMut(DatarefHandle, Value)) -> usize {
        let n = self.pending.len();
        for (handle, value) in self.pending.drain(..) {
            deliver(handle, value);
        }
        n
    }
}

/// Delay that only adds up the requested time
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub total_ns: u64,
}

impl CountingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

/// Input gate counting suspend/resume pairs
#[derive(Debug, Default)]
pub struct FlagGate {
    pub suspends: Cell<u32>,
    pub resumes: Cell<u32>,
}

impl FlagGate {
    pub fn is_suspended(&self) -> bool {
        self.suspends.get() > self.resumes.get()
    }
}

impl InputGate for FlagGate {
    fn suspend(&self) {
        self.suspends.set(self.suspends.get() + 1);
    }

    fn resume(&self) {
        self.resumes.set(self.resumes.get() + 1);
    }
}
