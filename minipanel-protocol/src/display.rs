//! Touch display link
//!
//! Commands to the display are ASCII instructions terminated by three
//! `0xFF` bytes. The display reports touches in the same framing:
//! ```text
//! ┌──────┬──────┬─────────┬────────────────┐
//! │ 0x65 │ OP   │ OPERAND │ 0xFF 0xFF 0xFF │
//! └──────┴──────┴─────────┴────────────────┘
//! ```
//! Any other frame (status codes, acknowledgements) is skipped.

use core::fmt::Write;
use heapless::{String, Vec};

/// Byte repeated three times to terminate every frame
pub const TERMINATOR: u8 = 0xFF;

/// Leading byte of a touch report
pub const TOUCH_EVENT: u8 = 0x65;

/// Maximum encoded command length, terminator included
pub const MAX_COMMAND_LEN: usize = 64;

/// Longest inbound frame kept before resynchronising
const MAX_INBOUND_LEN: usize = 8;

/// First sidebar op id; slots follow consecutively
pub const SIDEBAR_OP_FIRST: u8 = 0x81;

/// Number of sidebar slots
pub const SIDEBAR_SLOTS: usize = 6;

/// Errors when encoding display commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Encoded command exceeds [`MAX_COMMAND_LEN`]
    TooLong,
}

/// A touch on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchEvent {
    /// Operation id of the touched object (or keypad key)
    pub op: u8,
    /// Secondary operand (e.g. long-touch index)
    pub operand: u8,
}

impl TouchEvent {
    pub const fn new(op: u8, operand: u8) -> Self {
        Self { op, operand }
    }

    /// Sidebar slot (0-based) when this touch hit the sidebar menu
    pub fn sidebar_slot(&self) -> Option<usize> {
        let slot = self.op.checked_sub(SIDEBAR_OP_FIRST)? as usize;
        (slot < SIDEBAR_SLOTS).then_some(slot)
    }
}

/// Frame decoder for display reports
#[derive(Debug, Clone, Default)]
pub struct TouchDecoder {
    buffer: Vec<u8, MAX_INBOUND_LEN>,
    terminators: u8,
}

impl TouchDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a single byte
    ///
    /// Returns a touch event when `byte` completes a touch frame.
    pub fn feed(&mut self, byte: u8) -> Option<TouchEvent> {
        if byte == TERMINATOR {
            self.terminators += 1;
            if self.terminators < 3 {
                return None;
            }
            let event = match self.buffer.as_slice() {
                [TOUCH_EVENT, op, operand] => Some(TouchEvent::new(*op, *operand)),
                _ => None,
            };
            self.buffer.clear();
            self.terminators = 0;
            return event;
        }

        // Stray 0xFF inside a frame belongs to the payload
        for _ in 0..self.terminators {
            if self.buffer.push(TERMINATOR).is_err() {
                break;
            }
        }
        self.terminators = 0;

        if self.buffer.push(byte).is_err() {
            self.buffer.clear();
        }
        None
    }
}

/// Encoded command buffer
pub type Command = Vec<u8, MAX_COMMAND_LEN>;

fn terminate(text: &str) -> Result<Command, CommandError> {
    let mut out = Command::new();
    out.extend_from_slice(text.as_bytes())
        .map_err(|_| CommandError::TooLong)?;
    out.extend_from_slice(&[TERMINATOR; 3])
        .map_err(|_| CommandError::TooLong)?;
    Ok(out)
}

/// Encode a bare instruction such as `page AUTOPILOT` or `dim=40`
pub fn encode_command(command: &str) -> Result<Command, CommandError> {
    terminate(command)
}

/// Encode an attribute assignment
///
/// Text attributes (`.txt`) are quoted, everything else is sent raw.
pub fn encode_assignment(tag: &str, value: &str) -> Result<Command, CommandError> {
    let mut text = String::<MAX_COMMAND_LEN>::new();
    if tag.ends_with(".txt") {
        write!(text, "{}=\"{}\"", tag, value).map_err(|_| CommandError::TooLong)?;
    } else {
        write!(text, "{}={}", tag, value).map_err(|_| CommandError::TooLong)?;
    }
    terminate(&text)
}
