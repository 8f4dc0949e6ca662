//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;
use portable_atomic::AtomicBool;

use minipanel_hal::SETTINGS_IMAGE_SIZE;
use minipanel_protocol::{Command, InputEvent, TouchEvent};

/// Simulator link byte buffers
const SIM_PIPE_SIZE: usize = 512;

/// Display queue depth (commands and settle pauses)
pub const DISPLAY_QUEUE_SIZE: usize = 128;

const TOUCH_CHANNEL_SIZE: usize = 8;

const INPUT_CHANNEL_SIZE: usize = 16;

/// One item for the display transmitter
#[derive(Debug, Clone)]
pub enum DisplayOut {
    /// Encoded instruction, terminator included
    Command(Command),
    /// Hold the link for this many milliseconds
    Pause(u32),
}

/// Bytes received from the simulator, drained by the panel
pub static SIM_RX: Pipe<CriticalSectionRawMutex, SIM_PIPE_SIZE> = Pipe::new();

/// Bytes queued by the panel for the simulator
pub static SIM_TX: Pipe<CriticalSectionRawMutex, SIM_PIPE_SIZE> = Pipe::new();

/// Ordered display output
pub static DISPLAY_OUT: Channel<CriticalSectionRawMutex, DisplayOut, DISPLAY_QUEUE_SIZE> =
    Channel::new();

/// Touch reports from the display
pub static TOUCH_CHANNEL: Channel<CriticalSectionRawMutex, TouchEvent, TOUCH_CHANNEL_SIZE> =
    Channel::new();

/// Encoder rotations and presses
pub static INPUT_CHANNEL: Channel<CriticalSectionRawMutex, InputEvent, INPUT_CHANNEL_SIZE> =
    Channel::new();

/// 1 Hz housekeeping tick, carrying uptime in milliseconds
pub static TICK_SIGNAL: Signal<CriticalSectionRawMutex, u32> = Signal::new();

/// Settings image to persist
pub static SETTINGS_SAVE: Signal<CriticalSectionRawMutex, [u8; SETTINGS_IMAGE_SIZE]> =
    Signal::new();

/// Raised once a requested settings save reached flash
pub static SETTINGS_SAVED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Encoder delivery is held while set
pub static INPUT_SUSPENDED: AtomicBool = AtomicBool::new(false);
