//! Display output
//!
//! The panel addresses the touch display through a fire-and-forget
//! [`DisplaySink`]: attribute assignments by tag, or bare commands.

pub mod format;
pub mod hooks;
pub mod link;
pub mod scheduler;

pub use format::{format_value, FormatArg, FormatError};
pub use hooks::builtin_renderer;
pub use link::LinkIndicator;
pub use scheduler::{render_node, DisplayScheduler, DISPLAY_QUOTA};

use core::fmt::Write;
use heapless::String;

/// Surface switch settle time (ms)
pub const PAGE_SETTLE_MS: u32 = 25;

/// Display action sink
pub trait DisplaySink {
    /// Assign `value` to the attribute `tag` (e.g. `t3.txt`)
    fn send_value(&mut self, tag: &str, value: &str);

    /// Send a bare instruction (e.g. `page RADIOS`)
    fn send_command(&mut self, command: &str);

    /// Assign a number
    fn send_number(&mut self, tag: &str, value: i32) {
        let mut text = String::<12>::new();
        let _ = write!(text, "{}", value);
        self.send_value(tag, &text);
    }

    /// Switch to a display surface
    fn show_surface(&mut self, surface: &str) {
        let mut cmd = String::<32>::new();
        let _ = write!(cmd, "page {}", surface);
        self.send_command(&cmd);
    }
}
