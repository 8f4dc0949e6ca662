//! Simulator link indicator
//!
//! A short line at the bottom-left of every surface. It is drawn lit when
//! the profile's clock node moved since the last check and dark otherwise,
//! so a stalled or disconnected simulator shows at a glance.

use core::fmt::Write;
use heapless::String;

use super::DisplaySink;
use crate::node::Node;

/// Fill instruction prefix; the colour is appended
pub const LINK_FILL: &str = "fill 11,271,42,1,";

/// Line colour while the clock advances
pub const LINK_UP_COLOR: u16 = 1900;

/// Line colour while the clock stands still
pub const LINK_DOWN_COLOR: u16 = 0;

/// Tracks the clock node between checks
#[derive(Debug, Default)]
pub struct LinkIndicator {
    last: f32,
}

impl LinkIndicator {
    pub const fn new() -> Self {
        Self { last: 0.0 }
    }

    /// Redraw the indicator; true when the clock advanced
    pub fn refresh(&mut self, clock: &Node, sink: &mut dyn DisplaySink) -> bool {
        let now = clock.float_value();
        let alive = now != self.last;
        self.last = now;

        let color = if alive { LINK_UP_COLOR } else { LINK_DOWN_COLOR };
        let mut cmd = String::<24>::new();
        let _ = write!(cmd, "{}{}", LINK_FILL, color);
        sink.send_command(&cmd);
        alive
    }
}
