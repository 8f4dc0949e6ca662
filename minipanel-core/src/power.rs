//! Display dim/wake state machine

use core::fmt::Write;
use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::display::DisplaySink;
use crate::settings::Settings;

/// Settle time after a backlight change
pub const BACKLIGHT_SETTLE_MS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    #[default]
    Lit,
    Dimmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerInput {
    /// Periodic countdown
    Continue,
    Dim,
    Wake,
}

/// What a [`PowerInput`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerOutcome {
    Unchanged,
    Dimmed,
    /// Screen was dimmed and is lit again
    Woke,
    /// Already lit; idle timers restart
    Refreshed,
}

/// Backlight scheduler
#[derive(Debug, Clone, Default)]
pub struct PowerScheduler {
    state: PowerState,
    /// Time of the last activity (ms)
    last_activity: u32,
}

impl PowerScheduler {
    pub const fn new() -> Self {
        Self {
            state: PowerState::Lit,
            last_activity: 0,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_dimmed(&self) -> bool {
        self.state == PowerState::Dimmed
    }

    pub fn handle(
        &mut self,
        input: PowerInput,
        now_ms: u32,
        settings: &Settings,
        sink: &mut dyn DisplaySink,
        delay: &mut dyn DelayNs,
    ) -> PowerOutcome {
        match (self.state, input) {
            (PowerState::Lit, PowerInput::Continue) => {
                if settings.never_dim() {
                    return PowerOutcome::Unchanged;
                }
                let timeout = settings.screen_dim as u32 * 60_000;
                if now_ms.wrapping_sub(self.last_activity) > timeout {
                    self.dim(sink, delay);
                    PowerOutcome::Dimmed
                } else {
                    PowerOutcome::Unchanged
                }
            }
            (PowerState::Dimmed, PowerInput::Continue) => PowerOutcome::Unchanged,
            (PowerState::Lit, PowerInput::Dim) => {
                self.dim(sink, delay);
                PowerOutcome::Dimmed
            }
            (PowerState::Dimmed, PowerInput::Dim) => PowerOutcome::Unchanged,
            (PowerState::Dimmed, PowerInput::Wake) => {
                let mut cmd = String::<16>::new();
                let _ = write!(cmd, "dim={}", settings.brightness);
                sink.send_command(&cmd);
                delay.delay_ms(BACKLIGHT_SETTLE_MS);
                self.state = PowerState::Lit;
                self.last_activity = now_ms;
                PowerOutcome::Woke
            }
            (PowerState::Lit, PowerInput::Wake) => {
                self.last_activity = now_ms;
                PowerOutcome::Refreshed
            }
        }
    }

    fn dim(&mut self, sink: &mut dyn DisplaySink, delay: &mut dyn DelayNs) {
        sink.send_command("dim=0");
        delay.delay_ms(BACKLIGHT_SETTLE_MS);
        self.state = PowerState::Dimmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CountingDelay, RecordingSink};

    fn settings(minutes: u8) -> Settings {
        Settings {
            brightness: 40,
            screen_dim: minutes,
            ..Settings::default()
        }
    }

    #[test]
    fn test_countdown_dims_after_timeout() {
        let s = settings(1);
        let mut power = PowerScheduler::new();
        let mut sink = RecordingSink::default();
        let mut delay = CountingDelay::default();

        let out = power.handle(PowerInput::Continue, 60_000, &s, &mut sink, &mut delay);
        assert_eq!(out, PowerOutcome::Unchanged);
        let out = power.handle(PowerInput::Continue, 60_001, &s, &mut sink, &mut delay);
        assert_eq!(out, PowerOutcome::Dimmed);
        assert!(power.is_dimmed());
        assert_eq!(sink.commands, ["dim=0"]);
        assert_eq!(delay.total_ms(), 500);
    }

    #[test]
    fn test_never_dim() {
        let s = settings(70);
        let mut power = PowerScheduler::new();
        let mut sink = RecordingSink::default();
        let mut delay = CountingDelay::default();
        let out = power.handle(PowerInput::Continue, u32::MAX / 2, &s, &mut sink, &mut delay);
        assert_eq!(out, PowerOutcome::Unchanged);
        assert!(sink.commands.is_empty());
    }

    #[test]
    fn test_wake_restores_brightness() {
        let s = settings(5);
        let mut power = PowerScheduler::new();
        let mut sink = RecordingSink::default();
        let mut delay = CountingDelay::default();

        assert_eq!(
            power.handle(PowerInput::Dim, 10, &s, &mut sink, &mut delay),
            PowerOutcome::Dimmed
        );
        assert_eq!(
            power.handle(PowerInput::Dim, 20, &s, &mut sink, &mut delay),
            PowerOutcome::Unchanged
        );
        assert_eq!(
            power.handle(PowerInput::Wake, 30, &s, &mut sink, &mut delay),
            PowerOutcome::Woke
        );
        assert_eq!(sink.commands, ["dim=0", "dim=40"]);
        assert_eq!(delay.total_ms(), 1000);
        assert_eq!(
            power.handle(PowerInput::Wake, 40, &s, &mut sink, &mut delay),
            PowerOutcome::Refreshed
        );
    }

    #[test]
    fn test_activity_restarts_countdown() {
        let s = settings(1);
        let mut power = PowerScheduler::new();
        let mut sink = RecordingSink::default();
        let mut delay = CountingDelay::default();
        power.handle(PowerInput::Wake, 50_000, &s, &mut sink, &mut delay);
        let out = power.handle(PowerInput::Continue, 100_000, &s, &mut sink, &mut delay);
        assert_eq!(out, PowerOutcome::Unchanged);
        let out = power.handle(PowerInput::Continue, 110_001, &s, &mut sink, &mut delay);
        assert_eq!(out, PowerOutcome::Dimmed);
    }
}
