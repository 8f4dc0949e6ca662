//! Explicit device state
//!
//! Everything the panel tracks between events lives in one
//! [`DeviceState`] owned by the controller.

pub mod events;
pub mod machine;

pub use events::ScreenEvent;
pub use machine::Screen;

use crate::page::PageId;

/// Sidebar page pinned by a second touch, as a sidebar slot
pub type RubberBand = Option<u8>;

/// Runtime state of the panel
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    pub screen: Screen,
    pub rubber_band: RubberBand,
    /// Rubber band parked while a modal runs
    parked_band: RubberBand,
    /// Encoders carry the page's default focus group
    pub at_primary: bool,
    /// A different profile was selected and awaits a restart
    pub profile_changed: bool,
    /// Last page activity (ms)
    pub page_timer: u32,
    /// Last encoder activity (ms)
    pub enc_timer: u32,
    /// Unit served by key arrays
    pub unit: u8,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    pub const fn new() -> Self {
        Self {
            screen: Screen::Boot,
            rubber_band: None,
            parked_band: None,
            at_primary: true,
            profile_changed: false,
            page_timer: 0,
            enc_timer: 0,
            unit: 0,
        }
    }

    pub fn current_page(&self) -> Option<PageId> {
        self.screen.current_page()
    }

    /// Apply a screen event
    pub fn apply(&mut self, event: ScreenEvent) {
        self.screen = self.screen.transition(event);
    }

    /// Restart the page and focus idle timers
    pub fn touch(&mut self, now_ms: u32) {
        self.page_timer = now_ms;
        self.enc_timer = now_ms;
    }

    /// Park the rubber band while a modal runs
    pub fn park_rubber_band(&mut self) {
        self.parked_band = self.rubber_band.take();
    }

    pub fn restore_rubber_band(&mut self) {
        self.rubber_band = self.parked_band.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rubber_band_parking() {
        let mut state = DeviceState::new();
        state.rubber_band = Some(2);
        state.park_rubber_band();
        assert_eq!(state.rubber_band, None);
        state.restore_rubber_band();
        assert_eq!(state.rubber_band, Some(2));
        state.restore_rubber_band();
        assert_eq!(state.rubber_band, None);
    }

    #[test]
    fn test_touch_resets_timers() {
        let mut state = DeviceState::new();
        state.touch(1234);
        assert_eq!((state.page_timer, state.enc_timer), (1234, 1234));
    }
}
