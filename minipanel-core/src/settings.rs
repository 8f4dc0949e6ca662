//! Persisted user settings and the configuration system ops
//!
//! Settings live in a byte/float addressed store. Every value is range
//! checked on load and after each change; anything out of range is clamped
//! or replaced with its default, never reported.

use core::fmt::Write;
use heapless::String;
use minipanel_hal::{SettingsStore, StoreError};

use crate::display::DisplaySink;
use crate::node::Node;

/// Store address of the brightness byte
pub const ADDR_BRIGHTNESS: usize = 0;
/// Store address of the screen dim minutes byte
pub const ADDR_SCREEN_DIM: usize = 1;
/// Store address of the display units byte
pub const ADDR_UNITS: usize = 2;
/// Store address of the profile byte
pub const ADDR_PROFILE: usize = 3;
/// Store address of the situation GS/IAS flag
pub const ADDR_SITU_GS: usize = 8;
/// Store address of the touchdown flag
pub const ADDR_TOUCHDOWN: usize = 9;
/// Store address of the first standby frequency (f32)
pub const ADDR_STANDBY: usize = 16;

/// Standby frequency slots
pub const STANDBY_SLOTS: usize = 6;

pub const BRIGHTNESS_MIN: u8 = 4;
pub const BRIGHTNESS_MAX: u8 = 100;
pub const BRIGHTNESS_STEP: u8 = 4;

/// Dim timeouts above this mean "never dim"
pub const DIM_TIMEOUT_MAX: u8 = 60;
pub const SCREEN_DIM_MIN: u8 = 1;
pub const SCREEN_DIM_CEILING: u8 = DIM_TIMEOUT_MAX + 10;

/// Highest display units value (0 = inHg, 1 = hPa)
pub const UNITS_MAX: u8 = 1;

/// Valid standby band
pub const STANDBY_MIN: f32 = 108.0;
pub const STANDBY_LIMIT: f32 = 137.0;
pub const STANDBY_DEFAULT: f32 = 123.45;

/// Configuration opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigOp {
    BrightnessDec = 1,
    BrightnessInc = 2,
    BrightnessShow = 3,
    ScreenDimDec = 4,
    ScreenDimInc = 5,
    ScreenDimShow = 6,
    UnitsDec = 7,
    UnitsInc = 8,
    UnitsShow = 9,
    ProfileShow = 10,
}

impl ConfigOp {
    pub fn from_opcode(opcode: u16) -> Option<Self> {
        use ConfigOp::*;
        Some(match opcode {
            1 => BrightnessDec,
            2 => BrightnessInc,
            3 => BrightnessShow,
            4 => ScreenDimDec,
            5 => ScreenDimInc,
            6 => ScreenDimShow,
            7 => UnitsDec,
            8 => UnitsInc,
            9 => UnitsShow,
            10 => ProfileShow,
            _ => return None,
        })
    }
}

/// Settings errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// The backing store rejected an access
    Store(StoreError),
}

impl From<StoreError> for SettingsError {
    fn from(e: StoreError) -> Self {
        SettingsError::Store(e)
    }
}

/// In-memory settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Backlight percent
    pub brightness: u8,
    /// Minutes before dimming; above [`DIM_TIMEOUT_MAX`] never dims
    pub screen_dim: u8,
    pub units: u8,
    pub profile: u8,
    pub situ_gs: u8,
    pub touchdown: u8,
    pub standby: [f32; STANDBY_SLOTS],
    /// Number of profiles in the catalog, for enforcement
    pub profile_count: u8,
    /// Changed since the last commit
    pub save_required: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: BRIGHTNESS_MAX,
            screen_dim: 10,
            units: 0,
            profile: 0,
            situ_gs: 0,
            touchdown: 0,
            standby: [STANDBY_DEFAULT; STANDBY_SLOTS],
            profile_count: 1,
            save_required: false,
        }
    }
}

impl Settings {
    /// Load and enforce every field
    pub fn load(store: &dyn SettingsStore, profile_count: u8) -> Result<Self, SettingsError> {
        let mut settings = Self {
            brightness: store.read_u8(ADDR_BRIGHTNESS)?,
            screen_dim: store.read_u8(ADDR_SCREEN_DIM)?,
            units: store.read_u8(ADDR_UNITS)?,
            profile: store.read_u8(ADDR_PROFILE)?,
            situ_gs: store.read_u8(ADDR_SITU_GS)?,
            touchdown: store.read_u8(ADDR_TOUCHDOWN)?,
            standby: [0.0; STANDBY_SLOTS],
            profile_count: profile_count.max(1),
            save_required: false,
        };
        for (i, slot) in settings.standby.iter_mut().enumerate() {
            *slot = store.read_f32(ADDR_STANDBY + i * 4)?;
        }
        settings.enforce();
        Ok(settings)
    }

    /// Clamp every field into its valid range
    pub fn enforce(&mut self) {
        self.brightness = self.brightness.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX);
        self.screen_dim = self.screen_dim.clamp(SCREEN_DIM_MIN, SCREEN_DIM_CEILING);
        self.units = self.units.min(UNITS_MAX);
        self.profile = self.profile.min(self.profile_count.max(1) - 1);
        for f in &mut self.standby {
            *f = valid_standby(*f);
        }
    }

    /// True when the screen never dims
    pub fn never_dim(&self) -> bool {
        self.screen_dim > DIM_TIMEOUT_MAX
    }

    /// Write every field and commit the store
    pub fn commit(&mut self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        store.write_u8(ADDR_BRIGHTNESS, self.brightness)?;
        store.write_u8(ADDR_SCREEN_DIM, self.screen_dim)?;
        store.write_u8(ADDR_UNITS, self.units)?;
        store.write_u8(ADDR_PROFILE, self.profile)?;
        store.write_u8(ADDR_SITU_GS, self.situ_gs)?;
        store.write_u8(ADDR_TOUCHDOWN, self.touchdown)?;
        for (i, f) in self.standby.iter().enumerate() {
            store.write_f32(ADDR_STANDBY + i * 4, *f)?;
        }
        store.commit()?;
        self.save_required = false;
        Ok(())
    }

    /// Commit only when something changed
    pub fn commit_if_required(
        &mut self,
        store: &mut dyn SettingsStore,
    ) -> Result<bool, SettingsError> {
        if !self.save_required {
            return Ok(false);
        }
        self.commit(store)?;
        Ok(true)
    }

    /// Store a standby frequency
    pub fn set_standby(&mut self, slot: usize, freq: f32) {
        if let Some(s) = self.standby.get_mut(slot) {
            *s = valid_standby(freq);
            self.save_required = true;
        }
    }

    /// Execute a configuration opcode on behalf of `node`
    ///
    /// Returns false for unknown opcodes.
    pub fn handle_config(
        &mut self,
        opcode: u16,
        node: &mut Node,
        sink: &mut dyn DisplaySink,
    ) -> bool {
        let Some(op) = ConfigOp::from_opcode(opcode) else {
            return false;
        };
        let mut text = String::<16>::new();
        match op {
            ConfigOp::BrightnessDec | ConfigOp::BrightnessInc | ConfigOp::BrightnessShow => {
                match op {
                    ConfigOp::BrightnessDec => {
                        self.brightness = self.brightness.saturating_sub(BRIGHTNESS_STEP)
                    }
                    ConfigOp::BrightnessInc => {
                        self.brightness = self.brightness.saturating_add(BRIGHTNESS_STEP)
                    }
                    _ => {}
                }
                if op != ConfigOp::BrightnessShow {
                    self.enforce();
                    let mut cmd = String::<16>::new();
                    let _ = write!(cmd, "dim={}", self.brightness);
                    sink.send_command(&cmd);
                }
                let _ = write!(text, "{}%", self.brightness);
                sink.send_value(&node.tag, &text);
            }
            ConfigOp::ScreenDimDec | ConfigOp::ScreenDimInc | ConfigOp::ScreenDimShow => {
                match op {
                    ConfigOp::ScreenDimDec => {
                        let step = if self.screen_dim > 20 { 10 } else { 1 };
                        self.screen_dim = self.screen_dim.saturating_sub(step);
                    }
                    ConfigOp::ScreenDimInc => {
                        let step = if self.screen_dim >= 20 { 10 } else { 1 };
                        self.screen_dim = self.screen_dim.saturating_add(step);
                    }
                    _ => {}
                }
                self.enforce();
                if self.never_dim() {
                    let _ = text.push_str("never");
                } else {
                    let _ = write!(text, "{} mins", self.screen_dim);
                }
                sink.send_value(&node.tag, &text);
            }
            ConfigOp::UnitsDec | ConfigOp::UnitsInc | ConfigOp::UnitsShow => {
                match op {
                    ConfigOp::UnitsDec => self.units = self.units.saturating_sub(1),
                    ConfigOp::UnitsInc => self.units = (self.units + 1).min(UNITS_MAX),
                    _ => {}
                }
                let _ = text.push_str(if self.units == 0 { "inHg" } else { "hPa" });
                sink.send_value(&node.tag, &text);
            }
            ConfigOp::ProfileShow => node.set_int(self.profile as i32),
        }
        self.save_required = true;
        true
    }
}

fn valid_standby(f: f32) -> f32 {
    if f.is_nan() || f < STANDBY_MIN || f >= STANDBY_LIMIT {
        STANDBY_DEFAULT
    } else {
        f
    }
}
