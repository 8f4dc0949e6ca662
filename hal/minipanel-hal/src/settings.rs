//! Byte/float addressed settings store
//!
//! The panel keeps its user settings in a small addressed image, EEPROM
//! style. Reads never fail on content: range validation is the caller's
//! job. Addresses past the end of the image are rejected.

/// Size of the addressed settings image in bytes
pub const SETTINGS_IMAGE_SIZE: usize = 64;

/// Errors from settings store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Address (plus width) lies outside the image
    OutOfRange,
    /// Backing storage rejected the commit
    Commit,
}

/// Byte/float addressed store
pub trait SettingsStore {
    /// Read one byte
    fn read_u8(&self, addr: usize) -> Result<u8, StoreError>;

    /// Write one byte (not durable until [`SettingsStore::commit`])
    fn write_u8(&mut self, addr: usize, value: u8) -> Result<(), StoreError>;

    /// Read a little-endian f32
    fn read_f32(&self, addr: usize) -> Result<f32, StoreError>;

    /// Write a little-endian f32 (not durable until [`SettingsStore::commit`])
    fn write_f32(&mut self, addr: usize, value: f32) -> Result<(), StoreError>;

    /// Make all writes since the last commit durable
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// RAM image of the settings store
///
/// Commits only raise a flag; whoever owns the flash drains it with
/// [`SettingsImage::take_pending`] and persists [`SettingsImage::as_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsImage {
    bytes: [u8; SETTINGS_IMAGE_SIZE],
    pending: bool,
}

impl Default for SettingsImage {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsImage {
    /// Blank image, erased-flash style (all 0xFF)
    pub const fn new() -> Self {
        Self {
            bytes: [0xFF; SETTINGS_IMAGE_SIZE],
            pending: false,
        }
    }

    /// Image restored from persisted bytes
    ///
    /// Short input leaves the remainder erased; long input is cut.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut image = Self::new();
        let n = data.len().min(SETTINGS_IMAGE_SIZE);
        image.bytes[..n].copy_from_slice(&data[..n]);
        image
    }

    /// Raw image contents
    pub fn as_bytes(&self) -> &[u8; SETTINGS_IMAGE_SIZE] {
        &self.bytes
    }

    /// Returns true once per commit
    pub fn take_pending(&mut self) -> bool {
        core::mem::replace(&mut self.pending, false)
    }

    fn span(addr: usize, width: usize) -> Result<core::ops::Range<usize>, StoreError> {
        let end = addr.checked_add(width).ok_or(StoreError::OutOfRange)?;
        if end > SETTINGS_IMAGE_SIZE {
            return Err(StoreError::OutOfRange);
        }
        Ok(addr..end)
    }
}

impl SettingsStore for SettingsImage {
    fn read_u8(&self, addr: usize) -> Result<u8, StoreError> {
        let span = Self::span(addr, 1)?;
        Ok(self.bytes[span.start])
    }

    fn write_u8(&mut self, addr: usize, value: u8) -> Result<(), StoreError> {
        let span = Self::span(addr, 1)?;
        self.bytes[span.start] = value;
        Ok(())
    }

    fn read_f32(&self, addr: usize) -> Result<f32, StoreError> {
        let span = Self::span(addr, 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[span]);
        Ok(f32::from_le_bytes(raw))
    }

    fn write_f32(&mut self, addr: usize, value: f32) -> Result<(), StoreError> {
        let span = Self::span(addr, 4)?;
        self.bytes[span].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.pending = true;
        Ok(())
    }
}
