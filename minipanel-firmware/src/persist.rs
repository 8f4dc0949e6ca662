//! Flash persistence for the settings image and the catalog override
//!
//! The settings image is stored as a versioned postcard record. A catalog
//! uploaded to flash replaces the embedded `panel.toml` at boot.

use defmt::{debug, info, warn};
use serde::{Deserialize, Serialize};

use minipanel_hal::{FlashError, SettingsImage, SETTINGS_IMAGE_SIZE};
use minipanel_hal_rp2040::flash::{FlashStorage, StorageKey};
use minipanel_hal_rp2040::FlashStorageTrait;

/// Settings record layout version
const SETTINGS_VERSION: u8 = 1;

/// Serialized record: version, length prefix and image
const MAX_RECORD_SIZE: usize = SETTINGS_IMAGE_SIZE + 8;

/// Largest catalog override accepted from flash
pub const MAX_CATALOG_SIZE: usize = 8 * 1024;

/// Persistence errors
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// Flash operation failed
    Flash(FlashError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// Unknown record version
    InvalidFormat,
    /// Catalog override is not UTF-8
    NotText,
}

impl From<FlashError> for PersistError {
    fn from(e: FlashError) -> Self {
        PersistError::Flash(e)
    }
}

#[derive(Serialize, Deserialize)]
struct SettingsRecord<'a> {
    version: u8,
    #[serde(borrow)]
    image: &'a [u8],
}

/// Load the settings image from flash
///
/// Returns a blank image when nothing is stored or the record is invalid;
/// the panel then falls back to its defaults.
pub async fn load_settings(storage: &mut FlashStorage<'_>) -> SettingsImage {
    match load_settings_inner(storage).await {
        Ok(image) => {
            info!("Loaded settings from flash");
            image
        }
        Err(PersistError::Flash(FlashError::NotFound)) => {
            debug!("No settings in flash, using defaults");
            SettingsImage::new()
        }
        Err(e) => {
            warn!("Failed to load settings: {:?}, using defaults", e);
            SettingsImage::new()
        }
    }
}

async fn load_settings_inner(storage: &mut FlashStorage<'_>) -> Result<SettingsImage, PersistError> {
    let mut buffer = [0u8; MAX_RECORD_SIZE];
    let len = storage.read(StorageKey::Settings, &mut buffer).await?;

    let record: SettingsRecord<'_> =
        postcard::from_bytes(&buffer[..len]).map_err(|_| PersistError::Deserialize)?;
    if record.version != SETTINGS_VERSION {
        return Err(PersistError::InvalidFormat);
    }
    Ok(SettingsImage::from_bytes(record.image))
}

/// Save a settings image to flash
pub async fn save_settings(
    storage: &mut FlashStorage<'_>,
    image: &[u8; SETTINGS_IMAGE_SIZE],
) -> Result<(), PersistError> {
    let record = SettingsRecord {
        version: SETTINGS_VERSION,
        image: image.as_slice(),
    };
    let mut buffer = [0u8; MAX_RECORD_SIZE];
    let bytes = postcard::to_slice(&record, &mut buffer).map_err(|_| PersistError::Serialize)?;

    debug!("Saving {} bytes of settings to flash", bytes.len());
    storage.write(StorageKey::Settings, bytes).await?;
    info!("Saved settings to flash");
    Ok(())
}

/// Load a catalog override into `buffer`
///
/// Returns `None` when no override is stored or it cannot be used.
pub async fn load_catalog<'b>(
    storage: &mut FlashStorage<'_>,
    buffer: &'b mut [u8; MAX_CATALOG_SIZE],
) -> Option<&'b str> {
    match load_catalog_inner(storage, buffer).await {
        Ok(text) => {
            info!("Loaded catalog override from flash ({} bytes)", text.len());
            Some(text)
        }
        Err(PersistError::Flash(FlashError::NotFound)) => {
            debug!("No catalog override in flash");
            None
        }
        Err(e) => {
            warn!("Failed to load catalog override: {:?}", e);
            None
        }
    }
}

async fn load_catalog_inner<'b>(
    storage: &mut FlashStorage<'_>,
    buffer: &'b mut [u8; MAX_CATALOG_SIZE],
) -> Result<&'b str, PersistError> {
    let len = storage.read(StorageKey::CatalogToml, buffer).await?;
    core::str::from_utf8(&buffer[..len]).map_err(|_| PersistError::NotText)
}
