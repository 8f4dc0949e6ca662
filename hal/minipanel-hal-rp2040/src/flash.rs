//! Flash storage driver for RP2040
//!
//! Uses sequential-storage for wear-leveled key-value storage
//! in the last 64KB of flash.
//!
//! Implements the `FlashStorage` trait from `minipanel-hal`.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use minipanel_hal::flash::{FlashError, StorageKey};

/// 2MB flash on the Pico
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
pub const STORE_PARTITION_SIZE: usize = 64 * 1024;
pub const STORE_PARTITION_START: usize = FLASH_SIZE - STORE_PARTITION_SIZE;

/// Largest stored item (catalog text plus map overhead)
pub const MAX_ITEM_SIZE: usize = 8 * 1024 + 64;

/// Flash range for the store partition
pub const STORE_RANGE: core::ops::Range<u32> =
    (STORE_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// RP2040 flash storage
///
/// The item buffer lives in the driver so reads do not put 8KB on the
/// task stack; keep the driver itself in a `StaticCell`.
pub struct Rp2040FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
    buffer: [u8; MAX_ITEM_SIZE],
}

impl<'d> Rp2040FlashStorage<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
            buffer: [0u8; MAX_ITEM_SIZE],
        }
    }
}

impl<'d> minipanel_hal::FlashStorage for Rp2040FlashStorage<'d> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let result = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut self.buffer,
            &key,
        )
        .await;

        match result {
            Ok(Some(data)) => {
                let len = data.len();
                if buffer.len() < len {
                    return Err(FlashError::BufferTooSmall);
                }
                buffer[..len].copy_from_slice(data);
                Ok(len)
            }
            Ok(None) => Err(FlashError::NotFound),
            Err(_) => Err(FlashError::Storage),
        }
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        map::store_item(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut self.buffer,
            &key,
            &data,
        )
        .await
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => FlashError::Full,
            sequential_storage::Error::Corrupted { .. } => FlashError::Corrupted,
            _ => FlashError::Storage,
        })
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        matches!(
            map::fetch_item::<StorageKey, &[u8], _>(
                &mut self.flash,
                STORE_RANGE,
                &mut NoCache::new(),
                &mut self.buffer,
                &key,
            )
            .await,
            Ok(Some(_))
        )
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.flash
            .erase(STORE_PARTITION_START as u32, FLASH_SIZE as u32)
            .await
            .map_err(|_| FlashError::Flash)
    }
}

pub type FlashStorage<'d> = Rp2040FlashStorage<'d>;
