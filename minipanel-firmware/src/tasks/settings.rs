//! Settings persistence task
//!
//! Writes each committed settings image to flash. Flash writes stall the
//! core for a while, so they stay out of the panel loop.

use defmt::{info, warn};

use minipanel_hal_rp2040::flash::FlashStorage;

use crate::channels::{SETTINGS_SAVE, SETTINGS_SAVED};
use crate::persist::save_settings;

/// Settings task - persists images signalled by the panel
#[embassy_executor::task]
pub async fn settings_task(storage: &'static mut FlashStorage<'static>) {
    info!("Settings task started");

    loop {
        // A newer image replaces one still waiting
        let image = SETTINGS_SAVE.wait().await;
        if let Err(e) = save_settings(storage, &image).await {
            warn!("Failed to save settings: {:?}", e);
        }
        SETTINGS_SAVED.signal(());
    }
}
