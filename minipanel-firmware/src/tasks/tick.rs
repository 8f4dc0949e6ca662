//! Tick task for time-based updates
//!
//! Provides the 1 Hz housekeeping tick to the panel for:
//! - Backlight dim countdown
//! - Rubber band and focus snapback timers

use defmt::info;
use embassy_time::{Duration, Instant, Ticker};

use crate::channels::TICK_SIGNAL;

/// Tick interval in milliseconds
pub const TICK_INTERVAL_MS: u32 = 1_000;

/// Tick task - sends periodic tick signals with timestamp
#[embassy_executor::task]
pub async fn tick_task() {
    info!("Tick task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS as u64));

    loop {
        ticker.next().await;
        TICK_SIGNAL.signal(Instant::now().as_millis() as u32);
    }
}
