//! Display UART transmit task
//!
//! Drains the display queue in order. Settle pauses hold the link so the
//! display finishes a surface switch before the next instruction.

use defmt::{info, trace, warn};
use embassy_rp::uart::BufferedUartTx;
use embassy_time::Timer;
use embedded_io_async::Write;

use crate::channels::{DisplayOut, DISPLAY_OUT};

/// Display TX task - sends instructions to the touch display
#[embassy_executor::task]
pub async fn display_tx_task(mut tx: BufferedUartTx) {
    info!("Display TX task started");

    loop {
        match DISPLAY_OUT.receive().await {
            DisplayOut::Command(cmd) => {
                if let Err(e) = tx.write_all(&cmd).await {
                    warn!("Failed to send display instruction: {:?}", e);
                }
            }
            DisplayOut::Pause(ms) => {
                if let Err(e) = tx.flush().await {
                    warn!("Display UART flush failed: {:?}", e);
                }
                trace!("Display settle {} ms", ms);
                Timer::after_millis(ms as u64).await;
            }
        }
    }
}
