//! Display UART receive task
//!
//! Decodes touch reports from the display and forwards them to the panel.

use defmt::{debug, info, trace, warn};
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use minipanel_protocol::TouchDecoder;

use crate::channels::TOUCH_CHANNEL;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Display RX task - receives and decodes touch reports
#[embassy_executor::task]
pub async fn display_rx_task(mut rx: BufferedUartRx) {
    info!("Display RX task started");

    let mut decoder = TouchDecoder::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);

                for &byte in &buf[..n] {
                    if let Some(touch) = decoder.feed(byte) {
                        debug!("Touch: {:?}", touch);
                        if TOUCH_CHANNEL.try_send(touch).is_err() {
                            warn!("Touch channel full, dropping event");
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Display UART read error: {:?}", e);
            }
        }
    }
}
