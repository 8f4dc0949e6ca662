//! Simulator UART tasks
//!
//! Move raw bytes between UART1 and the link pipes. Packet framing
//! happens in the panel, which drains the receive pipe each pass.

use defmt::{info, trace, warn};
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};

use crate::channels::{SIM_RX, SIM_TX};

const BUF_SIZE: usize = 64;

/// Simulator RX task - fills the receive pipe
#[embassy_executor::task]
pub async fn sim_rx_task(mut rx: BufferedUartRx) {
    info!("Simulator RX task started");

    let mut buf = [0u8; BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("SIM RX: {} bytes", n);
                SIM_RX.write_all(&buf[..n]).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Simulator UART read error: {:?}", e);
            }
        }
    }
}

/// Simulator TX task - drains the transmit pipe
#[embassy_executor::task]
pub async fn sim_tx_task(mut tx: BufferedUartTx) {
    info!("Simulator TX task started");

    let mut buf = [0u8; BUF_SIZE];

    loop {
        let n = SIM_TX.read(&mut buf).await;
        if let Err(e) = tx.write_all(&buf[..n]).await {
            warn!("Failed to send simulator packet: {:?}", e);
        }
    }
}
