//! Rotary encoder task
//!
//! One instance per encoder. Samples the A/B pins and the push button
//! every [`SAMPLE_INTERVAL_MS`]; rotations go through the quadrature
//! decoder, presses are timed against the long-press threshold.

use core::sync::atomic::Ordering;

use defmt::{debug, info, warn};
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Instant, Ticker, Timer};

use minipanel_protocol::{classify_press, InputEvent, QuadratureDecoder, LONG_PRESS_MS};

use crate::channels::{INPUT_CHANNEL, INPUT_SUSPENDED};

/// Pin sampling period
pub const SAMPLE_INTERVAL_MS: u64 = 2;

/// Pins of one encoder; all inputs are active low with pull-ups
pub struct EncoderPins {
    pub a: Input<'static>,
    pub b: Input<'static>,
    pub button: Input<'static>,
}

/// Encoder task - decodes one encoder into input events
#[embassy_executor::task(pool_size = 4)]
pub async fn encoder_task(index: u8, pins: EncoderPins) {
    info!("Encoder {} task started", index);

    let EncoderPins { a, b, button } = pins;
    let mut decoder = QuadratureDecoder::new(index, a.is_high(), b.is_high());
    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_INTERVAL_MS));

    // Press start, and whether the long press already fired
    let mut press: Option<(Instant, bool)> = None;

    loop {
        ticker.next().await;

        if let Some(event) = decoder.update(a.is_high(), b.is_high()) {
            deliver(event).await;
        }

        match (button.is_low(), press) {
            (true, None) => press = Some((Instant::now(), false)),
            (true, Some((start, false))) => {
                if start.elapsed().as_millis() >= LONG_PRESS_MS {
                    press = Some((start, true));
                    deliver(InputEvent::LongPress(index)).await;
                }
            }
            (false, Some((start, fired))) => {
                press = None;
                if !fired {
                    if let Some(event) = classify_press(index, start.elapsed().as_millis()) {
                        deliver(event).await;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Queue an event once the panel accepts input again
async fn deliver(event: InputEvent) {
    while INPUT_SUSPENDED.load(Ordering::Acquire) {
        Timer::after_millis(SAMPLE_INTERVAL_MS).await;
    }
    debug!("Input: {:?}", event);
    if INPUT_CHANNEL.try_send(event).is_err() {
        warn!("Input channel full, dropping event");
    }
}
