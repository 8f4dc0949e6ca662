//! Panel task - main loop
//!
//! Boots the panel, then waits on touches, encoder events and the tick,
//! polling the simulator link and the display scheduler between them.
//! Committed settings are handed to the settings task after every call.

use defmt::{error, info, warn};
use embassy_futures::select::{select4, Either4};
use embassy_time::{with_timeout, Duration, Instant, Timer};

use minipanel_core::panel::{Panel, PanelError, PanelEvent, PanelIo};
use minipanel_core::sim::SimBackends;
use minipanel_core::display::DISPLAY_QUOTA;
use minipanel_hal::SettingsImage;

use crate::channels::{
    DISPLAY_OUT, INPUT_CHANNEL, SETTINGS_SAVE, SETTINGS_SAVED, TICK_SIGNAL, TOUCH_CHANNEL,
};
use crate::link::{AtomicGate, HostStub, NextionSink, PipeUart, SettleDelay};

/// Idle poll period when no event arrives
pub const POLL_INTERVAL_MS: u64 = 10;

/// Longest wait for the final settings save before a reset
pub const RESTART_SAVE_TIMEOUT_MS: u64 = 2_000;

/// Simulator link selected by the active profile
pub type PanelSim = SimBackends<PipeUart, HostStub>;

/// Everything the panel task owns
pub struct PanelParts {
    pub panel: &'static mut Panel,
    pub image: &'static mut SettingsImage,
    pub sim: PanelSim,
    pub catalog_text: &'static str,
}

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Room left for one scheduler step plus a page switch
fn display_has_room() -> bool {
    DISPLAY_OUT.free_capacity() > DISPLAY_QUOTA * 2
}

/// Panel task - owns the panel and every collaborator it borrows
#[embassy_executor::task]
pub async fn panel_task(parts: PanelParts) {
    info!("Panel task started");

    let PanelParts {
        panel,
        image,
        mut sim,
        catalog_text,
    } = parts;
    let mut sink = NextionSink::new();
    let mut delay = SettleDelay;
    let gate = AtomicGate;

    macro_rules! io {
        () => {
            PanelIo {
                sim: &mut sim,
                sink: &mut sink,
                delay: &mut delay,
                gate: &gate,
                store: &mut *image,
            }
        };
    }

    match panel.boot(catalog_text, &mut io!(), now_ms()) {
        Ok(None) => info!("Catalog loaded"),
        Ok(Some(e)) => warn!("Catalog error at line {}: {:?}", e.line, e.kind),
        Err(e) => error!("Boot failed: {:?}", e),
    }
    persist_if_committed(image);

    loop {
        let event = match select4(
            TOUCH_CHANNEL.receive(),
            INPUT_CHANNEL.receive(),
            TICK_SIGNAL.wait(),
            Timer::after_millis(POLL_INTERVAL_MS),
        )
        .await
        {
            Either4::First(touch) => panel.on_touch(touch, &mut io!(), now_ms()),
            Either4::Second(input) => panel.on_encoder(input, &mut io!(), now_ms()),
            Either4::Third(now) => panel.tick(&mut io!(), now).map(|()| PanelEvent::Continue),
            Either4::Fourth(()) => Ok(PanelEvent::Continue),
        };

        if display_has_room() {
            panel.poll(&mut io!());
        }

        let saving = persist_if_committed(image);

        match event {
            Ok(PanelEvent::Continue) => {}
            Ok(PanelEvent::Restart) => restart(saving).await,
            Err(PanelError::Settings(e)) => warn!("Settings error: {:?}", e),
            Err(PanelError::Sim(e)) => warn!("Simulator link error: {:?}", e),
        }
    }
}

/// Hand a committed image to the settings task
fn persist_if_committed(image: &mut SettingsImage) -> bool {
    if !image.take_pending() {
        return false;
    }
    SETTINGS_SAVED.reset();
    SETTINGS_SAVE.signal(*image.as_bytes());
    true
}

/// Wait for the last save, then reset the device
async fn restart(saving: bool) -> ! {
    info!("Restart requested");
    if saving {
        let wait = async {
            loop {
                SETTINGS_SAVED.wait().await;
                if !SETTINGS_SAVE.signaled() {
                    break;
                }
            }
        };
        if with_timeout(Duration::from_millis(RESTART_SAVE_TIMEOUT_MS), wait)
            .await
            .is_err()
        {
            warn!("Settings save timed out, restarting anyway");
        }
    }
    cortex_m::peripheral::SCB::sys_reset()
}
