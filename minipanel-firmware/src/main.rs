//! Minipanel - Flight Simulator Control Panel Firmware
//!
//! Main firmware binary for RP2040-based panels: a touch display on
//! UART0, the simulator link on UART1 and four rotary encoders.
//! Panel behaviour comes from a TOML catalog, embedded at build time
//! and optionally overridden from flash.

#![no_std]
#![no_main]

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::peripherals::{UART0, UART1};
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use minipanel_core::catalog::loader::profile_backends;
use minipanel_core::catalog::Backend;
use minipanel_core::panel::Panel;
use minipanel_core::settings::Settings;
use minipanel_core::sim::{SerialBackend, SimAdapter, SimBackends};
use minipanel_hal::SettingsImage;
use minipanel_hal_rp2040::flash::FlashStorage;

use crate::link::{HostStub, PipeUart};
use crate::persist::MAX_CATALOG_SIZE;
use crate::tasks::{EncoderPins, PanelParts, PanelSim};

/// Embedded default catalog (compiled into firmware)
/// Edit panel.toml and rebuild to customize
const EMBEDDED_CATALOG: &str = include_str!("../panel.toml");

/// Simulator link baud rate
const SIM_BAUD: u32 = 115_200;

/// Touch display baud rate
const DISPLAY_BAUD: u32 = 115_200;

mod channels;
mod link;
mod persist;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

// Static cells for UART buffers (must live forever)
static DISPLAY_TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static DISPLAY_RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static SIM_TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static SIM_RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// Large state kept out of the task stacks
static FLASH: StaticCell<FlashStorage<'static>> = StaticCell::new();
static CATALOG_BUF: StaticCell<[u8; MAX_CATALOG_SIZE]> = StaticCell::new();
static SETTINGS_IMAGE: StaticCell<SettingsImage> = StaticCell::new();
static PANEL: StaticCell<Panel> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Minipanel firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Persisted settings and catalog override
    let flash = FLASH.init_with(|| FlashStorage::new(p.FLASH, p.DMA_CH0));
    let image = SETTINGS_IMAGE.init(persist::load_settings(flash).await);
    let catalog_buf = CATALOG_BUF.init([0u8; MAX_CATALOG_SIZE]);
    let catalog_text: &'static str = match persist::load_catalog(flash, catalog_buf).await {
        Some(text) => text,
        None => {
            info!("Using embedded catalog");
            EMBEDDED_CATALOG
        }
    };

    // The active profile decides the simulator link before the full load
    let sim = select_sim(catalog_text, image);

    // Display link
    let mut display_config = UartConfig::default();
    display_config.baudrate = DISPLAY_BAUD;
    let display_uart = BufferedUart::new(
        p.UART0,
        p.PIN_0,
        p.PIN_1,
        Irqs,
        DISPLAY_TX_BUF.init([0u8; 256]),
        DISPLAY_RX_BUF.init([0u8; 64]),
        display_config,
    );
    let (display_tx, display_rx) = display_uart.split();
    info!("UART0 initialized for the touch display");

    // Simulator link
    let mut sim_config = UartConfig::default();
    sim_config.baudrate = SIM_BAUD;
    let sim_uart = BufferedUart::new(
        p.UART1,
        p.PIN_8,
        p.PIN_9,
        Irqs,
        SIM_TX_BUF.init([0u8; 256]),
        SIM_RX_BUF.init([0u8; 256]),
        sim_config,
    );
    let (sim_tx, sim_rx) = sim_uart.split();
    info!("UART1 initialized for the simulator link");

    // Encoders: A, B, push button
    let encoders = [
        EncoderPins {
            a: Input::new(p.PIN_2, Pull::Up),
            b: Input::new(p.PIN_3, Pull::Up),
            button: Input::new(p.PIN_4, Pull::Up),
        },
        EncoderPins {
            a: Input::new(p.PIN_5, Pull::Up),
            b: Input::new(p.PIN_6, Pull::Up),
            button: Input::new(p.PIN_7, Pull::Up),
        },
        EncoderPins {
            a: Input::new(p.PIN_10, Pull::Up),
            b: Input::new(p.PIN_11, Pull::Up),
            button: Input::new(p.PIN_12, Pull::Up),
        },
        EncoderPins {
            a: Input::new(p.PIN_13, Pull::Up),
            b: Input::new(p.PIN_14, Pull::Up),
            button: Input::new(p.PIN_15, Pull::Up),
        },
    ];
    info!("Encoder inputs initialized");

    let panel = PANEL.init_with(Panel::new);

    // Spawn tasks
    spawner.spawn(tasks::tick_task()).unwrap();
    spawner.spawn(tasks::display_rx_task(display_rx)).unwrap();
    spawner.spawn(tasks::display_tx_task(display_tx)).unwrap();
    spawner.spawn(tasks::sim_rx_task(sim_rx)).unwrap();
    spawner.spawn(tasks::sim_tx_task(sim_tx)).unwrap();
    for (index, pins) in encoders.into_iter().enumerate() {
        spawner.spawn(tasks::encoder_task(index as u8, pins)).unwrap();
    }
    spawner.spawn(tasks::settings_task(flash)).unwrap();
    spawner
        .spawn(tasks::panel_task(PanelParts {
            panel,
            image,
            sim,
            catalog_text,
        }))
        .unwrap();

    info!("All tasks spawned, firmware running");
}

/// Build the simulator link for the stored profile
fn select_sim(catalog_text: &str, image: &SettingsImage) -> PanelSim {
    let backends = profile_backends(catalog_text);
    let profile = Settings::load(image, backends.len().max(1) as u8)
        .map(|s| s.profile as usize)
        .unwrap_or(0);

    match backends.get(profile).copied().unwrap_or_default() {
        Backend::Serial => {
            info!("Profile {}: serial simulator link", profile);
            SimBackends::Serial(SerialBackend::new(PipeUart))
        }
        Backend::Registration => {
            warn!(
                "Profile {}: registration link has no host bridge, values stay local",
                profile
            );
            SimBackends::Registration(SimAdapter::new(HostStub::new()))
        }
    }
}
