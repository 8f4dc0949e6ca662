//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod display_rx;
pub mod display_tx;
pub mod encoders;
pub mod panel;
pub mod settings;
pub mod sim_link;
pub mod tick;

pub use display_rx::display_rx_task;
pub use display_tx::display_tx_task;
pub use encoders::{encoder_task, EncoderPins};
pub use panel::{panel_task, PanelParts, PanelSim};
pub use settings::settings_task;
pub use sim_link::{sim_rx_task, sim_tx_task};
pub use tick::tick_task;
