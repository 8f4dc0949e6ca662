//! MiniPanel wire protocols
//!
//! Two serial links leave the controller:
//!
//! - the simulator link, carrying short ASCII packets
//!   ```text
//!   ┌───┬────┬───┬───────┬───┬───────┬───┐
//!   │ @ │ ID │ / │ INDEX │ = │ VALUE │ $ │
//!   └───┴────┴───┴───────┴───┴───────┴───┘
//!   ```
//! - the touch display link, carrying ASCII instructions out and binary
//!   touch reports in, both terminated by `FF FF FF`
//!
//! Encoder input is local to the controller; [`InputEvent`] is the shared
//! vocabulary between the input task and the panel logic.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod display;
pub mod events;
pub mod packet;

pub use display::{
    encode_assignment, encode_command, Command, CommandError, TouchDecoder, TouchEvent,
    SIDEBAR_SLOTS,
};
pub use events::{
    classify_press, InputEvent, QuadratureDecoder, ENCODER_COUNT, LONG_PRESS_MS, PUSH_MIN_MS,
};
pub use packet::{
    compose, compose_bare, compose_text, OutboundPacket, Packet, PacketError, PacketFramer,
    MAX_BODY_LEN, MAX_PACKET_LEN, NO_INDEX,
};
