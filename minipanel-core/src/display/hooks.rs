//! Built-in rendering callbacks
//!
//! Catalog nodes name these with `display = "fn:<name>"`.

use core::fmt::Write;

use crate::node::{Node, RenderFn};
use crate::value::Text;

/// Look up a renderer by catalog name
pub fn builtin_renderer(name: &str) -> Option<RenderFn> {
    Some(match name {
        "com_freq" => com_freq,
        "nav_freq" => nav_freq,
        "adf_bcd" => adf_bcd,
        "hour_minute" => hour_minute,
        "volume_level" => volume_level,
        _ => return None,
    })
}

/// COM frequency stored in kHz
fn com_freq(node: &Node) -> Text {
    let mut out = Text::new();
    let _ = write!(out, "{:7.3}", node.float_value() / 1000.0);
    out
}

/// NAV frequency stored in 10 kHz units
fn nav_freq(node: &Node) -> Text {
    let mut out = Text::new();
    let _ = write!(out, "{:6.2}", node.float_value() / 100.0);
    out
}

/// ADF frequency delivered as BCD in the upper 16 bits
fn adf_bcd(node: &Node) -> Text {
    let mut out = Text::new();
    let bcd = (node.float_value() / 65536.0 + 0.5) as u16;
    let _ = write!(out, "{:4X}", bcd);
    out
}

/// Seconds since midnight as `HH:MM`
fn hour_minute(node: &Node) -> Text {
    let mut out = Text::new();
    let minutes = (node.float_value() / 60.0) as u32;
    let _ = write!(out, "{:2}:{:02}", minutes / 60, minutes % 60);
    out
}

/// Volume ratio as 0..11
fn volume_level(node: &Node) -> Text {
    let mut out = Text::new();
    let _ = write!(out, "{:2}", (node.float_value() * 10.0 + 0.5) as i32);
    out
}
