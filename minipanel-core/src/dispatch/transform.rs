//! Opcode transform table for the registration backend
//!
//! Transforms are pure: they map the current node value and a step
//! direction to the new value, or to a side effect the dispatcher runs.

use crate::sim::{AuxGroup, ExtraCommand};
use crate::value::Value;

/// Repeat count for the fast time commands
pub const TIME_FAST_REPEAT: u8 = 13;

/// Altitude bounds in feet
pub const ALTITUDE_MIN: i32 = -500;
pub const ALTITUDE_MAX: i32 = 44000;

/// Step direction of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    Dec,
    Inc,
}

impl Step {
    pub fn sign(self) -> i32 {
        match self {
            Step::Dec => -1,
            Step::Inc => 1,
        }
    }

    fn signf(self) -> f32 {
        self.sign() as f32
    }
}

/// Transform rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransformKind {
    ApSpeed,
    /// Heading or course, wrapping at 360
    Heading,
    Altitude,
    VerticalSpeed,
    /// Sim rate
    Accelerate,
    XpndrMode,
    Volume,
    LandingElevation,
    /// Integer clamped to an inclusive range
    Bounded { min: i32, max: i32 },
    /// Auxiliary brightness group
    Brightness(AuxGroup),
    /// Repeat the fast time command
    TimeFast,
}

/// A transform bound to a step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transform {
    pub kind: TransformKind,
    pub step: Step,
}

/// What the dispatcher does with a transform result
#[derive(Debug, Clone, PartialEq)]
pub enum TransformResult {
    /// Store into the node and write it back
    NodeValue(Value),
    /// Adjust every slot of an auxiliary group
    Aux { group: AuxGroup, step: Step },
    /// Trigger an extra command repeatedly
    Trigger { command: ExtraCommand, times: u8 },
}

impl Transform {
    pub const fn new(kind: TransformKind, step: Step) -> Self {
        Self { kind, step }
    }

    /// Parse a catalog name such as `heading_inc` or `bounded_dec:0:2`
    ///
    /// Brightness groups are resolved by the caller and passed in `aux`.
    pub fn from_name(name: &str, aux: Option<AuxGroup>) -> Option<Self> {
        let (head, args) = match name.split_once(':') {
            Some((h, a)) => (h, Some(a)),
            None => (name, None),
        };
        let (base, step) = if let Some(b) = head.strip_suffix("_inc") {
            (b, Step::Inc)
        } else if let Some(b) = head.strip_suffix("_dec") {
            (b, Step::Dec)
        } else {
            return None;
        };
        let kind = match base {
            "ap_speed" => TransformKind::ApSpeed,
            "heading" | "course" => TransformKind::Heading,
            "altitude" => TransformKind::Altitude,
            "vs" => TransformKind::VerticalSpeed,
            "accelerate" => TransformKind::Accelerate,
            "xpndr_mode" => TransformKind::XpndrMode,
            "volume" => TransformKind::Volume,
            "land_elev" => TransformKind::LandingElevation,
            "time_fast" => TransformKind::TimeFast,
            "brightness" => TransformKind::Brightness(aux?),
            "bounded" => {
                let (min, max) = args?.split_once(':')?;
                TransformKind::Bounded {
                    min: min.trim().parse().ok()?,
                    max: max.trim().parse().ok()?,
                }
            }
            _ => return None,
        };
        Some(Self { kind, step })
    }

    /// Apply to the current node value
    pub fn apply(&self, current: &Value) -> TransformResult {
        let step = self.step;
        let v = current.as_int();
        let f = current.as_float();
        let value = match self.kind {
            TransformKind::ApSpeed => Value::Float(((f as i32) + step.sign()).max(100) as f32),
            TransformKind::Heading => Value::Int(step_heading(v, step)),
            TransformKind::Altitude => Value::Int(step_altitude(v, step)),
            TransformKind::VerticalSpeed => {
                let n = v + 100 * step.sign();
                Value::Int(n - n % 100)
            }
            TransformKind::Accelerate => Value::Float((f + 0.5 * step.signf()).clamp(1.0, 16.0)),
            TransformKind::XpndrMode => Value::Int((v + step.sign()).clamp(0, 4)),
            TransformKind::Volume => Value::Float((f + 0.1 * step.signf()).clamp(0.0, 1.1)),
            TransformKind::LandingElevation => Value::Float(f + 0.5 * step.signf()),
            TransformKind::Bounded { min, max } => Value::Int((v + step.sign()).clamp(min, max)),
            TransformKind::Brightness(group) => return TransformResult::Aux { group, step },
            TransformKind::TimeFast => {
                let command = match step {
                    Step::Dec => ExtraCommand::TimeDownFast,
                    Step::Inc => ExtraCommand::TimeUpFast,
                };
                return TransformResult::Trigger {
                    command,
                    times: TIME_FAST_REPEAT,
                };
            }
        };
        TransformResult::NodeValue(value)
    }
}

/// Heading/course step, wrapping into 0..360
pub fn step_heading(v: i32, step: Step) -> i32 {
    match step {
        Step::Dec => {
            let n = v - 1;
            if n < 0 {
                n + 360
            } else {
                n
            }
        }
        Step::Inc => (v + 1) % 360,
    }
}

/// Altitude step with the band-dependent increment
pub fn step_altitude(v: i32, step: Step) -> i32 {
    let size = if v >= 18000 {
        1000
    } else if v >= 10000 {
        500
    } else {
        100
    };
    let n = v + size * step.sign();
    let n = n - n % 100;
    n.clamp(ALTITUDE_MIN, ALTITUDE_MAX)
}

/// Brightness ratio step, clamped to [0, 1]
pub fn step_brightness(v: f32, step: Step) -> f32 {
    (v + 0.1 * step.signf()).clamp(0.0, 1.0)
}
