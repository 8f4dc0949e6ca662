//! Input events from the panel encoders

/// Number of rotary encoders on the panel
pub const ENCODER_COUNT: usize = 4;

/// Shortest press reported as a push (debounce)
pub const PUSH_MIN_MS: u64 = 50;

/// Hold time that turns a press into a long press
pub const LONG_PRESS_MS: u64 = 500;

/// Input event from one of the encoders
///
/// The payload is the encoder index (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputEvent {
    /// Encoder rotated clockwise (1 detent)
    Cw(u8),
    /// Encoder rotated counter-clockwise (1 detent)
    Ccw(u8),
    /// Short press (<500 ms)
    Push(u8),
    /// Long press (>=500 ms)
    LongPress(u8),
}

impl InputEvent {
    /// Encoder that produced the event
    pub fn encoder(&self) -> usize {
        match *self {
            InputEvent::Cw(n) | InputEvent::Ccw(n) | InputEvent::Push(n) | InputEvent::LongPress(n) => {
                n as usize
            }
        }
    }

    /// Returns true if this is a rotation event
    pub fn is_rotation(&self) -> bool {
        matches!(self, InputEvent::Cw(_) | InputEvent::Ccw(_))
    }

    /// Returns the rotation direction as a signed delta (-1, 0, or +1)
    pub fn rotation_delta(&self) -> i8 {
        match self {
            InputEvent::Cw(_) => 1,
            InputEvent::Ccw(_) => -1,
            _ => 0,
        }
    }
}

/// Decoder states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    CwStep1,
    CwStep2,
    CcwStep1,
    CcwStep2,
}

/// Quadrature decoder for one encoder
///
/// Fed with the A/B levels on every change; reports one event per detent.
/// ```text
/// CW:  (1,1) -> (0,1) -> (0,0) -> either high: Cw
/// CCW: (1,1) -> (1,0) -> (0,0) -> either high: Ccw
/// ```
#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    index: u8,
    phase: Phase,
    last: (bool, bool),
}

impl QuadratureDecoder {
    pub fn new(index: u8, a: bool, b: bool) -> Self {
        Self {
            index,
            phase: Phase::Idle,
            last: (a, b),
        }
    }

    /// Feed the current pin levels
    pub fn update(&mut self, a: bool, b: bool) -> Option<InputEvent> {
        if (a, b) == self.last {
            return None;
        }
        self.last = (a, b);

        match self.phase {
            Phase::Idle => {
                if !a && b {
                    self.phase = Phase::CwStep1;
                } else if a && !b {
                    self.phase = Phase::CcwStep1;
                }
                None
            }
            Phase::CwStep1 | Phase::CcwStep1 => {
                if !a && !b {
                    self.phase = if self.phase == Phase::CwStep1 {
                        Phase::CwStep2
                    } else {
                        Phase::CcwStep2
                    };
                } else if a && b {
                    // Bounce
                    self.phase = Phase::Idle;
                }
                None
            }
            Phase::CwStep2 if a || b => {
                self.phase = Phase::Idle;
                Some(InputEvent::Cw(self.index))
            }
            Phase::CcwStep2 if a || b => {
                self.phase = Phase::Idle;
                Some(InputEvent::Ccw(self.index))
            }
            Phase::CwStep2 | Phase::CcwStep2 => None,
        }
    }
}

/// Classify a finished press by its duration
///
/// Presses shorter than [`PUSH_MIN_MS`] are bounce.
pub fn classify_press(index: u8, held_ms: u64) -> Option<InputEvent> {
    if held_ms >= LONG_PRESS_MS {
        Some(InputEvent::LongPress(index))
    } else if held_ms >= PUSH_MIN_MS {
        Some(InputEvent::Push(index))
    } else {
        None
    }
}
