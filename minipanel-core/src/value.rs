//! Node value storage
//!
//! A node holds exactly one kind of value for its whole life. Setters on
//! [`crate::node::Node`] coerce into that kind.

use core::fmt::Write;
use heapless::String;

/// Maximum text value length
pub const MAX_TEXT_LEN: usize = 24;

/// Float values closer than this compare unchanged
pub const FLOAT_EPSILON: f32 = 1e-4;

/// Bounded text value
pub type Text = String<MAX_TEXT_LEN>;

/// Kind tag of a node value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueKind {
    #[default]
    Int,
    Float,
    Text,
}

/// Tagged node value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    Int(i32),
    Float(f32),
    Text(Text),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl Value {
    /// Zero value of the given kind
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Text => Value::Text(Text::new()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Integer view; floats truncate, unparsable text is 0
    pub fn as_int(&self) -> i32 {
        match self {
            Value::Int(v) => *v,
            Value::Float(v) => *v as i32,
            Value::Text(t) => parse_int(t).unwrap_or(0),
        }
    }

    /// Float view; unparsable text is 0.0
    pub fn as_float(&self) -> f32 {
        match self {
            Value::Int(v) => *v as f32,
            Value::Float(v) => *v,
            Value::Text(t) => t.trim().parse().unwrap_or(0.0),
        }
    }

    /// Plain text rendering
    pub fn to_text(&self) -> Text {
        let mut out = Text::new();
        match self {
            Value::Int(v) => {
                let _ = write!(out, "{}", v);
            }
            Value::Float(v) => {
                let _ = write!(out, "{}", v);
            }
            Value::Text(t) => out = t.clone(),
        }
        out
    }

    /// Convert into `kind`
    pub fn coerce(self, kind: ValueKind) -> Value {
        if self.kind() == kind {
            return self;
        }
        match kind {
            ValueKind::Int => Value::Int(self.as_int()),
            ValueKind::Float => Value::Float(self.as_float()),
            ValueKind::Text => Value::Text(self.to_text()),
        }
    }

    /// Dirty-check against a previous value
    ///
    /// Floats compare within [`FLOAT_EPSILON`], ints and text exactly.
    pub fn differs_from(&self, prev: &Value) -> bool {
        match (self, prev) {
            (Value::Float(a), Value::Float(b)) => {
                if a.is_nan() || b.is_nan() {
                    return a.is_nan() != b.is_nan();
                }
                (a - b).abs() > FLOAT_EPSILON
            }
            _ => self != prev,
        }
    }
}

/// Integer parse that also accepts a float rendering (truncated)
pub fn parse_int(text: &str) -> Option<i32> {
    let text = text.trim();
    text.parse::<i32>()
        .ok()
        .or_else(|| text.parse::<f32>().ok().map(|f| f as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_dirty_epsilon() {
        let a = Value::Float(1.0);
        assert!(!Value::Float(1.00005).differs_from(&a));
        assert!(Value::Float(1.0002).differs_from(&a));
        // A change of exactly epsilon is not dirty
        assert!(!Value::Float(FLOAT_EPSILON).differs_from(&Value::Float(0.0)));
        assert!(!Value::Float(0.0).differs_from(&Value::Float(FLOAT_EPSILON)));
    }

    #[test]
    fn test_int_and_text_exact() {
        assert!(Value::Int(3).differs_from(&Value::Int(4)));
        assert!(!Value::Int(3).differs_from(&Value::Int(3)));
        let t = Value::Text(Text::try_from("ALT").unwrap());
        assert!(!t.differs_from(&t.clone()));
        assert!(t.differs_from(&Value::Text(Text::try_from("ALT ").unwrap())));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Float(12.9).coerce(ValueKind::Int), Value::Int(12));
        assert_eq!(Value::Int(5).coerce(ValueKind::Float), Value::Float(5.0));
        assert_eq!(
            Value::Int(-7).coerce(ValueKind::Text),
            Value::Text(Text::try_from("-7").unwrap())
        );
        let t = Value::Text(Text::try_from("118.5").unwrap());
        assert_eq!(t.coerce(ValueKind::Int), Value::Int(118));
    }

    #[test]
    fn test_nan_compares_unchanged_to_nan() {
        assert!(!Value::Float(f32::NAN).differs_from(&Value::Float(f32::NAN)));
        assert!(Value::Float(0.0).differs_from(&Value::Float(f32::NAN)));
    }
}
