//! printf-subset formatter
//!
//! Catalog formats use a single conversion with optional literal text:
//! flags `-0+ ` (space), width, precision and one of `d i x X f s`.
//! `%%` emits a percent sign.

use core::fmt::Write;
use heapless::String;

use crate::value::{Text, MAX_TEXT_LEN};

/// Formatter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// Unknown conversion character
    BadConversion,
    /// More than one conversion in the format
    ExtraConversion,
    /// Output does not fit
    Overflow,
}

/// Argument to a format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatArg<'a> {
    Int(i32),
    Float(f32),
    Str(&'a str),
}

#[derive(Debug, Clone, Copy, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
}

/// Format a single argument
pub fn format_value(fmt: &str, arg: FormatArg<'_>) -> Result<Text, FormatError> {
    let mut out = Text::new();
    let mut used = false;
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c).map_err(|_| FormatError::Overflow)?;
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%').map_err(|_| FormatError::Overflow)?;
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                _ => break,
            }
            chars.next();
        }
        spec.width = take_number(&mut chars).unwrap_or(0);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(take_number(&mut chars).unwrap_or(0));
        }

        let conv = chars.next().ok_or(FormatError::BadConversion)?;
        if used {
            return Err(FormatError::ExtraConversion);
        }
        used = true;
        render(&mut out, conv, &spec, arg)?;
    }
    Ok(out)
}

fn take_number(chars: &mut core::iter::Peekable<core::str::Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    n
}

fn render(out: &mut Text, conv: char, spec: &Spec, arg: FormatArg<'_>) -> Result<(), FormatError> {
    let mut body = String::<MAX_TEXT_LEN>::new();
    let mut sign = "";

    match conv {
        'd' | 'i' | 'x' | 'X' => {
            let v = match arg {
                FormatArg::Int(v) => v,
                FormatArg::Float(f) => f as i32,
                FormatArg::Str(s) => s.trim().parse().unwrap_or(0),
            };
            match conv {
                'x' => write!(body, "{:x}", v as u32),
                'X' => write!(body, "{:X}", v as u32),
                _ => write!(body, "{}", v.unsigned_abs()),
            }
            .map_err(|_| FormatError::Overflow)?;
            if matches!(conv, 'd' | 'i') {
                sign = sign_of(v < 0, spec);
            }
            if let Some(p) = spec.precision {
                // Minimum digit count
                let mut digits = String::<MAX_TEXT_LEN>::new();
                for _ in body.len()..p {
                    digits.push('0').map_err(|_| FormatError::Overflow)?;
                }
                digits.push_str(&body).map_err(|_| FormatError::Overflow)?;
                body = digits;
            }
        }
        'f' => {
            let v = match arg {
                FormatArg::Int(v) => v as f32,
                FormatArg::Float(f) => f,
                FormatArg::Str(s) => s.trim().parse().unwrap_or(0.0),
            };
            let prec = spec.precision.unwrap_or(6);
            write!(body, "{:.*}", prec, v.abs()).map_err(|_| FormatError::Overflow)?;
            sign = sign_of(v < 0.0, spec);
        }
        's' => {
            match arg {
                FormatArg::Int(v) => write!(body, "{}", v),
                FormatArg::Float(f) => write!(body, "{}", f),
                FormatArg::Str(s) => body.push_str(s).map_err(|_| core::fmt::Error),
            }
            .map_err(|_| FormatError::Overflow)?;
            if let Some(p) = spec.precision {
                let cut = body.char_indices().nth(p).map(|(i, _)| i);
                if let Some(cut) = cut {
                    body.truncate(cut);
                }
            }
            let s = Spec { zero: false, ..*spec };
            return pad(out, "", &body, &s);
        }
        _ => return Err(FormatError::BadConversion),
    }
    pad(out, sign, &body, spec)
}

fn sign_of(negative: bool, spec: &Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn pad(out: &mut Text, sign: &str, body: &str, spec: &Spec) -> Result<(), FormatError> {
    let len = sign.len() + body.chars().count();
    let fill = spec.width.saturating_sub(len);
    let push = |out: &mut Text, s: &str| out.push_str(s).map_err(|_| FormatError::Overflow);
    let repeat = |out: &mut Text, c: char, n: usize| {
        (0..n).try_for_each(|_| out.push(c).map_err(|_| FormatError::Overflow))
    };

    if spec.left {
        push(out, sign)?;
        push(out, body)?;
        repeat(out, ' ', fill)
    } else if spec.zero {
        push(out, sign)?;
        repeat(out, '0', fill)?;
        push(out, body)
    } else {
        repeat(out, ' ', fill)?;
        push(out, sign)?;
        push(out, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(f: &str, arg: FormatArg<'_>) -> std::string::String {
        format_value(f, arg).unwrap().as_str().into()
    }

    #[test]
    fn test_integers() {
        assert_eq!(fmt("%d", FormatArg::Int(-42)), "-42");
        assert_eq!(fmt("%03d", FormatArg::Int(7)), "007");
        assert_eq!(fmt("%05d", FormatArg::Int(-7)), "-0007");
        assert_eq!(fmt("%+d", FormatArg::Int(5)), "+5");
        assert_eq!(fmt("% d", FormatArg::Int(5)), " 5");
        assert_eq!(fmt("%-4d|", FormatArg::Int(5)), "5   |");
        assert_eq!(fmt("%4X", FormatArg::Int(0x1750)), "1750");
        assert_eq!(fmt("%x", FormatArg::Int(255)), "ff");
        assert_eq!(fmt("%.3d", FormatArg::Int(9)), "009");
    }

    #[test]
    fn test_floats() {
        assert_eq!(fmt("%.2f", FormatArg::Float(29.921)), "29.92");
        assert_eq!(fmt("%7.3f", FormatArg::Float(118.5)), "118.500");
        assert_eq!(fmt("%8.3f", FormatArg::Float(-1.5)), "  -1.500");
        assert_eq!(fmt("%.1f%%", FormatArg::Float(45.0)), "45.0%");
        assert_eq!(fmt("%f", FormatArg::Int(1)), "1.000000");
    }

    #[test]
    fn test_strings_and_literals() {
        assert_eq!(fmt("%s", FormatArg::Str("ALT")), "ALT");
        assert_eq!(fmt("%5s", FormatArg::Str("ALT")), "  ALT");
        assert_eq!(fmt("%-5s|", FormatArg::Str("ALT")), "ALT  |");
        assert_eq!(fmt("%.2s", FormatArg::Str("HOLD")), "HO");
        assert_eq!(fmt("FL%03d", FormatArg::Int(350)), "FL350");
        assert_eq!(fmt("no conversion", FormatArg::Int(1)), "no conversion");
    }

    #[test]
    fn test_errors() {
        assert_eq!(format_value("%q", FormatArg::Int(1)), Err(FormatError::BadConversion));
        assert_eq!(format_value("%", FormatArg::Int(1)), Err(FormatError::BadConversion));
        assert_eq!(
            format_value("%d %d", FormatArg::Int(1)),
            Err(FormatError::ExtraConversion)
        );
        assert_eq!(format_value("%40d", FormatArg::Int(1)), Err(FormatError::Overflow));
    }
}
