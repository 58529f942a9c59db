//! The closed set of field/attribute value types (§4.4).
//!
//! A `Type` parses wire-format text into the raw `u32` a class stores in its
//! register mirror, and formats that `u32` back out. `scalar`/`position`
//! carry their own scale/offset/units state; `enum` owns an `Enumeration`;
//! the rest are stateless.

use crate::enumeration::Enumeration;
use crate::error::{CoreError, Result};

/// Renders `value` with up to 10 significant digits, trailing zeros and any
/// leading whitespace the underlying formatter might produce stripped.
/// Mirrors the original's `"%.10g"`-based `format_double`.
pub fn format_double(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    // Pick enough decimal places to get 10 significant digits, then trim.
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (9 - magnitude).max(0) as usize;
    let rendered = format!("{:.*}", decimals, value);
    let mut trimmed = rendered.trim_start();
    if trimmed.contains('.') {
        trimmed = trimmed.trim_end_matches('0');
        trimmed = trimmed.trim_end_matches('.');
    }
    if trimmed.is_empty() || trimmed == "-0" {
        return "0".to_string();
    }
    trimmed.to_string()
}

fn round_to_nearest(value: f64) -> i64 {
    value.round() as i64
}

/// Mask covering the low `bits` bits, used to keep `int`-typed values
/// confined to their declared width in the `u32` register mirror.
fn int_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Scale/offset/units state shared by `scalar` and `position` types.
#[derive(Debug, Clone)]
pub struct ScaledType {
    pub scale: f64,
    pub offset: f64,
    pub units: String,
}

impl Default for ScaledType {
    fn default() -> Self {
        ScaledType {
            scale: 1.0,
            offset: 0.0,
            units: String::new(),
        }
    }
}

impl ScaledType {
    fn parse(&self, text: &str) -> Result<u32> {
        let raw: f64 = text
            .trim()
            .parse()
            .map_err(|_| CoreError::parse(format!("invalid number '{}'", text)))?;
        let scaled = (raw - self.offset) / self.scale;
        Ok(round_to_nearest(scaled) as u32)
    }

    fn format(&self, value: u32) -> String {
        let physical = value as f64 * self.scale + self.offset;
        format_double(physical)
    }
}

/// One of the closed set of value types a field or attribute can carry.
#[derive(Debug, Clone)]
pub enum Type {
    Uint { bits: u32 },
    Int { bits: u32 },
    Bit,
    Action,
    Lut,
    Enum(Enumeration),
    Scalar(ScaledType),
    Position(ScaledType),
    Time,
}

/// Tick rate used to convert `time`-typed values, expressed in clock ticks
/// per microsecond. The register holds a raw tick count; `us`/`ms`/`s`/`min`
/// suffixes are just alternate input/output units over the same count.
const TICKS_PER_US: f64 = 1.0;

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Uint { .. } => "uint",
            Type::Int { .. } => "int",
            Type::Bit => "bit",
            Type::Action => "action",
            Type::Lut => "lut",
            Type::Enum(_) => "enum",
            Type::Scalar(_) => "scalar",
            Type::Position(_) => "position",
            Type::Time => "time",
        }
    }

    /// Full parse of `text`: no trailing garbage permitted.
    pub fn parse(&self, text: &str) -> Result<u32> {
        let text = text.trim();
        match self {
            Type::Uint { bits } => {
                let value: u64 = text
                    .parse()
                    .map_err(|_| CoreError::parse(format!("invalid uint '{}'", text)))?;
                let max = if *bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
                if value > max {
                    return Err(CoreError::range(format!(
                        "value {} out of range for {}-bit uint",
                        value, bits
                    )));
                }
                Ok(value as u32)
            }
            Type::Int { bits } => {
                let value: i64 = text
                    .parse()
                    .map_err(|_| CoreError::parse(format!("invalid int '{}'", text)))?;
                let half = 1i64 << (*bits - 1);
                if value < -half || value >= half {
                    return Err(CoreError::range(format!(
                        "value {} out of range for {}-bit int",
                        value, bits
                    )));
                }
                Ok((value as u64 & int_mask(*bits)) as u32)
            }
            Type::Bit => match text {
                "0" => Ok(0),
                "1" => Ok(1),
                _ => Err(CoreError::parse(format!("invalid bit value '{}'", text))),
            },
            Type::Action => Ok(0),
            Type::Lut => {
                let value = if let Some(hex) = text.strip_prefix("0x") {
                    u32::from_str_radix(hex, 16)
                } else {
                    text.parse()
                }
                .map_err(|_| CoreError::parse(format!("invalid lut value '{}'", text)))?;
                Ok(value)
            }
            Type::Enum(e) => e.index_of(text).map(|i| i as u32),
            Type::Scalar(scaled) | Type::Position(scaled) => scaled.parse(text),
            Type::Time => parse_time(text),
        }
    }

    pub fn format(&self, value: u32) -> Result<String> {
        match self {
            Type::Uint { .. } => Ok(value.to_string()),
            Type::Int { bits } => {
                let half = 1i64 << (*bits - 1);
                let truncated = value as u64 & int_mask(*bits);
                let signed = truncated as i64;
                let signed = if signed >= half { signed - (1i64 << *bits) } else { signed };
                Ok(signed.to_string())
            }
            Type::Bit => Ok(if value != 0 { "1" } else { "0" }.to_string()),
            Type::Action => Ok(String::new()),
            Type::Lut => Ok(format!("0x{:08X}", value)),
            Type::Enum(e) => Ok(e.name_of(value as usize)?.to_string()),
            Type::Scalar(scaled) | Type::Position(scaled) => Ok(scaled.format(value)),
            Type::Time => Ok(format_time(value)),
        }
    }
}

fn parse_time(text: &str) -> Result<u32> {
    let (number, suffix) = split_suffix(text);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| CoreError::parse(format!("invalid time value '{}'", text)))?;
    let us = match suffix {
        "us" | "" => value,
        "ms" => value * 1_000.0,
        "s" => value * 1_000_000.0,
        "min" => value * 60_000_000.0,
        other => return Err(CoreError::parse(format!("invalid time suffix '{}'", other))),
    };
    Ok(round_to_nearest(us * TICKS_PER_US) as u32)
}

fn format_time(value: u32) -> String {
    format_double(value as f64 / TICKS_PER_US)
}

fn split_suffix(text: &str) -> (&str, &str) {
    for suffix in ["min", "us", "ms", "s"] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            return (stripped, suffix);
        }
    }
    (text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_round_trips() {
        let t = Type::Uint { bits: 8 };
        assert_eq!(t.parse("200").unwrap(), 200);
        assert_eq!(t.format(200).unwrap(), "200");
        assert!(t.parse("300").is_err());
    }

    #[test]
    fn int_handles_negative_values() {
        let t = Type::Int { bits: 8 };
        assert_eq!(t.parse("-5").unwrap() as i8, -5);
        assert_eq!(t.format(t.parse("-5").unwrap()).unwrap(), "-5");
    }

    #[test]
    fn bit_rejects_non_boolean_text() {
        let t = Type::Bit;
        assert_eq!(t.parse("1").unwrap(), 1);
        assert!(t.parse("2").is_err());
    }

    #[test]
    fn scalar_applies_scale_and_offset() {
        let t = Type::Scalar(ScaledType {
            scale: 0.5,
            offset: 10.0,
            units: "V".to_string(),
        });
        // physical = raw * 0.5 + 10 => raw = (physical - 10) / 0.5
        let raw = t.parse("11").unwrap();
        assert_eq!(raw, 2);
        assert_eq!(t.format(raw).unwrap(), "11");
    }

    #[test]
    fn enum_delegates_to_enumeration() {
        let e = Enumeration::from_labels(["Off", "On"]).unwrap();
        let t = Type::Enum(e);
        assert_eq!(t.parse("On").unwrap(), 1);
        assert_eq!(t.format(0).unwrap(), "Off");
    }

    #[test]
    fn time_parses_suffixes() {
        let t = Type::Time;
        assert_eq!(t.parse("2ms").unwrap(), 2_000);
        assert_eq!(t.parse("1s").unwrap(), 1_000_000);
    }

    #[test]
    fn format_double_strips_trailing_zeros_and_trivial_negative_zero() {
        assert_eq!(format_double(0.0), "0");
        assert_eq!(format_double(-0.0), "0");
        assert_eq!(format_double(1.5), "1.5");
        assert_eq!(format_double(11.0), "11");
    }
}
