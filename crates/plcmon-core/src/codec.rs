// ── Edit literal encoding ──
//
// The inverse of the format interpreter: turns a user-entered literal and
// a write format into the word(s) to send to the backend.

use crate::error::CoreError;
use crate::model::{DeviceAddress, DisplayFormat, WordOrder};

/// Words to write, starting at `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWrite {
    pub base: DeviceAddress,
    pub words: Vec<u16>,
}

/// Encode `literal` for a write at `target` under `format`.
///
/// Combined formats always write at the even-aligned base of the pair that
/// contains `target`.
pub fn encode_write(
    format: DisplayFormat,
    target: &DeviceAddress,
    literal: &str,
    order: WordOrder,
) -> Result<EncodedWrite, CoreError> {
    if format.is_combined() {
        let value = encode_u32(format, literal)?;
        return Ok(EncodedWrite {
            base: target.pair_base(),
            words: order.split(value).to_vec(),
        });
    }
    Ok(EncodedWrite {
        base: target.clone(),
        words: vec![encode_word(format, literal)?],
    })
}

/// Encode a literal into one word under a 16-bit format.
pub fn encode_word(format: DisplayFormat, literal: &str) -> Result<u16, CoreError> {
    match format {
        DisplayFormat::Ascii => encode_ascii(literal),
        DisplayFormat::Hex => {
            let digits = strip_prefix(literal.trim(), "0x");
            parse_radix(format, literal, digits, 16).map(low_word)
        }
        DisplayFormat::Bin => {
            let digits = strip_prefix(literal.trim(), "0b");
            parse_radix(format, literal, digits, 2).map(low_word)
        }
        DisplayFormat::U16 | DisplayFormat::I16 => parse_integer(format, literal).map(low_word),
        DisplayFormat::U32 | DisplayFormat::I32 | DisplayFormat::F32 => Err(CoreError::literal(
            format,
            literal,
            "32-bit format cannot be written as a single word",
        )),
    }
}

/// Encode a literal into a 32-bit value under a combined format.
pub fn encode_u32(format: DisplayFormat, literal: &str) -> Result<u32, CoreError> {
    match format {
        DisplayFormat::F32 => literal
            .trim()
            .parse::<f32>()
            .map(f32::to_bits)
            .map_err(|e| CoreError::literal(format, literal, e.to_string())),
        DisplayFormat::U32 | DisplayFormat::I32 => {
            parse_integer(format, literal).map(low_dword)
        }
        _ => Err(CoreError::literal(
            format,
            literal,
            "16-bit format cannot be written as a 32-bit value",
        )),
    }
}

fn encode_ascii(literal: &str) -> Result<u16, CoreError> {
    let mut bytes = [0u8; 2];
    for (slot, c) in bytes.iter_mut().zip(literal.chars()) {
        *slot = u8::try_from(u32::from(c)).map_err(|_| {
            CoreError::literal(DisplayFormat::Ascii, literal, format!("'{c}' is not a single byte"))
        })?;
    }
    Ok(u16::from_be_bytes(bytes))
}

/// Decimal, or hex with a `0x` prefix. A leading `-` is allowed.
fn parse_integer(format: DisplayFormat, literal: &str) -> Result<i64, CoreError> {
    let trimmed = literal.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => parse_radix(format, literal, hex, 16)?,
        None => parse_radix(format, literal, body, 10)?,
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_radix(
    format: DisplayFormat,
    literal: &str,
    digits: &str,
    radix: u32,
) -> Result<i64, CoreError> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(CoreError::literal(
            format,
            literal,
            format!("expected base-{radix} digits"),
        ));
    }
    i64::from_str_radix(digits, radix).map_err(|e| CoreError::literal(format, literal, e.to_string()))
}

fn strip_prefix<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn low_word(value: i64) -> u16 {
    (value & 0xFFFF) as u16
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn low_dword(value: i64) -> u32 {
    (value & 0xFFFF_FFFF) as u32
}
