// ── Format interpreter ──
//
// Pure computation of row display state from the word cache. No view
// technology leaks in here; the engine hands the result to a `ViewSink`.

use crate::model::{DeviceAddress, DisplayFormat, RowState, WordOrder};
use crate::store::WordCache;

/// Compute the display state of the row at `addr`.
///
/// Missing words render as zero. Under a combined format the even address
/// carries the 32-bit value and the odd address is suppressed; if the odd
/// partner has not been observed yet the even row shows only its own raw
/// word.
pub fn render_row(
    addr: &DeviceAddress,
    format: DisplayFormat,
    order: WordOrder,
    cache: &WordCache,
) -> RowState {
    let word = cache.get(addr).unwrap_or(0);
    let bits = word_bits(word);

    if !format.is_combined() {
        return RowState {
            address: addr.clone(),
            bits,
            formatted: format_word(format, word),
            raw: hex16(word),
            suppressed: false,
        };
    }

    if !addr.is_even() {
        return RowState {
            address: addr.clone(),
            bits,
            formatted: String::new(),
            raw: String::new(),
            suppressed: true,
        };
    }

    let (formatted, raw) = match addr.offset(1).and_then(|odd| cache.get(&odd)) {
        Some(odd) => {
            let value = order.combine(word, odd);
            (format_combined(format, value), hex32(value))
        }
        None => (String::new(), hex16(word)),
    };

    RowState {
        address: addr.clone(),
        bits,
        formatted,
        raw,
        suppressed: false,
    }
}

/// Bit vector for the bit cells, bit 15 first.
pub fn word_bits(word: u16) -> [bool; 16] {
    let mut bits = [false; 16];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = word & (0x8000 >> i) != 0;
    }
    bits
}

/// Render a single word in a 16-bit format.
///
/// Combined formats fall back to `U16` here; callers route them through
/// [`format_combined`].
pub fn format_word(format: DisplayFormat, word: u16) -> String {
    match format {
        DisplayFormat::Bin => format!("{word:016b}"),
        DisplayFormat::U16 | DisplayFormat::U32 | DisplayFormat::I32 | DisplayFormat::F32 => {
            word.to_string()
        }
        DisplayFormat::I16 => i16::from_ne_bytes(word.to_ne_bytes()).to_string(),
        DisplayFormat::Hex => hex16(word),
        DisplayFormat::Ascii => {
            let [high, low] = word.to_be_bytes();
            [high, low].into_iter().map(printable).collect()
        }
    }
}

/// Render a combined 32-bit value.
pub fn format_combined(format: DisplayFormat, value: u32) -> String {
    match format {
        DisplayFormat::I32 => i32::from_ne_bytes(value.to_ne_bytes()).to_string(),
        DisplayFormat::F32 => format_f32(f32::from_bits(value)),
        _ => value.to_string(),
    }
}

/// Decimal rendering of a float, with non-finite values spelled out.
pub fn format_f32(value: f32) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".into()
        } else {
            "-Infinity".into()
        }
    } else {
        value.to_string()
    }
}

pub fn hex16(word: u16) -> String {
    format!("0x{word:04X}")
}

pub fn hex32(value: u32) -> String {
    format!("0x{value:08X}")
}

fn printable(byte: u8) -> char {
    if (32..=126).contains(&byte) {
        char::from(byte)
    } else {
        '.'
    }
}
