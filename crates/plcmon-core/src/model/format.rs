// ── Display formats ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How words are shown in the monitor and how edit literals are encoded.
///
/// Global to the view. The three 32-bit kinds combine an even/odd pair of
/// words into one value anchored at the even address.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayFormat {
    Bin,
    #[default]
    U16,
    I16,
    Hex,
    Ascii,
    U32,
    I32,
    F32,
}

impl DisplayFormat {
    /// Whether this format pairs two adjacent words into one value.
    pub fn is_combined(self) -> bool {
        matches!(self, Self::U32 | Self::I32 | Self::F32)
    }

    /// Next format in menu order (wraps around).
    pub fn next(self) -> Self {
        match self {
            Self::Bin => Self::U16,
            Self::U16 => Self::I16,
            Self::I16 => Self::Hex,
            Self::Hex => Self::Ascii,
            Self::Ascii => Self::U32,
            Self::U32 => Self::I32,
            Self::I32 => Self::F32,
            Self::F32 => Self::Bin,
        }
    }

    /// Previous format in menu order (wraps around).
    pub fn prev(self) -> Self {
        match self {
            Self::Bin => Self::F32,
            Self::U16 => Self::Bin,
            Self::I16 => Self::U16,
            Self::Hex => Self::I16,
            Self::Ascii => Self::Hex,
            Self::U32 => Self::Ascii,
            Self::I32 => Self::U32,
            Self::F32 => Self::I32,
        }
    }
}

/// Which word of an even/odd pair carries the low 16 bits of a combined
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    /// The even address holds the low word (MELSEC convention).
    #[default]
    LowFirst,
    /// The even address holds the high word.
    HighFirst,
}

impl WordOrder {
    /// Combine the words at the even and odd address into one 32-bit value.
    pub fn combine(self, even: u16, odd: u16) -> u32 {
        let (low, high) = match self {
            Self::LowFirst => (even, odd),
            Self::HighFirst => (odd, even),
        };
        (u32::from(high) << 16) | u32::from(low)
    }

    /// Split a 32-bit value into `[even, odd]` words.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn split(self, value: u32) -> [u16; 2] {
        let low = (value & 0xFFFF) as u16;
        let high = (value >> 16) as u16;
        match self {
            Self::LowFirst => [low, high],
            Self::HighFirst => [high, low],
        }
    }
}
