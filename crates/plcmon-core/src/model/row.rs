use serde::{Deserialize, Serialize};

use super::DeviceAddress;

/// Computed display state for one monitor row.
///
/// Produced by [`render_row`](crate::render::render_row) and handed to the
/// view sink. Carries everything a view needs; views never read the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowState {
    pub address: DeviceAddress,
    /// Bit 15 first, bit 0 last.
    pub bits: [bool; 16],
    /// Value rendered in the active display format.
    pub formatted: String,
    /// `0x`-prefixed hex of the word (or of the combined 32-bit value).
    pub raw: String,
    /// Consumed by a neighbouring combined value; has no content of its own.
    pub suppressed: bool,
}

impl RowState {
    /// Whether bit `n` (0 = least significant) is set.
    pub fn bit(&self, n: usize) -> bool {
        n < 16 && self.bits[15 - n]
    }
}

/// Saved screen position of the edit surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditPosition {
    pub x: u16,
    pub y: u16,
}
