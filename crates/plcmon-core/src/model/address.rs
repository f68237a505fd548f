// ── Device addresses ──
//
// A device address names one 16-bit word: an alphabetic device key
// (`D`, `W`, `R`, ...) plus a numeric offset within that device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A `(key, addr)` pair identifying one word in the PLC address space.
///
/// Keys are stored uppercase. Ordering is by key, then address, which is
/// also the row order of the monitor view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress {
    key: String,
    addr: usize,
}

impl DeviceAddress {
    /// Build an address from an already-validated key.
    ///
    /// Returns `None` if the key is empty or contains non-alphabetic
    /// characters.
    pub fn new(key: &str, addr: usize) -> Option<Self> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self {
            key: key.to_ascii_uppercase(),
            addr,
        })
    }

    /// Parse a human-entered target token such as `"D100"` or `"WFF"`.
    pub fn parse(token: &str) -> Option<Self> {
        parse(token)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Canonical cache key, `"{key}:{addr}"`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.key, self.addr)
    }

    /// The address `n` words further along the same device, or `None`
    /// past the end of the address space.
    pub fn offset(&self, n: usize) -> Option<Self> {
        Some(Self {
            key: self.key.clone(),
            addr: self.addr.checked_add(n)?,
        })
    }

    /// The `count` consecutive addresses starting here, or `None` if the
    /// run would leave the address space.
    pub fn span(&self, count: usize) -> Option<Vec<Self>> {
        (0..count).map(|i| self.offset(i)).collect()
    }

    pub fn is_even(&self) -> bool {
        self.addr % 2 == 0
    }

    /// The even-aligned low-word address of the pair containing `self`.
    pub fn pair_base(&self) -> Self {
        Self {
            key: self.key.clone(),
            addr: self.addr - self.addr % 2,
        }
    }

    /// The other half of the even/odd pair containing `self`.
    pub fn partner(&self) -> Self {
        Self {
            key: self.key.clone(),
            addr: self.addr ^ 1,
        }
    }
}

/// Renders the target form used by the backend, e.g. `D100`.
impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.key, self.addr)
    }
}

impl FromStr for DeviceAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s).ok_or_else(|| CoreError::InvalidAddress {
            token: s.to_owned(),
        })
    }
}

/// Parse a target token into a [`DeviceAddress`].
///
/// The leading alphabetic run is the device key and the remainder is the
/// address literal. A literal containing any of `A`-`F` is read as
/// hexadecimal, otherwise decimal. When the alphabetic run swallows the
/// whole token (`"WFF"`), the first character is taken as the key and the
/// rest as a hex literal.
pub fn parse(token: &str) -> Option<DeviceAddress> {
    let token = token.trim().to_ascii_uppercase();
    let key_len = token
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .count();
    if key_len == 0 {
        return None;
    }

    let (mut key, mut literal) = token.split_at(key_len);
    if literal.is_empty() {
        if key_len == 1 {
            return None;
        }
        (key, literal) = token.split_at(1);
    }

    let addr = parse_literal(literal)?;
    DeviceAddress::new(key, addr)
}

fn parse_literal(literal: &str) -> Option<usize> {
    if literal.is_empty() || !literal.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let radix = if literal.bytes().any(|b| matches!(b, b'A'..=b'F')) {
        16
    } else {
        10
    };
    usize::from_str_radix(literal, radix).ok()
}
