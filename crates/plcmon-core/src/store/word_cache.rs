// ── Word cache ──
//
// Concurrent storage for the last known value of every observed word,
// with push-based change notification via a `watch` version counter.

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::DeviceAddress;

/// The single source of truth for word values in a monitoring session.
///
/// Keyed by the canonical `"{key}:{addr}"` string. Entries appear on first
/// observation and are only removed by [`clear`](Self::clear).
pub struct WordCache {
    by_key: DashMap<String, (DeviceAddress, u16)>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,
}

impl WordCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            by_key: DashMap::new(),
            version,
        }
    }

    /// Current value at `addr`, if any has been observed.
    pub fn get(&self, addr: &DeviceAddress) -> Option<u16> {
        self.by_key.get(&addr.cache_key()).map(|r| r.value().1)
    }

    /// Store a value, masking it to 16 bits. Returns `true` if the entry
    /// was new.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn set(&self, addr: &DeviceAddress, value: impl Into<u32>) -> bool {
        let word = (value.into() & 0xFFFF) as u16;
        let is_new = self
            .by_key
            .insert(addr.cache_key(), (addr.clone(), word))
            .is_none();
        self.bump_version();
        is_new
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.by_key.clear();
        self.bump_version();
    }

    pub fn contains(&self, addr: &DeviceAddress) -> bool {
        self.by_key.contains_key(&addr.cache_key())
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// All cached addresses, sorted.
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        let mut out: Vec<DeviceAddress> = self.by_key.iter().map(|r| r.value().0.clone()).collect();
        out.sort();
        out
    }

    /// All entries, sorted by address.
    pub fn snapshot(&self) -> Vec<(DeviceAddress, u16)> {
        let mut out: Vec<(DeviceAddress, u16)> =
            self.by_key.iter().map(|r| r.value().clone()).collect();
        out.sort();
        out
    }

    /// Subscribe to the mutation counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn bump_version(&self) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for WordCache {
    fn default() -> Self {
        Self::new()
    }
}
