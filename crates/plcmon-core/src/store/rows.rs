// ── Row index ──
//
// The set of row identities the view currently shows. Rows are created
// lazily as words are observed, or in bulk when monitoring starts.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::model::DeviceAddress;

/// Ordered set of monitor rows with a `watch` snapshot for subscribers.
pub struct RowIndex {
    rows: watch::Sender<Arc<BTreeSet<DeviceAddress>>>,
}

impl RowIndex {
    pub fn new() -> Self {
        let (rows, _) = watch::channel(Arc::new(BTreeSet::new()));
        Self { rows }
    }

    /// Register a row. Returns `true` if it did not exist yet.
    pub fn insert(&self, addr: &DeviceAddress) -> bool {
        self.rows.send_if_modified(|rows| {
            if rows.contains(addr) {
                false
            } else {
                Arc::make_mut(rows).insert(addr.clone());
                true
            }
        })
    }

    /// Register `count` consecutive rows starting at `start`. Returns the
    /// addresses in order, whether or not they already existed. Rows past
    /// the end of the address space are not created.
    pub fn extend(&self, start: &DeviceAddress, count: usize) -> Vec<DeviceAddress> {
        let addrs: Vec<DeviceAddress> = (0..count).map_while(|i| start.offset(i)).collect();
        self.rows.send_modify(|rows| {
            let set = Arc::make_mut(rows);
            for a in &addrs {
                set.insert(a.clone());
            }
        });
        addrs
    }

    pub fn contains(&self, addr: &DeviceAddress) -> bool {
        self.rows.borrow().contains(addr)
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.rows.send_modify(|rows| *rows = Arc::new(BTreeSet::new()));
    }

    /// Current rows in view order (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<BTreeSet<DeviceAddress>> {
        self.rows.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BTreeSet<DeviceAddress>>> {
        self.rows.subscribe()
    }

    /// The row `delta` positions away from `from`, clamped to the ends.
    ///
    /// Returns `None` only when there are no rows. If `from` is not a row,
    /// navigation starts from the first row.
    pub fn step(&self, from: Option<&DeviceAddress>, delta: isize) -> Option<DeviceAddress> {
        let rows = self.rows.borrow();
        let last = rows.len().checked_sub(1)?;
        let current = from
            .and_then(|addr| rows.iter().position(|r| r == addr))
            .map_or(0, |idx| idx.saturating_add_signed(delta).min(last));
        rows.iter().nth(current).cloned()
    }
}

impl Default for RowIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(n: usize) -> DeviceAddress {
        DeviceAddress::new("D", n).unwrap()
    }

    #[test]
    fn extend_creates_distinct_consecutive_rows() {
        let rows = RowIndex::new();
        let created = rows.extend(&d(0), 30);
        assert_eq!(created.len(), 30);
        assert_eq!(rows.len(), 30);
        let names: Vec<String> = rows.snapshot().iter().map(ToString::to_string).collect();
        assert_eq!(names.first().unwrap(), "D0");
        assert_eq!(names.last().unwrap(), "D29");
    }

    #[test]
    fn insert_is_idempotent() {
        let rows = RowIndex::new();
        assert!(rows.insert(&d(3)));
        assert!(!rows.insert(&d(3)));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn step_clamps_at_both_ends() {
        let rows = RowIndex::new();
        rows.extend(&d(0), 3);
        assert_eq!(rows.step(Some(&d(1)), 1), Some(d(2)));
        assert_eq!(rows.step(Some(&d(2)), 1), Some(d(2)));
        assert_eq!(rows.step(Some(&d(0)), -1), Some(d(0)));
        assert_eq!(rows.step(None, 1), Some(d(0)));
    }

    #[test]
    fn step_on_empty_index_is_none() {
        let rows = RowIndex::new();
        assert_eq!(rows.step(None, 1), None);
    }

    #[test]
    fn subscribers_see_new_rows() {
        let rows = RowIndex::new();
        let mut rx = rows.subscribe();
        rows.insert(&d(0));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        rows.insert(&d(0));
        assert!(!rx.has_changed().unwrap());
    }
}
