// ── View sink ──
//
// The thin seam between the engine and whatever draws it. The engine
// computes complete `RowState`s and pushes them here; a view never reads
// the word cache.

use crate::log::LogEntry;
use crate::model::{DeviceAddress, RowState, ServerStatus};
use crate::selection::SelectionState;

/// Receives render output from the engine.
///
/// Calls are synchronous and made from whichever task produced the
/// change, so implementations should hand the data off (e.g. over a
/// channel) rather than draw inline.
pub trait ViewSink: Send + Sync {
    /// A row was created or its display state changed.
    fn row_rendered(&self, row: &RowState);

    /// All rows were removed.
    fn rows_cleared(&self) {}

    fn selection_changed(&self, _selection: &SelectionState) {}

    fn status_changed(&self, _status: &ServerStatus) {}

    fn log_appended(&self, _entry: &LogEntry) {}

    /// The monitor target changed (monitoring started on a new address).
    fn target_changed(&self, _target: Option<&DeviceAddress>) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl ViewSink for NullView {
    fn row_rendered(&self, _row: &RowState) {}
}
