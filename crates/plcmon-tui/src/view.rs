//! Engine-to-UI bridge: forwards every view callback as an [`Action`].

use tokio::sync::mpsc;

use plcmon_core::{DeviceAddress, LogEntry, RowState, SelectionState, ServerStatus, ViewSink};

use crate::action::Action;

/// A [`ViewSink`] that queues engine output on the app's action channel.
///
/// Engine callbacks arrive from background tasks; the app loop applies
/// them on its own turn. Sends after the app has exited are dropped.
pub struct ChannelView {
    tx: mpsc::UnboundedSender<Action>,
}

impl ChannelView {
    pub fn new(tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { tx }
    }

    fn send(&self, action: Action) {
        let _ = self.tx.send(action);
    }
}

impl ViewSink for ChannelView {
    fn row_rendered(&self, row: &RowState) {
        self.send(Action::RowRendered(row.clone()));
    }

    fn rows_cleared(&self) {
        self.send(Action::RowsCleared);
    }

    fn selection_changed(&self, selection: &SelectionState) {
        self.send(Action::SelectionChanged(selection.clone()));
    }

    fn status_changed(&self, status: &ServerStatus) {
        self.send(Action::StatusChanged(status.clone()));
    }

    fn log_appended(&self, entry: &LogEntry) {
        self.send(Action::LogAppended(entry.clone()));
    }

    fn target_changed(&self, target: Option<&DeviceAddress>) {
        self.send(Action::TargetChanged(target.cloned()));
    }
}
