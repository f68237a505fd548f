//! All possible UI actions. Actions are the sole mechanism for state mutation.

use plcmon_core::{DeviceAddress, LogEntry, RowState, SelectionState, ServerStatus};

#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    Render,
    Resize(u16, u16),

    // ── Engine output ──
    RowRendered(RowState),
    RowsCleared,
    SelectionChanged(SelectionState),
    StatusChanged(ServerStatus),
    LogAppended(LogEntry),
    TargetChanged(Option<DeviceAddress>),
}
