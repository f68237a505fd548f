// ── Domain model ──
//
// Canonical types shared by the store, the renderer, and the view layer.

pub mod address;
pub mod event;
pub mod format;
pub mod row;

pub use address::DeviceAddress;
pub use event::{BackendEvent, MONITOR_EVENT, MonitorPayload, STATUS_EVENT, ServerStatus};
pub use format::{DisplayFormat, WordOrder};
pub use row::{EditPosition, RowState};
