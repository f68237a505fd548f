//! Device word monitor engine.
//!
//! Keeps a live, formatted view of a window of PLC word memory and lets a
//! user edit individual words:
//!
//! - **[`Monitor`]**: Central facade. [`start_session()`](Monitor::start_session)
//!   picks the update channel once (backend push events, or a polling
//!   fallback when the event source refuses a subscription), then
//!   [`start_monitoring()`](Monitor::start_monitoring) creates the rows,
//!   prefetches their words, and keeps them current.
//!
//! - **[`WordCache`]**: Sparse `DashMap` of 16-bit words keyed by
//!   [`DeviceAddress`], with a `watch` version counter for observers.
//!
//! - **Format interpreter** ([`render`]): Pure computation of a
//!   [`RowState`] (bit cells, formatted value, raw hex, suppression) from the
//!   cache under a [`DisplayFormat`]. The 32-bit formats pair an even/odd
//!   word into one value anchored at the even row.
//!
//! - **Edit workflow**: Idle / Selected / Editing ([`SelectionState`]).
//!   [`codec`] turns the edit literal into words; commits update the cache
//!   optimistically before the backend write completes.
//!
//! - **Backend seams** ([`CommandSink`], [`EventSource`]) plus an in-process
//!   [`MemoryBackend`] that implements both.
//!
//! - **View seam** ([`ViewSink`]): the engine pushes render output; views
//!   never read the cache.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod log;
pub mod model;
pub mod monitor;
pub mod prefs;
pub mod render;
pub mod selection;
pub mod store;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{CommandSink, EventSource, MemoryBackend, NoEvents, Operation};
pub use codec::{EncodedWrite, encode_write};
pub use config::{MockSettings, MonitorConfig};
pub use error::CoreError;
pub use log::{LogEntry, LogLevel, SessionLog};
pub use monitor::{Monitor, UpdateChannel};
pub use prefs::{MemoryPreferences, Preferences};
pub use render::render_row;
pub use selection::{EditSession, SelectionState};
pub use store::{RowIndex, WordCache};
pub use view::{NullView, ViewSink};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BackendEvent, DeviceAddress, DisplayFormat, EditPosition, MonitorPayload, RowState,
    ServerStatus, WordOrder,
};
