// ── Runtime monitor configuration ──
//
// These types describe how the engine polls, renders, and launches the
// backend. They never touch disk: the config crate or the caller builds
// them and hands them to `Monitor::new`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::WordOrder;

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Period of the polling fallback.
    pub poll_interval: Duration,
    /// Push interval requested from the backend in event mode.
    pub monitor_interval: Duration,
    /// Rows created (and words fetched) when monitoring starts.
    pub row_count: usize,
    pub select_retry_attempts: u32,
    pub select_retry_backoff: Duration,
    /// Which half of an even/odd pair carries the low 16 bits.
    pub word_order: WordOrder,
    pub session_log_capacity: usize,
    /// Skip the event channel and poll for the whole session.
    pub force_polling: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            monitor_interval: Duration::from_millis(500),
            row_count: 30,
            select_retry_attempts: 10,
            select_retry_backoff: Duration::from_millis(50),
            word_order: WordOrder::LowFirst,
            session_log_capacity: 200,
            force_polling: false,
        }
    }
}

/// Launch settings for the backend PLC service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockSettings {
    pub ip: String,
    pub tcp_port: u16,
    #[serde(default)]
    pub udp_port: Option<u16>,
    /// Artificial response delay applied by the service, in milliseconds.
    #[serde(default)]
    pub tim_await_ms: Option<u64>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".into(),
            tcp_port: 5000,
            udp_port: None,
            tim_await_ms: None,
        }
    }
}
