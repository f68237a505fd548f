// ── Backend contracts ──
//
// The engine talks to the outside world through exactly two seams: a
// command sink it issues requests to, and an event source it may receive
// notifications from. Transport, protocol framing, and process plumbing
// all live behind these traits.

mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::MockSettings;
use crate::error::CoreError;
use crate::model::BackendEvent;

pub use memory::{MONITOR_WINDOW, MemoryBackend, Operation};

/// Outbound requests. Every call either completes or fails; none of them
/// touch engine state.
pub trait CommandSink: Send + Sync + 'static {
    /// Start the backend service.
    fn start_mock(
        &self,
        settings: &MockSettings,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Stop the backend service.
    fn stop_mock(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Ask the backend to push `monitor` events for `target` (e.g. `D100`).
    fn start_monitor(
        &self,
        target: &str,
        interval: Duration,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Stop backend pushes.
    fn stop_monitor(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Read `count` consecutive words.
    fn get_words(
        &self,
        key: &str,
        addr: usize,
        count: usize,
    ) -> impl Future<Output = Result<Vec<u16>, CoreError>> + Send;

    /// Write consecutive words starting at `addr`.
    fn set_words(
        &self,
        key: &str,
        addr: usize,
        words: &[u16],
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Inbound notifications (`monitor`, `server-status`).
pub trait EventSource: Send + Sync {
    /// Register for notifications. An error means the channel is
    /// unavailable for this session.
    fn subscribe(
        &self,
    ) -> impl Future<Output = Result<broadcast::Receiver<BackendEvent>, CoreError>> + Send;
}

/// An event source for backends without a push channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl EventSource for NoEvents {
    async fn subscribe(&self) -> Result<broadcast::Receiver<BackendEvent>, CoreError> {
        Err(CoreError::SubscriptionDenied {
            reason: "backend has no event channel".into(),
        })
    }
}

impl<T: CommandSink> CommandSink for Arc<T> {
    fn start_mock(
        &self,
        settings: &MockSettings,
    ) -> impl Future<Output = Result<(), CoreError>> + Send {
        (**self).start_mock(settings)
    }

    fn stop_mock(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        (**self).stop_mock()
    }

    fn start_monitor(
        &self,
        target: &str,
        interval: Duration,
    ) -> impl Future<Output = Result<(), CoreError>> + Send {
        (**self).start_monitor(target, interval)
    }

    fn stop_monitor(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        (**self).stop_monitor()
    }

    fn get_words(
        &self,
        key: &str,
        addr: usize,
        count: usize,
    ) -> impl Future<Output = Result<Vec<u16>, CoreError>> + Send {
        (**self).get_words(key, addr, count)
    }

    fn set_words(
        &self,
        key: &str,
        addr: usize,
        words: &[u16],
    ) -> impl Future<Output = Result<(), CoreError>> + Send {
        (**self).set_words(key, addr, words)
    }
}

impl<T: EventSource> EventSource for Arc<T> {
    fn subscribe(
        &self,
    ) -> impl Future<Output = Result<broadcast::Receiver<BackendEvent>, CoreError>> + Send {
        (**self).subscribe()
    }
}
