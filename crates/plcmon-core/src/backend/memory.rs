// ── In-process PLC backend ──
//
// A word store keyed by device area that implements both backend
// contracts. Used as the mock server in the TUI and as the backend for
// engine tests: it pushes `monitor` events on an interval, reports its
// service state over `server-status`, and can be told to fail individual
// operations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CommandSink, EventSource};
use crate::config::MockSettings;
use crate::error::CoreError;
use crate::model::{BackendEvent, DeviceAddress, MonitorPayload};

/// Number of words in each backend `monitor` push.
pub const MONITOR_WINDOW: usize = 30;

const EVENT_CAPACITY: usize = 256;

/// Backend operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartMock,
    StopMock,
    StartMonitor,
    StopMonitor,
    GetWords,
    SetWords,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::StartMock => "start_mock",
            Self::StopMock => "stop_mock",
            Self::StartMonitor => "start_monitor",
            Self::StopMonitor => "stop_monitor",
            Self::GetWords => "get_words",
            Self::SetWords => "set_words",
        }
    }
}

/// Cheaply cloneable handle to the in-process backend.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    /// Written words per device key. Unwritten addresses read as zero.
    areas: DashMap<String, BTreeMap<usize, u16>>,
    events: broadcast::Sender<BackendEvent>,
    events_enabled: AtomicBool,
    running: AtomicBool,
    settings: Mutex<Option<MockSettings>>,
    response_delay_ms: AtomicU64,
    failures: DashSet<Operation>,
    push: Mutex<Option<PushTask>>,
    calls: DashMap<&'static str, usize>,
}

struct PushTask {
    target: DeviceAddress,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                areas: DashMap::new(),
                events,
                events_enabled: AtomicBool::new(true),
                running: AtomicBool::new(false),
                settings: Mutex::new(None),
                response_delay_ms: AtomicU64::new(0),
                failures: DashSet::new(),
                push: Mutex::new(None),
                calls: DashMap::new(),
            }),
        }
    }

    /// A backend whose event channel refuses subscriptions.
    pub fn without_events() -> Self {
        let backend = Self::new();
        backend.inner.events_enabled.store(false, Ordering::Relaxed);
        backend
    }

    // ── Test and demo controls ───────────────────────────────────────

    /// Make `op` fail (or succeed again) until told otherwise.
    pub fn fail(&self, op: Operation, enabled: bool) {
        if enabled {
            self.inner.failures.insert(op);
        } else {
            self.inner.failures.remove(&op);
        }
    }

    /// Write words directly into the store, bypassing the command surface.
    /// No event is emitted.
    pub fn poke(&self, key: &str, addr: usize, words: &[u16]) {
        self.inner.write(key, addr, words);
    }

    /// Read words directly from the store.
    pub fn peek(&self, key: &str, addr: usize, count: usize) -> Vec<u16> {
        self.inner.read(key, addr, count)
    }

    /// Inject a raw notification, as if the backend had emitted it.
    pub fn emit(&self, event: BackendEvent) {
        self.inner.emit(event);
    }

    /// How many times a command has been invoked.
    pub fn calls(&self, op: Operation) -> usize {
        self.inner.calls.get(op.name()).map_or(0, |c| *c)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Relaxed)
    }

    /// Settings from the last successful `start_mock`.
    pub async fn settings(&self) -> Option<MockSettings> {
        self.inner.settings.lock().await.clone()
    }

    /// Target of the active push task, if any.
    pub async fn monitor_target(&self) -> Option<DeviceAddress> {
        self.inner.push.lock().await.as_ref().map(|p| p.target.clone())
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn enter(&self, op: Operation) -> Result<(), CoreError> {
        *self.inner.calls.entry(op.name()).or_insert(0) += 1;
        let delay = self.inner.response_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.inner.failures.contains(&op) {
            return Err(CoreError::transport(op.name(), "injected failure"));
        }
        Ok(())
    }

    async fn stop_push(&self) {
        if let Some(task) = self.inner.push.lock().await.take() {
            task.cancel.cancel();
            let _ = task.handle.await;
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn read(&self, key: &str, addr: usize, count: usize) -> Vec<u16> {
        let key = key.to_ascii_uppercase();
        let Some(area) = self.areas.get(&key) else {
            return vec![0; count];
        };
        (0..count)
            .map(|i| {
                addr.checked_add(i)
                    .and_then(|a| area.get(&a).copied())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Store `words` from `addr` on. Words past the end of the address
    /// space are dropped.
    fn write(&self, key: &str, addr: usize, words: &[u16]) {
        let mut area = self.areas.entry(key.to_ascii_uppercase()).or_default();
        for (i, word) in words.iter().enumerate() {
            let Some(a) = addr.checked_add(i) else {
                break;
            };
            area.insert(a, *word);
        }
    }

    fn emit(&self, event: BackendEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn push_window(&self, target: &DeviceAddress) {
        let vals = self
            .read(target.key(), target.addr(), MONITOR_WINDOW)
            .into_iter()
            .map(u32::from)
            .collect();
        self.emit(BackendEvent::monitor(&MonitorPayload {
            key: target.key().to_owned(),
            addr: target.addr(),
            vals,
        }));
    }
}

/// Resolve a device key that may carry an embedded address (`D100`).
///
/// A plain key uses `addr` as given. A combined key supplies its own
/// address unless the caller passed a non-zero one, which wins.
fn resolve(key: &str, addr: usize) -> Result<(String, usize), CoreError> {
    let trimmed = key.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok((trimmed.to_ascii_uppercase(), addr));
    }
    let parsed = DeviceAddress::parse(trimmed).ok_or_else(|| CoreError::InvalidAddress {
        token: key.to_owned(),
    })?;
    if addr != 0 && addr != parsed.addr() {
        warn!(key, addr, "explicit address overrides combined key");
        return Ok((parsed.key().to_owned(), addr));
    }
    Ok((parsed.key().to_owned(), parsed.addr()))
}

impl CommandSink for MemoryBackend {
    async fn start_mock(&self, settings: &MockSettings) -> Result<(), CoreError> {
        self.enter(Operation::StartMock).await?;
        let already = self.inner.running.swap(true, Ordering::Relaxed);
        if already {
            debug!("mock server already running");
        } else {
            info!(ip = %settings.ip, tcp_port = settings.tcp_port, "mock server started");
            self.inner
                .response_delay_ms
                .store(settings.tim_await_ms.unwrap_or(0), Ordering::Relaxed);
            *self.inner.settings.lock().await = Some(settings.clone());
        }
        self.inner.emit(BackendEvent::status("running"));
        Ok(())
    }

    async fn stop_mock(&self) -> Result<(), CoreError> {
        self.enter(Operation::StopMock).await?;
        if self.inner.running.swap(false, Ordering::Relaxed) {
            info!("mock server stopped");
        }
        self.inner.response_delay_ms.store(0, Ordering::Relaxed);
        self.inner.emit(BackendEvent::status("stopped"));
        Ok(())
    }

    async fn start_monitor(&self, target: &str, interval: Duration) -> Result<(), CoreError> {
        self.enter(Operation::StartMonitor).await?;
        let target = DeviceAddress::parse(target).ok_or_else(|| CoreError::InvalidAddress {
            token: target.to_owned(),
        })?;
        self.stop_push().await;

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_target = target.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    _ = ticker.tick() => inner.push_window(&task_target),
                }
            }
            debug!(addr = %task_target, "monitor push task exiting");
        });

        info!(addr = %target, ?interval, "backend monitor started");
        *self.inner.push.lock().await = Some(PushTask {
            target,
            cancel,
            handle,
        });
        Ok(())
    }

    async fn stop_monitor(&self) -> Result<(), CoreError> {
        self.enter(Operation::StopMonitor).await?;
        self.stop_push().await;
        Ok(())
    }

    async fn get_words(&self, key: &str, addr: usize, count: usize) -> Result<Vec<u16>, CoreError> {
        self.enter(Operation::GetWords).await?;
        let (key, addr) = resolve(key, addr)?;
        Ok(self.inner.read(&key, addr, count))
    }

    async fn set_words(&self, key: &str, addr: usize, words: &[u16]) -> Result<(), CoreError> {
        self.enter(Operation::SetWords).await?;
        let (key, addr) = resolve(key, addr)?;
        if addr.checked_add(words.len().saturating_sub(1)).is_none() {
            return Err(CoreError::InvalidAddress {
                token: format!("{key}{addr}+{}", words.len()),
            });
        }
        self.inner.write(&key, addr, words);
        debug!(%key, addr, count = words.len(), "words written");

        // Push the monitored window right away so subscribers see the write
        // without waiting for the next tick.
        if let Some(task) = self.inner.push.lock().await.as_ref() {
            self.inner.push_window(&task.target);
        }
        Ok(())
    }
}

impl EventSource for MemoryBackend {
    async fn subscribe(&self) -> Result<broadcast::Receiver<BackendEvent>, CoreError> {
        if self.inner.events_enabled.load(Ordering::Relaxed) {
            Ok(self.inner.events.subscribe())
        } else {
            Err(CoreError::SubscriptionDenied {
                reason: "event channel disabled".into(),
            })
        }
    }
}
