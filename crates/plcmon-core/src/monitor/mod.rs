// ── Monitor engine ──
//
// Session lifecycle for one monitor view: picks the update channel,
// starts and stops the backend service and monitoring, owns the word cache
// and row index, and pushes render output to the view sink.

mod edit;
mod reconcile;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use strum::Display;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::backend::{CommandSink, EventSource};
use crate::config::{MockSettings, MonitorConfig};
use crate::error::CoreError;
use crate::log::{LogEntry, LogLevel, SessionLog};
use crate::model::{DeviceAddress, DisplayFormat, EditPosition, ServerStatus};
use crate::prefs::Preferences;
use crate::render::render_row;
use crate::selection::SelectionState;
use crate::store::{RowIndex, WordCache};
use crate::view::ViewSink;

use reconcile::Task;

/// How word updates reach the cache for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum UpdateChannel {
    /// Backend pushes `monitor` events.
    Events,
    /// The engine polls `get_words` on a timer.
    Polling,
}

/// The engine facade.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Background tasks (the event
/// bridge and the poll timer) hold clones; [`shutdown`](Self::shutdown)
/// stops them.
pub struct Monitor<C: CommandSink> {
    inner: Arc<MonitorInner<C>>,
}

impl<C: CommandSink> Clone for Monitor<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct MonitorInner<C> {
    config: MonitorConfig,
    sink: C,
    view: Arc<dyn ViewSink>,
    prefs: Arc<dyn Preferences>,
    cache: WordCache,
    rows: RowIndex,
    format: watch::Sender<DisplayFormat>,
    selection: watch::Sender<SelectionState>,
    /// Set once per session by `start_session` (or the first monitor start).
    channel: OnceLock<UpdateChannel>,
    target: watch::Sender<Option<DeviceAddress>>,
    status: watch::Sender<ServerStatus>,
    server_running: watch::Sender<bool>,
    monitoring: watch::Sender<bool>,
    /// Bumped by every monitoring start and stop. A start that finds a
    /// newer value once its prefetch returns has been superseded.
    epoch: AtomicU64,
    /// The poll timer. At most one exists at a time.
    poller: Mutex<Option<Task>>,
    bridge: Mutex<Option<Task>>,
    cancel: CancellationToken,
    log: SessionLog,
}

impl<C: CommandSink> Monitor<C> {
    /// Create an engine. Nothing talks to the backend until
    /// [`start_session`](Self::start_session).
    pub fn new(
        config: MonitorConfig,
        sink: C,
        view: Arc<dyn ViewSink>,
        prefs: Arc<dyn Preferences>,
    ) -> Self {
        let format = prefs.display_format().unwrap_or_default();
        let log = SessionLog::new(config.session_log_capacity);
        Self {
            inner: Arc::new(MonitorInner {
                config,
                sink,
                view,
                prefs,
                cache: WordCache::new(),
                rows: RowIndex::new(),
                format: watch::Sender::new(format),
                selection: watch::Sender::new(SelectionState::Idle),
                channel: OnceLock::new(),
                target: watch::Sender::new(None),
                status: watch::Sender::new(ServerStatus::Stopped),
                server_running: watch::Sender::new(false),
                monitoring: watch::Sender::new(false),
                epoch: AtomicU64::new(0),
                poller: Mutex::new(None),
                bridge: Mutex::new(None),
                cancel: CancellationToken::new(),
                log,
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn sink(&self) -> &C {
        &self.inner.sink
    }

    pub fn cache(&self) -> &WordCache {
        &self.inner.cache
    }

    pub fn rows(&self) -> &RowIndex {
        &self.inner.rows
    }

    pub fn format(&self) -> DisplayFormat {
        *self.inner.format.borrow()
    }

    pub fn subscribe_format(&self) -> watch::Receiver<DisplayFormat> {
        self.inner.format.subscribe()
    }

    pub fn selection(&self) -> SelectionState {
        self.inner.selection.borrow().clone()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<SelectionState> {
        self.inner.selection.subscribe()
    }

    /// The channel chosen for this session, once chosen.
    pub fn channel(&self) -> Option<UpdateChannel> {
        self.inner.channel.get().copied()
    }

    pub fn target(&self) -> Option<DeviceAddress> {
        self.inner.target.borrow().clone()
    }

    pub fn status(&self) -> ServerStatus {
        self.inner.status.borrow().clone()
    }

    /// Observe the start/stop toggle of the backend service.
    pub fn server_running(&self) -> watch::Receiver<bool> {
        self.inner.server_running.subscribe()
    }

    pub fn is_server_running(&self) -> bool {
        *self.inner.server_running.borrow()
    }

    pub fn is_monitoring(&self) -> bool {
        *self.inner.monitoring.borrow()
    }

    pub fn session_log(&self) -> Vec<LogEntry> {
        self.inner.log.entries()
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Pick the update channel for this session.
    ///
    /// Tries to subscribe to `events`; on success a bridge task feeds
    /// notifications into the engine, otherwise the session polls. The
    /// choice is made once: later calls return the existing mode.
    pub async fn start_session<E: EventSource>(&self, events: &E) -> UpdateChannel {
        let mut bridge = self.inner.bridge.lock().await;
        if let Some(mode) = self.channel() {
            return mode;
        }

        let mode = if self.inner.config.force_polling {
            info!("event channel disabled by configuration");
            UpdateChannel::Polling
        } else {
            match events.subscribe().await {
                Ok(rx) => {
                    *bridge = Some(self.spawn_event_bridge(rx));
                    UpdateChannel::Events
                }
                Err(e) => {
                    warn!(error = %e, "event channel unavailable, polling instead");
                    self.log(LogLevel::Warn, format!("{e}; falling back to polling"));
                    UpdateChannel::Polling
                }
            }
        };
        let mode = *self.inner.channel.get_or_init(|| mode);
        info!(%mode, "update channel selected");
        mode
    }

    /// Start the service and monitoring if the auto-start preference is
    /// set. Returns whether anything was started.
    pub async fn auto_start(&self, settings: &MockSettings, target: &str) -> Result<bool, CoreError> {
        if !self.inner.prefs.auto_start() {
            return Ok(false);
        }
        info!(token = target, "auto-start");
        self.start_server(settings).await?;
        self.start_monitoring(target).await?;
        Ok(true)
    }

    /// Stop background tasks. The engine is unusable afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.stop_polling().await;
        if let Some(task) = self.inner.bridge.lock().await.take() {
            task.stop().await;
        }
        debug!("monitor shut down");
    }

    // ── Backend service ──────────────────────────────────────────

    /// Start the backend service. The running flag flips immediately and
    /// is reverted if the command fails.
    pub async fn start_server(&self, settings: &MockSettings) -> Result<(), CoreError> {
        self.inner.server_running.send_replace(true);
        match self.inner.sink.start_mock(settings).await {
            Ok(()) => {
                self.set_status(ServerStatus::Running);
                self.log(
                    LogLevel::Info,
                    format!("server started on {}:{}", settings.ip, settings.tcp_port),
                );
                Ok(())
            }
            Err(e) => {
                self.inner.server_running.send_replace(false);
                warn!(error = %e, "server start failed");
                self.log(LogLevel::Error, format!("server start failed: {e}"));
                Err(e)
            }
        }
    }

    pub async fn stop_server(&self) -> Result<(), CoreError> {
        let was = self.inner.server_running.send_replace(false);
        match self.inner.sink.stop_mock().await {
            Ok(()) => {
                self.set_status(ServerStatus::Stopped);
                self.log(LogLevel::Info, "server stopped");
                Ok(())
            }
            Err(e) => {
                self.inner.server_running.send_replace(was);
                warn!(error = %e, "server stop failed");
                self.log(LogLevel::Error, format!("server stop failed: {e}"));
                Err(e)
            }
        }
    }

    // ── Monitoring ───────────────────────────────────────────────

    /// Record the target the view points at without starting anything.
    pub fn set_target(&self, token: &str) -> Result<DeviceAddress, CoreError> {
        let target = parse_target(token, self.inner.config.row_count).inspect_err(|e| {
            self.log(LogLevel::Error, e.to_string());
        })?;
        self.replace_target(&target);
        Ok(target)
    }

    /// Start monitoring `row_count` words from the target token.
    ///
    /// Creates the rows, fetches their current values once, then hands
    /// over to the session's update channel. A bad token is rejected
    /// before anything reaches the backend. If monitoring is stopped or
    /// restarted while the prefetch is in flight, this start hands over
    /// nothing.
    pub async fn start_monitoring(&self, token: &str) -> Result<(), CoreError> {
        let target = self.set_target(token)?;
        let count = self.inner.config.row_count;
        let mode = *self.inner.channel.get_or_init(|| {
            debug!("no session channel chosen, defaulting to polling");
            UpdateChannel::Polling
        });
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        self.stop_polling().await;
        self.inner.monitoring.send_replace(true);
        self.create_rows(&target, count);
        self.prefetch(&target, count).await;

        // A stop bumps the epoch before it takes the timer slot, so holding
        // the slot here orders the check and the hand-over against it.
        let mut slot = self.inner.poller.lock().await;
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!(addr = %target, "monitoring start superseded");
            return Ok(());
        }

        match mode {
            UpdateChannel::Events => {
                let interval = self.inner.config.monitor_interval;
                if let Err(e) = self.inner.sink.start_monitor(&target.to_string(), interval).await {
                    self.inner.monitoring.send_replace(false);
                    warn!(error = %e, addr = %target, "start_monitor failed");
                    self.log(LogLevel::Error, format!("monitor start failed: {e}"));
                    return Err(e);
                }
            }
            UpdateChannel::Polling => self.start_polling(&mut slot, target.clone(), count).await,
        }
        drop(slot);

        info!(addr = %target, %mode, "monitoring started");
        self.log(LogLevel::Info, format!("monitoring {target} ({mode})"));
        Ok(())
    }

    pub async fn stop_monitoring(&self) -> Result<(), CoreError> {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.stop_polling().await;
        let was = self.inner.monitoring.send_replace(false);
        if self.channel() == Some(UpdateChannel::Events) {
            if let Err(e) = self.inner.sink.stop_monitor().await {
                self.inner.monitoring.send_replace(was);
                warn!(error = %e, "stop_monitor failed");
                self.log(LogLevel::Error, format!("monitor stop failed: {e}"));
                return Err(e);
            }
        }
        info!("monitoring stopped");
        self.log(LogLevel::Info, "monitoring stopped");
        Ok(())
    }

    // ── Display ──────────────────────────────────────────────────

    /// Switch the display format, persist it, and re-render every row.
    pub fn set_format(&self, format: DisplayFormat) {
        self.inner.format.send_replace(format);
        if let Err(e) = self.inner.prefs.set_display_format(format) {
            warn!(error = %e, "failed to save display format");
            self.log(LogLevel::Warn, format!("could not save display format: {e}"));
        }
        self.rerender_all();
    }

    pub fn cycle_format(&self, forward: bool) -> DisplayFormat {
        let current = self.format();
        let next = if forward { current.next() } else { current.prev() };
        self.set_format(next);
        next
    }

    /// Forget every word, row, and the selection.
    pub fn reset_view(&self) {
        self.inner.cache.clear();
        self.inner.rows.clear();
        self.inner.view.rows_cleared();
        self.update_selection(|s| {
            let changed = *s != SelectionState::Idle;
            *s = SelectionState::Idle;
            changed
        });
        debug!("view reset");
    }

    // ── Preferences ──────────────────────────────────────────────

    pub fn auto_start_enabled(&self) -> bool {
        self.inner.prefs.auto_start()
    }

    pub fn set_auto_start(&self, enabled: bool) {
        if let Err(e) = self.inner.prefs.set_auto_start(enabled) {
            warn!(error = %e, "failed to save auto-start flag");
            self.log(LogLevel::Warn, format!("could not save auto-start: {e}"));
        }
    }

    pub fn edit_position(&self) -> Option<EditPosition> {
        self.inner.prefs.edit_position()
    }

    pub fn set_edit_position(&self, position: EditPosition) {
        if let Err(e) = self.inner.prefs.set_edit_position(position) {
            warn!(error = %e, "failed to save edit position");
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = self.inner.log.push(level, message);
        self.inner.view.log_appended(&entry);
    }

    fn set_status(&self, status: ServerStatus) {
        match status {
            ServerStatus::Running => {
                self.inner.server_running.send_replace(true);
            }
            ServerStatus::Stopped => {
                self.inner.server_running.send_replace(false);
            }
            ServerStatus::Other(_) => {}
        }
        self.inner.view.status_changed(&status);
        self.inner.status.send_replace(status);
    }

    fn replace_target(&self, target: &DeviceAddress) {
        self.inner.target.send_replace(Some(target.clone()));
        self.inner.view.target_changed(Some(target));
    }

    fn render(&self, addr: &DeviceAddress) {
        let row = render_row(
            addr,
            self.format(),
            self.inner.config.word_order,
            &self.inner.cache,
        );
        self.inner.view.row_rendered(&row);
    }

    fn rerender_all(&self) {
        for addr in self.inner.rows.snapshot().iter() {
            self.render(addr);
        }
    }

    fn create_rows(&self, start: &DeviceAddress, count: usize) {
        for addr in self.inner.rows.extend(start, count) {
            self.render(&addr);
        }
    }

    /// Apply `f` to the selection and tell the view if it changed.
    fn update_selection(&self, f: impl FnOnce(&mut SelectionState) -> bool) -> bool {
        let changed = self.inner.selection.send_if_modified(f);
        if changed {
            let snapshot = self.selection();
            self.inner.view.selection_changed(&snapshot);
        }
        changed
    }
}

/// Parse a target token whose row window fits in the address space.
fn parse_target(token: &str, rows: usize) -> Result<DeviceAddress, CoreError> {
    let target = token.parse::<DeviceAddress>()?;
    if target.offset(rows.saturating_sub(1)).is_none() {
        return Err(CoreError::InvalidAddress {
            token: token.trim().to_owned(),
        });
    }
    Ok(target)
}
