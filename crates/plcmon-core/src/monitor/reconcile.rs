// ── Update reconciliation ──
//
// Both channels end in `apply_words`: the event bridge decodes `monitor`
// payloads into it, the poll timer feeds it `get_words` results. Failures
// on either path are logged and dropped; the channel keeps running.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Monitor;
use crate::backend::CommandSink;
use crate::error::CoreError;
use crate::log::LogLevel;
use crate::model::{
    BackendEvent, DeviceAddress, MONITOR_EVENT, MonitorPayload, STATUS_EVENT, ServerStatus,
};

/// A cancellable background task.
pub(super) struct Task {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Task {
    /// Cancel and wait for the task to finish.
    pub(super) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "background task panicked");
            }
        }
    }
}

impl<C: CommandSink> Monitor<C> {
    /// Store consecutive words starting at `key`/`addr` and re-render the
    /// rows they touch.
    ///
    /// An empty `vals` stores a zero at `addr`. Values are masked to 16
    /// bits. Rows are created for addresses not seen before. A run that
    /// would leave the address space is rejected whole.
    pub fn apply_words(&self, key: &str, addr: usize, vals: &[u32]) -> Result<(), CoreError> {
        let base = DeviceAddress::new(key, addr).ok_or_else(|| CoreError::InvalidAddress {
            token: format!("{key}{addr}"),
        })?;
        if vals.is_empty() {
            self.apply_word(&base, 0);
            return Ok(());
        }
        let addrs = base.span(vals.len()).ok_or_else(|| CoreError::Payload {
            event: MONITOR_EVENT.into(),
            message: format!("{} words from {base} overflow the address space", vals.len()),
        })?;
        for (addr, value) in addrs.iter().zip(vals) {
            self.apply_word(addr, *value);
        }
        Ok(())
    }

    /// Feed one backend notification into the engine.
    ///
    /// `monitor` payloads update the cache; `server-status` updates the
    /// status indicator and, on a running state, selects the row at the
    /// current target. Unknown event names are ignored.
    pub fn apply_event(&self, event: &BackendEvent) -> Result<(), CoreError> {
        match event.name.as_str() {
            MONITOR_EVENT => {
                let payload = decode_monitor(&event.payload)?;
                self.apply_words(&payload.key, payload.addr, &payload.vals)
            }
            STATUS_EVENT => {
                let message = event.payload.as_str().ok_or_else(|| CoreError::Payload {
                    event: STATUS_EVENT.into(),
                    message: format!("expected a string, got {}", event.payload),
                })?;
                let status = ServerStatus::from_message(message);
                debug!(%status, "server status");
                let running = status.is_running();
                self.set_status(status);
                if running {
                    self.spawn_select_target();
                }
                Ok(())
            }
            other => {
                debug!(event = other, "ignoring unknown event");
                Ok(())
            }
        }
    }

    pub(super) fn apply_word(&self, addr: &DeviceAddress, value: u32) {
        self.inner.cache.set(addr, value);
        self.inner.rows.insert(addr);
        self.render(addr);
        if self.format().is_combined() {
            let partner = addr.partner();
            if self.inner.rows.contains(&partner) {
                self.render(&partner);
            }
        }
    }

    /// One `get_words` round trip for the row range.
    pub(super) async fn prefetch(&self, target: &DeviceAddress, count: usize) {
        match self
            .inner
            .sink
            .get_words(target.key(), target.addr(), count)
            .await
        {
            Ok(words) => self.apply_polled(target, &words),
            Err(e) => {
                warn!(error = %e, "initial fetch failed");
                self.log(LogLevel::Warn, format!("initial fetch failed: {e}"));
            }
        }
    }

    fn apply_polled(&self, target: &DeviceAddress, words: &[u16]) {
        let vals: Vec<u32> = words.iter().copied().map(u32::from).collect();
        if let Err(e) = self.apply_words(target.key(), target.addr(), &vals) {
            debug!(error = %e, "dropping poll result");
        }
    }

    // ── Polling fallback ─────────────────────────────────────────

    /// Start the poll timer in `slot`, replacing any previous one.
    pub(super) async fn start_polling(
        &self,
        slot: &mut Option<Task>,
        target: DeviceAddress,
        count: usize,
    ) {
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }

        let cancel = self.inner.cancel.child_token();
        let monitor = self.clone();
        let period = self.inner.config.poll_interval;
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            monitor.poll_loop(&target, count, period, &task_cancel).await;
        });
        *slot = Some(Task { cancel, handle });
    }

    /// Cancel the poll timer, if any. An in-flight poll is dropped.
    pub(super) async fn stop_polling(&self) {
        if let Some(task) = self.inner.poller.lock().await.take() {
            task.stop().await;
            debug!("poll timer stopped");
        }
    }

    async fn poll_loop(
        &self,
        target: &DeviceAddress,
        count: usize,
        period: Duration,
        cancel: &CancellationToken,
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The prefetch already covered the first tick.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let poll = self.inner.sink.get_words(target.key(), target.addr(), count);
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = poll => match result {
                    Ok(words) => self.apply_polled(target, &words),
                    Err(e) => debug!(error = %e, "poll failed"),
                },
            }
        }
        debug!(addr = %target, "poll loop exiting");
    }

    // ── Event channel ────────────────────────────────────────────

    pub(super) fn spawn_event_bridge(&self, mut rx: broadcast::Receiver<BackendEvent>) -> Task {
        let cancel = self.inner.cancel.child_token();
        let task_cancel = cancel.clone();
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    result = rx.recv() => match result {
                        Ok(event) => {
                            if let Err(e) = monitor.apply_event(&event) {
                                debug!(error = %e, event = %event.name, "dropping event");
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(skipped = n, "event bridge lagged");
                        }
                        Err(RecvError::Closed) => {
                            info!("event channel closed");
                            break;
                        }
                    },
                }
            }
            debug!("event bridge exiting");
        });
        Task { cancel, handle }
    }

    /// Select the target row once it exists. Runs detached so the event
    /// bridge keeps delivering the updates that create the row.
    fn spawn_select_target(&self) {
        let Some(target) = self.target() else {
            return;
        };
        let monitor = self.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                _ = monitor.select(&target) => {}
            }
        });
    }
}

fn decode_monitor(value: &serde_json::Value) -> Result<MonitorPayload, CoreError> {
    MonitorPayload::deserialize(value).map_err(|e| CoreError::Payload {
        event: MONITOR_EVENT.into(),
        message: e.to_string(),
    })
}
