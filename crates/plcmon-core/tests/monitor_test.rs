#![allow(clippy::unwrap_used)]
// Integration tests driving `Monitor` against the in-process backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use plcmon_core::{
    BackendEvent, CoreError, DeviceAddress, DisplayFormat, LogEntry, LogLevel, MemoryBackend,
    MemoryPreferences, MockSettings, Monitor, MonitorConfig, NoEvents, Operation, Preferences,
    RowState, SelectionState, ServerStatus, UpdateChannel, ViewSink,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingView {
    rows: Mutex<HashMap<DeviceAddress, RowState>>,
    selection: Mutex<Option<SelectionState>>,
    statuses: Mutex<Vec<ServerStatus>>,
    logs: Mutex<Vec<LogEntry>>,
}

impl RecordingView {
    fn row(&self, n: usize) -> RowState {
        self.rows.lock().unwrap().get(&d(n)).cloned().unwrap()
    }

    fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn logs_at(&self, level: LogLevel) -> Vec<String> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }
}

impl ViewSink for RecordingView {
    fn row_rendered(&self, row: &RowState) {
        self.rows
            .lock()
            .unwrap()
            .insert(row.address.clone(), row.clone());
    }

    fn rows_cleared(&self) {
        self.rows.lock().unwrap().clear();
    }

    fn selection_changed(&self, selection: &SelectionState) {
        *self.selection.lock().unwrap() = Some(selection.clone());
    }

    fn status_changed(&self, status: &ServerStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }

    fn log_appended(&self, entry: &LogEntry) {
        self.logs.lock().unwrap().push(entry.clone());
    }
}

fn d(n: usize) -> DeviceAddress {
    DeviceAddress::new("D", n).unwrap()
}

fn setup_with(
    backend: &MemoryBackend,
    config: MonitorConfig,
    prefs: Arc<MemoryPreferences>,
) -> (Monitor<MemoryBackend>, Arc<RecordingView>) {
    let view = Arc::new(RecordingView::default());
    let monitor = Monitor::new(config, backend.clone(), view.clone(), prefs);
    (monitor, view)
}

fn setup(backend: &MemoryBackend) -> (Monitor<MemoryBackend>, Arc<RecordingView>) {
    setup_with(
        backend,
        MonitorConfig::default(),
        Arc::new(MemoryPreferences::new()),
    )
}

/// Select `addr` and open an edit with the given format and literal.
async fn open_edit(
    monitor: &Monitor<MemoryBackend>,
    addr: &DeviceAddress,
    format: DisplayFormat,
    literal: &str,
) {
    assert!(monitor.select(addr).await);
    assert!(monitor.activate());
    assert!(monitor.set_write_format(format));
    assert!(monitor.set_literal(literal));
}

// ── Polling fallback ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_polling_fallback_applies_words() {
    let backend = MemoryBackend::without_events();
    backend.poke("D", 0, &[10, 20, 30]);
    let config = MonitorConfig {
        row_count: 3,
        ..MonitorConfig::default()
    };
    let (monitor, view) = setup_with(&backend, config, Arc::new(MemoryPreferences::new()));

    assert_eq!(monitor.start_session(&backend).await, UpdateChannel::Polling);
    monitor.start_monitoring("D0").await.unwrap();

    assert_eq!(monitor.cache().get(&d(0)), Some(10));
    assert_eq!(monitor.cache().get(&d(1)), Some(20));
    assert_eq!(monitor.cache().get(&d(2)), Some(30));
    assert_eq!(view.row(0).formatted, "10");
    assert_eq!(view.row(1).formatted, "20");
    assert_eq!(view.row(2).formatted, "30");

    // The timer picks up later changes.
    backend.poke("D", 1, &[99]);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(monitor.cache().get(&d(1)), Some(99));
    assert_eq!(view.row(1).formatted, "99");

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_restarting_monitor_keeps_a_single_timer() {
    let backend = MemoryBackend::without_events();
    let (monitor, _view) = setup(&backend);
    monitor.start_session(&backend).await;

    monitor.start_monitoring("D0").await.unwrap();
    monitor.start_monitoring("D0").await.unwrap();
    assert_eq!(backend.calls(Operation::GetWords), 2);

    tokio::time::sleep(Duration::from_millis(1250)).await;
    // Two prefetches plus two ticks of one timer.
    assert_eq!(backend.calls(Operation::GetWords), 4);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_monitoring_cancels_the_timer() {
    let backend = MemoryBackend::without_events();
    let (monitor, _view) = setup(&backend);
    monitor.start_session(&backend).await;
    monitor.start_monitoring("D0").await.unwrap();
    monitor.stop_monitoring().await.unwrap();
    assert!(!monitor.is_monitoring());

    let before = backend.calls(Operation::GetWords);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.calls(Operation::GetWords), before);
    // No backend push to stop in polling mode.
    assert_eq!(backend.calls(Operation::StopMonitor), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_polls_are_swallowed() {
    let backend = MemoryBackend::without_events();
    let (monitor, _view) = setup(&backend);
    monitor.start_session(&backend).await;
    monitor.start_monitoring("D0").await.unwrap();

    backend.fail(Operation::GetWords, true);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    backend.fail(Operation::GetWords, false);
    backend.poke("D", 0, &[7]);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(monitor.cache().get(&d(0)), Some(7));
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_session_without_event_source_polls() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    assert_eq!(monitor.start_session(&NoEvents).await, UpdateChannel::Polling);
    // The choice sticks for the session.
    assert_eq!(monitor.start_session(&backend).await, UpdateChannel::Polling);
    assert_eq!(view.logs_at(LogLevel::Warn).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_prefetch_leaves_no_timer() {
    let backend = MemoryBackend::without_events();
    let (monitor, _view) = setup(&backend);
    let slow = MockSettings {
        tim_await_ms: Some(200),
        ..MockSettings::default()
    };
    monitor.start_server(&slow).await.unwrap();
    monitor.start_session(&backend).await;

    let starting = monitor.clone();
    let start = tokio::spawn(async move { starting.start_monitoring("D0").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor.stop_monitoring().await.unwrap();
    start.await.unwrap().unwrap();
    assert!(!monitor.is_monitoring());

    // Only the prefetch ever reached the backend.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.calls(Operation::GetWords), 1);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_prefetch_keeps_latest_target() {
    let backend = MemoryBackend::without_events();
    let (monitor, _view) = setup(&backend);
    let slow = MockSettings {
        tim_await_ms: Some(200),
        ..MockSettings::default()
    };
    monitor.start_server(&slow).await.unwrap();
    monitor.start_session(&backend).await;

    let first = monitor.clone();
    let first = tokio::spawn(async move { first.start_monitoring("D0").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor.start_monitoring("D100").await.unwrap();
    first.await.unwrap().unwrap();

    backend.poke("D", 100, &[5]);
    let before = backend.calls(Operation::GetWords);
    tokio::time::sleep(Duration::from_millis(1300)).await;
    // One timer, polling the second target.
    assert_eq!(backend.calls(Operation::GetWords), before + 2);
    assert_eq!(monitor.cache().get(&d(100)), Some(5));
    monitor.shutdown().await;
}

// ── Address space edges ─────────────────────────────────────────────

#[tokio::test]
async fn test_window_past_address_space_is_rejected() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    let token = format!("D{:X}", usize::MAX);

    let err = monitor.start_monitoring(&token).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidAddress { .. }), "got: {err:?}");
    assert_eq!(backend.calls(Operation::GetWords), 0);
    assert!(!monitor.is_monitoring());
    assert_eq!(monitor.target(), None);
    assert_eq!(view.row_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_largest_fitting_window_is_monitored() {
    let backend = MemoryBackend::without_events();
    let (monitor, view) = setup(&backend);
    monitor.start_session(&backend).await;
    backend.poke("D", usize::MAX, &[9]);

    monitor
        .start_monitoring(&format!("D{:X}", usize::MAX - 29))
        .await
        .unwrap();

    assert_eq!(view.row_count(), 30);
    assert_eq!(monitor.cache().get(&d(usize::MAX)), Some(9));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.calls(Operation::GetWords), 2);
    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_overflowing_payload_does_not_stop_the_bridge() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.start_session(&backend).await;

    let overflowing = BackendEvent::new(
        "monitor",
        json!({"key": "D", "addr": usize::MAX, "vals": [1, 2]}),
    );
    let err = monitor.apply_event(&overflowing).unwrap_err();
    assert!(matches!(err, CoreError::Payload { .. }), "got: {err:?}");

    backend.emit(overflowing);
    backend.emit(BackendEvent::new("monitor", json!({"key": "D", "addr": 0, "vals": [7]})));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(monitor.cache().get(&d(0)), Some(7));
    // Rejected whole: nothing from the overflowing run was stored.
    assert_eq!(monitor.cache().get(&d(usize::MAX)), None);
    monitor.shutdown().await;
}

// ── Event channel ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_event_channel_updates_cache() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    assert_eq!(monitor.start_session(&backend).await, UpdateChannel::Events);

    monitor.start_monitoring("D100").await.unwrap();
    assert_eq!(backend.monitor_target().await, Some(d(100)));
    assert_eq!(view.row_count(), 30);

    backend.poke("D", 105, &[0xBEEF]);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(monitor.cache().get(&d(105)), Some(0xBEEF));
    assert_eq!(view.row(105).formatted, "48879");

    // No engine-side timer in event mode: only the prefetch read.
    assert_eq!(backend.calls(Operation::GetWords), 1);

    monitor.stop_monitoring().await.unwrap();
    assert_eq!(backend.monitor_target().await, None);
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_monitor_payload_with_empty_vals_sets_zero() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor
        .apply_event(&BackendEvent::new(
            "monitor",
            json!({"key": "D", "addr": 3, "vals": []}),
        ))
        .unwrap();
    assert_eq!(monitor.cache().get(&d(3)), Some(0));
    assert_eq!(view.row(3).formatted, "0");
}

#[tokio::test]
async fn test_monitor_values_are_masked() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.apply_words("D", 0, &[0x1_0005, 7]).unwrap();
    assert_eq!(monitor.cache().get(&d(0)), Some(5));
    assert_eq!(monitor.cache().get(&d(1)), Some(7));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payloads_do_not_stop_the_bridge() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.start_session(&backend).await;

    backend.emit(BackendEvent::new("monitor", json!({"bogus": true})));
    backend.emit(BackendEvent::new("server-status", json!(42)));
    backend.emit(BackendEvent::new("monitor", json!({"key": "D", "addr": 0, "vals": [11]})));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(monitor.cache().get(&d(0)), Some(11));
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_malformed_payload_is_reported_to_caller() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    let err = monitor
        .apply_event(&BackendEvent::new("monitor", json!({"key": "D"})))
        .unwrap_err();
    assert!(matches!(err, CoreError::Payload { .. }), "got: {err:?}");
}

#[tokio::test(start_paused = true)]
async fn test_running_status_selects_target_row() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor.start_session(&backend).await;
    monitor.start_monitoring("D10").await.unwrap();

    backend.emit(BackendEvent::status("running"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(monitor.selection(), SelectionState::Selected(d(10)));
    assert_eq!(
        *view.selection.lock().unwrap(),
        Some(SelectionState::Selected(d(10)))
    );
    assert_eq!(monitor.status(), ServerStatus::Running);
    assert_eq!(
        view.statuses.lock().unwrap().last(),
        Some(&ServerStatus::Running)
    );
    assert!(monitor.is_server_running());
    monitor.shutdown().await;
}

// ── Server lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_start_reverts_running_flag() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    let mut running = monitor.server_running();

    backend.fail(Operation::StartMock, true);
    let result = monitor.start_server(&MockSettings::default()).await;
    assert!(matches!(result, Err(CoreError::Transport { .. })));
    assert!(!monitor.is_server_running());
    assert!(!*running.borrow_and_update());
    assert_eq!(view.logs_at(LogLevel::Error).len(), 1);

    backend.fail(Operation::StartMock, false);
    monitor.start_server(&MockSettings::default()).await.unwrap();
    assert!(monitor.is_server_running());
    assert!(backend.is_running());
}

#[tokio::test]
async fn test_failed_stop_keeps_server_running() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.start_server(&MockSettings::default()).await.unwrap();

    backend.fail(Operation::StopMock, true);
    assert!(monitor.stop_server().await.is_err());
    assert!(monitor.is_server_running());
}

#[tokio::test]
async fn test_launch_settings_reach_the_backend() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    let settings = MockSettings {
        ip: "0.0.0.0".into(),
        tcp_port: 5010,
        udp_port: Some(5011),
        tim_await_ms: None,
    };
    monitor.start_server(&settings).await.unwrap();
    assert_eq!(backend.settings().await, Some(settings));
}

#[tokio::test(start_paused = true)]
async fn test_auto_start_follows_preference() {
    let backend = MemoryBackend::without_events();
    let prefs = Arc::new(MemoryPreferences::new());
    let (monitor, _view) = setup_with(&backend, MonitorConfig::default(), prefs.clone());
    monitor.start_session(&backend).await;

    assert!(!monitor.auto_start(&MockSettings::default(), "D0").await.unwrap());
    assert!(!backend.is_running());

    prefs.set_auto_start(true).unwrap();
    assert!(monitor.auto_start(&MockSettings::default(), "D0").await.unwrap());
    assert!(backend.is_running());
    assert!(monitor.is_monitoring());
    assert_eq!(monitor.target(), Some(d(0)));
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_invalid_target_never_reaches_backend() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    let err = monitor.start_monitoring("123").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidAddress { .. }));
    assert_eq!(backend.calls(Operation::GetWords), 0);
    assert_eq!(backend.calls(Operation::StartMonitor), 0);
    assert!(!monitor.is_monitoring());
    assert_eq!(view.logs_at(LogLevel::Error).len(), 1);
}

// ── Rows and formats ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_initial_rows_span_the_window() {
    let backend = MemoryBackend::without_events();
    let (monitor, view) = setup(&backend);
    monitor.start_session(&backend).await;
    monitor.start_monitoring("D0").await.unwrap();

    let rows: Vec<String> = monitor.rows().snapshot().iter().map(ToString::to_string).collect();
    assert_eq!(rows.len(), 30);
    assert_eq!(rows.first().map(String::as_str), Some("D0"));
    assert_eq!(rows.last().map(String::as_str), Some("D29"));
    assert_eq!(view.row_count(), 30);
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_combined_format_toggles_suppression() {
    let backend = MemoryBackend::new();
    let prefs = Arc::new(MemoryPreferences::new());
    let (monitor, view) = setup_with(&backend, MonitorConfig::default(), prefs.clone());
    monitor.apply_words("D", 0, &[1, 2]).unwrap();

    monitor.set_format(DisplayFormat::U32);
    assert!(view.row(1).suppressed);
    assert_eq!(view.row(0).formatted, ((2u32 << 16) | 1).to_string());
    assert_eq!(prefs.display_format(), Some(DisplayFormat::U32));

    monitor.set_format(DisplayFormat::U16);
    assert!(!view.row(1).suppressed);
    assert_eq!(view.row(1).formatted, "2");
    assert_eq!(view.row(0).formatted, "1");
}

#[tokio::test]
async fn test_odd_word_update_rerenders_even_partner() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor.set_format(DisplayFormat::I32);
    monitor.apply_words("D", 4, &[0xFFFF, 0]).unwrap();
    assert_eq!(view.row(4).formatted, "65535");

    monitor.apply_words("D", 5, &[0xFFFF]).unwrap();
    assert_eq!(view.row(4).formatted, "-1");
    assert!(view.row(5).suppressed);
}

#[tokio::test]
async fn test_saved_format_is_restored() {
    let backend = MemoryBackend::new();
    let prefs = Arc::new(MemoryPreferences::with(Some(DisplayFormat::Hex), false, None));
    let (monitor, view) = setup_with(&backend, MonitorConfig::default(), prefs);
    assert_eq!(monitor.format(), DisplayFormat::Hex);
    monitor.apply_words("D", 0, &[255]).unwrap();
    assert_eq!(view.row(0).formatted, "0x00FF");
}

#[tokio::test]
async fn test_reset_view_forgets_everything() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor.apply_words("D", 0, &[1, 2, 3]).unwrap();
    monitor.navigate(1);
    monitor.reset_view();

    assert!(monitor.cache().is_empty());
    assert!(monitor.rows().is_empty());
    assert_eq!(view.row_count(), 0);
    assert_eq!(monitor.selection(), SelectionState::Idle);
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_select_waits_for_row_to_appear() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);

    let waiter = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.select(&d(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    monitor.apply_words("D", 5, &[1]).unwrap();

    assert!(waiter.await.unwrap());
    assert_eq!(monitor.selection(), SelectionState::Selected(d(5)));
}

#[tokio::test(start_paused = true)]
async fn test_select_gives_up_quietly() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    assert!(!monitor.select(&d(99)).await);
    assert_eq!(monitor.selection(), SelectionState::Idle);
    assert!(view.logs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_navigation_clamps_and_carries_edit() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.apply_words("D", 0, &[0, 0, 0]).unwrap();

    assert_eq!(monitor.navigate(1), Some(d(0)));
    assert_eq!(monitor.navigate(5), Some(d(2)));
    assert!(monitor.activate());
    assert!(monitor.set_literal("12"));
    assert_eq!(monitor.navigate(-1), Some(d(1)));

    let edit = monitor.selection().edit().cloned().unwrap();
    assert_eq!(edit.address, d(1));
    assert_eq!(edit.literal, "12");

    assert!(monitor.cancel_edit());
    assert_eq!(monitor.selection(), SelectionState::Selected(d(1)));
}

#[tokio::test]
async fn test_activation_seeds_write_format_from_display() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.apply_words("D", 0, &[0]).unwrap();
    monitor.set_format(DisplayFormat::F32);
    monitor.navigate(0);
    assert!(monitor.activate());
    assert_eq!(
        monitor.selection().edit().map(|e| e.format),
        Some(DisplayFormat::F32)
    );
    assert_eq!(monitor.cycle_write_format(true), Some(DisplayFormat::Bin));
}

// ── Edit commit ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_signed_write_splits_into_pair() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor.apply_words("D", 10, &[0, 0]).unwrap();
    open_edit(&monitor, &d(10), DisplayFormat::I32, "-1").await;

    let write = monitor.commit_edit().await.unwrap();
    assert_eq!(write.base, d(10));
    assert_eq!(write.words, vec![0xFFFF, 0xFFFF]);
    assert_eq!(monitor.cache().get(&d(10)), Some(0xFFFF));
    assert_eq!(monitor.cache().get(&d(11)), Some(0xFFFF));
    assert_eq!(backend.peek("D", 10, 2), vec![0xFFFF, 0xFFFF]);
    assert_eq!(view.row(10).formatted, "65535");

    // The edit surface stays open.
    assert!(monitor.selection().is_editing());
}

#[tokio::test]
async fn test_combined_write_from_odd_row_targets_even_base() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    monitor.apply_words("D", 0, &[0, 0]).unwrap();
    open_edit(&monitor, &d(1), DisplayFormat::F32, "1.5").await;

    let write = monitor.commit_edit().await.unwrap();
    assert_eq!(write.base, d(0));
    let words = backend.peek("D", 0, 2);
    let value = (u32::from(words[1]) << 16) | u32::from(words[0]);
    assert_eq!(f32::from_bits(value), 1.5);
}

#[tokio::test]
async fn test_rejected_write_keeps_optimistic_value() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor.apply_words("D", 3, &[0]).unwrap();
    open_edit(&monitor, &d(3), DisplayFormat::U16, "5").await;

    backend.fail(Operation::SetWords, true);
    let err = monitor.commit_edit().await.unwrap_err();
    assert!(matches!(err, CoreError::Transport { .. }));

    assert_eq!(monitor.cache().get(&d(3)), Some(5));
    assert_eq!(view.row(3).formatted, "5");
    assert_eq!(backend.peek("D", 3, 1), vec![0]);
    let errors = view.logs_at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("D3"), "got: {errors:?}");
    assert!(monitor.selection().is_editing());
}

#[tokio::test]
async fn test_invalid_literal_is_rejected_locally() {
    let backend = MemoryBackend::new();
    let (monitor, view) = setup(&backend);
    monitor.apply_words("D", 0, &[9]).unwrap();
    open_edit(&monitor, &d(0), DisplayFormat::Bin, "12").await;

    let err = monitor.commit_edit().await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidLiteral { .. }));
    assert_eq!(backend.calls(Operation::SetWords), 0);
    assert_eq!(monitor.cache().get(&d(0)), Some(9));
    assert_eq!(view.logs_at(LogLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_commit_without_edit_fails() {
    let backend = MemoryBackend::new();
    let (monitor, _view) = setup(&backend);
    assert!(matches!(
        monitor.commit_edit().await,
        Err(CoreError::NotEditing)
    ));
}
