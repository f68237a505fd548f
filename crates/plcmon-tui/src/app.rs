//! Application core. Owns the engine handle and draws the monitor.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, TableState,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tui_input::{Input, InputRequest};

use plcmon_core::{
    CoreError, DeviceAddress, EditPosition, LogEntry, MemoryBackend, MockSettings, Monitor,
    RowState, SelectionState, ServerStatus,
};

use crate::action::Action;
use crate::event::{Event, EventReader};
use crate::theme;
use crate::tui::Tui;

/// Session log lines kept for the log pane.
const LOG_TAIL: usize = 200;
const PAGE: isize = 10;
const POPUP_WIDTH: u16 = 40;
const POPUP_HEIGHT: u16 = 6;

/// Top-level application state.
pub struct App {
    monitor: Monitor<MemoryBackend>,
    settings: MockSettings,
    running: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    rows: BTreeMap<DeviceAddress, RowState>,
    selection: SelectionState,
    status: ServerStatus,
    target: Option<DeviceAddress>,
    log: VecDeque<LogEntry>,
    /// Target token being typed; applied on Enter.
    target_input: Input,
    target_focused: bool,
    edit_input: Input,
    /// Saved popup position; `None` centers it.
    popup: Option<EditPosition>,
    terminal_size: (u16, u16),
}

impl App {
    pub fn new(
        monitor: Monitor<MemoryBackend>,
        settings: MockSettings,
        target: &str,
        action_tx: mpsc::UnboundedSender<Action>,
        action_rx: mpsc::UnboundedReceiver<Action>,
    ) -> Self {
        let popup = monitor.edit_position();
        Self {
            monitor,
            settings,
            running: true,
            action_tx,
            action_rx,
            rows: BTreeMap::new(),
            selection: SelectionState::Idle,
            status: ServerStatus::Stopped,
            target: None,
            log: VecDeque::new(),
            target_input: Input::new(target.to_owned()),
            target_focused: false,
            edit_input: Input::default(),
            popup,
            terminal_size: (80, 24),
        }
    }

    /// Main event loop.
    pub async fn run(&mut self, backend: &MemoryBackend) -> Result<()> {
        let mut tui = Tui::enter()?;
        self.terminal_size = tui.size()?;

        let mut events = EventReader::spawn(Duration::from_millis(33));

        let channel = self.monitor.start_session(backend).await;
        info!(%channel, "session started");
        self.spawn_auto_start();

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };
            let action = match event {
                Event::Key(key) => self.handle_key_event(key),
                Event::Resize(w, h) => Some(Action::Resize(w, h)),
                Event::Render => Some(Action::Render),
            };
            if let Some(action) = action {
                self.action_tx.send(action)?;
            }

            while let Ok(action) = self.action_rx.try_recv() {
                if matches!(action, Action::Render) {
                    tui.draw(|frame| self.render(frame))?;
                } else {
                    self.process_action(action);
                }
            }
        }

        events.stop();
        self.monitor.shutdown().await;
        tui.exit();
        Ok(())
    }

    // ── Engine commands ──────────────────────────────────────────

    /// Run an engine command in the background. Failures are already in
    /// the session log by the time they surface here.
    fn spawn_engine<F, Fut>(&self, command: &'static str, f: F)
    where
        F: FnOnce(Monitor<MemoryBackend>) -> Fut,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let fut = f(self.monitor.clone());
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                debug!(error = %e, command, "engine command failed");
            }
        });
    }

    fn spawn_auto_start(&self) {
        let settings = self.settings.clone();
        let target = self.target_input.value().to_owned();
        self.spawn_engine("auto_start", move |m| async move {
            m.auto_start(&settings, &target).await.map(|_started| ())
        });
    }

    fn toggle_server(&self) {
        if self.monitor.is_server_running() {
            self.spawn_engine("stop_server", |m| async move { m.stop_server().await });
        } else {
            let settings = self.settings.clone();
            self.spawn_engine("start_server", move |m| async move {
                m.start_server(&settings).await
            });
        }
    }

    fn toggle_monitoring(&self) {
        if self.monitor.is_monitoring() {
            self.spawn_engine("stop_monitoring", |m| async move { m.stop_monitoring().await });
        } else {
            self.start_monitoring();
        }
    }

    fn start_monitoring(&self) {
        let token = self.target_input.value().trim().to_owned();
        self.spawn_engine("start_monitoring", move |m| async move {
            m.start_monitoring(&token).await
        });
    }

    fn commit_edit(&self) {
        self.spawn_engine("commit_edit", |m| async move {
            m.commit_edit().await.map(|_write| ())
        });
    }

    // ── Input ────────────────────────────────────────────────────

    fn handle_key_event(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        if self.target_focused {
            self.handle_target_key(key);
            return None;
        }
        if self.monitor.selection().is_editing() {
            self.handle_edit_key(key);
            return None;
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Char('q')) => return Some(Action::Quit),

            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.navigate(-1),
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.navigate(1),
            (KeyModifiers::NONE, KeyCode::PageUp) => self.navigate(-PAGE),
            (KeyModifiers::NONE, KeyCode::PageDown) => self.navigate(PAGE),
            (KeyModifiers::NONE, KeyCode::Home) => self.navigate(isize::MIN),
            (KeyModifiers::NONE, KeyCode::End) => self.navigate(isize::MAX),

            (KeyModifiers::NONE, KeyCode::Enter) => {
                if self.monitor.activate() {
                    self.edit_input.reset();
                }
            }

            (KeyModifiers::NONE, KeyCode::Char('f')) => {
                self.monitor.cycle_format(true);
            }
            (_, KeyCode::Char('F')) => {
                self.monitor.cycle_format(false);
            }

            (KeyModifiers::NONE, KeyCode::Char('s')) => self.toggle_server(),
            (KeyModifiers::NONE, KeyCode::Char('m')) => self.toggle_monitoring(),
            (KeyModifiers::NONE, KeyCode::Char('t')) => self.target_focused = true,
            (KeyModifiers::NONE, KeyCode::Char('a')) => {
                let enabled = !self.monitor.auto_start_enabled();
                self.monitor.set_auto_start(enabled);
            }
            (KeyModifiers::NONE, KeyCode::Char('r')) => self.monitor.reset_view(),

            _ => {}
        }
        None
    }

    fn handle_target_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.target_focused = false;
                if let Some(target) = &self.target {
                    self.target_input = Input::new(target.to_string());
                }
            }
            KeyCode::Enter => {
                self.target_focused = false;
                self.start_monitoring();
            }
            _ => {
                if let Some(request) = input_request(key) {
                    self.target_input.handle(request);
                }
            }
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => {
                self.monitor.cancel_edit();
            }
            (_, KeyCode::Enter) => self.commit_edit(),
            (KeyModifiers::NONE, KeyCode::Tab) => {
                self.monitor.cycle_write_format(true);
            }
            (_, KeyCode::BackTab) => {
                self.monitor.cycle_write_format(false);
            }

            (KeyModifiers::CONTROL, KeyCode::Left) => self.move_popup(-2, 0),
            (KeyModifiers::CONTROL, KeyCode::Right) => self.move_popup(2, 0),
            (KeyModifiers::CONTROL, KeyCode::Up) => self.move_popup(0, -1),
            (KeyModifiers::CONTROL, KeyCode::Down) => self.move_popup(0, 1),

            (KeyModifiers::NONE, KeyCode::Up) => self.navigate(-1),
            (KeyModifiers::NONE, KeyCode::Down) => self.navigate(1),

            _ => {
                let changed = input_request(key)
                    .and_then(|request| self.edit_input.handle(request))
                    .is_some();
                if changed {
                    self.monitor.set_literal(self.edit_input.value());
                }
            }
        }
    }

    fn navigate(&self, delta: isize) {
        if let Some(addr) = self.monitor.navigate(delta) {
            debug!(%addr, "selected");
        }
    }

    /// Nudge the edit popup and persist where it ended up.
    fn move_popup(&mut self, dx: i16, dy: i16) {
        let (w, h) = self.terminal_size;
        let current = self.popup_rect(Rect::new(0, 0, w, h));
        let moved = EditPosition {
            x: current.x.saturating_add_signed(dx),
            y: current.y.saturating_add_signed(dy),
        };
        let clamped = clamp_position(moved, w, h);
        self.popup = Some(clamped);
        self.monitor.set_edit_position(clamped);
    }

    // ── State updates ────────────────────────────────────────────

    fn process_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Resize(w, h) => self.terminal_size = (w, h),
            Action::Render => {}

            Action::RowRendered(row) => {
                self.rows.insert(row.address.clone(), row);
            }
            Action::RowsCleared => self.rows.clear(),
            Action::SelectionChanged(selection) => self.selection = selection,
            Action::StatusChanged(status) => self.status = status,
            Action::LogAppended(entry) => {
                self.log.push_back(entry);
                while self.log.len() > LOG_TAIL {
                    self.log.pop_front();
                }
            }
            Action::TargetChanged(target) => {
                if let Some(addr) = &target {
                    if !self.target_focused {
                        self.target_input = Input::new(addr.to_string());
                    }
                }
                self.target = target;
            }
        }
    }

    // ── Rendering ────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let layout = Layout::vertical([
            Constraint::Length(3), // Target + state
            Constraint::Min(5),    // Word table
            Constraint::Length(8), // Session log
            Constraint::Length(1), // Key hints
        ])
        .split(area);

        self.render_header(frame, layout[0]);
        self.render_table(frame, layout[1]);
        self.render_log(frame, layout[2]);
        self.render_status_bar(frame, layout[3]);

        if let SelectionState::Editing(edit) = &self.selection {
            let popup = self.popup_rect(area);
            self.render_edit_popup(frame, popup, &edit.address, &edit.format.to_string());
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let config = self.monitor.config();
        let channel = self
            .monitor
            .channel()
            .map_or_else(|| "-".to_owned(), |c| c.to_string());
        let server_on = self.monitor.is_server_running();
        let monitoring = self.monitor.is_monitoring();

        let target_style = if self.target_focused {
            Style::default().fg(theme::ELECTRIC_YELLOW)
        } else {
            Style::default().fg(theme::NEON_CYAN)
        };

        let line = Line::from(vec![
            Span::styled(" target ", theme::key_hint()),
            Span::styled(self.target_input.value().to_owned(), target_style),
            Span::styled("   server ", theme::key_hint()),
            Span::styled(
                format!("{} {}", if server_on { "●" } else { "○" }, self.status),
                theme::indicator(server_on),
            ),
            Span::styled("   monitor ", theme::key_hint()),
            Span::styled(
                if monitoring { "● on" } else { "○ off" },
                theme::indicator(monitoring),
            ),
            Span::styled(
                format!(
                    " ({channel}, {})",
                    humantime::format_duration(config.poll_interval)
                ),
                theme::status_bar(),
            ),
            Span::styled("   format ", theme::key_hint()),
            Span::styled(self.monitor.format().to_string(), theme::title_style()),
            Span::styled("   auto-start ", theme::key_hint()),
            Span::styled(
                if self.monitor.auto_start_enabled() { "on" } else { "off" },
                theme::status_bar(),
            ),
        ]);

        let border = if self.target_focused {
            theme::border_focused()
        } else {
            theme::border_default()
        };
        let block = Block::default()
            .title(" plcmon ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border);
        frame.render_widget(Paragraph::new(line).block(block), area);

        if self.target_focused {
            let cursor = u16::try_from(self.target_input.visual_cursor()).unwrap_or(u16::MAX);
            frame.set_cursor_position((area.x + 9 + cursor, area.y + 1));
        }
    }

    fn render_table(&self, frame: &mut Frame, area: Rect) {
        let header = Row::new(vec![
            Cell::from("Addr").style(theme::table_header()),
            Cell::from("F---E---D---C--- B---8---7---4---0").style(theme::table_header()),
            Cell::from("Value").style(theme::table_header()),
            Cell::from("Raw").style(theme::table_header()),
        ]);

        let rows: Vec<Row> = self.rows.values().map(table_row).collect();
        let selected = self
            .selection
            .selected()
            .and_then(|addr| self.rows.keys().position(|a| a == addr));

        let title = self
            .target
            .as_ref()
            .map_or_else(|| " Words ".to_owned(), |t| format!(" Words from {t} "));
        let block = Block::default()
            .title(title)
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());

        let table = Table::new(
            rows,
            [
                Constraint::Length(8),
                Constraint::Length(20),
                Constraint::Min(14),
                Constraint::Length(12),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(theme::table_selected());

        let mut state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let visible = usize::from(area.height.saturating_sub(2));
        let skip = self.log.len().saturating_sub(visible);
        let lines: Vec<Line> = self
            .log
            .iter()
            .skip(skip)
            .map(|entry| Line::from(Span::styled(entry.to_string(), theme::log_line(entry.level))))
            .collect();

        let block = Block::default()
            .title(" Log ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let hints: &[(&str, &str)] = if self.target_focused {
            &[("Enter", "monitor"), ("Esc", "cancel")]
        } else if self.selection.is_editing() {
            &[
                ("Enter", "write"),
                ("Esc", "close"),
                ("Tab", "format"),
                ("Ctrl+←↑↓→", "move"),
            ]
        } else {
            &[
                ("↑↓", "select"),
                ("Enter", "edit"),
                ("f/F", "format"),
                ("t", "target"),
                ("m", "monitor"),
                ("s", "server"),
                ("a", "auto-start"),
                ("r", "reset"),
                ("q", "quit"),
            ]
        };

        let mut spans = vec![Span::raw(" ")];
        for (key, label) in hints {
            spans.push(Span::styled(*key, theme::key_hint_key()));
            spans.push(Span::styled(format!(" {label}  "), theme::key_hint()));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_edit_popup(&self, frame: &mut Frame, area: Rect, addr: &DeviceAddress, format: &str) {
        frame.render_widget(Clear, area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            area,
        );

        let block = Block::default()
            .title(format!(" Write {addr} "))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::ELECTRIC_YELLOW));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text = vec![
            Line::from(vec![
                Span::styled(" format ", theme::key_hint()),
                Span::styled(format.to_owned(), theme::title_style()),
                Span::styled("  (Tab)", theme::key_hint()),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled(" > ", Style::default().fg(theme::ELECTRIC_PURPLE)),
                Span::styled(
                    self.edit_input.value().to_owned(),
                    Style::default().fg(theme::NEON_CYAN),
                ),
            ]),
        ];
        frame.render_widget(Paragraph::new(text), inner);

        let cursor = u16::try_from(self.edit_input.visual_cursor()).unwrap_or(u16::MAX);
        frame.set_cursor_position((inner.x.saturating_add(3).saturating_add(cursor), inner.y + 2));
    }

    /// Where the edit popup goes inside `area`.
    fn popup_rect(&self, area: Rect) -> Rect {
        let width = POPUP_WIDTH.min(area.width);
        let height = POPUP_HEIGHT.min(area.height);
        let position = self.popup.map_or_else(
            || EditPosition {
                x: area.width.saturating_sub(width) / 2,
                y: area.height.saturating_sub(height) / 2,
            },
            |saved| clamp_position(saved, area.width, area.height),
        );
        Rect::new(area.x + position.x, area.y + position.y, width, height)
    }
}

/// Map a key to a text-field edit.
fn input_request(key: KeyEvent) -> Option<InputRequest> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let request = match key.code {
        KeyCode::Char('u') if ctrl => InputRequest::DeleteLine,
        KeyCode::Char('w') if ctrl => InputRequest::DeletePrevWord,
        KeyCode::Char(c) if !ctrl => InputRequest::InsertChar(c),
        KeyCode::Backspace => InputRequest::DeletePrevChar,
        KeyCode::Delete => InputRequest::DeleteNextChar,
        KeyCode::Left => InputRequest::GoToPrevChar,
        KeyCode::Right => InputRequest::GoToNextChar,
        KeyCode::Home => InputRequest::GoToStart,
        KeyCode::End => InputRequest::GoToEnd,
        _ => return None,
    };
    Some(request)
}

/// Keep the popup fully on a `width` x `height` screen.
fn clamp_position(position: EditPosition, width: u16, height: u16) -> EditPosition {
    EditPosition {
        x: position.x.min(width.saturating_sub(POPUP_WIDTH)),
        y: position.y.min(height.saturating_sub(POPUP_HEIGHT)),
    }
}

fn table_row(row: &RowState) -> Row<'static> {
    if row.suppressed {
        return Row::new(vec![
            Cell::from(row.address.to_string()),
            Cell::from(bit_line(row)),
            Cell::from(""),
            Cell::from(""),
        ])
        .style(theme::row_suppressed());
    }
    Row::new(vec![
        Cell::from(row.address.to_string()).style(Style::default().fg(theme::NEON_CYAN)),
        Cell::from(bit_line(row)),
        Cell::from(row.formatted.clone()),
        Cell::from(row.raw.clone()).style(Style::default().fg(theme::CORAL)),
    ])
    .style(theme::table_row())
}

/// Bit cells, most significant first, grouped by nibble.
fn bit_line(row: &RowState) -> Line<'static> {
    let mut spans = Vec::with_capacity(19);
    for (i, set) in row.bits.iter().enumerate() {
        if i > 0 && i % 4 == 0 {
            spans.push(Span::raw(" "));
        }
        if *set {
            spans.push(Span::styled("1", theme::bit_on()));
        } else {
            spans.push(Span::styled("0", theme::bit_off()));
        }
    }
    Line::from(spans)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use plcmon_core::{
        DisplayFormat, LogLevel, MemoryPreferences, MonitorConfig, NullView, SessionLog,
        WordCache, WordOrder, render_row,
    };

    use super::*;

    fn d(n: usize) -> DeviceAddress {
        DeviceAddress::new("D", n).unwrap()
    }

    fn app() -> App {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = Monitor::new(
            MonitorConfig::default(),
            MemoryBackend::new(),
            Arc::new(NullView),
            Arc::new(MemoryPreferences::new()),
        );
        App::new(monitor, MockSettings::default(), "D0", tx, rx)
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn bit_line_groups_nibbles() {
        let cache = WordCache::new();
        cache.set(&d(0), 0x8005_u16);
        let row = render_row(&d(0), DisplayFormat::U16, WordOrder::LowFirst, &cache);
        assert_eq!(text(&bit_line(&row)), "1000 0000 0000 0101");
    }

    #[test]
    fn popup_stays_on_screen() {
        assert_eq!(
            clamp_position(EditPosition { x: 500, y: 500 }, 80, 24),
            EditPosition {
                x: 80 - POPUP_WIDTH,
                y: 24 - POPUP_HEIGHT
            }
        );
        assert_eq!(
            clamp_position(EditPosition { x: 3, y: 4 }, 80, 24),
            EditPosition { x: 3, y: 4 }
        );
    }

    #[test]
    fn popup_centers_without_saved_position() {
        let app = app();
        let rect = app.popup_rect(Rect::new(0, 0, 80, 24));
        assert_eq!((rect.x, rect.y), ((80 - POPUP_WIDTH) / 2, (24 - POPUP_HEIGHT) / 2));
    }

    #[test]
    fn engine_output_updates_state() {
        let mut app = app();
        let cache = WordCache::new();
        cache.set(&d(3), 7_u16);
        let row = render_row(&d(3), DisplayFormat::U16, WordOrder::LowFirst, &cache);

        app.process_action(Action::RowRendered(row.clone()));
        app.process_action(Action::TargetChanged(Some(d(3))));
        app.process_action(Action::StatusChanged(ServerStatus::Running));

        assert_eq!(app.rows.get(&d(3)), Some(&row));
        assert_eq!(app.target_input.value(), "D3");
        assert_eq!(app.status, ServerStatus::Running);

        app.process_action(Action::RowsCleared);
        assert!(app.rows.is_empty());
    }

    #[test]
    fn log_pane_keeps_a_bounded_tail() {
        let mut app = app();
        let log = SessionLog::new(LOG_TAIL + 10);
        for i in 0..LOG_TAIL + 5 {
            app.process_action(Action::LogAppended(log.push(LogLevel::Info, format!("line {i}"))));
        }
        assert_eq!(app.log.len(), LOG_TAIL);
        assert_eq!(app.log.front().unwrap().message, "line 5");
    }

    #[test]
    fn target_field_captures_typing() {
        let mut app = app();
        assert!(app.handle_key_event(key(KeyCode::Char('t'))).is_none());
        assert!(app.target_focused);

        app.handle_key_event(key(KeyCode::Backspace));
        app.handle_key_event(key(KeyCode::Char('5')));
        // 'q' is text while the field has focus
        assert!(app.handle_key_event(key(KeyCode::Char('q'))).is_none());
        assert_eq!(app.target_input.value(), "D5q");

        app.handle_key_event(key(KeyCode::Esc));
        assert!(!app.target_focused);
    }

    #[test]
    fn quit_keys() {
        let mut app = app();
        assert!(matches!(app.handle_key_event(key(KeyCode::Char('q'))), Some(Action::Quit)));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(app.handle_key_event(ctrl_c), Some(Action::Quit)));
        app.process_action(Action::Quit);
        assert!(!app.running);
    }
}
