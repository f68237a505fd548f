//! Terminal input for the app loop.
//!
//! A spawned task merges the crossterm event stream with a frame clock and
//! forwards both over one channel, so the loop in `app` only ever awaits
//! [`EventReader::next`].

use std::time::Duration;

use crossterm::event::{Event as TermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    /// New terminal size as (columns, rows).
    Resize(u16, u16),
    /// Time to draw the next frame.
    Render,
}

pub struct EventReader {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventReader {
    /// Start reading; a `Render` is emitted every `frame` period.
    pub fn spawn(frame: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(pump(tx, frame, cancel.clone()));
        Self { rx, cancel }
    }

    /// `None` once the reader task has ended.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump(tx: mpsc::UnboundedSender<Event>, frame: Duration, cancel: CancellationToken) {
    let mut input = EventStream::new();
    let mut clock = tokio::time::interval(frame);
    // A slow frame drops ticks instead of queueing a burst of redraws.
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => return,
            _ = clock.tick() => Event::Render,
            Some(Ok(raw)) = input.next() => match translate(raw) {
                Some(event) => event,
                None => continue,
            },
        };
        if tx.send(event).is_err() {
            return;
        }
    }
}

/// Key presses and resizes matter; releases, repeats, mouse and focus
/// changes do not.
fn translate(raw: TermEvent) -> Option<Event> {
    match raw {
        TermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        TermEvent::Resize(cols, rows) => Some(Event::Resize(cols, rows)),
        _ => None,
    }
}
