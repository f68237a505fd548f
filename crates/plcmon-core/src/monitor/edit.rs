// ── Selection and edit workflow ──

use tracing::{debug, info, warn};

use super::Monitor;
use crate::backend::CommandSink;
use crate::codec::{EncodedWrite, encode_write};
use crate::error::CoreError;
use crate::log::LogLevel;
use crate::model::{DeviceAddress, DisplayFormat};
use crate::selection::SelectionState;

impl<C: CommandSink> Monitor<C> {
    /// Select the row at `addr`.
    ///
    /// If the row does not exist yet (monitoring just started and the first
    /// update is still in flight) this retries with a short backoff, then
    /// gives up quietly. Returns whether the row was selected.
    pub async fn select(&self, addr: &DeviceAddress) -> bool {
        let retries = self.inner.config.select_retry_attempts;
        let backoff = self.inner.config.select_retry_backoff;
        for attempt in 0..=retries {
            if self.inner.rows.contains(addr) {
                self.update_selection(|s| {
                    let before = s.clone();
                    s.select(addr.clone());
                    *s != before
                });
                return true;
            }
            if attempt < retries {
                tokio::time::sleep(backoff).await;
            }
        }
        debug!(%addr, retries, "row never appeared, selection abandoned");
        false
    }

    /// Move the selection `delta` rows, clamped to the first and last row.
    /// With nothing selected, selects the first row.
    pub fn navigate(&self, delta: isize) -> Option<DeviceAddress> {
        let current = self.selection().selected().cloned();
        let next = self.inner.rows.step(current.as_ref(), delta)?;
        let chosen = next.clone();
        self.update_selection(move |s| {
            let before = s.clone();
            s.select(chosen);
            *s != before
        });
        Some(next)
    }

    /// Open the edit surface on the selected row. The write format starts
    /// as the current display format.
    pub fn activate(&self) -> bool {
        let format = self.format();
        self.update_selection(|s| s.activate(format))
    }

    /// Close the edit surface without writing.
    pub fn cancel_edit(&self) -> bool {
        self.update_selection(SelectionState::cancel)
    }

    pub fn set_literal(&self, literal: &str) -> bool {
        self.update_selection(|s| s.set_literal(literal))
    }

    pub fn set_write_format(&self, format: DisplayFormat) -> bool {
        self.update_selection(|s| s.set_write_format(format))
    }

    /// Step the write format of the open edit.
    pub fn cycle_write_format(&self, forward: bool) -> Option<DisplayFormat> {
        let current = self.selection().edit()?.format;
        let next = if forward { current.next() } else { current.prev() };
        self.set_write_format(next).then_some(next)
    }

    /// Encode the literal and write it.
    ///
    /// The cache is updated before the write is sent. A rejected write is
    /// reported but not rolled back. The edit surface stays open either
    /// way.
    pub async fn commit_edit(&self) -> Result<EncodedWrite, CoreError> {
        let Some(edit) = self.selection().edit().cloned() else {
            return Err(CoreError::NotEditing);
        };

        let write = encode_write(
            edit.format,
            &edit.address,
            &edit.literal,
            self.inner.config.word_order,
        )
        .inspect_err(|e| {
            warn!(error = %e, "rejected edit literal");
            self.log(LogLevel::Error, e.to_string());
        })?;

        for (i, word) in write.words.iter().enumerate() {
            if let Some(addr) = write.base.offset(i) {
                self.apply_word(&addr, u32::from(*word));
            }
        }

        if let Err(e) = self
            .inner
            .sink
            .set_words(write.base.key(), write.base.addr(), &write.words)
            .await
        {
            warn!(error = %e, base = %write.base, "write rejected");
            self.log(
                LogLevel::Error,
                format!("write to {} rejected: {e}", write.base),
            );
            return Err(e);
        }

        info!(base = %write.base, words = write.words.len(), format = %edit.format, "words written");
        self.log(
            LogLevel::Info,
            format!("wrote {} ({}) at {}", edit.literal.trim(), edit.format, write.base),
        );
        Ok(write)
    }
}
