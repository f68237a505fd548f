// ── Core error types ──
//
// Every failure in the monitor degrades a single operation. Callers get a
// `CoreError` back; the engine logs it and stays ready for the next input.

use thiserror::Error;

use crate::model::DisplayFormat;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Parse errors (never reach the backend) ───────────────────────
    #[error("Invalid device address: '{token}'")]
    InvalidAddress { token: String },

    #[error("Invalid {format} literal '{literal}': {reason}")]
    InvalidLiteral {
        format: DisplayFormat,
        literal: String,
        reason: String,
    },

    #[error("No edit in progress")]
    NotEditing,

    // ── Transport errors ─────────────────────────────────────────────
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("Event subscription denied: {reason}")]
    SubscriptionDenied { reason: String },

    // ── Payload errors ───────────────────────────────────────────────
    #[error("Malformed {event} payload: {message}")]
    Payload { event: String, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a transport failure of a named command.
    pub fn transport(operation: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn literal(format: DisplayFormat, literal: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLiteral {
            format,
            literal: literal.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload {
            event: "unknown".into(),
            message: err.to_string(),
        }
    }
}
