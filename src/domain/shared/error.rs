//! Call-flow errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while orchestrating a call.
///
/// The variant decides whether the execution engine may retry: only
/// switch-side failures ([`FlowError::Transport`]) and exceeded activity
/// bounds ([`FlowError::Timeout`]) are retryable. Everything else is
/// returned to the caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FlowError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("switch transport error: {0}")]
    Transport(String),

    #[error("activity timed out: {0}")]
    Timeout(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("workflow cancelled: {0}")]
    Cancelled(String),

    #[error("workflow already running: {0}")]
    AlreadyRunning(String),

    #[error("checkpoint store error: {0}")]
    Checkpoint(String),
}

impl FlowError {
    pub fn input(message: impl Into<String>) -> Self {
        FlowError::Input(message.into())
    }

    /// Shorthand for a required field that was absent.
    pub fn require_field(field: impl Into<String>) -> Self {
        FlowError::MissingField(field.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Transport(_) | FlowError::Timeout(_))
    }

    /// Stable label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::Input(_) => "input",
            FlowError::MissingField(_) => "missing_field",
            FlowError::Transport(_) => "transport",
            FlowError::Timeout(_) => "timeout",
            FlowError::UnsupportedAction(_) => "unsupported_action",
            FlowError::Cancelled(_) => "cancelled",
            FlowError::AlreadyRunning(_) => "already_running",
            FlowError::Checkpoint(_) => "checkpoint",
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Input(err.to_string())
    }
}
