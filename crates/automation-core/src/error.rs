//! Error types for the automation state store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading, writing, or editing persisted state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read config {path}: {reason}")]
    ReadConfig { path: PathBuf, reason: String },

    #[error("failed to write config {path}: {reason}")]
    WriteConfig { path: PathBuf, reason: String },

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid environment: {0}")]
    Invariant(String),
}

impl StateError {
    pub(crate) fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ReadConfig {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteConfig {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
