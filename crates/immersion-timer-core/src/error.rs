//! Core error types for immersion-timer-core.
//!
//! Errors are layered with thiserror: each subsystem has its own enum and
//! `CoreError` wraps them for callers that just want one type.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::TimerStatus;

/// Core error type for immersion-timer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer transition rejected
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Durable storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected timer operations. The state is left untouched whenever one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Duration input was zero, negative, fractional or not a number
    #[error("Invalid duration '{input}': must be a positive whole number of minutes")]
    InvalidDuration { input: String },

    /// Mode and duration cannot change under a running segment
    #[error("Cannot {operation} while the timer is {status}")]
    NotAllowed {
        operation: &'static str,
        status: TimerStatus,
    },
}

/// Durable storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[source] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Completion side-effect failures. These never leave the notifier; they
/// exist so adapters can report what went wrong to the log.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Notifications unavailable on this platform: {0}")]
    Unavailable(String),

    #[error("Audio cue failed: {0}")]
    Audio(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_error_messages_name_the_operation() {
        let err = TimerError::NotAllowed {
            operation: "change mode",
            status: TimerStatus::Running,
        };
        assert_eq!(err.to_string(), "Cannot change mode while the timer is running");
    }

    #[test]
    fn timer_error_converts_into_core_error() {
        let err: CoreError = TimerError::InvalidDuration { input: "0".into() }.into();
        assert!(matches!(err, CoreError::Timer(_)));
        assert!(err.to_string().contains("positive whole number"));
    }
}
