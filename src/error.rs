//! Error types for outdial
//!
//! Two layers of errors exist:
//! - [`Error`] — crate-level taxonomy used by the loader, report writer, and
//!   coordinator. Input and sink errors are fatal; everything else is
//!   recovered per job.
//! - [`EngineError`] — a fault as the calling platform reports it
//!   (name/message and an optional reason), attached to rejected jobs and
//!   engine-level transport failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::JobKey;

/// Result type alias for outdial operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for outdial
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// I/O error (unreadable input file, unwritable report sink)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write error (malformed rows propagate, never skipped)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A generated job key collided with a live one
    #[error("duplicate job key: {0}")]
    DuplicateKey(JobKey),

    /// Fault reported by the calling platform
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Network error talking to the platform API
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A fault as reported by the calling platform.
///
/// The platform attaches a symbolic `name`, a human-readable `message`, and
/// sometimes a `reason` (e.g. why a job was declined). All three are logged;
/// only the terminal status reaches the report.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct EngineError {
    /// Symbolic error name (e.g. "QueueError", "TransportError")
    pub name: String,
    /// Human-readable error message
    pub message: String,
    /// Optional reason supplied by the platform (rejections mostly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EngineError {
    /// Create an engine error with a name and message.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            reason: None,
        }
    }

    /// Attach the platform-supplied reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Transport-level fault (HTTP/connection), not tied to one job.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new("TransportError", message)
    }
}
