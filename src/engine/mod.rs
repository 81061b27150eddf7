//! Engine boundary — the external conversational-AI calling platform
//!
//! The platform does the actual dialog, audio, and telephony work; this crate
//! only enqueues job keys and reacts to the four lifecycle events that come
//! back. The boundary is two traits (a work queue and a per-call
//! conversation) plus an event stream, so the coordinator can be exercised
//! against an in-memory fake in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::config::ConversationSettings;
use crate::error::EngineError;
use crate::types::{CallRecord, JobKey};

pub mod platform;

/// Result of a successfully executed conversation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationResult {
    /// Result fields produced by the dialog (e.g. status, serviceStatus)
    #[serde(default)]
    pub output: Map<String, Value>,

    /// URL of the call recording, when the platform produced one
    #[serde(default)]
    pub recording_url: Option<String>,
}

/// Lifecycle event emitted by a deployed application's work queue.
///
/// The four job-scoped events are mutually exclusive and terminal per key;
/// `Error` is engine-level and tied to no job.
pub enum QueueEvent {
    /// A job reached the front of the queue; its conversation is ready to run
    Ready {
        /// The job's correlation key
        key: JobKey,
        /// Handle for configuring and executing the call
        conversation: Box<dyn Conversation>,
    },

    /// The engine declined the job outright
    Rejected {
        /// The job's correlation key
        key: JobKey,
        /// Why the engine declined it
        error: EngineError,
    },

    /// The job exceeded its allotted execution time
    Timeout {
        /// The job's correlation key
        key: JobKey,
    },

    /// Transport or engine fault not tied to a specific job
    Error {
        /// The fault
        error: EngineError,
    },
}

impl std::fmt::Debug for QueueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEvent::Ready { key, .. } => f
                .debug_struct("Ready")
                .field("key", key)
                .finish_non_exhaustive(),
            QueueEvent::Rejected { key, error } => f
                .debug_struct("Rejected")
                .field("key", key)
                .field("error", error)
                .finish(),
            QueueEvent::Timeout { key } => {
                f.debug_struct("Timeout").field("key", key).finish()
            }
            QueueEvent::Error { error } => {
                f.debug_struct("Error").field("error", error).finish()
            }
        }
    }
}

/// Receiver half of the engine's event stream, handed out at deploy time.
pub type QueueEvents = mpsc::UnboundedReceiver<QueueEvent>;

/// Work queue of a deployed application.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job key to the queue.
    async fn push(&self, key: JobKey) -> Result<(), EngineError>;

    /// Start executing queued jobs, bounded by the given concurrency limit.
    /// The limit is enforced by the engine, not locally.
    async fn start(&self, concurrency: usize) -> Result<(), EngineError>;
}

/// One ready-to-run conversation, carried by [`QueueEvent::Ready`].
#[async_trait]
pub trait Conversation: Send {
    /// Supply the correlated call record as conversation input.
    fn set_input(&mut self, input: CallRecord);

    /// Apply ambient-noise, SIP, and TTS settings before execution.
    fn configure(&mut self, settings: &ConversationSettings);

    /// Execute the call. Suspends until the platform resolves it.
    async fn execute(&mut self) -> Result<ConversationResult, EngineError>;

    /// Decline the job back to the engine (unknown-key path).
    async fn decline(&mut self) -> Result<(), EngineError>;
}
