//! # outdial
//!
//! Batch scheduler for outbound automated phone calls.
//!
//! Reads a CSV call schedule, dispatches one job per row through an external
//! conversational-AI calling platform, and writes a CSV report with one row
//! per resolved job. The crate's own core is deliberately small: a
//! correlation store keyed by generated job keys, a coordinator reacting to
//! the engine's four terminal lifecycle events, and a drain-then-linger
//! shutdown. The dialog, audio, and telephony work all happens on the
//! platform side, behind the [`engine`] boundary.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - the CLI binary is a thin wrapper over [`run_batch`]
//! - **Event-driven** - the coordinator consumes engine events, no polling
//! - **Fail loud on input** - a malformed schedule aborts before any call
//! - **Recover per job** - failures, rejections, and timeouts become report
//!   rows, never batch aborts
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use outdial::{Config, PlatformEngine, run_batch, shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let (engine, events) = PlatformEngine::deploy(&config.deploy).await?;
//!
//!     run_batch(
//!         engine,
//!         events,
//!         &config,
//!         Path::new("calls.csv"),
//!         Path::new("report.csv"),
//!     )
//!     .await?;
//!
//!     shutdown::linger(config.queue.shutdown_grace).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Job lifecycle coordination
pub mod coordinator;
/// Engine boundary and the platform client
pub mod engine;
/// Error types
pub mod error;
/// Call schedule loading
pub mod loader;
/// CSV outcome report
pub mod report;
/// Post-drain shutdown grace period
pub mod shutdown;
/// Job correlation store
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConversationSettings, CsvConfig, DeployConfig, QueueConfig};
pub use coordinator::Coordinator;
pub use engine::platform::PlatformEngine;
pub use engine::{Conversation, ConversationResult, JobQueue, QueueEvent, QueueEvents};
pub use error::{EngineError, Error, Result};
pub use loader::{CallSchedule, load_call_schedule};
pub use report::{ReportRow, ReportWriter, default_report_path};
pub use store::CorrelationStore;
pub use types::{CallRecord, JobKey, JobOutcome, JobStatus};

use std::path::Path;
use std::sync::Arc;

use tracing::info;

/// Run one batch end to end: load the schedule, enqueue every record, start
/// the engine, and consume events until all jobs settle.
///
/// Returns once the batch has drained (or immediately when the schedule is
/// empty). The caller decides what happens next — the CLI lingers for the
/// configured grace period and exits.
pub async fn run_batch(
    queue: Arc<dyn JobQueue>,
    mut events: QueueEvents,
    config: &Config,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let schedule = loader::load_call_schedule(input, &config.csv)?;
    let writer = ReportWriter::create(output, &schedule.headers)?;

    let mut coordinator = Coordinator::new(
        CorrelationStore::new(),
        Arc::clone(&queue),
        writer,
        config.conversation.clone(),
    );

    let enqueued = coordinator.enqueue(schedule.records).await?;
    if enqueued == 0 {
        info!(input = %input.display(), "no call records to dispatch");
        return Ok(());
    }

    queue
        .start(config.queue.concurrency)
        .await
        .map_err(Error::Engine)?;

    coordinator.run(&mut events).await
}
