//! Job coordinator
//!
//! Orchestrates the full lifecycle of every submitted call job: generates a
//! fresh key per record, populates the correlation store, pushes the key to
//! the engine's work queue, then consumes lifecycle events until every job
//! resolves.
//!
//! Per-job state machine:
//! `Enqueued → { Running → (Completed | Failed) } | Rejected | Timeout` —
//! all four right-hand states are terminal. The unknown-key and
//! engine-decline paths go straight to Rejected.
//!
//! Every job-scoped handler captures the timestamp at event arrival, resolves
//! input context from the store, writes exactly one report row, removes the
//! key, and re-checks the drain condition. Known-key ready jobs execute on
//! spawned tasks so the engine can keep its full concurrency limit of calls
//! in flight; their outcomes come back over an internal channel and the row
//! write, removal, and drain check still happen on the event loop. Drain
//! surfaces as [`Coordinator::run`] returning, so shutdown can only trigger
//! once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::ConversationSettings;
use crate::engine::{Conversation, JobQueue, QueueEvent, QueueEvents};
use crate::error::{EngineError, Result};
use crate::report::{ReportRow, ReportWriter};
use crate::store::CorrelationStore;
use crate::types::{CallRecord, JobKey, JobOutcome};

/// Outcome of one spawned conversation execution, reported back to the
/// event loop. `at` is the timestamp captured when the ready event arrived.
struct Resolution {
    at: DateTime<Utc>,
    key: JobKey,
    outcome: JobOutcome,
}

/// Coordinates enqueueing, event handling, and drain detection for one batch.
pub struct Coordinator {
    store: CorrelationStore,
    writer: ReportWriter,
    settings: ConversationSettings,
    queue: Arc<dyn JobQueue>,
}

impl Coordinator {
    /// Create a coordinator over an injected store, engine queue, report
    /// sink, and per-conversation settings.
    pub fn new(
        store: CorrelationStore,
        queue: Arc<dyn JobQueue>,
        writer: ReportWriter,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            store,
            writer,
            settings,
            queue,
        }
    }

    /// Number of jobs not yet resolved.
    pub fn outstanding(&self) -> usize {
        self.store.len()
    }

    /// Enqueue one job per record, strictly sequentially: generate a key,
    /// store the record under it, push the key to the engine. The store is
    /// populated before any callback can fire for that key.
    pub async fn enqueue(&mut self, records: Vec<CallRecord>) -> Result<usize> {
        let mut enqueued = 0;
        for record in records {
            let key = JobKey::generate();
            self.store.put(key, record)?;
            self.queue
                .push(key)
                .await
                .map_err(crate::error::Error::Engine)?;
            enqueued += 1;
        }
        info!("{enqueued} call(s) enqueued");
        Ok(enqueued)
    }

    /// Consume queue events until all jobs settle, then return.
    ///
    /// Ready jobs with known keys execute on spawned tasks, so the next
    /// event is picked up while calls are still in flight; each task's
    /// outcome comes back over an internal channel and is resolved here.
    ///
    /// Returns immediately if nothing is outstanding. The event stream
    /// closing while jobs are still outstanding (and none executing) is an
    /// engine transport failure and surfaces as an error.
    pub async fn run(&mut self, events: &mut QueueEvents) -> Result<()> {
        if self.store.is_empty() {
            return Ok(());
        }
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut executing = 0usize;
        let mut events_open = true;
        loop {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        let now = Utc::now();
                        match event {
                            QueueEvent::Ready { key, conversation } => {
                                if self.on_ready(now, key, conversation, &done_tx).await? {
                                    executing += 1;
                                }
                            }
                            QueueEvent::Rejected { key, error } => {
                                self.on_rejected(now, key, error)?;
                            }
                            QueueEvent::Timeout { key } => self.on_timeout(now, key)?,
                            QueueEvent::Error { error } => {
                                // Engine-level fault, tied to no job: log only, no row
                                error!(
                                    name = %error.name,
                                    reason = ?error.reason,
                                    "engine fault: {}",
                                    error.message
                                );
                            }
                        }
                    }
                    None => events_open = false,
                },
                Some(resolution) = done_rx.recv() => {
                    executing -= 1;
                    self.on_resolved(resolution)?;
                }
            }
            if self.store.is_empty() {
                info!("all jobs settled");
                return Ok(());
            }
            if !events_open && executing == 0 {
                return Err(
                    EngineError::transport("event stream closed with jobs outstanding").into(),
                );
            }
        }
    }

    /// Handle a ready job. Unknown keys are declined and resolved inline;
    /// known keys spawn an execution task that reports back through `done`.
    /// Returns whether a task was spawned.
    async fn on_ready(
        &mut self,
        now: DateTime<Utc>,
        key: JobKey,
        mut conversation: Box<dyn Conversation>,
        done: &mpsc::UnboundedSender<Resolution>,
    ) -> Result<bool> {
        let Some(record) = self.store.get(&key).cloned() else {
            warn!(key = %key, "no call data for ready job, declining");
            if let Err(error) = conversation.decline().await {
                warn!(key = %key, "failed to decline job: {error}");
            }
            self.writer.write(&ReportRow {
                timestamp: now,
                key,
                input: None,
                outcome: JobOutcome::Rejected { reason: None },
            })?;
            self.store.remove(&key);
            return Ok(false);
        };

        let settings = self.settings.clone();
        let done = done.clone();
        tokio::spawn(async move {
            conversation.set_input(record);
            conversation.configure(&settings);
            let outcome = match conversation.execute().await {
                Ok(result) => {
                    info!(key = %key, output = ?result.output, "job completed");
                    JobOutcome::Completed {
                        output: result.output,
                        recording_url: result.recording_url,
                    }
                }
                Err(error) => {
                    error!(key = %key, "job execution failed: {error}");
                    JobOutcome::Failed { error }
                }
            };
            // run() holds the receiver until the store drains
            let _ = done.send(Resolution { at: now, key, outcome });
        });
        Ok(true)
    }

    /// Resolve an executed job on the event loop: one row with whatever input
    /// the store still holds, then the removal.
    fn on_resolved(&mut self, resolution: Resolution) -> Result<()> {
        let Resolution { at, key, outcome } = resolution;
        let input = self.store.get(&key).cloned();
        self.writer.write(&ReportRow {
            timestamp: at,
            key,
            input,
            outcome,
        })?;
        self.store.remove(&key);
        Ok(())
    }

    fn on_rejected(&mut self, now: DateTime<Utc>, key: JobKey, error: EngineError) -> Result<()> {
        warn!(
            key = %key,
            name = %error.name,
            reason = ?error.reason,
            "job rejected: {}",
            error.message
        );
        let input = self.store.get(&key).cloned();
        self.writer.write(&ReportRow {
            timestamp: now,
            key,
            input,
            outcome: JobOutcome::Rejected {
                reason: Some(error),
            },
        })?;
        self.store.remove(&key);
        Ok(())
    }

    fn on_timeout(&mut self, now: DateTime<Utc>, key: JobKey) -> Result<()> {
        info!(key = %key, "job timed out");
        let input = self.store.get(&key).cloned();
        self.writer.write(&ReportRow {
            timestamp: now,
            key,
            input,
            outcome: JobOutcome::TimedOut,
        })?;
        self.store.remove(&key);
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ConversationResult;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct RecordingQueue {
        pushed: Mutex<Vec<JobKey>>,
    }

    impl RecordingQueue {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                pushed: Mutex::new(Vec::new()),
            })
        }

        fn pushed(&self) -> Vec<JobKey> {
            self.pushed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        async fn push(&self, key: JobKey) -> std::result::Result<(), EngineError> {
            self.pushed.lock().unwrap().push(key);
            Ok(())
        }

        async fn start(&self, _concurrency: usize) -> std::result::Result<(), EngineError> {
            Ok(())
        }
    }

    struct ScriptedConversation {
        result: Option<std::result::Result<ConversationResult, EngineError>>,
        declined: Arc<AtomicBool>,
    }

    impl ScriptedConversation {
        fn succeeding() -> Box<Self> {
            let mut output = serde_json::Map::new();
            output.insert("status".to_string(), "reached".into());
            Box::new(Self {
                result: Some(Ok(ConversationResult {
                    output,
                    recording_url: Some("https://records/1.wav".to_string()),
                })),
                declined: Arc::new(AtomicBool::new(false)),
            })
        }

        fn declinable(flag: Arc<AtomicBool>) -> Box<Self> {
            Box::new(Self {
                result: None,
                declined: flag,
            })
        }
    }

    #[async_trait]
    impl Conversation for ScriptedConversation {
        fn set_input(&mut self, _input: CallRecord) {}

        fn configure(&mut self, _settings: &ConversationSettings) {}

        async fn execute(&mut self) -> std::result::Result<ConversationResult, EngineError> {
            self.result
                .take()
                .unwrap_or_else(|| Err(EngineError::new("Script", "no scripted result")))
        }

        async fn decline(&mut self) -> std::result::Result<(), EngineError> {
            self.declined.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SleepingConversation {
        delay: Duration,
    }

    #[async_trait]
    impl Conversation for SleepingConversation {
        fn set_input(&mut self, _input: CallRecord) {}

        fn configure(&mut self, _settings: &ConversationSettings) {}

        async fn execute(&mut self) -> std::result::Result<ConversationResult, EngineError> {
            tokio::time::sleep(self.delay).await;
            Ok(ConversationResult::default())
        }

        async fn decline(&mut self) -> std::result::Result<(), EngineError> {
            Ok(())
        }
    }

    fn coordinator_at(path: &Path, queue: Arc<RecordingQueue>) -> Coordinator {
        let writer = ReportWriter::create(path, &["phone".to_string()]).unwrap();
        Coordinator::new(
            CorrelationStore::new(),
            queue,
            writer,
            ConversationSettings::default(),
        )
    }

    fn report_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    fn column<'a>(rows: &'a [Vec<String>], row: usize, name: &str) -> &'a str {
        let idx = rows[0].iter().position(|c| c == name).unwrap();
        &rows[row][idx]
    }

    #[tokio::test]
    async fn run_returns_immediately_with_nothing_outstanding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut coordinator = coordinator_at(&path, RecordingQueue::new());
        let (_tx, mut events) = mpsc::unbounded_channel();

        tokio::time::timeout(Duration::from_millis(100), coordinator.run(&mut events))
            .await
            .expect("run must not wait for events when nothing is enqueued")
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_pushes_one_distinct_key_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let queue = RecordingQueue::new();
        let mut coordinator = coordinator_at(&path, queue.clone());

        let records: Vec<CallRecord> = (0..3)
            .map(|i| CallRecord::from_pairs([("phone", format!("+{i}"))]))
            .collect();
        let enqueued = coordinator.enqueue(records).await.unwrap();

        assert_eq!(enqueued, 3);
        assert_eq!(coordinator.outstanding(), 3);
        let pushed = queue.pushed();
        assert_eq!(pushed.len(), 3, "one push per record");
        let distinct: std::collections::HashSet<_> = pushed.iter().collect();
        assert_eq!(distinct.len(), 3, "keys must be distinct");
    }

    #[tokio::test(start_paused = true)]
    async fn ready_jobs_execute_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let queue = RecordingQueue::new();
        let mut coordinator = coordinator_at(&path, queue.clone());
        let records: Vec<CallRecord> = (0..3)
            .map(|i| CallRecord::from_pairs([("phone", format!("+{i}"))]))
            .collect();
        coordinator.enqueue(records).await.unwrap();

        let (tx, mut events) = mpsc::unbounded_channel();
        for key in queue.pushed() {
            tx.send(QueueEvent::Ready {
                key,
                conversation: Box::new(SleepingConversation {
                    delay: Duration::from_millis(300),
                }),
            })
            .unwrap();
        }

        let began = tokio::time::Instant::now();
        coordinator.run(&mut events).await.unwrap();
        let elapsed = began.elapsed();

        assert!(
            elapsed < Duration::from_millis(900),
            "three 300ms calls must run in parallel, took {elapsed:?}"
        );
        let rows = report_rows(&path);
        assert_eq!(rows.len(), 4, "header plus one row per job");
        for row in 1..4 {
            assert_eq!(column(&rows, row, "Job Status"), "Completed");
        }
        assert_eq!(coordinator.outstanding(), 0);
    }

    #[tokio::test]
    async fn unknown_key_ready_declines_and_does_not_end_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let queue = RecordingQueue::new();
        let mut coordinator = coordinator_at(&path, queue.clone());
        coordinator
            .enqueue(vec![CallRecord::from_pairs([("phone", "+1555")])])
            .await
            .unwrap();
        let real_key = queue.pushed()[0];

        let declined = Arc::new(AtomicBool::new(false));
        let (tx, mut events) = mpsc::unbounded_channel();
        tx.send(QueueEvent::Ready {
            key: JobKey::generate(),
            conversation: ScriptedConversation::declinable(declined.clone()),
        })
        .unwrap();
        tx.send(QueueEvent::Timeout { key: real_key }).unwrap();

        coordinator.run(&mut events).await.unwrap();

        assert!(declined.load(Ordering::SeqCst), "unknown job must be declined");
        let rows = report_rows(&path);
        assert_eq!(rows.len(), 3, "header plus two rows");
        assert_eq!(column(&rows, 1, "Job Status"), "Rejected");
        assert_eq!(column(&rows, 1, "Phone"), "", "unknown key has no input");
        assert_eq!(column(&rows, 2, "Job Status"), "Timeout");
        assert_eq!(column(&rows, 2, "Phone"), "+1555");
    }

    #[tokio::test]
    async fn engine_level_error_writes_no_row_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let queue = RecordingQueue::new();
        let mut coordinator = coordinator_at(&path, queue.clone());
        coordinator
            .enqueue(vec![CallRecord::from_pairs([("phone", "+1555")])])
            .await
            .unwrap();
        let key = queue.pushed()[0];

        let (tx, mut events) = mpsc::unbounded_channel();
        tx.send(QueueEvent::Error {
            error: EngineError::transport("connection reset"),
        })
        .unwrap();
        tx.send(QueueEvent::Ready {
            key,
            conversation: ScriptedConversation::succeeding(),
        })
        .unwrap();

        coordinator.run(&mut events).await.unwrap();

        let rows = report_rows(&path);
        assert_eq!(rows.len(), 2, "engine-level error must not produce a row");
        assert_eq!(column(&rows, 1, "Job Status"), "Completed");
        assert_eq!(column(&rows, 1, "RecordUrl"), "https://records/1.wav");
    }

    #[tokio::test]
    async fn execution_failure_resolves_the_job_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let queue = RecordingQueue::new();
        let mut coordinator = coordinator_at(&path, queue.clone());
        coordinator
            .enqueue(vec![CallRecord::from_pairs([("phone", "+1555")])])
            .await
            .unwrap();
        let key = queue.pushed()[0];

        let (tx, mut events) = mpsc::unbounded_channel();
        tx.send(QueueEvent::Ready {
            key,
            conversation: Box::new(ScriptedConversation {
                result: Some(Err(EngineError::new("ExecutionError", "dialog crashed"))),
                declined: Arc::new(AtomicBool::new(false)),
            }),
        })
        .unwrap();

        coordinator.run(&mut events).await.unwrap();

        let rows = report_rows(&path);
        assert_eq!(column(&rows, 1, "Job Status"), "Failed");
        assert_eq!(column(&rows, 1, "Phone"), "+1555", "input context survives");
        assert_eq!(coordinator.outstanding(), 0);
    }

    #[tokio::test]
    async fn closed_event_stream_with_outstanding_jobs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let queue = RecordingQueue::new();
        let mut coordinator = coordinator_at(&path, queue.clone());
        coordinator
            .enqueue(vec![CallRecord::from_pairs([("phone", "+1555")])])
            .await
            .unwrap();

        let (tx, mut events) = mpsc::unbounded_channel::<QueueEvent>();
        drop(tx);

        let err = coordinator.run(&mut events).await.unwrap_err();
        assert!(matches!(err, Error::Engine(_)), "expected Engine, got: {err}");
    }
}
