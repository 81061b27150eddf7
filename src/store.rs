//! Job correlation store
//!
//! Maps outstanding job keys to their originating call records so event
//! handlers can recover input context when only a key comes back from the
//! engine. A key is present exactly while its job is unresolved: inserted at
//! enqueue time, removed exactly once by the handler that resolves the job.
//! The store is an owned, injected value — the coordinator holds it and the
//! cooperative scheduler serializes all mutation, so no locking is needed.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{CallRecord, JobKey};

/// Mapping from live job key to the originating call record.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    jobs: HashMap<JobKey, CallRecord>,
}

impl CorrelationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly enqueued job.
    ///
    /// Errors with [`Error::DuplicateKey`] if the key is already live, which
    /// key generation guarantees should never happen.
    pub fn put(&mut self, key: JobKey, record: CallRecord) -> Result<()> {
        match self.jobs.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => Err(Error::DuplicateKey(key)),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    /// Look up the record for a key. Not-found is a valid, handled outcome
    /// (the coordinator treats it as a rejection, not a crash).
    pub fn get(&self, key: &JobKey) -> Option<&CallRecord> {
        self.jobs.get(key)
    }

    /// Remove a resolved job. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &JobKey) -> Option<CallRecord> {
        self.jobs.remove(key)
    }

    /// Number of outstanding jobs, used for drain detection.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no jobs remain outstanding.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
