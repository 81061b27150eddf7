//! Core types for outdial

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::EngineError;

/// Unique opaque correlation token for one scheduled call job.
///
/// Generated once per input record at enqueue time (128-bit random), never
/// reused, and the only handle the engine's callbacks carry back. Exactly one
/// live key exists per outstanding job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(Uuid);

impl JobKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Terminal status of a job, exactly as written to the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// The call executed without error
    Completed,
    /// Execution raised an error
    Failed,
    /// The engine declined the job, or its key was unknown locally
    Rejected,
    /// The job exceeded its allotted execution time
    Timeout,
}

impl JobStatus {
    /// Report-column spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Rejected => "Rejected",
            JobStatus::Timeout => "Timeout",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a job.
///
/// One of four mutually exclusive resolutions; no transition leaves any of
/// them. Carries whatever context the resolution produced so the report row
/// can be written from it.
#[derive(Clone, Debug)]
pub enum JobOutcome {
    /// The call executed without error
    Completed {
        /// Result fields returned by the conversation
        output: Map<String, Value>,
        /// URL of the call recording, when the platform produced one
        recording_url: Option<String>,
    },
    /// Execution raised an error (logged, not persisted beyond the status)
    Failed {
        /// The execution error
        error: EngineError,
    },
    /// The engine declined the job, or its key was unknown locally
    Rejected {
        /// Decline reason, absent on the unknown-key path
        reason: Option<EngineError>,
    },
    /// The job exceeded its allotted execution time
    TimedOut,
}

impl JobOutcome {
    /// The report status this outcome maps to.
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
            JobOutcome::Rejected { .. } => JobStatus::Rejected,
            JobOutcome::TimedOut => JobStatus::Timeout,
        }
    }
}

/// One input row of the call schedule.
///
/// An ordered field-name → value mapping, immutable once loaded. Field order
/// follows the input file's header row and is preserved through
/// serialization (conversation input) and into pass-through report columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallRecord {
    fields: Vec<(String, String)>,
}

impl CallRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from (name, value) pairs, preserving order.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Look up a field value by exact name (first match).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate fields in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for CallRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn job_keys_are_distinct_across_generations() {
        let keys: HashSet<JobKey> = (0..1000).map(|_| JobKey::generate()).collect();
        assert_eq!(keys.len(), 1000, "1000 generated keys must all be distinct");
    }

    #[test]
    fn job_key_round_trips_through_display_and_from_str() {
        let key = JobKey::generate();
        let parsed = JobKey::from_str(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn job_key_from_str_rejects_garbage() {
        assert!(JobKey::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn job_status_spellings_match_report_values() {
        assert_eq!(JobStatus::Completed.as_str(), "Completed");
        assert_eq!(JobStatus::Failed.as_str(), "Failed");
        assert_eq!(JobStatus::Rejected.as_str(), "Rejected");
        assert_eq!(JobStatus::Timeout.as_str(), "Timeout");
    }

    #[test]
    fn outcome_maps_to_status_for_all_variants() {
        let completed = JobOutcome::Completed {
            output: Map::new(),
            recording_url: None,
        };
        let failed = JobOutcome::Failed {
            error: EngineError::new("X", "y"),
        };
        let rejected = JobOutcome::Rejected { reason: None };

        assert_eq!(completed.status(), JobStatus::Completed);
        assert_eq!(failed.status(), JobStatus::Failed);
        assert_eq!(rejected.status(), JobStatus::Rejected);
        assert_eq!(JobOutcome::TimedOut.status(), JobStatus::Timeout);
    }

    #[test]
    fn call_record_preserves_field_order() {
        let record = CallRecord::from_pairs([("phone", "+1555"), ("name", "Alice"), ("a", "1")]);
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["phone", "name", "a"]);
    }

    #[test]
    fn call_record_get_finds_value_by_name() {
        let record = CallRecord::from_pairs([("phone", "+1555"), ("name", "Alice")]);
        assert_eq!(record.get("name"), Some("Alice"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn call_record_serializes_as_ordered_json_object() {
        let record = CallRecord::from_pairs([("b", "2"), ("a", "1")]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json, r#"{"b":"2","a":"1"}"#,
            "field order must follow input order, not be sorted"
        );
    }
}
