//! CSV report of per-job outcomes
//!
//! One always-quoted row per resolved job, appended in resolution order (not
//! enqueue order) and flushed immediately. The column schema is fixed when
//! the sink is opened: a timestamp, the six standard columns, the job key,
//! then every input header not already covered (pass-through). Result-output
//! fields fill whichever column matches their name; on a collision,
//! coordinator metadata wins over result output, which wins over the input
//! record.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::types::{CallRecord, JobKey, JobOutcome};

/// The six standard report columns, in order.
pub const FIXED_COLUMNS: [&str; 6] = [
    "Phone",
    "Status",
    "Service Status",
    "RecordUrl",
    "Job Status",
    "Errors",
];

/// One report row: the resolution of a single job.
#[derive(Clone, Debug)]
pub struct ReportRow {
    /// When the resolving event arrived (captured before any handler I/O)
    pub timestamp: DateTime<Utc>,
    /// The job's correlation key
    pub key: JobKey,
    /// The originating call record, when the store still held it
    pub input: Option<CallRecord>,
    /// The terminal outcome
    pub outcome: JobOutcome,
}

/// Append-only CSV sink for report rows.
///
/// The file handle is acquired once at startup and released at process exit;
/// write errors propagate and abort the batch.
pub struct ReportWriter {
    writer: csv::Writer<File>,
    columns: Vec<String>,
}

impl ReportWriter {
    /// Open the report sink and write the header immediately.
    ///
    /// `input_headers` are the call schedule's field names; any not covered
    /// by a standard column become pass-through columns, in input order.
    pub fn create(path: &Path, input_headers: &[String]) -> Result<Self> {
        let columns = build_columns(input_headers);
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(file);
        writer.write_record(&columns)?;
        writer.flush()?;
        Ok(Self { writer, columns })
    }

    /// Append one row and flush.
    pub fn write(&mut self, row: &ReportRow) -> Result<()> {
        let mut cells = vec![String::new(); self.columns.len()];

        // Input record fields (lowest precedence)
        if let Some(input) = &row.input {
            for (name, value) in input.iter() {
                if let Some(idx) = self.column_index(name) {
                    cells[idx] = value.to_string();
                }
            }
        }

        // Result-output fields
        if let JobOutcome::Completed { output, .. } = &row.outcome {
            for (name, value) in output {
                match self.column_index(name) {
                    Some(idx) => cells[idx] = cell_value(value),
                    None => {
                        debug!(field = %name, "result field has no report column, dropping");
                    }
                }
            }
        }

        // Coordinator metadata (highest precedence)
        self.set(&mut cells, "Timestamp", row.timestamp.to_rfc3339());
        self.set(&mut cells, "Key", row.key.to_string());
        self.set(&mut cells, "Job Status", row.outcome.status().as_str().to_string());
        if let JobOutcome::Completed {
            recording_url: Some(url),
            ..
        } = &row.outcome
        {
            self.set(&mut cells, "RecordUrl", url.clone());
        }

        self.writer.write_record(&cells)?;
        self.writer.flush()?;
        Ok(())
    }

    /// The full column schema, header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn set(&self, cells: &mut [String], column: &str, value: String) {
        if let Some(idx) = self.column_index(column) {
            cells[idx] = value;
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = fold_name(name);
        self.columns.iter().position(|c| fold_name(c) == wanted)
    }
}

/// Derive a report path from the current local time:
/// `YYYY-MM-DD_HH-mm-ss.csv`.
pub fn default_report_path(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{}.csv", now.format("%Y-%m-%d_%H-%M-%S")))
}

fn build_columns(input_headers: &[String]) -> Vec<String> {
    let mut columns = Vec::with_capacity(FIXED_COLUMNS.len() + input_headers.len() + 2);
    columns.push("Timestamp".to_string());
    columns.extend(FIXED_COLUMNS.iter().map(|c| (*c).to_string()));
    columns.push("Key".to_string());
    for header in input_headers {
        let folded = fold_name(header);
        if !columns.iter().any(|c| fold_name(c) == folded) {
            columns.push(header.clone());
        }
    }
    columns
}

/// Case- and separator-insensitive column name, so `serviceStatus`,
/// `service_status`, and "Service Status" all address the same column.
fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
