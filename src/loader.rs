//! Call schedule loading from delimited input files
//!
//! The header row defines field names; data rows become [`CallRecord`]s in
//! file order. Parse failures propagate — a malformed schedule aborts the
//! batch before anything is enqueued, rather than silently skipping calls.

use std::fs::File;
use std::path::Path;

use tracing::debug;

use crate::config::CsvConfig;
use crate::error::Result;
use crate::types::CallRecord;

/// A loaded call schedule: the input header plus one record per data row.
#[derive(Clone, Debug, Default)]
pub struct CallSchedule {
    /// Field names from the header row, in file order
    pub headers: Vec<String>,
    /// One record per data row, in file order
    pub records: Vec<CallRecord>,
}

/// Load a call schedule from a delimited file.
///
/// Fails with [`crate::Error::Io`] if the file cannot be opened and with
/// [`crate::Error::Csv`] on any malformed row.
pub fn load_call_schedule(path: &Path, options: &CsvConfig) -> Result<CallSchedule> {
    // Open explicitly so an unreadable file surfaces as an I/O error, not a
    // CSV error.
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(true)
        .from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = CallRecord::new();
        for (name, value) in headers.iter().zip(row.iter()) {
            record.push(name, value);
        }
        records.push(record);
    }

    debug!(
        path = %path.display(),
        records = records.len(),
        "loaded call schedule"
    );
    Ok(CallSchedule { headers, records })
}
