//! Status sinks: durable destinations for aggregate counts and per-item
//! outcomes.
//!
//! The engine only knows the [`StatusSink`] trait. [`CsvStatusSink`] is the
//! production implementation: a `Result,Count` file that is fully rewritten
//! after every recorded event, and a per-item status file that is appended
//! one row per finished item. [`MemorySink`] backs tests.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::outcome::{ItemOutcome, ResultKey};

/// Default file name for the aggregate counts snapshot.
pub const COUNTS_FILE_NAME: &str = "status_counts.csv";

/// Default file name for the per-item status log.
pub const ITEMS_FILE_NAME: &str = "downloaded_reports.csv";

/// Errors raised while persisting status data.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Opening or writing a sink file failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File the failure occurred on.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error on {path}: {source}")]
    Csv {
        /// File the failure occurred on.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

impl SinkError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Destination for aggregate snapshots and per-item outcome rows.
///
/// Implementations must be safe to call from concurrent workers; the
/// aggregator serializes calls, but the trait itself is `Send + Sync` so it
/// can be shared behind an `Arc`.
pub trait StatusSink: Send + Sync {
    /// Replaces the persisted counts with the given full snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the snapshot cannot be written.
    fn write_counts(&self, snapshot: &[(ResultKey, u64)]) -> Result<(), SinkError>;

    /// Appends one terminal item outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the row cannot be written.
    fn write_item(&self, outcome: &ItemOutcome) -> Result<(), SinkError>;
}

#[derive(Serialize)]
struct CountRow {
    #[serde(rename = "Result")]
    result: String,
    #[serde(rename = "Count")]
    count: u64,
}

#[derive(Serialize)]
struct ItemRow<'a> {
    #[serde(rename = "Id")]
    id: &'a str,
    #[serde(rename = "Downloaded")]
    downloaded: &'static str,
    #[serde(rename = "Cause")]
    cause: String,
}

/// CSV-backed status sink writing into an output directory.
#[derive(Debug)]
pub struct CsvStatusSink {
    counts_path: PathBuf,
    items_path: PathBuf,
    items_writer: Mutex<csv::Writer<File>>,
}

impl CsvStatusSink {
    /// Opens (or creates) the sink files inside `output_dir`.
    ///
    /// The per-item file is opened in append mode so re-runs extend the
    /// existing log; its header row is only written when the file is new.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the per-item file cannot be opened.
    pub fn new(output_dir: &Path) -> Result<Self, SinkError> {
        let counts_path = output_dir.join(COUNTS_FILE_NAME);
        let items_path = output_dir.join(ITEMS_FILE_NAME);

        let has_rows = items_path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let items_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&items_path)
            .map_err(|e| SinkError::io(&items_path, e))?;
        let items_writer = csv::WriterBuilder::new()
            .has_headers(!has_rows)
            .from_writer(items_file);

        debug!(
            counts = %counts_path.display(),
            items = %items_path.display(),
            "opened CSV status sink"
        );

        Ok(Self {
            counts_path,
            items_path,
            items_writer: Mutex::new(items_writer),
        })
    }

    /// Path of the counts snapshot file.
    #[must_use]
    pub fn counts_path(&self) -> &Path {
        &self.counts_path
    }

    /// Path of the per-item status file.
    #[must_use]
    pub fn items_path(&self) -> &Path {
        &self.items_path
    }
}

impl StatusSink for CsvStatusSink {
    fn write_counts(&self, snapshot: &[(ResultKey, u64)]) -> Result<(), SinkError> {
        // Full overwrite: the file always holds the latest complete counts.
        let mut writer =
            csv::Writer::from_path(&self.counts_path).map_err(|e| SinkError::csv(&self.counts_path, e))?;
        for (key, count) in snapshot {
            writer
                .serialize(CountRow {
                    result: key.to_string(),
                    count: *count,
                })
                .map_err(|e| SinkError::csv(&self.counts_path, e))?;
        }
        writer
            .flush()
            .map_err(|e| SinkError::io(&self.counts_path, e))?;
        Ok(())
    }

    fn write_item(&self, outcome: &ItemOutcome) -> Result<(), SinkError> {
        let mut writer = self
            .items_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        writer
            .serialize(ItemRow {
                id: &outcome.item_id,
                downloaded: if outcome.downloaded { "Yes" } else { "No" },
                cause: outcome.cause_label(),
            })
            .map_err(|e| SinkError::csv(&self.items_path, e))?;
        writer
            .flush()
            .map_err(|e| SinkError::io(&self.items_path, e))?;
        Ok(())
    }
}

/// In-memory sink recording everything it receives. Test support.
#[derive(Debug, Default)]
pub struct MemorySink {
    count_snapshots: Mutex<Vec<Vec<(ResultKey, u64)>>>,
    item_outcomes: Mutex<Vec<ItemOutcome>>,
}

impl MemorySink {
    /// Every counts snapshot written so far, oldest first.
    #[must_use]
    pub fn count_snapshots(&self) -> Vec<Vec<(ResultKey, u64)>> {
        self.count_snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every item outcome written so far, in write order.
    #[must_use]
    pub fn item_outcomes(&self) -> Vec<ItemOutcome> {
        self.item_outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatusSink for MemorySink {
    fn write_counts(&self, snapshot: &[(ResultKey, u64)]) -> Result<(), SinkError> {
        self.count_snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.to_vec());
        Ok(())
    }

    fn write_item(&self, outcome: &ItemOutcome) -> Result<(), SinkError> {
        self.item_outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        Ok(())
    }
}
