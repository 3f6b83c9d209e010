//! Catalog source: turns a delimited catalog file into work items.
//!
//! The catalog is a CSV file whose first three columns are
//! `id, primary_url, backup_url` (a header row is expected and skipped).
//! Placeholder backup values such as an empty cell, `nan` or `N/A` are
//! normalized to "no backup". Rows missing an id or primary URL are skipped
//! with a warning rather than failing the batch, matching how a large
//! hand-maintained catalog behaves in practice.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::item::WorkItem;

/// Errors raised while reading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be opened or parsed at all.
    #[error("failed to read catalog {path}: {source}")]
    Read {
        /// The catalog path.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

/// Reads the catalog into a list of validated work items.
///
/// # Errors
///
/// Returns [`CatalogError::Read`] if the file cannot be opened or is not
/// parseable CSV. Individually malformed rows are skipped, not fatal.
pub fn read_catalog(path: &Path) -> Result<Vec<WorkItem>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| CatalogError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut items = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(row = index + 2, error = %e, "skipping unreadable catalog row");
                continue;
            }
        };

        let id = record.get(0).map(str::trim).unwrap_or_default();
        let primary = record.get(1).map(str::trim).unwrap_or_default();
        if id.is_empty() || primary.is_empty() {
            warn!(row = index + 2, "skipping catalog row without id or primary URL");
            continue;
        }

        let backup = record.get(2).and_then(normalize_backup);
        items.push(WorkItem::new(id, primary, backup));
    }

    info!(items = items.len(), catalog = %path.display(), "parsed catalog");
    Ok(items)
}

/// Normalizes a raw backup cell, mapping placeholder markers to `None`.
fn normalize_backup(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "nan" || lowered == "n/a" || lowered == "not available" {
        return None;
    }
    Some(trimmed.to_string())
}
