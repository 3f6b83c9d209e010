//! Outcome accounting: result keys, per-item outcomes, and the aggregator.
//!
//! Every download attempt produces an event keyed by [`ResultKey`] (an HTTP
//! status code or a named error kind). The [`Aggregator`] tallies those
//! events and persists a full overwrite-snapshot of the counts to the status
//! sink after every update, so the persisted file always reflects the latest
//! complete counts rather than a log of individual events. It also tracks
//! the running succeeded/failed item totals, which always sum to the number
//! of items processed so far.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{instrument, warn};

use crate::sink::StatusSink;

/// Key an attempt-level event is counted under: a numeric HTTP status or a
/// short stable error-kind tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKey {
    /// HTTP status code (success or error).
    Status(u16),
    /// Named error kind, e.g. `timeout` or `Invalid Content-Type`.
    Kind(String),
}

impl ResultKey {
    /// Creates a status-code key.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::Status(status)
    }

    /// Creates a named error-kind key.
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::Kind(kind.into())
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Kind(kind) => f.write_str(kind),
        }
    }
}

/// Terminal result for one work item, written exactly once to the status
/// sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// The item this outcome belongs to.
    pub item_id: String,
    /// Whether a non-empty, correctly-typed file reached stable storage.
    pub downloaded: bool,
    /// Failure cause; `None` for successful items.
    pub cause: Option<ResultKey>,
}

impl ItemOutcome {
    /// Outcome for a successfully downloaded item.
    pub fn success(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            downloaded: true,
            cause: None,
        }
    }

    /// Outcome for an item that exhausted all candidates and rounds.
    pub fn failure(item_id: impl Into<String>, cause: Option<ResultKey>) -> Self {
        Self {
            item_id: item_id.into(),
            downloaded: false,
            cause,
        }
    }

    /// Stable label for the cause column (`N/A` when there is none).
    #[must_use]
    pub fn cause_label(&self) -> String {
        self.cause
            .as_ref()
            .map_or_else(|| "N/A".to_string(), ToString::to_string)
    }
}

/// Counters shared by all concurrent controllers.
#[derive(Debug, Default)]
struct AggregateCounters {
    counts: HashMap<ResultKey, u64>,
    succeeded: u64,
    failed: u64,
}

/// Thread-safe outcome aggregator backed by a status sink.
///
/// All mutation goes through a single mutex; the snapshot write to the sink
/// happens while the lock is held so concurrently recorded events cannot
/// persist stale counts out of order. Sink failures are logged and do not
/// abort the batch.
pub struct Aggregator {
    inner: Mutex<AggregateCounters>,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}

impl Aggregator {
    /// Creates an aggregator persisting to the given sink.
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            inner: Mutex::new(AggregateCounters::default()),
            sink,
        }
    }

    /// Records one attempt-level event and persists the updated snapshot.
    #[instrument(level = "debug", skip(self))]
    pub fn record(&self, key: ResultKey) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *inner.counts.entry(key).or_insert(0) += 1;

        let snapshot = sorted_snapshot(&inner.counts);
        if let Err(e) = self.sink.write_counts(&snapshot) {
            warn!(error = %e, "failed to persist result counts snapshot");
        }
    }

    /// Records an item's terminal outcome: bumps the succeeded/failed totals
    /// and forwards the per-item row to the sink.
    #[instrument(level = "debug", skip(self, outcome), fields(item_id = %outcome.item_id))]
    pub fn record_outcome(&self, outcome: &ItemOutcome) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if outcome.downloaded {
                inner.succeeded += 1;
            } else {
                inner.failed += 1;
            }
        }
        if let Err(e) = self.sink.write_item(outcome) {
            warn!(item_id = %outcome.item_id, error = %e, "failed to persist item outcome");
        }
    }

    /// Current per-key counts, sorted by key label.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ResultKey, u64)> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sorted_snapshot(&inner.counts)
    }

    /// Running `(succeeded, failed)` item totals.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (inner.succeeded, inner.failed)
    }
}

fn sorted_snapshot(counts: &HashMap<ResultKey, u64>) -> Vec<(ResultKey, u64)> {
    let mut snapshot: Vec<(ResultKey, u64)> = counts
        .iter()
        .map(|(key, count)| (key.clone(), *count))
        .collect();
    snapshot.sort_by_key(|(key, _)| key.to_string());
    snapshot
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn memory_aggregator() -> (Aggregator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (Aggregator::new(Arc::clone(&sink) as Arc<dyn StatusSink>), sink)
    }

    #[test]
    fn test_result_key_display() {
        assert_eq!(ResultKey::status(404).to_string(), "404");
        assert_eq!(ResultKey::kind("timeout").to_string(), "timeout");
    }

    #[test]
    fn test_item_outcome_cause_label() {
        assert_eq!(ItemOutcome::success("R1").cause_label(), "N/A");
        assert_eq!(
            ItemOutcome::failure("R2", Some(ResultKey::status(404))).cause_label(),
            "404"
        );
        assert_eq!(ItemOutcome::failure("R3", None).cause_label(), "N/A");
    }

    #[test]
    fn test_record_counts_events_per_key() {
        let (aggregator, _sink) = memory_aggregator();
        aggregator.record(ResultKey::status(404));
        aggregator.record(ResultKey::status(404));
        aggregator.record(ResultKey::kind("timeout"));

        let snapshot = aggregator.snapshot();
        assert_eq!(
            snapshot,
            vec![
                (ResultKey::status(404), 2),
                (ResultKey::kind("timeout"), 1),
            ]
        );
    }

    #[test]
    fn test_record_persists_snapshot_after_every_event() {
        let (aggregator, sink) = memory_aggregator();
        aggregator.record(ResultKey::status(200));
        aggregator.record(ResultKey::status(200));

        let snapshots = sink.count_snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0], vec![(ResultKey::status(200), 1)]);
        assert_eq!(snapshots[1], vec![(ResultKey::status(200), 2)]);
    }

    #[test]
    fn test_totals_track_item_outcomes_not_attempts() {
        let (aggregator, sink) = memory_aggregator();
        // Three attempt events but only two item outcomes.
        aggregator.record(ResultKey::status(503));
        aggregator.record(ResultKey::status(200));
        aggregator.record(ResultKey::status(404));

        aggregator.record_outcome(&ItemOutcome::success("R1"));
        aggregator.record_outcome(&ItemOutcome::failure("R2", Some(ResultKey::status(404))));

        assert_eq!(aggregator.totals(), (1, 1));
        assert_eq!(sink.item_outcomes().len(), 2);
    }

    #[test]
    fn test_totals_sum_matches_items_processed() {
        let (aggregator, _sink) = memory_aggregator();
        for i in 0..10 {
            let outcome = if i % 3 == 0 {
                ItemOutcome::success(format!("R{i}"))
            } else {
                ItemOutcome::failure(format!("R{i}"), Some(ResultKey::kind("timeout")))
            };
            aggregator.record_outcome(&outcome);
        }
        let (succeeded, failed) = aggregator.totals();
        assert_eq!(succeeded + failed, 10);
    }

    #[test]
    fn test_concurrent_record_is_serialized() {
        use std::thread;

        let (aggregator, _sink) = memory_aggregator();
        let aggregator = Arc::new(aggregator);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let aggregator = Arc::clone(&aggregator);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    aggregator.record(ResultKey::status(200));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(aggregator.snapshot(), vec![(ResultKey::status(200), 400)]);
    }
}
