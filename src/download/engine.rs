//! Download engine: bounded worker pool driving one controller per item.
//!
//! The engine uses a semaphore to cap the number of concurrently executing
//! item controllers. Each item runs in its own Tokio task; completions are
//! drained in whatever order tasks finish. A panic escaping a controller is
//! caught at join, logged, and counted as an unexpected failure without
//! aborting sibling tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::attempt::Fetcher;
use super::controller::process_item;
use crate::item::WorkItem;
use crate::outcome::{Aggregator, ItemOutcome, ResultKey};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 1000;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Live counters for one batch run.
///
/// `processed` is monotonically increasing and bumps once per finished item
/// regardless of success, which is what progress reporting reads.
#[derive(Debug, Default)]
pub struct BatchStats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchStats {
    /// Creates a stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items that finished with a downloaded file.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Items that exhausted every candidate and round.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Total items finished so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.succeeded() + self.failed()
    }

    fn increment_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bounded concurrent download engine.
///
/// # Concurrency Model
///
/// - Each item runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released automatically when tasks complete (RAII)
/// - No ordering is guaranteed between items; within one item, candidate
///   URLs and rounds are strictly sequential
/// - There is no mid-flight cancellation; the pool stops when every
///   submitted task has completed
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_budget: u32,
}

impl DownloadEngine {
    /// Creates an engine with the given concurrency cap and whole-item
    /// retry budget (extra rounds after the first).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-1000).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize, retry_budget: u32) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, retry_budget, "creating download engine");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_budget,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured whole-item retry budget.
    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Runs every item to its terminal outcome.
    ///
    /// Each item yields exactly one [`ItemOutcome`] through the aggregator:
    /// either from its controller, or synthesized here when a task panics.
    /// Individual item failures never abort the batch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed
    /// while dispatching, which does not happen in normal operation.
    #[instrument(skip(self, items, fetcher, aggregator, stats), fields(items = items.len()))]
    pub async fn run<F>(
        &self,
        items: Vec<WorkItem>,
        fetcher: Arc<F>,
        aggregator: Arc<Aggregator>,
        stats: Arc<BatchStats>,
    ) -> Result<(), EngineError>
    where
        F: Fetcher + ?Sized + 'static,
    {
        info!(items = items.len(), "starting batch");
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            // Blocks while the pool is saturated.
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let fetcher = Arc::clone(&fetcher);
            let aggregator = Arc::clone(&aggregator);
            let stats = Arc::clone(&stats);
            let retry_budget = self.retry_budget;
            let item_id = item.id.clone();

            let handle = tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII).
                let _permit = permit;

                let outcome = process_item(fetcher.as_ref(), &aggregator, &item, retry_budget).await;
                if outcome.downloaded {
                    stats.increment_succeeded();
                } else {
                    stats.increment_failed();
                }
                aggregator.record_outcome(&outcome);
            });
            handles.push((item_id, handle));
        }

        debug!(tasks = handles.len(), "waiting for downloads to complete");

        // Drain completions in finish order, not submission order, so a
        // panic in one task is surfaced without waiting on slower siblings.
        let mut completions: FuturesUnordered<_> = handles
            .into_iter()
            .map(|(item_id, handle)| async move { (item_id, handle.await) })
            .collect();

        while let Some((item_id, joined)) = completions.next().await {
            if let Err(e) = joined {
                // A panic escaping the controller still yields exactly one
                // outcome for the item.
                warn!(item_id = %item_id, error = %e, "download task panicked");
                aggregator.record(ResultKey::kind("task-panic"));
                aggregator.record_outcome(&ItemOutcome::failure(
                    item_id,
                    Some(ResultKey::kind("task-panic")),
                ));
                stats.increment_failed();
            }
        }

        info!(
            succeeded = stats.succeeded(),
            failed = stats.failed(),
            total = stats.processed(),
            "batch complete"
        );
        Ok(())
    }
}
