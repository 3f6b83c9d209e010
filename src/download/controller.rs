//! Per-item retry/fallback controller.
//!
//! Drives download attempts for one work item: candidate URLs in order
//! within a round, a one-shot certificate-verification-disabled retry when a
//! TLS failure is seen, and a bounded number of whole-item rounds. The
//! round loop is explicit; there is no recursion and no parallel fan-out
//! within an item.

use tracing::{debug, info, instrument, warn};

use super::attempt::{AttemptResult, Fetcher};
use crate::item::WorkItem;
use crate::outcome::{Aggregator, ItemOutcome, ResultKey};

/// Default whole-item retry budget: extra rounds after the first.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Processes one item to its terminal outcome.
///
/// Every attempt-level result (including the TLS event that triggers the
/// bypass) is recorded with the aggregator as it happens. The returned
/// outcome is terminal and unique per item; on failure its cause is the
/// first failure recorded during the final round, matching the
/// last-round-wins update semantics of the status sink.
#[instrument(skip(fetcher, aggregator, item), fields(item_id = %item.id))]
pub async fn process_item<F>(
    fetcher: &F,
    aggregator: &Aggregator,
    item: &WorkItem,
    retry_budget: u32,
) -> ItemOutcome
where
    F: Fetcher + ?Sized,
{
    let candidates = item.candidates();
    let rounds = retry_budget + 1;
    let mut final_cause: Option<ResultKey> = None;

    for round in 0..rounds {
        let mut round_cause: Option<ResultKey> = None;

        for url in &candidates {
            let mut result = fetcher.attempt(&item.id, url, true).await;

            if result == AttemptResult::TlsError {
                // Record the TLS event, then retry the same URL once with
                // verification disabled. The bypass never cascades: whatever
                // it returns is final for this candidate.
                aggregator.record(result.key());
                debug!(url, "certificate failure, retrying once with verification disabled");
                result = fetcher.attempt(&item.id, url, false).await;
            }

            aggregator.record(result.key());

            if let AttemptResult::Success { status } = result {
                info!(url, status, round, "item downloaded");
                return ItemOutcome::success(item.id.clone());
            }

            debug!(url, round, result = ?result, "candidate failed, advancing");
            if round_cause.is_none() {
                round_cause = Some(result.key());
            }
        }

        // Round exhausted without success; a later round overwrites the
        // recorded cause.
        final_cause = round_cause;
        if round + 1 < rounds {
            debug!(round, remaining = rounds - round - 1, "round exhausted, restarting");
        }
    }

    warn!(
        rounds,
        cause = %final_cause.as_ref().map_or_else(|| "N/A".to_string(), ToString::to_string),
        "item failed after all rounds"
    );
    ItemOutcome::failure(item.id.clone(), final_cause)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;

    use super::*;
    use crate::sink::{MemorySink, StatusSink};

    /// Fetcher that replays a scripted sequence of results and records the
    /// `(url, verify_certificates)` pairs it was called with.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<AttemptResult>>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<AttemptResult>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, bool)> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn attempt(&self, _item_id: &str, url: &str, verify: bool) -> AttemptResult {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((url.to_string(), verify));
            self.script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(AttemptResult::Other {
                    kind: "script-exhausted".to_string(),
                })
        }
    }

    fn aggregator() -> (Aggregator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (Aggregator::new(Arc::clone(&sink) as Arc<dyn StatusSink>), sink)
    }

    fn item_two_urls() -> WorkItem {
        WorkItem::new(
            "R1",
            "http://primary.example.com/a.pdf",
            Some("http://backup.example.com/a.pdf".to_string()),
        )
    }

    #[tokio::test]
    async fn test_first_attempt_success_stops_immediately() {
        let fetcher = ScriptedFetcher::new(vec![AttemptResult::Success { status: 200 }]);
        let (agg, _) = aggregator();

        let outcome = process_item(&fetcher, &agg, &item_two_urls(), 3).await;

        assert!(outcome.downloaded);
        assert_eq!(fetcher.calls().len(), 1);
        assert_eq!(agg.snapshot(), vec![(ResultKey::status(200), 1)]);
    }

    #[tokio::test]
    async fn test_failure_advances_to_backup_candidate() {
        let fetcher = ScriptedFetcher::new(vec![
            AttemptResult::HttpError { status: 404 },
            AttemptResult::Success { status: 200 },
        ]);
        let (agg, _) = aggregator();

        let outcome = process_item(&fetcher, &agg, &item_two_urls(), 0).await;

        assert!(outcome.downloaded);
        let calls = fetcher.calls();
        assert_eq!(calls[0].0, "http://primary.example.com/a.pdf");
        assert_eq!(calls[1].0, "http://backup.example.com/a.pdf");
    }

    #[tokio::test]
    async fn test_tls_failure_triggers_single_bypass_of_same_url() {
        let fetcher = ScriptedFetcher::new(vec![
            AttemptResult::TlsError,
            AttemptResult::Success { status: 200 },
        ]);
        let (agg, _) = aggregator();
        let item = WorkItem::new("R3", "https://cert.example.com/a.pdf", None);

        let outcome = process_item(&fetcher, &agg, &item, 3).await;

        assert!(outcome.downloaded);
        let calls = fetcher.calls();
        assert_eq!(
            calls,
            vec![
                ("https://cert.example.com/a.pdf".to_string(), true),
                ("https://cert.example.com/a.pdf".to_string(), false),
            ]
        );
        // One TLS attempt-level event plus one success.
        assert_eq!(
            agg.snapshot(),
            vec![
                (ResultKey::status(200), 1),
                (ResultKey::kind("tls-error"), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_tls_bypass_never_cascades() {
        // Bypass also reports a TLS failure; the controller must move on,
        // not bypass a second time.
        let fetcher = ScriptedFetcher::new(vec![
            AttemptResult::TlsError,
            AttemptResult::TlsError,
            AttemptResult::Success { status: 200 },
        ]);
        let (agg, _) = aggregator();

        let outcome = process_item(&fetcher, &agg, &item_two_urls(), 0).await;

        assert!(outcome.downloaded);
        let calls = fetcher.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].1, true);
        assert_eq!(calls[1].1, false);
        // Third call is the backup candidate, back on verified mode.
        assert_eq!(calls[2].0, "http://backup.example.com/a.pdf");
        assert_eq!(calls[2].1, true);
    }

    #[tokio::test]
    async fn test_exhausted_rounds_report_first_failure_of_final_round() {
        // Round 1: 500 then 404; round 2: 404 then 404. Final round's first
        // failure (404) must win over the earlier 500.
        let fetcher = ScriptedFetcher::new(vec![
            AttemptResult::HttpError { status: 500 },
            AttemptResult::HttpError { status: 404 },
            AttemptResult::HttpError { status: 404 },
            AttemptResult::HttpError { status: 404 },
        ]);
        let (agg, _) = aggregator();

        let outcome = process_item(&fetcher, &agg, &item_two_urls(), 1).await;

        assert!(!outcome.downloaded);
        assert_eq!(outcome.cause, Some(ResultKey::status(404)));
        assert_eq!(fetcher.calls().len(), 4);
        assert_eq!(
            agg.snapshot(),
            vec![
                (ResultKey::status(404), 3),
                (ResultKey::status(500), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_budget_runs_exactly_one_round() {
        let fetcher = ScriptedFetcher::new(vec![
            AttemptResult::HttpError { status: 404 },
            AttemptResult::HttpError { status: 404 },
        ]);
        let (agg, _) = aggregator();

        let outcome = process_item(&fetcher, &agg, &item_two_urls(), 0).await;

        assert!(!outcome.downloaded);
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(outcome.cause, Some(ResultKey::status(404)));
        let _ = agg;
    }

    #[tokio::test]
    async fn test_content_type_mismatch_is_not_retried_against_same_url() {
        let fetcher = ScriptedFetcher::new(vec![
            AttemptResult::ContentTypeMismatch,
            AttemptResult::Success { status: 200 },
        ]);
        let (agg, _) = aggregator();

        let outcome = process_item(&fetcher, &agg, &item_two_urls(), 0).await;

        assert!(outcome.downloaded);
        let calls = fetcher.calls();
        // Mismatch moved straight to the backup, no second try of primary.
        assert_eq!(calls[1].0, "http://backup.example.com/a.pdf");
    }

    #[tokio::test]
    async fn test_single_candidate_mismatch_reports_invalid_content_type() {
        let fetcher = ScriptedFetcher::new(vec![AttemptResult::ContentTypeMismatch]);
        let (agg, _) = aggregator();
        let item = WorkItem::new("R5", "http://only.example.com/a.pdf", None);

        let outcome = process_item(&fetcher, &agg, &item, 0).await;

        assert!(!outcome.downloaded);
        assert_eq!(outcome.cause_label(), "Invalid Content-Type");
    }
}
