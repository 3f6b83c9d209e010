//! Concurrent download engine: per-item retry/fallback control, the bounded
//! worker pool, and the single-attempt HTTP client.
//!
//! # Overview
//!
//! One [`WorkItem`](crate::item::WorkItem) flows through
//! [`process_item`], which sequences [`Fetcher::attempt`] calls across the
//! item's candidate URLs and bounded whole-item rounds, including a one-shot
//! certificate-verification-disabled retry after a TLS failure. The
//! [`DownloadEngine`] drives many controllers concurrently under a
//! semaphore-bounded pool and guarantees exactly one terminal outcome per
//! item.

mod attempt;
mod client;
mod controller;
mod engine;
mod error;

pub use attempt::{AttemptResult, Fetcher};
pub use client::{DEFAULT_TIMEOUT_SECS, HttpClient, PDF_CONTENT_TYPE};
pub use controller::{DEFAULT_RETRY_BUDGET, process_item};
pub use engine::{BatchStats, DEFAULT_CONCURRENCY, DownloadEngine, EngineError};
pub use error::{FetchError, is_tls_error};
