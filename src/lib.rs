//! Batch document fetcher library.
//!
//! Fetches a batch of remote documents identified by a primary URL and an
//! optional backup URL, under bounded concurrency, with transient-fault
//! retry, certificate-failure fallback, content-type validation, and
//! per-item outcome accounting.
//!
//! # Architecture
//!
//! - [`catalog`] - catalog source turning CSV triples into work items
//! - [`item`] - work items and one-time URL validation
//! - [`download`] - the concurrent download engine (attempt, controller,
//!   worker pool)
//! - [`outcome`] - result keys, per-item outcomes, and the aggregator
//! - [`sink`] - durable status sinks (CSV, in-memory)
//! - [`config`] - file-backed CLI defaults

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod item;
pub mod outcome;
pub mod sink;

// Re-export commonly used types
pub use catalog::{CatalogError, read_catalog};
pub use download::{
    AttemptResult, BatchStats, DEFAULT_CONCURRENCY, DEFAULT_RETRY_BUDGET, DEFAULT_TIMEOUT_SECS,
    DownloadEngine, EngineError, FetchError, Fetcher, HttpClient, PDF_CONTENT_TYPE, process_item,
};
pub use item::WorkItem;
pub use outcome::{Aggregator, ItemOutcome, ResultKey};
pub use sink::{CsvStatusSink, MemorySink, SinkError, StatusSink};
