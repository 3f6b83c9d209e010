//! Attempt results and the fetcher seam.
//!
//! A download attempt is one fetch of one URL. Its terminal state is an
//! [`AttemptResult`], a plain value the controller pattern-matches on; no
//! failure travels as a propagated error past this boundary. The [`Fetcher`]
//! trait is the seam between the controller state machine and the real HTTP
//! client, which keeps the state machine testable with scripted results.

use async_trait::async_trait;

use super::error::FetchError;
use crate::outcome::ResultKey;

/// Terminal result of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// The file was fetched, validated, and written with non-zero size.
    Success {
        /// Final HTTP status code (2xx).
        status: u16,
    },
    /// The server answered with an error status after transport retries.
    HttpError {
        /// The HTTP status code.
        status: u16,
    },
    /// Certificate validation failed during connection setup.
    TlsError,
    /// The response was not the expected document type; nothing was written.
    ContentTypeMismatch,
    /// Any other fault, tagged with a short stable kind name
    /// (`timeout`, `connect`, `empty-file`, ...).
    Other {
        /// The fault category tag.
        kind: String,
    },
}

impl AttemptResult {
    /// Whether this attempt produced a usable file.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The aggregation key this result is counted under.
    #[must_use]
    pub fn key(&self) -> ResultKey {
        match self {
            Self::Success { status } | Self::HttpError { status } => ResultKey::status(*status),
            Self::TlsError => ResultKey::kind("tls-error"),
            // Matches the cause label the status sink reports for this case.
            Self::ContentTypeMismatch => ResultKey::kind("Invalid Content-Type"),
            Self::Other { kind } => ResultKey::kind(kind.clone()),
        }
    }

    /// Classifies a fetch error into an attempt result.
    #[must_use]
    pub fn from_error(error: &FetchError) -> Self {
        match error {
            FetchError::HttpStatus { status, .. } => Self::HttpError { status: *status },
            FetchError::Tls { .. } => Self::TlsError,
            FetchError::ContentType { .. } => Self::ContentTypeMismatch,
            FetchError::Timeout { .. } => Self::Other {
                kind: "timeout".to_string(),
            },
            FetchError::EmptyFile { .. } => Self::Other {
                kind: "empty-file".to_string(),
            },
            FetchError::Io { .. } => Self::Other {
                kind: "io".to_string(),
            },
            FetchError::Network { source, .. } => Self::Other {
                kind: if source.is_connect() {
                    "connect".to_string()
                } else {
                    "request".to_string()
                },
            },
        }
    }
}

/// Performs one download attempt for an item URL.
///
/// Implemented by the production [`HttpClient`](super::HttpClient) and by
/// scripted fakes in tests. `verify_certificates` selects the
/// certificate-checking or certificate-bypassing transport.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and, on success, writes the document for `item_id` to
    /// the destination folder.
    async fn attempt(&self, item_id: &str, url: &str, verify_certificates: bool) -> AttemptResult;
}
