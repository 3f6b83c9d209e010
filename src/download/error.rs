//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a single fetch of one URL.
///
/// One variant per failure class the controller cares about; callers pattern
/// match on the variant rather than inspecting error strings.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, resets).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// TLS/certificate validation failed during connection setup.
    ///
    /// Kept separate from [`FetchError::Network`] so the controller can apply
    /// its one-shot verification-disabled retry.
    #[error("TLS failure fetching {url}: {source}")]
    Tls {
        /// The URL that failed the handshake.
        url: String,
        /// The underlying TLS error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (4xx, or 5xx after transport retries exhausted).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response succeeded but its `Content-Type` is not the expected
    /// document type. No file is written in this case.
    #[error("unexpected Content-Type {content_type:?} for {url}")]
    ContentType {
        /// The URL that returned the wrong type.
        url: String,
        /// The `Content-Type` header value, if any.
        content_type: Option<String>,
    },

    /// The stream completed but left a zero-byte file on disk.
    #[error("empty file for {url} at {path}")]
    EmptyFile {
        /// The URL whose body was empty.
        url: String,
        /// The path of the removed zero-byte file.
        path: PathBuf,
    },

    /// File system error while writing the download.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a TLS error.
    pub fn tls(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Tls {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content-type mismatch error.
    pub fn content_type(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::ContentType {
            url: url.into(),
            content_type,
        }
    }

    /// Creates an empty-file error.
    pub fn empty_file(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::EmptyFile {
            url: url.into(),
            path: path.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Checks whether a reqwest error is a TLS/certificate failure.
///
/// reqwest does not expose a dedicated predicate, so this walks the error
/// source chain looking for the usual certificate markers. Only the inner
/// sources are inspected; the top-level message embeds the request URL,
/// which must not be able to trip the match.
#[must_use]
pub fn is_tls_error(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return true;
        }
        source = inner.source();
    }
    false
}
