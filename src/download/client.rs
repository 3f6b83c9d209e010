//! HTTP client wrapper performing single download attempts.
//!
//! One [`HttpClient`] holds two pre-built reqwest clients: the normal
//! certificate-verifying one and a certificate-bypassing one used for the
//! controller's one-shot TLS fallback. Transient server errors (500, 502,
//! 503, 504) are retried here, below the controller, with a fixed
//! exponential backoff; everything the controller sees is a final result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::attempt::{AttemptResult, Fetcher};
use super::error::{FetchError, is_tls_error};

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Content type a successful download must carry, exactly.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Status codes retried at the transport level before surfacing.
const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Maximum transport-level retries per fetch.
const MAX_TRANSPORT_RETRIES: u32 = 3;

/// Base delay for transport backoff; doubles per retry (1s, 2s, 4s).
const TRANSPORT_BASE_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for streaming document downloads.
///
/// Create once and share across workers; reqwest pools connections
/// internally.
#[derive(Debug, Clone)]
pub struct HttpClient {
    verified: Client,
    insecure: Client,
    dest_dir: PathBuf,
}

impl HttpClient {
    /// Creates a client writing into `dest_dir` with the default timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self::with_timeout(dest_dir, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit per-attempt timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(dest_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let verified = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .expect("failed to build HTTP client with static configuration");
        let insecure = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            verified,
            insecure,
            dest_dir: dest_dir.into(),
        }
    }

    /// The destination folder downloads are written into.
    #[must_use]
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Fetches `url` and streams the body to `dest_path`.
    ///
    /// Responses with status 500, 502, 503 or 504 are retried up to three
    /// times with 1s/2s/4s backoff before the final response is inspected.
    /// The response must carry `Content-Type: application/pdf` exactly; a
    /// mismatch fails before any file is created. An existing file at
    /// `dest_path` is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] describing the failure class; on success the
    /// final HTTP status code is returned and `dest_path` holds a non-empty
    /// file.
    #[instrument(skip(self), fields(url = %url, verify = verify_certificates))]
    pub async fn fetch_to_file(
        &self,
        url: &str,
        verify_certificates: bool,
        dest_path: &Path,
    ) -> Result<u16, FetchError> {
        let client = if verify_certificates {
            &self.verified
        } else {
            &self.insecure
        };

        let mut retries = 0u32;
        let response = loop {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| map_transport_error(url, e))?;

            let status = response.status().as_u16();
            if TRANSIENT_STATUSES.contains(&status) && retries < MAX_TRANSPORT_RETRIES {
                let delay = TRANSPORT_BASE_DELAY * 2u32.pow(retries);
                retries += 1;
                info!(
                    status,
                    retry = retries,
                    max_retries = MAX_TRANSPORT_RETRIES,
                    delay_ms = delay.as_millis(),
                    "transient server error, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            break response;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        if content_type.as_deref() != Some(PDF_CONTENT_TYPE) {
            debug!(content_type = ?content_type, "content type mismatch, discarding response");
            return Err(FetchError::content_type(url, content_type));
        }

        let file = File::create(dest_path)
            .await
            .map_err(|e| FetchError::io(dest_path, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Do not keep a partial file from a broken stream.
                    drop(writer);
                    let _ = tokio::fs::remove_file(dest_path).await;
                    return Err(map_transport_error(url, e));
                }
            };
            if let Err(e) = writer.write_all(&chunk).await {
                drop(writer);
                let _ = tokio::fs::remove_file(dest_path).await;
                return Err(FetchError::io(dest_path, e));
            }
        }
        writer
            .flush()
            .await
            .map_err(|e| FetchError::io(dest_path, e))?;
        drop(writer);

        let size = tokio::fs::metadata(dest_path)
            .await
            .map_err(|e| FetchError::io(dest_path, e))?
            .len();
        if size == 0 {
            let _ = tokio::fs::remove_file(dest_path).await;
            return Err(FetchError::empty_file(url, dest_path));
        }

        info!(path = %dest_path.display(), bytes = size, "download complete");
        Ok(status.as_u16())
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpClient {
    async fn attempt(&self, item_id: &str, url: &str, verify_certificates: bool) -> AttemptResult {
        let dest_path = self.dest_dir.join(format!("{item_id}.pdf"));
        match self
            .fetch_to_file(url, verify_certificates, &dest_path)
            .await
        {
            Ok(status) => AttemptResult::Success { status },
            Err(e) => {
                warn!(item_id, url, error = %e, "download attempt failed");
                AttemptResult::from_error(&e)
            }
        }
    }
}

/// Maps a reqwest error from send or body streaming to a fetch error.
fn map_transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else if is_tls_error(&error) {
        FetchError::tls(url, error)
    } else {
        FetchError::network(url, error)
    }
}
