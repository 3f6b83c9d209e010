//! Work items and URL validation.
//!
//! A [`WorkItem`] is one unit of batch work: an identifier plus a primary URL
//! and an optional backup URL. Validation runs exactly once, at construction:
//! if the primary does not look like a fetchable URL but the backup does, the
//! backup is substituted into the primary slot. Nothing is re-validated
//! later; a primary that is still malformed after construction simply fails
//! at fetch time.

use tracing::debug;
use url::{Host, Url};

/// One document to download: an id and up to two candidate URLs.
///
/// Owned exclusively by the controller task processing it; never shared
/// mutably across items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Catalog identifier; also names the output file (`<id>.pdf`).
    pub id: String,
    /// Effective primary URL after one-time validation.
    pub primary_url: String,
    /// Backup URL, if the catalog provided one.
    pub backup_url: Option<String>,
}

impl WorkItem {
    /// Builds a work item, normalizing the primary URL once.
    ///
    /// If `primary` is not a valid URL and `backup` is, the backup replaces
    /// the primary. When validation had to prepend the default `http://`
    /// scheme, the prepended form is stored so the first fetch can use it.
    pub fn new(id: impl Into<String>, primary: impl Into<String>, backup: Option<String>) -> Self {
        let id = id.into();
        let primary = primary.into();
        let primary_url = match normalize_url(&primary) {
            Some(normalized) => normalized,
            None => match backup.as_deref().and_then(normalize_url) {
                Some(substituted) => {
                    debug!(
                        item_id = %id,
                        primary = %primary,
                        backup = %substituted,
                        "primary URL invalid, substituting backup"
                    );
                    substituted
                }
                // Still malformed; the fetch attempt will surface the error.
                None => primary,
            },
        };

        Self {
            id,
            primary_url,
            backup_url: backup,
        }
    }

    /// The candidate URLs one round tries, in order.
    ///
    /// The backup stays a candidate even when it was substituted into the
    /// primary slot, so such an item tries the same URL twice per round.
    #[must_use]
    pub fn candidates(&self) -> Vec<&str> {
        match self.backup_url.as_deref() {
            Some(backup) => vec![self.primary_url.as_str(), backup],
            None => vec![self.primary_url.as_str()],
        }
    }
}

/// Validates a candidate URL, returning its normalized form if usable.
///
/// A candidate is valid when, after prepending `http://` if no scheme is
/// present, it parses to a plausible host: an IP literal, `localhost`, or a
/// dotted domain. Bare tokens like `not-a-url` technically parse once a
/// scheme is prepended, but are never fetchable document URLs and are
/// rejected here so the backup gets its chance.
#[must_use]
pub fn normalize_url(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let with_scheme = if candidate.contains("://") {
        candidate.to_string()
    } else {
        format!("http://{candidate}")
    };

    let parsed = Url::parse(&with_scheme).ok()?;
    match parsed.host()? {
        Host::Domain(domain) => {
            (domain == "localhost" || domain.contains('.')).then_some(with_scheme)
        }
        Host::Ipv4(_) | Host::Ipv6(_) => Some(with_scheme),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_accepts_full_url() {
        assert_eq!(
            normalize_url("https://example.com/report.pdf"),
            Some("https://example.com/report.pdf".to_string())
        );
    }

    #[test]
    fn test_normalize_url_prepends_default_scheme() {
        assert_eq!(
            normalize_url("example.com/report.pdf"),
            Some("http://example.com/report.pdf".to_string())
        );
    }

    #[test]
    fn test_normalize_url_accepts_ip_and_localhost() {
        assert_eq!(
            normalize_url("http://127.0.0.1:8080/a.pdf"),
            Some("http://127.0.0.1:8080/a.pdf".to_string())
        );
        assert_eq!(
            normalize_url("localhost:8080/a.pdf"),
            Some("http://localhost:8080/a.pdf".to_string())
        );
    }

    #[test]
    fn test_normalize_url_rejects_bare_token() {
        assert_eq!(normalize_url("not-a-url"), None);
    }

    #[test]
    fn test_normalize_url_rejects_empty_and_hostless() {
        assert_eq!(normalize_url(""), None);
        assert_eq!(normalize_url("   "), None);
        assert_eq!(normalize_url("http:///path-only"), None);
    }

    #[test]
    fn test_work_item_keeps_valid_primary() {
        let item = WorkItem::new(
            "R1",
            "https://example.com/a.pdf",
            Some("https://backup.example.com/a.pdf".to_string()),
        );
        assert_eq!(item.primary_url, "https://example.com/a.pdf");
        assert_eq!(item.candidates().len(), 2);
    }

    #[test]
    fn test_work_item_substitutes_backup_for_invalid_primary() {
        let item = WorkItem::new(
            "R1",
            "not-a-url",
            Some("http://backup.example.com/a.pdf".to_string()),
        );
        assert_eq!(item.primary_url, "http://backup.example.com/a.pdf");
        // The backup remains a candidate, so both slots point at the backup.
        assert_eq!(
            item.candidates(),
            vec![
                "http://backup.example.com/a.pdf",
                "http://backup.example.com/a.pdf"
            ]
        );
    }

    #[test]
    fn test_work_item_keeps_invalid_primary_without_backup() {
        let item = WorkItem::new("R2", "not-a-url", None);
        assert_eq!(item.primary_url, "not-a-url");
        assert_eq!(item.candidates(), vec!["not-a-url"]);
    }

    #[test]
    fn test_work_item_keeps_invalid_primary_when_backup_also_invalid() {
        let item = WorkItem::new("R3", "not-a-url", Some("also-bad".to_string()));
        assert_eq!(item.primary_url, "not-a-url");
    }

    #[test]
    fn test_work_item_normalizes_schemeless_primary() {
        let item = WorkItem::new("R4", "example.com/r.pdf", None);
        assert_eq!(item.primary_url, "http://example.com/r.pdf");
    }
}
