//! Error types for Ferret operations.
//!
//! Errors come in two tiers. Transport-level failures ([`FetchError`]) are
//! produced by the fetch client and classified by [`FetchErrorKind`]; only
//! [`FetchErrorKind::Blocked`] signals that an alternate path exists.
//! Content-level failures ([`ExtractionError`]) come from the content
//! extractor and each map to a distinct recovery action.
//!
//! [`FerretError`] covers everything else a library caller can hit (bad
//! URLs, bad selectors) and is what the crate-wide [`Result`] alias carries.
//!
//! # Example
//!
//! ```rust
//! use ferret_core::{FetchError, FetchErrorKind};
//!
//! let err = FetchError::from_status(403);
//! assert_eq!(err.kind, FetchErrorKind::Blocked);
//! assert!(err.is_forbidden());
//! ```

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorKind {
    /// DNS failure, refused connection, TLS failure.
    Network,
    /// Non-2xx response with no fallback path.
    Http,
    /// 401, 403, 429 or 451: a fallback path exists.
    Blocked,
    /// The request exceeded its wall-clock bound.
    Timeout,
    /// Anything that could not be classified.
    Unknown,
}

/// A transport-level failure from a single fetch attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status_code: None }
    }

    /// Maps a non-2xx status code to an error using the fixed status table.
    pub fn from_status(status: u16) -> Self {
        let (kind, message) = match status {
            401 | 403 => (FetchErrorKind::Blocked, "Access denied, this page requires authentication".to_string()),
            429 => (FetchErrorKind::Blocked, "Too many requests, please try again later".to_string()),
            451 => (FetchErrorKind::Blocked, "Unavailable for legal reasons".to_string()),
            404 => (FetchErrorKind::Http, "Page not found".to_string()),
            410 => (FetchErrorKind::Http, "This page no longer exists".to_string()),
            500..=599 => (FetchErrorKind::Http, "Server error, the website is having issues".to_string()),
            _ => (FetchErrorKind::Http, format!("HTTP error {}", status)),
        };

        Self { kind, message, status_code: Some(status) }
    }

    /// Whether this is the 403 case that triggers tab reuse and bypass.
    pub fn is_forbidden(&self) -> bool {
        self.kind == FetchErrorKind::Blocked && self.status_code == Some(403)
    }
}

/// A content-level failure from the content extractor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The precheck heuristic decided the page is not an article.
    ///
    /// Recoverable by forcing extraction with the precheck skipped.
    #[error("This page doesn't appear to have article content")]
    NotReadable,

    /// The readability pass produced nothing.
    #[error("Unable to extract content from this page: {0}")]
    ParseFailed(String),

    /// Extraction succeeded but the content is empty once trimmed.
    #[error("No content found on this page")]
    EmptyContent,
}

/// A failed archive lookup. Only ever surfaced inside the aggregated bypass
/// message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ArchiveError {
    pub message: String,
}

impl ArchiveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// The browser collaborator failed or returned nothing usable.
///
/// Never fatal: callers treat it as "collaborator unavailable".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BrowserError {
    pub message: String,
}

impl BrowserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Every bypass strategy failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("All bypass methods failed: {}", join_attempts(.attempts))]
pub struct BypassError {
    /// `(strategy label, error message)` in attempt order.
    pub attempts: Vec<(String, String)>,
}

fn join_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(label, err)| format!("{}: {}", label, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for library operations outside the pipeline taxonomy.
#[derive(Error, Debug)]
pub enum FerretError {
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing or selector errors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// HTTP client construction or transport errors outside a classified fetch.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization failures when rendering output.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Result type alias for FerretError.
pub type Result<T> = std::result::Result<T, FerretError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(401, FetchErrorKind::Blocked)]
    #[case(403, FetchErrorKind::Blocked)]
    #[case(429, FetchErrorKind::Blocked)]
    #[case(451, FetchErrorKind::Blocked)]
    #[case(404, FetchErrorKind::Http)]
    #[case(410, FetchErrorKind::Http)]
    #[case(500, FetchErrorKind::Http)]
    #[case(503, FetchErrorKind::Http)]
    #[case(418, FetchErrorKind::Http)]
    fn test_status_table(#[case] status: u16, #[case] kind: FetchErrorKind) {
        let err = FetchError::from_status(status);
        assert_eq!(err.kind, kind);
        assert_eq!(err.status_code, Some(status));
    }

    #[test]
    fn test_only_403_is_forbidden() {
        assert!(FetchError::from_status(403).is_forbidden());
        assert!(!FetchError::from_status(401).is_forbidden());
        assert!(!FetchError::from_status(429).is_forbidden());
        assert!(!FetchError::new(FetchErrorKind::Timeout, "slow").is_forbidden());
    }

    #[test]
    fn test_default_status_message() {
        let err = FetchError::from_status(418);
        assert!(err.to_string().contains("418"));
    }

    #[test]
    fn test_bypass_error_aggregates_attempts() {
        let err = BypassError {
            attempts: vec![
                ("Crawler identity".to_string(), "Access denied".to_string()),
                ("Archive mirror".to_string(), "No archived version found".to_string()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "All bypass methods failed: Crawler identity: Access denied; Archive mirror: No archived version found"
        );
    }

    #[test]
    fn test_error_display() {
        let err = FerretError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }
}
