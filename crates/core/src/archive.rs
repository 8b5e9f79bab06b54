//! Lookups against third-party web archives.
//!
//! Two services sit behind [`ArchiveLookup`]:
//!
//! - [`ArchiveMirror`] asks a rotating set of interchangeable mirror domains
//!   for their newest capture. Success is read from the redirect target, not
//!   the body.
//! - [`SnapshotService`] asks an availability API for the closest snapshot,
//!   then fetches it and unwraps the service's proxied URLs.
//!
//! Both run sequentially and carry their own timeouts.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{FetchConfig, Identity};
use crate::{ArchiveError, FerretError, Result};

pub const DEFAULT_MIRRORS: &[&str] = &["https://archive.is", "https://archive.today", "https://archive.ph"];
pub const DEFAULT_SNAPSHOT_ENDPOINT: &str = "https://archive.org/wayback/available";
pub const DEFAULT_SNAPSHOT_HOST: &str = "web.archive.org";

/// Escapes everything in a URL component but the unreserved marks. Spaces
/// become `%20`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static MIRROR_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4}\.\d{2}\.\d{2}-\d+)").unwrap());

/// Which archive service produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveService {
    ArchiveMirror,
    SnapshotService,
}

/// Endpoints and timeouts for both archive services.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Mirror base URLs, tried in this order.
    pub mirrors: Vec<String>,
    pub mirror_timeout: Duration,
    pub snapshot_endpoint: String,
    pub snapshot_check_timeout: Duration,
    pub snapshot_fetch_timeout: Duration,
    /// Host whose `/web/<timestamp>/` prefixes get stripped from snapshots.
    pub snapshot_host: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            mirror_timeout: Duration::from_secs(45),
            snapshot_endpoint: DEFAULT_SNAPSHOT_ENDPOINT.to_string(),
            snapshot_check_timeout: Duration::from_secs(10),
            snapshot_fetch_timeout: Duration::from_secs(30),
            snapshot_host: DEFAULT_SNAPSHOT_HOST.to_string(),
        }
    }
}

/// A capture retrieved from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedPage {
    pub html: String,
    pub archive_url: String,
    /// Human-readable capture date, when the service exposes one.
    pub timestamp: Option<String>,
    pub service: ArchiveService,
}

pub type ArchiveResult = std::result::Result<ArchivedPage, ArchiveError>;

/// A single archive service.
#[async_trait]
pub trait ArchiveLookup: Send + Sync {
    fn service(&self) -> ArchiveService;

    async fn lookup(&self, url: &str) -> ArchiveResult;
}

/// Rotating mirrors of one archiving service.
#[derive(Debug, Clone)]
pub struct ArchiveMirror {
    mirrors: Vec<Url>,
    fetch_config: FetchConfig,
    client: Client,
}

impl ArchiveMirror {
    pub fn new(config: &ArchiveConfig, fetch_config: FetchConfig) -> Result<Self> {
        let mirrors = config
            .mirrors
            .iter()
            .map(|m| Url::parse(m).map_err(|e| FerretError::InvalidUrl(format!("{}: {}", m, e))))
            .collect::<Result<Vec<_>>>()?;
        let client = Client::builder().timeout(config.mirror_timeout).build()?;

        Ok(Self { mirrors, fetch_config, client })
    }

    /// A redirect target counts as a capture when it is on one of the mirror
    /// origins and is not the `/newest/` request path or the bare root.
    fn is_archive_page(&self, final_url: &Url) -> bool {
        let on_mirror = self.mirrors.iter().any(|m| m.origin() == final_url.origin());
        let first_segment = final_url.path_segments().and_then(|mut s| s.next()).unwrap_or("");
        on_mirror && !first_segment.is_empty() && first_segment != "newest"
    }

    async fn get(&self, url: &Url) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(url.clone())
            .headers(self.fetch_config.headers_for(Identity::Browser, url))
            .send()
            .await
    }

    /// One mirror. `Err` carries the reason to try the next one.
    async fn try_mirror(&self, mirror: &Url, url: &str) -> std::result::Result<ArchivedPage, String> {
        let encoded = utf8_percent_encode(url, COMPONENT).to_string();
        let request_url = mirror
            .join(&format!("newest/{}", encoded))
            .map_err(|e| format!("Invalid mirror request URL: {}", e))?;

        let response = self.get(&request_url).await.map_err(|e| mirror_transport_error(&e))?;
        let final_url = response.url().clone();
        let is_archive_page = self.is_archive_page(&final_url);
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS && is_archive_page {
            debug!(mirror = %mirror, archive_url = %final_url, "rate limited on capture page, fetching directly");
            let direct = self.get(&final_url).await.map_err(|e| mirror_transport_error(&e))?;
            if !direct.status().is_success() {
                return Err(format!("Archive mirror returned HTTP {}", direct.status().as_u16()));
            }
            let html = direct.text().await.map_err(|e| mirror_transport_error(&e))?;
            return Ok(self.page(html, final_url));
        }

        if !status.is_success() {
            return Err(format!("Archive mirror returned HTTP {}", status.as_u16()));
        }
        if !is_archive_page {
            return Err("No archived version found on archive mirror".to_string());
        }

        let html = response.text().await.map_err(|e| mirror_transport_error(&e))?;
        Ok(self.page(html, final_url))
    }

    fn page(&self, html: String, archive_url: Url) -> ArchivedPage {
        ArchivedPage {
            timestamp: mirror_timestamp(archive_url.as_str()),
            html,
            archive_url: archive_url.into(),
            service: ArchiveService::ArchiveMirror,
        }
    }
}

#[async_trait]
impl ArchiveLookup for ArchiveMirror {
    fn service(&self) -> ArchiveService {
        ArchiveService::ArchiveMirror
    }

    async fn lookup(&self, url: &str) -> ArchiveResult {
        let mut last_error = "All archive mirrors failed".to_string();

        for mirror in &self.mirrors {
            debug!(url, mirror = %mirror, "trying archive mirror");
            match self.try_mirror(mirror, url).await {
                Ok(page) => {
                    info!(
                        url,
                        mirror = %mirror,
                        archive_url = %page.archive_url,
                        content_length = page.html.len(),
                        "archive mirror capture found"
                    );
                    return Ok(page);
                }
                Err(reason) => {
                    warn!(url, mirror = %mirror, reason = %reason, "archive mirror failed");
                    last_error = reason;
                }
            }
        }

        Err(ArchiveError::new(last_error))
    }
}

fn mirror_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() { "Archive mirror request timed out".to_string() } else { err.to_string() }
}

/// Pulls a `YYYY.MM.DD-hhmmss` capture stamp out of a mirror URL and renders
/// its date part.
pub fn mirror_timestamp(archive_url: &str) -> Option<String> {
    let stamp = MIRROR_TIMESTAMP.captures(archive_url)?.get(1)?.as_str();
    let digits: String = stamp.chars().take(10).filter(|c| c.is_ascii_digit()).collect();
    Some(format_capture_date(&digits).unwrap_or_else(|| stamp.to_string()))
}

#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ClosestSnapshot {
    #[serde(default)]
    available: bool,
    url: String,
    #[serde(default)]
    timestamp: String,
}

/// Timestamped snapshot service with an availability API.
#[derive(Debug, Clone)]
pub struct SnapshotService {
    config: ArchiveConfig,
    fetch_config: FetchConfig,
    client: Client,
    rewrite: Regex,
}

impl SnapshotService {
    pub fn new(config: ArchiveConfig, fetch_config: FetchConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        let rewrite = snapshot_rewrite_pattern(&config.snapshot_host)?;
        Ok(Self { config, fetch_config, client, rewrite })
    }

    async fn closest_snapshot(&self, url: &str) -> std::result::Result<ClosestSnapshot, ArchiveError> {
        let encoded = utf8_percent_encode(url, COMPONENT).to_string();
        let availability_url = format!("{}?url={}", self.config.snapshot_endpoint, encoded);

        let response = self
            .client
            .get(&availability_url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .timeout(self.config.snapshot_check_timeout)
            .send()
            .await
            .map_err(|e| snapshot_transport_error(&e))?;

        if !response.status().is_success() {
            return Err(ArchiveError::new(format!(
                "Snapshot availability check failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response.text().await.map_err(|e| snapshot_transport_error(&e))?;
        let availability: Availability = serde_json::from_str(&body)
            .map_err(|e| ArchiveError::new(format!("Unexpected availability response: {}", e)))?;

        match availability.archived_snapshots.closest {
            Some(snapshot) if snapshot.available => Ok(snapshot),
            _ => Err(ArchiveError::new("No archived version found on snapshot service")),
        }
    }

    /// Strips the service's proxy prefix from embedded URLs so resources
    /// resolve against the live origin.
    pub fn rewrite_snapshot_urls(&self, html: &str) -> String {
        self.rewrite.replace_all(html, "$1").into_owned()
    }
}

#[async_trait]
impl ArchiveLookup for SnapshotService {
    fn service(&self) -> ArchiveService {
        ArchiveService::SnapshotService
    }

    async fn lookup(&self, url: &str) -> ArchiveResult {
        let snapshot = self
            .closest_snapshot(url)
            .await
            .inspect_err(|e| warn!(url, reason = %e, "no usable snapshot"))?;
        debug!(url, snapshot_url = %snapshot.url, timestamp = %snapshot.timestamp, "snapshot found");

        let snapshot_url = Url::parse(&snapshot.url)
            .map_err(|e| ArchiveError::new(format!("Invalid snapshot URL {}: {}", snapshot.url, e)))?;
        let response = self
            .client
            .get(snapshot_url.clone())
            .headers(self.fetch_config.headers_for(Identity::Browser, &snapshot_url))
            .timeout(self.config.snapshot_fetch_timeout)
            .send()
            .await
            .map_err(|e| snapshot_transport_error(&e))?;

        if !response.status().is_success() {
            let err = ArchiveError::new(format!(
                "Failed to fetch snapshot: HTTP {}",
                response.status().as_u16()
            ));
            warn!(url, snapshot_url = %snapshot.url, reason = %err, "snapshot fetch failed");
            return Err(err);
        }

        let raw = response.text().await.map_err(|e| snapshot_transport_error(&e))?;
        let html = self.rewrite_snapshot_urls(&raw);
        let timestamp = Some(format_snapshot_timestamp(&snapshot.timestamp)).filter(|t| !t.is_empty());

        info!(
            url,
            archive_url = %snapshot.url,
            content_length = html.len(),
            urls_rewritten = raw.len() != html.len(),
            "snapshot retrieved"
        );

        Ok(ArchivedPage { html, archive_url: snapshot.url, timestamp, service: ArchiveService::SnapshotService })
    }
}

fn snapshot_transport_error(err: &reqwest::Error) -> ArchiveError {
    if err.is_timeout() {
        ArchiveError::new("Snapshot service request timed out")
    } else {
        ArchiveError::new(err.to_string())
    }
}

/// Pattern for `http(s)://<host>/web/<digits><modifier>/<original>` URLs.
/// The first capture group is the original URL.
pub fn snapshot_rewrite_pattern(host: &str) -> Result<Regex> {
    let pattern = format!(
        r#"https?://{}/web/\d+(?:im_|js_|cs_|if_|mp_)?/?(https?://[^"'\s<>]+)"#,
        regex::escape(host)
    );
    Regex::new(&pattern).map_err(|e| FerretError::InvalidUrl(format!("Invalid snapshot host {}: {}", host, e)))
}

/// Renders a `YYYYMMDDhhmmss` snapshot stamp as "January 3, 2024". Stamps
/// that are too short or not a real date come back unchanged.
pub fn format_snapshot_timestamp(timestamp: &str) -> String {
    format_capture_date(timestamp).unwrap_or_else(|| timestamp.to_string())
}

fn format_capture_date(digits: &str) -> Option<String> {
    if digits.len() < 8 || !digits.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;

    let date = Date::from_calendar_date(year, month.try_into().ok()?, day).ok()?;
    date.format(format_description!("[month repr:long] [day padding:none], [year]")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_snapshot_timestamp() {
        assert_eq!(format_snapshot_timestamp("20240103123456"), "January 3, 2024");
        assert_eq!(format_snapshot_timestamp("19991231"), "December 31, 1999");
        assert_eq!(format_snapshot_timestamp("2024"), "2024");
        assert_eq!(format_snapshot_timestamp("20241341000000"), "20241341000000");
        assert_eq!(format_snapshot_timestamp(""), "");
    }

    #[test]
    fn test_non_digit_timestamps_come_back_unchanged() {
        assert_eq!(format_snapshot_timestamp("12\u{20ac}45678"), "12\u{20ac}45678");
        assert_eq!(format_snapshot_timestamp("+2024010312"), "+2024010312");
        assert_eq!(format_snapshot_timestamp("2024-01-03"), "2024-01-03");
    }

    #[test]
    fn test_lookup_urls_escape_as_components() {
        let encoded = utf8_percent_encode("https://example.com/a b?q=1&x=(y)", COMPONENT).to_string();
        assert_eq!(encoded, "https%3A%2F%2Fexample.com%2Fa%20b%3Fq%3D1%26x%3D(y)");
    }

    #[test]
    fn test_mirror_timestamp() {
        assert_eq!(
            mirror_timestamp("https://archive.ph/2024.01.03-123456/https://example.com/a").as_deref(),
            Some("January 3, 2024")
        );
        assert!(mirror_timestamp("https://archive.ph/AbCdE").is_none());
    }

    #[test]
    fn test_rewrite_snapshot_urls() {
        let service = SnapshotService::new(ArchiveConfig::default(), FetchConfig::default()).unwrap();
        let html = r#"
            <img src="https://web.archive.org/web/20241009151945im_/https://example.com/image.jpg">
            <a href="http://web.archive.org/web/20241009151945/https://example.com/page">Page</a>
            <link href="https://web.archive.org/web/20241009151945cs_/https://example.com/s.css">
            <a href="https://example.com/untouched">Live</a>
        "#;

        let rewritten = service.rewrite_snapshot_urls(html);
        assert!(rewritten.contains(r#"src="https://example.com/image.jpg""#));
        assert!(rewritten.contains(r#"href="https://example.com/page""#));
        assert!(rewritten.contains(r#"href="https://example.com/s.css""#));
        assert!(rewritten.contains(r#"href="https://example.com/untouched""#));
        assert!(!rewritten.contains("web.archive.org"));
    }

    #[test]
    fn test_is_archive_page() {
        let mirror = ArchiveMirror::new(&ArchiveConfig::default(), FetchConfig::default()).unwrap();
        let check = |u: &str| mirror.is_archive_page(&Url::parse(u).unwrap());

        assert!(check("https://archive.ph/AbCdE"));
        assert!(check("https://archive.is/2024.01.03-123456/https://example.com/"));
        assert!(!check("https://archive.ph/newest/https%3A%2F%2Fexample.com"));
        assert!(!check("https://archive.ph/"));
        assert!(!check("https://example.com/AbCdE"));
    }

    #[test]
    fn test_availability_parsing() {
        let body = r#"{"url": "example.com", "archived_snapshots": {"closest": {"status": "200", "available": true,
            "url": "http://web.archive.org/web/20240103000000/https://example.com/", "timestamp": "20240103000000"}}}"#;
        let parsed: Availability = serde_json::from_str(body).unwrap();
        let closest = parsed.archived_snapshots.closest.unwrap();
        assert!(closest.available);
        assert_eq!(closest.timestamp, "20240103000000");

        let empty: Availability = serde_json::from_str(r#"{"url": "x", "archived_snapshots": {}}"#).unwrap();
        assert!(empty.archived_snapshots.closest.is_none());
    }
}
