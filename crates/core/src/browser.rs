//! Reading already-open browser tabs through an external collaborator.
//!
//! The collaborator (a browser extension or any other tab host) implements
//! [`TabCollaborator`]. [`BrowserBridge`] layers URL matching, availability
//! caching and the inactive-tab timeout on top of it. Collaborator failures
//! are never fatal: they read as "no tabs" or "no content".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::BrowserError;
use crate::parse::Document;

/// Default bound on reading content from a tab that is not focused.
pub const INACTIVE_TAB_TIMEOUT: Duration = Duration::from_secs(5);

/// An open tab as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserTab {
    pub id: u64,
    pub url: String,
    pub title: Option<String>,
    pub active: bool,
    pub favicon: Option<String>,
}

/// External tab host.
#[async_trait]
pub trait TabCollaborator: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<BrowserTab>, BrowserError>;

    /// Rendered HTML of `tab_id`, or of the focused tab when `None`.
    async fn get_content(&self, tab_id: Option<u64>) -> Result<String, BrowserError>;
}

/// Collaborator for environments with no browser attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBrowser;

#[async_trait]
impl TabCollaborator for UnavailableBrowser {
    async fn list_tabs(&self) -> Result<Vec<BrowserTab>, BrowserError> {
        Err(BrowserError::new("No browser extension connected"))
    }

    async fn get_content(&self, _tab_id: Option<u64>) -> Result<String, BrowserError> {
        Err(BrowserError::new("No browser extension connected"))
    }
}

/// Sticky "the collaborator has answered at least once" flag.
///
/// Starts unknown and only ever moves to `true`. A negative probe is not
/// recorded, so the next call checks again.
#[derive(Debug, Clone, Default)]
pub struct ExtensionAvailability(Arc<AtomicBool>);

impl ExtensionAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_available(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn mark_available(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// How a tab was matched to a target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMatch {
    /// Normalized addresses are equal.
    Direct,
    /// The tab's declared canonical URL normalizes to the target.
    Canonical,
}

/// Result of trying to read an open tab for a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabContent {
    Success { html: String, tab: BrowserTab },
    /// No open tab has this URL.
    NotFound,
    /// The tab exists but its content could not be read. Carries the tab so
    /// the caller can ask the user to focus it.
    FetchFailed { error: String, tab: BrowserTab },
}

/// Tab lookups and content reads over a [`TabCollaborator`].
#[derive(Clone)]
pub struct BrowserBridge {
    collaborator: Arc<dyn TabCollaborator>,
    availability: ExtensionAvailability,
    inactive_tab_timeout: Duration,
}

impl std::fmt::Debug for BrowserBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserBridge")
            .field("availability", &self.availability)
            .field("inactive_tab_timeout", &self.inactive_tab_timeout)
            .finish_non_exhaustive()
    }
}

impl BrowserBridge {
    pub fn new(collaborator: Arc<dyn TabCollaborator>) -> Self {
        Self { collaborator, availability: ExtensionAvailability::new(), inactive_tab_timeout: INACTIVE_TAB_TIMEOUT }
    }

    /// A bridge with no browser behind it.
    pub fn unavailable() -> Self {
        Self::new(Arc::new(UnavailableBrowser))
    }

    pub fn with_inactive_tab_timeout(mut self, timeout: Duration) -> Self {
        self.inactive_tab_timeout = timeout;
        self
    }

    pub fn availability(&self) -> &ExtensionAvailability {
        &self.availability
    }

    /// All open tabs. Empty when the collaborator is unavailable.
    pub async fn list_tabs(&self) -> Vec<BrowserTab> {
        match self.collaborator.list_tabs().await {
            Ok(tabs) => {
                self.availability.mark_available();
                tabs
            }
            Err(e) => {
                debug!(error = %e, "browser collaborator unavailable");
                Vec::new()
            }
        }
    }

    /// Whether the collaborator responds. Positive answers are cached.
    pub async fn is_available(&self) -> bool {
        if self.availability.known_available() {
            return true;
        }

        let available = self.collaborator.list_tabs().await.is_ok();
        if available {
            self.availability.mark_available();
        }
        debug!(available, cached = false, "browser availability probed");
        available
    }

    /// First open tab whose normalized URL equals the target's.
    pub async fn find_by_url(&self, target: &str) -> Option<BrowserTab> {
        let key = normalize_url(target);
        self.list_tabs().await.into_iter().find(|tab| normalize_url(&tab.url) == key)
    }

    /// Reads a tab's HTML. Empty or whitespace-only content is a failure.
    pub async fn get_content(&self, url: &str, tab_id: Option<u64>) -> Result<String, BrowserError> {
        debug!(url, ?tab_id, "reading tab content");

        let html = self.collaborator.get_content(tab_id).await.map_err(|e| {
            warn!(url, ?tab_id, error = %e, "tab content read failed");
            BrowserError::new("Failed to get content from browser. Make sure the browser extension is installed.")
        })?;

        if html.trim().is_empty() {
            warn!(url, ?tab_id, "tab returned empty content");
            return Err(BrowserError::new("Could not get content from browser. Make sure the page is fully loaded."));
        }

        debug!(url, ?tab_id, content_length = html.len(), "tab content read");
        Ok(html)
    }

    /// Reads `url` from an already-open tab, if there is one.
    ///
    /// Reads from unfocused tabs race against the inactive-tab timeout; a
    /// backgrounded page can stall indefinitely.
    pub async fn try_open_tab(&self, url: &str) -> TabContent {
        let Some(tab) = self.find_by_url(url).await else {
            debug!(url, "no open tab for url");
            return TabContent::NotFound;
        };

        info!(url, tab_id = tab.id, tab_title = ?tab.title, active = tab.active, "found open tab");

        let result = if tab.active {
            self.get_content(url, Some(tab.id)).await
        } else {
            match tokio::time::timeout(self.inactive_tab_timeout, self.get_content(url, Some(tab.id))).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        url,
                        tab_id = tab.id,
                        timeout_ms = self.inactive_tab_timeout.as_millis() as u64,
                        "inactive tab read timed out"
                    );
                    Err(BrowserError::new("Timed out fetching from inactive tab"))
                }
            }
        };

        match result {
            Ok(html) => TabContent::Success { html, tab },
            Err(e) => TabContent::FetchFailed { error: e.message, tab },
        }
    }

    /// The focused tab, if any.
    pub async fn active_tab(&self) -> Option<BrowserTab> {
        self.list_tabs().await.into_iter().find(|tab| tab.active && !tab.url.is_empty())
    }

    /// URL and id of the focused tab.
    pub async fn active_tab_url(&self) -> Option<(String, u64)> {
        self.active_tab().await.map(|tab| (tab.url, tab.id))
    }

    /// Reads the focused tab. Used after the user opens a blocked page by hand.
    pub async fn content_from_active_tab(&self, url: &str) -> Result<String, BrowserError> {
        self.get_content(url, None).await
    }
}

/// Decides whether a tab shows the target page.
///
/// Normalized addresses are compared first. Failing that, the canonical URL
/// declared in `tab_html` is compared.
pub fn urls_match(target: &str, tab_url: &str, tab_html: Option<&str>) -> Option<UrlMatch> {
    let key = normalize_url(target);
    if normalize_url(tab_url) == key {
        return Some(UrlMatch::Direct);
    }

    let canonical = Document::parse_with_url(tab_html?, tab_url).extract_canonical_url()?;
    let canonical = Url::parse(tab_url)
        .and_then(|base| base.join(&canonical))
        .map(String::from)
        .unwrap_or(canonical);
    (normalize_url(&canonical) == key).then_some(UrlMatch::Canonical)
}

/// Comparison key for a URL: scheme, lowercase host, port, path without
/// trailing slashes, and the query string. Fragments are dropped.
/// Unparseable input is returned unchanged.
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let mut key = format!("{}://", parsed.scheme());
    if let Some(host) = parsed.host_str() {
        key.push_str(&host.to_lowercase());
    }
    if let Some(port) = parsed.port() {
        key.push_str(&format!(":{}", port));
    }
    key.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    key
}
