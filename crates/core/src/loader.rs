//! The load state machine.
//!
//! `Idle -> Fetching -> {Success, Blocked, NotReadable, EmptyContent, Error}`
//!
//! A direct fetch runs first. A 403 sends the load to an already-open tab,
//! then to the bypass chain when enabled. Extracted content is gated on a
//! minimum length. Every path ends in exactly one [`LoadOutcome`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::ArchiveConfig;
use crate::article::{ArticleContent, ArticleState};
use crate::browser::{BrowserBridge, BrowserTab, INACTIVE_TAB_TIMEOUT, TabContent, UrlMatch, normalize_url, urls_match};
use crate::extract::{ExtractOptions, Extractor};
use crate::fetch::{FetchConfig, HttpFetcher, Identity, PageFetcher};
use crate::hopper::{ArchiveSource, BypassSource, Hopper};
use crate::{ExtractionError, FetchError, Result};

/// Extracted text shorter than this is treated as empty.
pub const MIN_ARTICLE_CHARS: usize = 100;

/// Source label for content read from a browser tab.
pub const TAB_SOURCE: &str = "browser extension (tab)";

/// Load orchestration settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Run the bypass chain after a 403 with no usable tab (default: false).
    pub bypass_enabled: bool,
    /// Minimum extracted text length in characters (default: 100).
    pub min_article_chars: usize,
    /// Bound on reading an unfocused tab (default: 5s).
    pub inactive_tab_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { bypass_enabled: false, min_article_chars: MIN_ARTICLE_CHARS, inactive_tab_timeout: INACTIVE_TAB_TIMEOUT }
    }
}

impl LoaderConfig {
    /// Creates a new builder for LoaderConfig.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ferret_core::LoaderConfig;
    ///
    /// let config = LoaderConfig::builder().bypass_enabled(true).min_article_chars(250).build();
    /// assert!(config.bypass_enabled);
    /// ```
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::new()
    }
}

/// Builder for LoaderConfig.
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn new() -> Self {
        Self { config: LoaderConfig::default() }
    }

    pub fn bypass_enabled(mut self, value: bool) -> Self {
        self.config.bypass_enabled = value;
        self
    }

    pub fn min_article_chars(mut self, value: usize) -> Self {
        self.config.min_article_chars = value;
        self
    }

    pub fn inactive_tab_timeout(mut self, value: Duration) -> Self {
        self.config.inactive_tab_timeout = value;
        self
    }

    pub fn build(self) -> LoaderConfig {
        self.config
    }
}

impl Default for LoaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a load is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    Idle,
    Fetching,
    Success,
    Blocked,
    NotReadable,
    EmptyContent,
    Error,
}

/// Terminal result of one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Success(ArticleState),
    /// Direct access was refused and no alternate path produced content.
    Blocked {
        url: String,
        has_browser_extension: bool,
        /// An open tab for the URL that could not be read.
        found_tab: Option<BrowserTab>,
        error: String,
    },
    /// The page does not look like an article. Retry with [`Loader::force`].
    NotReadable { url: String, error: String },
    EmptyContent { url: String, error: String },
    Error { error: String },
}

impl LoadOutcome {
    pub fn state(&self) -> LoadState {
        match self {
            LoadOutcome::Success(_) => LoadState::Success,
            LoadOutcome::Blocked { .. } => LoadState::Blocked,
            LoadOutcome::NotReadable { .. } => LoadState::NotReadable,
            LoadOutcome::EmptyContent { .. } => LoadState::EmptyContent,
            LoadOutcome::Error { .. } => LoadState::Error,
        }
    }
}

/// Result of refreshing an article from the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReimportOutcome {
    Success { article: ArticleState, matched_via: UrlMatch },
    /// The matching tab is open but not focused and cannot be read reliably.
    TabInactive { tab: BrowserTab },
    TabNotFound,
    Failed { error: String },
}

/// Drives fetch, tab reuse, bypass and extraction for one URL at a time.
pub struct Loader {
    config: LoaderConfig,
    fetcher: Arc<dyn PageFetcher>,
    browser: BrowserBridge,
    hopper: Hopper,
    extractor: Extractor,
}

impl Loader {
    pub fn new(config: LoaderConfig, fetcher: Arc<dyn PageFetcher>, browser: BrowserBridge, hopper: Hopper) -> Self {
        let browser = browser.with_inactive_tab_timeout(config.inactive_tab_timeout);
        Self { config, fetcher, browser, hopper, extractor: Extractor::default() }
    }

    /// HTTP fetcher and the standard bypass chain.
    pub fn standard(
        config: LoaderConfig, fetch_config: FetchConfig, archive_config: &ArchiveConfig, browser: BrowserBridge,
    ) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(fetch_config.clone())?);
        let hopper = Hopper::standard(fetcher.clone(), archive_config, fetch_config)?;
        Ok(Self::new(config, fetcher, browser, hopper))
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn browser(&self) -> &BrowserBridge {
        &self.browser
    }

    /// Strategies tried after a 403, in order. Empty when bypass is off.
    pub fn bypass_sources(&self) -> Vec<BypassSource> {
        if self.config.bypass_enabled { self.hopper.sources() } else { Vec::new() }
    }

    /// Loads `url`. `source` records where the URL came from and is carried
    /// into the resulting [`ArticleState`].
    pub async fn load(&self, url: &str, source: &str, options: ExtractOptions) -> LoadOutcome {
        info!(url, source, state = ?LoadState::Fetching, skip_precheck = options.skip_precheck, "load started");

        let outcome = match self.fetcher.fetch(url, Identity::Browser).await {
            Ok(page) => {
                debug!(
                    url,
                    final_url = %page.final_url,
                    content_length = page.content_length,
                    content_type = page.content_type.as_deref().unwrap_or("unknown"),
                    "direct fetch succeeded"
                );
                self.extract_fetched(&page.html, &page.final_url, source, options).await
            }
            Err(err) if err.is_forbidden() => self.on_blocked(url, source, options, err).await,
            Err(err) => {
                warn!(url, kind = ?err.kind, error = %err, "direct fetch failed");
                LoadOutcome::Error { error: err.message }
            }
        };

        info!(url, state = ?outcome.state(), "load finished");
        outcome
    }

    /// Reloads with the article gate skipped.
    pub async fn force(&self, url: &str, source: &str) -> LoadOutcome {
        self.load(url, source, ExtractOptions::forced()).await
    }

    async fn extract_fetched(&self, html: &str, url: &str, source: &str, options: ExtractOptions) -> LoadOutcome {
        match self.extractor.extract(html, url, options) {
            Ok(content) => self.accept(content, url, source, options.skip_precheck, None),
            Err(ExtractionError::NotReadable) => {
                LoadOutcome::NotReadable { url: url.to_string(), error: ExtractionError::NotReadable.to_string() }
            }
            Err(ExtractionError::EmptyContent) => {
                LoadOutcome::EmptyContent { url: url.to_string(), error: ExtractionError::EmptyContent.to_string() }
            }
            Err(err @ ExtractionError::ParseFailed(_)) => {
                debug!(url, error = %err, "parse failed, retrying through an open tab");
                match self.browser.try_open_tab(url).await {
                    TabContent::Success { html, tab } => match self.extractor.extract(&html, url, options) {
                        Ok(content) => {
                            info!(url, tab_id = tab.id, "recovered parse failure from open tab");
                            self.accept(content, url, TAB_SOURCE, options.skip_precheck, None)
                        }
                        Err(_) => LoadOutcome::Error { error: err.to_string() },
                    },
                    _ => LoadOutcome::Error { error: err.to_string() },
                }
            }
        }
    }

    async fn on_blocked(&self, url: &str, source: &str, options: ExtractOptions, err: FetchError) -> LoadOutcome {
        info!(url, status = err.status_code, "direct fetch blocked, looking for an open tab");

        match self.browser.try_open_tab(url).await {
            TabContent::Success { html, tab } => match self.extractor.extract(&html, url, options) {
                Ok(content) => {
                    info!(url, tab_id = tab.id, "loaded from open tab");
                    return self.accept(content, url, TAB_SOURCE, options.skip_precheck, None);
                }
                Err(e) => {
                    warn!(url, tab_id = tab.id, error = %e, "open tab content not extractable");
                    return LoadOutcome::Blocked {
                        url: url.to_string(),
                        has_browser_extension: true,
                        found_tab: Some(tab),
                        error: err.message,
                    };
                }
            },
            TabContent::FetchFailed { error, tab } => {
                info!(url, tab_id = tab.id, active = tab.active, error = %error, "tab found but unreadable");
                return LoadOutcome::Blocked {
                    url: url.to_string(),
                    has_browser_extension: true,
                    found_tab: Some(tab),
                    error: err.message,
                };
            }
            TabContent::NotFound => {}
        }

        let mut error = err.message;
        if self.config.bypass_enabled {
            match self.hopper.bypass(url).await {
                Ok(page) => match self.extractor.extract(&page.html, url, ExtractOptions::forced()) {
                    Ok(content) => {
                        let annotation = ArchiveSource::from_page(&page);
                        return self.accept(content, url, source, true, annotation);
                    }
                    Err(e) => {
                        warn!(url, source = ?page.source, error = %e, "bypassed content not extractable");
                        error = e.to_string();
                    }
                },
                Err(e) => error = e.to_string(),
            }
        }

        let has_browser_extension = self.browser.is_available().await;
        info!(url, has_browser_extension, "blocked with no open tab");
        LoadOutcome::Blocked { url: url.to_string(), has_browser_extension, found_tab: None, error }
    }

    fn accept(
        &self, content: ArticleContent, url: &str, source: &str, bypassed: bool, annotation: Option<ArchiveSource>,
    ) -> LoadOutcome {
        if content.length < self.config.min_article_chars {
            warn!(url, length = content.length, min = self.config.min_article_chars, "extracted text too short");
            return LoadOutcome::EmptyContent { url: url.to_string(), error: ExtractionError::EmptyContent.to_string() };
        }

        let article = ArticleState::new(content, url, source)
            .with_bypassed_check(bypassed)
            .with_archive_annotation(annotation);
        LoadOutcome::Success(article)
    }

    /// Rebuilds `current` from the browser tab showing its URL.
    ///
    /// Looks for a tab with the same normalized URL first. Failing that, the
    /// focused tab is accepted when its declared canonical URL matches. The
    /// new state keeps only the previous title.
    pub async fn reimport(&self, current: &ArticleState) -> ReimportOutcome {
        let tabs = self.browser.list_tabs().await;
        let key = normalize_url(&current.url);

        let (tab, html, matched_via) = if let Some(tab) = tabs.iter().find(|t| normalize_url(&t.url) == key) {
            if !tab.active {
                info!(url = %current.url, tab_id = tab.id, "matching tab is not focused");
                return ReimportOutcome::TabInactive { tab: tab.clone() };
            }
            match self.browser.get_content(&current.url, Some(tab.id)).await {
                Ok(html) => (tab.clone(), html, UrlMatch::Direct),
                Err(e) => return ReimportOutcome::Failed { error: e.message },
            }
        } else {
            let Some(active) = tabs.iter().find(|t| t.active) else {
                return ReimportOutcome::TabNotFound;
            };
            let Ok(html) = self.browser.get_content(&active.url, Some(active.id)).await else {
                return ReimportOutcome::TabNotFound;
            };
            match urls_match(&current.url, &active.url, Some(&html)) {
                Some(matched) => {
                    info!(url = %current.url, tab_url = %active.url, ?matched, "reimport matched via canonical url");
                    (active.clone(), html, matched)
                }
                None => return ReimportOutcome::TabNotFound,
            }
        };

        match self.extractor.extract(&html, &current.url, ExtractOptions::forced()) {
            Ok(content) if content.length >= self.config.min_article_chars => {
                let mut article = ArticleState::new(content, current.url.clone(), TAB_SOURCE).with_bypassed_check(true);
                article.title = current.title.clone();
                info!(url = %current.url, tab_id = tab.id, ?matched_via, "reimport succeeded");
                ReimportOutcome::Success { article, matched_via }
            }
            Ok(_) => ReimportOutcome::Failed { error: ExtractionError::EmptyContent.to_string() },
            Err(e) => ReimportOutcome::Failed { error: e.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_config_defaults() {
        let config = LoaderConfig::default();
        assert!(!config.bypass_enabled);
        assert_eq!(config.min_article_chars, 100);
        assert_eq!(config.inactive_tab_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_loader_config_builder() {
        let config = LoaderConfig::builder()
            .bypass_enabled(true)
            .min_article_chars(10)
            .inactive_tab_timeout(Duration::from_millis(250))
            .build();

        assert!(config.bypass_enabled);
        assert_eq!(config.min_article_chars, 10);
        assert_eq!(config.inactive_tab_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_outcome_state() {
        assert_eq!(LoadOutcome::Error { error: "x".into() }.state(), LoadState::Error);
        assert_eq!(
            LoadOutcome::NotReadable { url: "u".into(), error: "x".into() }.state(),
            LoadState::NotReadable
        );
        assert_eq!(
            LoadOutcome::Blocked { url: "u".into(), has_browser_extension: false, found_tab: None, error: "x".into() }
                .state(),
            LoadState::Blocked
        );
    }

    #[test]
    fn test_bypass_sources_follow_config() {
        let standard = |bypass: bool| {
            let config = LoaderConfig::builder().bypass_enabled(bypass).build();
            Loader::standard(config, FetchConfig::default(), &ArchiveConfig::default(), BrowserBridge::unavailable())
                .unwrap()
        };

        assert!(standard(false).bypass_sources().is_empty());
        assert_eq!(
            standard(true).bypass_sources(),
            vec![BypassSource::CrawlerIdentity, BypassSource::ArchiveMirror, BypassSource::SnapshotService]
        );
    }
}
