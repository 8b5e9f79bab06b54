//! Bypass orchestration for pages that refuse direct access.
//!
//! The [`Hopper`] walks an ordered list of [`BypassStrategy`] objects and
//! stops at the first one that returns content. The standard order is
//! crawler identity, archive mirror, snapshot service.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ferret_core::{ArchiveConfig, FetchConfig, Hopper, HttpFetcher};
//!
//! # async fn run() -> ferret_core::Result<()> {
//! let fetch_config = FetchConfig::default();
//! let fetcher = Arc::new(HttpFetcher::new(fetch_config.clone())?);
//! let hopper = Hopper::standard(fetcher, &ArchiveConfig::default(), fetch_config)?;
//!
//! match hopper.bypass("https://example.com/paywalled").await {
//!     Ok(page) => println!("got {} bytes via {:?}", page.html.len(), page.source),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveConfig, ArchiveLookup, ArchiveMirror, ArchiveService, SnapshotService};
use crate::fetch::{FetchConfig, Identity, PageFetcher};
use crate::{BypassError, Result};

/// Where bypassed content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BypassSource {
    CrawlerIdentity,
    ArchiveMirror,
    SnapshotService,
    BrowserTab,
    None,
}

impl BypassSource {
    pub fn label(&self) -> &'static str {
        match self {
            BypassSource::CrawlerIdentity => "Crawler identity",
            BypassSource::ArchiveMirror => "Archive mirror",
            BypassSource::SnapshotService => "Snapshot service",
            BypassSource::BrowserTab => "Browser tab",
            BypassSource::None => "None",
        }
    }
}

impl From<ArchiveService> for BypassSource {
    fn from(service: ArchiveService) -> Self {
        match service {
            ArchiveService::ArchiveMirror => BypassSource::ArchiveMirror,
            ArchiveService::SnapshotService => BypassSource::SnapshotService,
        }
    }
}

/// Content recovered by one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassedPage {
    pub html: String,
    pub source: BypassSource,
    pub archive_url: Option<String>,
    pub timestamp: Option<String>,
}

pub type BypassResult = std::result::Result<BypassedPage, BypassError>;

/// One way of getting around a blocked page.
#[async_trait]
pub trait BypassStrategy: Send + Sync {
    fn source(&self) -> BypassSource;

    /// `Err` carries a message for the aggregated failure.
    async fn attempt(&self, url: &str) -> std::result::Result<BypassedPage, String>;
}

/// Refetches with the crawler identity.
pub struct CrawlerStrategy {
    fetcher: Arc<dyn PageFetcher>,
}

impl CrawlerStrategy {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl BypassStrategy for CrawlerStrategy {
    fn source(&self) -> BypassSource {
        BypassSource::CrawlerIdentity
    }

    async fn attempt(&self, url: &str) -> std::result::Result<BypassedPage, String> {
        let page = self.fetcher.fetch(url, Identity::Crawler).await.map_err(|e| e.message)?;
        Ok(BypassedPage { html: page.html, source: self.source(), archive_url: None, timestamp: None })
    }
}

/// Adapts an [`ArchiveLookup`] into the chain.
pub struct ArchiveStrategy {
    lookup: Arc<dyn ArchiveLookup>,
}

impl ArchiveStrategy {
    pub fn new(lookup: Arc<dyn ArchiveLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl BypassStrategy for ArchiveStrategy {
    fn source(&self) -> BypassSource {
        self.lookup.service().into()
    }

    async fn attempt(&self, url: &str) -> std::result::Result<BypassedPage, String> {
        let page = self.lookup.lookup(url).await.map_err(|e| e.message)?;
        Ok(BypassedPage {
            html: page.html,
            source: page.service.into(),
            archive_url: Some(page.archive_url),
            timestamp: page.timestamp,
        })
    }
}

/// Ordered fallback chain. The first successful strategy wins.
pub struct Hopper {
    strategies: Vec<Box<dyn BypassStrategy>>,
}

impl Hopper {
    pub fn new(strategies: Vec<Box<dyn BypassStrategy>>) -> Self {
        Self { strategies }
    }

    /// Crawler identity, then archive mirrors, then the snapshot service.
    pub fn standard(fetcher: Arc<dyn PageFetcher>, archive: &ArchiveConfig, fetch: FetchConfig) -> Result<Self> {
        let mirror = ArchiveMirror::new(archive, fetch.clone())?;
        let snapshot = SnapshotService::new(archive.clone(), fetch)?;

        Ok(Self::new(vec![
            Box::new(CrawlerStrategy::new(fetcher)),
            Box::new(ArchiveStrategy::new(Arc::new(mirror))),
            Box::new(ArchiveStrategy::new(Arc::new(snapshot))),
        ]))
    }

    pub fn sources(&self) -> Vec<BypassSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    /// Tries each strategy in order. Individual failures are only reported
    /// through the aggregated error.
    pub async fn bypass(&self, url: &str) -> BypassResult {
        info!(url, strategies = self.strategies.len(), "bypass started");
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let source = strategy.source();
            debug!(url, ?source, "trying bypass strategy");

            match strategy.attempt(url).await {
                Ok(page) => {
                    info!(
                        url,
                        ?source,
                        archive_url = page.archive_url.as_deref().unwrap_or(""),
                        content_length = page.html.len(),
                        "bypass succeeded"
                    );
                    return Ok(page);
                }
                Err(message) => {
                    debug!(url, ?source, error = %message, "bypass strategy failed");
                    attempts.push((source.label().to_string(), message));
                }
            }
        }

        let err = BypassError { attempts };
        warn!(url, error = %err, "bypass failed");
        Err(err)
    }
}

/// Provenance attached to an article recovered through a bypass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSource {
    pub service: BypassSource,
    pub url: Option<String>,
    pub timestamp: Option<String>,
    /// RFC 3339 time the content was retrieved.
    pub retrieved_at: String,
}

impl ArchiveSource {
    /// `None` for pages with no real source.
    pub fn from_page(page: &BypassedPage) -> Option<Self> {
        if page.source == BypassSource::None {
            return None;
        }

        Some(Self {
            service: page.source,
            url: page.archive_url.clone(),
            timestamp: page.timestamp.clone(),
            retrieved_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        })
    }
}
