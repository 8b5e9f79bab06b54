//! Bounded HTTP fetching with browser and crawler identities.
//!
//! Every fetch performs a single GET, follows redirects transparently and
//! reports the final URL. Failures are classified into [`FetchErrorKind`]s
//! so the caller can decide whether an alternate path exists.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use tracing::{debug, warn};
use url::Url;

use crate::{FerretError, FetchError, FetchErrorKind, Result};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
pub const CRAWLER_USER_AGENT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Which header profile a request presents to the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Mimics a current desktop browser. Used for direct fetches.
    Browser,
    /// A recognizable search-engine crawler. Used for bypass attempts.
    Crawler,
}

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Wall-clock bound for browser-identity requests.
    pub browser_timeout: Duration,
    /// Wall-clock bound for crawler-identity requests.
    pub crawler_timeout: Duration,
    pub browser_user_agent: String,
    pub crawler_user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            browser_timeout: Duration::from_secs(30),
            crawler_timeout: Duration::from_secs(15),
            browser_user_agent: BROWSER_USER_AGENT.to_string(),
            crawler_user_agent: CRAWLER_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout_for(&self, identity: Identity) -> Duration {
        match identity {
            Identity::Browser => self.browser_timeout,
            Identity::Crawler => self.crawler_timeout,
        }
    }

    /// Builds the request headers for an identity. The referer is the
    /// origin of the target URL.
    pub fn headers_for(&self, identity: Identity, url: &Url) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let user_agent = match identity {
            Identity::Browser => &self.browser_user_agent,
            Identity::Crawler => &self.crawler_user_agent,
        };

        if let Ok(value) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));

        let origin = url.origin().ascii_serialization();
        if origin != "null"
            && let Ok(value) = HeaderValue::from_str(&format!("{}/", origin))
        {
            headers.insert(REFERER, value);
        }

        match identity {
            Identity::Browser => {
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
                headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
                headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
                headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
                headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
                headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
            }
            Identity::Crawler => {
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
            }
        }

        headers
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub html: String,
    /// URL after redirects. Use this for cache keys and canonical comparisons.
    pub final_url: String,
    pub content_length: usize,
    pub content_type: Option<String>,
}

/// Outcome of a single fetch attempt.
pub type FetchOutcome = std::result::Result<FetchedPage, FetchError>;

/// Performs one bounded GET with the given identity.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, identity: Identity) -> FetchOutcome;
}

/// [`PageFetcher`] backed by reqwest, one client per identity.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    config: FetchConfig,
    browser: Client,
    crawler: Client,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let browser = Client::builder()
            .timeout(config.browser_timeout)
            .build()
            .map_err(FerretError::HttpError)?;
        let crawler = Client::builder()
            .timeout(config.crawler_timeout)
            .build()
            .map_err(FerretError::HttpError)?;

        Ok(Self { config, browser, crawler })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn client(&self, identity: Identity) -> &Client {
        match identity {
            Identity::Browser => &self.browser,
            Identity::Crawler => &self.crawler,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, identity: Identity) -> FetchOutcome {
        debug!(url, ?identity, "fetch started");

        let parsed = Url::parse(url)
            .map_err(|e| FetchError::new(FetchErrorKind::Unknown, format!("Invalid URL: {}", e)))?;

        let response = self
            .client(identity)
            .get(parsed.clone())
            .headers(self.config.headers_for(identity, &parsed))
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))
            .inspect_err(|e| warn!(url, kind = ?e.kind, message = %e.message, "fetch failed"))?;

        let status = response.status();
        if !status.is_success() {
            let err = FetchError::from_status(status.as_u16());
            warn!(url, status = status.as_u16(), kind = ?err.kind, "fetch rejected");
            return Err(err);
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let html = response.text().await.map_err(|e| classify_transport_error(&e))?;

        debug!(
            url,
            final_url = %final_url,
            status = status.as_u16(),
            content_length = html.len(),
            content_type = content_type.as_deref().unwrap_or("unknown"),
            "fetch succeeded"
        );

        Ok(FetchedPage { content_length: html.len(), html, final_url, content_type })
    }
}

/// Classifies a reqwest failure that happened before a status was available.
pub(crate) fn classify_transport_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::new(FetchErrorKind::Timeout, "Request timed out, the page took too long to load")
    } else if err.is_connect() || err.is_request() {
        FetchError::new(FetchErrorKind::Network, "Unable to reach the website, check your connection")
    } else {
        FetchError::new(FetchErrorKind::Unknown, err.to_string())
    }
}
