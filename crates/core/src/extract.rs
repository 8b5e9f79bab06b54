//! Content extraction: absolutize, clean, gate, extract, merge metadata.
//!
//! # Example
//!
//! ```rust
//! use ferret_core::{ExtractOptions, ExtractionError, Extractor};
//!
//! let html = r##"<html><body><nav><a href="#">Home</a></nav></body></html>"##;
//! let extractor = Extractor::default();
//!
//! let result = extractor.extract(html, "https://example.com/", ExtractOptions::default());
//! assert_eq!(result, Err(ExtractionError::NotReadable));
//! ```

use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::article::ArticleContent;
use crate::clean::{CleanConfig, CleaningResult, clean_html};
use crate::metadata::StructuredMetadata;
use crate::parse::Document;
use crate::preprocess::absolutize_urls;
use crate::quirks::{SiteQuirks, quirks_for_url};
use crate::readability::{Readable, extract_readable, is_probably_readable};
use crate::ExtractionError;

const SCHEMA_BODY_SELECTOR: &str = r#"[itemprop="articleBody"]"#;

/// Per-call extraction switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Skip the "is this an article" gate. Used by the force path and for
    /// content recovered through a bypass strategy.
    pub skip_precheck: bool,
}

impl ExtractOptions {
    pub fn forced() -> Self {
        Self { skip_precheck: true }
    }
}

/// Turns a fetched page into [`ArticleContent`].
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    clean_config: CleanConfig,
}

impl Extractor {
    pub fn new(clean_config: CleanConfig) -> Self {
        Self { clean_config }
    }

    pub fn clean_config(&self) -> &CleanConfig {
        &self.clean_config
    }

    /// Extracts readable content from `html` fetched at `url`.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::NotReadable`] when the gate rejects the page and
    ///   `skip_precheck` is off
    /// - [`ExtractionError::ParseFailed`] when readability finds nothing
    /// - [`ExtractionError::EmptyContent`] when what it finds has no text
    pub fn extract(&self, html: &str, url: &str, options: ExtractOptions) -> Result<ArticleContent, ExtractionError> {
        debug!(url, html_len = html.len(), skip_precheck = options.skip_precheck, "extraction started");

        let html = match Url::parse(url) {
            Ok(base) => absolutize_urls(html, &base),
            Err(e) => {
                warn!(url, error = %e, "cannot resolve relative URLs");
                html.to_string()
            }
        };

        let raw = Document::parse_with_url(&html, url);
        let metadata = raw.extract_metadata();
        let page_title = raw.title();

        let cleaning = clean_html(&html, url, &self.clean_config);

        if let Some(quirks) = quirks_for_url(url)
            && let Some(content) = site_specific(&cleaning, quirks)
        {
            info!(url, quirks = quirks.name, text_len = content.length, "site-specific extraction");
            return Ok(merge_site_specific(content, metadata, page_title));
        }

        if !options.skip_precheck && !is_probably_readable(&cleaning.html) {
            warn!(url, "page does not look like an article");
            return Err(ExtractionError::NotReadable);
        }

        let readable = extract_readable(&cleaning.html, url).inspect_err(|e| warn!(url, error = %e, "extraction failed"))?;
        info!(url, text_len = readable.length, content_len = readable.content.len(), "extraction succeeded");

        Ok(merge(readable, metadata, page_title, url))
    }
}

/// Extracts with default settings.
pub fn extract(html: &str, url: &str, options: ExtractOptions) -> Result<ArticleContent, ExtractionError> {
    Extractor::default().extract(html, url, options)
}

/// Body selected directly by the host's quirk selector.
struct SiteContent {
    content: String,
    text_content: String,
    length: usize,
}

/// Pulls the article body with the host's own selector. `None` means the
/// selector found nothing usable and the generic path should run.
fn site_specific(cleaning: &CleaningResult, quirks: &SiteQuirks) -> Option<SiteContent> {
    let article_selector = quirks.article_selector?;
    let doc = Html::parse_document(&cleaning.html);

    let prefer_schema = quirks.prefer_schema_org == Some(true) && cleaning.schema_article_found;
    let selectors = prefer_schema
        .then_some(SCHEMA_BODY_SELECTOR)
        .into_iter()
        .chain(std::iter::once(article_selector));

    for selector in selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        let mut content = String::new();
        let mut texts = Vec::new();
        for el in doc.select(&selector) {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            content.push_str(&el.html());
            texts.push(text.to_string());
        }

        if !texts.is_empty() {
            let text_content = texts.join("\n\n");
            return Some(SiteContent { length: text_content.chars().count(), content, text_content });
        }
    }

    debug!(quirks = quirks.name, "site selector matched nothing, falling back");
    None
}

fn merge_site_specific(site: SiteContent, metadata: StructuredMetadata, page_title: Option<String>) -> ArticleContent {
    ArticleContent {
        title: ArticleContent::display_title(metadata.title.or(page_title)),
        content: site.content,
        text_content: site.text_content,
        excerpt: metadata.description.clone(),
        byline: metadata.author.clone(),
        site_name: metadata.site_name,
        length: site.length,
        author: metadata.author,
        published: metadata.published,
        image: metadata.image,
        description: metadata.description,
        favicon: metadata.favicon,
    }
}

/// Structured metadata wins; readability's guesses fill the gaps.
fn merge(readable: Readable, metadata: StructuredMetadata, page_title: Option<String>, url: &str) -> ArticleContent {
    let host = Url::parse(url).ok().and_then(|u| u.host_str().map(|h| h.to_string()));

    ArticleContent {
        title: ArticleContent::display_title(metadata.title.or(readable.title).or(page_title)),
        byline: metadata.author.clone().or(readable.byline),
        site_name: metadata.site_name.or(readable.site_name).or(host),
        excerpt: readable.excerpt.or_else(|| metadata.description.clone()),
        length: readable.length,
        content: readable.content,
        text_content: readable.text_content,
        author: metadata.author,
        published: metadata.published,
        image: metadata.image,
        description: metadata.description,
        favicon: metadata.favicon,
    }
}
