//! Readability gate and main-content extraction.
//!
//! [`is_probably_readable`] is a cheap yes/no check run before the full
//! pass, so homepages and listing pages fail fast. [`extract_readable`]
//! wraps `dom_smoothie`, which does the actual main-content scoring.
//!
//! # Example
//!
//! ```rust
//! use ferret_core::readability::is_probably_readable;
//!
//! let nav = r##"<html><body><nav><a href="#">Link</a></nav></body></html>"##;
//! assert!(!is_probably_readable(nav));
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use dom_smoothie::Readability;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::ExtractionError;

/// Accumulated score above which a page counts as readable.
pub const MIN_READABLE_SCORE: f64 = 20.0;
/// Blocks shorter than this contribute nothing to the score.
pub const MIN_BLOCK_TEXT_LEN: usize = 140;

static UNLIKELY_CANDIDATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote",
    )
    .unwrap()
});

static MAYBE_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)and|article|body|column|content|main|mathjax|shadow").unwrap());

static HIDDEN_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap());

/// Decides whether a page is probably an article.
///
/// Scores every `<p>`, `<pre>`, `<article>` and `<br>`-holding `<div>` that
/// is visible, not inside a list item and not marked as boilerplate by its
/// class or id. Each block longer than [`MIN_BLOCK_TEXT_LEN`] adds the
/// square root of its excess length.
pub fn is_probably_readable(html: &str) -> bool {
    let doc = Html::parse_document(html);
    let score = readability_score(&doc);
    debug!(score, threshold = MIN_READABLE_SCORE, "readability precheck");
    score > MIN_READABLE_SCORE
}

fn readability_score(doc: &Html) -> f64 {
    let (Ok(blocks), Ok(br_divs), Ok(list_paragraphs)) =
        (Selector::parse("p, pre, article"), Selector::parse("div > br"), Selector::parse("li p"))
    else {
        return 0.0;
    };

    let in_list: HashSet<_> = doc.select(&list_paragraphs).map(|el| el.id()).collect();

    let mut seen = HashSet::new();
    let mut candidates: Vec<ElementRef<'_>> = Vec::new();
    for el in doc.select(&blocks) {
        if seen.insert(el.id()) {
            candidates.push(el);
        }
    }
    for br in doc.select(&br_divs) {
        if let Some(div) = br.parent().and_then(ElementRef::wrap)
            && seen.insert(div.id())
        {
            candidates.push(div);
        }
    }

    let mut score = 0.0;
    for el in candidates {
        if !is_visible(&el) || in_list.contains(&el.id()) {
            continue;
        }

        let marker = format!("{} {}", el.value().attr("class").unwrap_or(""), el.value().attr("id").unwrap_or(""));
        if UNLIKELY_CANDIDATES.is_match(&marker) && !MAYBE_CANDIDATE.is_match(&marker) {
            continue;
        }

        let len = el.text().collect::<String>().trim().chars().count();
        if len < MIN_BLOCK_TEXT_LEN {
            continue;
        }

        score += ((len - MIN_BLOCK_TEXT_LEN) as f64).sqrt();
        if score > MIN_READABLE_SCORE {
            break;
        }
    }
    score
}

fn is_visible(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return false;
    }
    if value.attr("style").is_some_and(|style| HIDDEN_STYLE.is_match(style)) {
        return false;
    }
    value.attr("aria-hidden") != Some("true")
}

/// What the readability pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readable {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub excerpt: Option<String>,
    /// Cleaned HTML of the main content.
    pub content: String,
    pub text_content: String,
    pub length: usize,
}

/// Runs the readability pass.
///
/// # Errors
///
/// [`ExtractionError::ParseFailed`] when no main content could be located,
/// [`ExtractionError::EmptyContent`] when it was located but holds no text.
pub fn extract_readable(html: &str, url: &str) -> Result<Readable, ExtractionError> {
    let mut reader = Readability::new(html, Some(url), None)
        .map_err(|e| ExtractionError::ParseFailed(format!("{:?}", e)))?;
    let article = reader.parse().map_err(|e| ExtractionError::ParseFailed(format!("{:?}", e)))?;

    let content: String = article.content.into();
    let text_content: String = article.text_content.into();
    if content.trim().is_empty() || text_content.trim().is_empty() {
        return Err(ExtractionError::EmptyContent);
    }

    let title = Some(article.title.trim().to_string()).filter(|t| !t.is_empty());

    Ok(Readable {
        title,
        byline: non_empty(article.byline),
        site_name: non_empty(article.site_name),
        excerpt: non_empty(article.excerpt),
        length: text_content.trim().chars().count(),
        content,
        text_content,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
