//! Extraction output and the terminal pipeline artifact.
//!
//! [`ArticleContent`] is what the content extractor returns for one page.
//! [`ArticleState`] is what a successful load hands to the caller; it is
//! built once and replaced wholesale on reimport.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::hopper::ArchiveSource;

const DEFAULT_TITLE: &str = "Untitled";

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[\w'-]+\b").unwrap());

/// Readable content extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleContent {
    pub title: String,
    /// Main content as HTML. Never empty on a successful extraction.
    pub content: String,
    /// Plain text derived from `content`.
    pub text_content: String,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    /// Character count of `text_content`.
    pub length: usize,
    pub author: Option<String>,
    pub published: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub favicon: Option<String>,
}

impl ArticleContent {
    /// Title to display, falling back to a placeholder when none was found.
    pub fn display_title(title: Option<String>) -> String {
        title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.text_content)
    }
}

/// The result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleState {
    /// Main content as HTML, ready for an external formatter.
    pub body_content: String,
    pub title: String,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    /// Final URL after redirects.
    pub url: String,
    /// Where the URL or content came from, e.g. `argument` or `browser extension (tab)`.
    pub source: String,
    pub text_content: String,
    pub bypassed_readability_check: bool,
    /// Provenance when content came through a bypass strategy.
    pub archive_annotation: Option<ArchiveSource>,
}

impl ArticleState {
    pub fn new(content: ArticleContent, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            body_content: content.content,
            title: content.title,
            byline: content.byline.or(content.author),
            site_name: content.site_name,
            url: url.into(),
            source: source.into(),
            text_content: content.text_content,
            bypassed_readability_check: false,
            archive_annotation: None,
        }
    }

    pub fn with_bypassed_check(mut self, bypassed: bool) -> Self {
        self.bypassed_readability_check = bypassed;
        self
    }

    pub fn with_archive_annotation(mut self, annotation: Option<ArchiveSource>) -> Self {
        self.archive_annotation = annotation;
        self
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.text_content)
    }

    /// Estimated reading time in minutes at 200 words per minute.
    pub fn reading_time(&self) -> f64 {
        self.word_count() as f64 / 200.0
    }
}

/// Count words in text using a simple regex pattern
pub(crate) fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::BypassSource;

    fn content() -> ArticleContent {
        ArticleContent {
            title: "Test Article".to_string(),
            content: "<p>This is a test article with some content.</p>".to_string(),
            text_content: "This is a test article with some content.".to_string(),
            author: Some("Jane Smith".to_string()),
            length: 41,
            ..Default::default()
        }
    }

    #[test]
    fn test_word_count() {
        let article = content();
        assert_eq!(article.word_count(), 8);

        let state = ArticleState::new(article, "https://example.com/a", "argument");
        assert_eq!(state.reading_time(), 8.0 / 200.0);
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("hello world"), 2);
        assert_eq!(count_words("one"), 1);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("don't stop-start"), 2);
    }

    #[test]
    fn test_display_title_fallback() {
        assert_eq!(ArticleContent::display_title(None), "Untitled");
        assert_eq!(ArticleContent::display_title(Some("  ".to_string())), "Untitled");
        assert_eq!(ArticleContent::display_title(Some("Real".to_string())), "Real");
    }

    #[test]
    fn test_state_from_content() {
        let state = ArticleState::new(content(), "https://example.com/a", "argument");

        assert_eq!(state.title, "Test Article");
        assert_eq!(state.byline.as_deref(), Some("Jane Smith"));
        assert_eq!(state.url, "https://example.com/a");
        assert_eq!(state.source, "argument");
        assert!(!state.bypassed_readability_check);
        assert!(state.archive_annotation.is_none());
    }

    #[test]
    fn test_state_serializes_annotation() {
        let annotation = ArchiveSource {
            service: BypassSource::ArchiveMirror,
            url: Some("https://archive.ph/abc".to_string()),
            timestamp: None,
            retrieved_at: "2024-01-03T00:00:00Z".to_string(),
        };
        let state = ArticleState::new(content(), "https://example.com/a", "argument")
            .with_bypassed_check(true)
            .with_archive_annotation(Some(annotation));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["bypassed_readability_check"], true);
        assert_eq!(json["archive_annotation"]["service"], "archive-mirror");
        assert_eq!(json["archive_annotation"]["url"], "https://archive.ph/abc");
    }
}
