//! HTML parsing and CSS-selector queries.
//!
//! [`Document`] wraps a parsed page together with the URL it came from, so
//! relative image and icon URLs in metadata can be resolved. [`Element`]
//! exposes the two things metadata reads from a node: text and attributes.
//!
//! # Example
//!
//! ```rust
//! use ferret_core::parse::Document;
//!
//! let html = r#"<html><head><title>Test</title></head><body><p class="lead">Hi</p></body></html>"#;
//! let doc = Document::parse(html);
//! assert_eq!(doc.title(), Some("Test".to_string()));
//! assert_eq!(doc.select("p.lead").unwrap().len(), 1);
//! ```

use scraper::{Html, Selector};
use url::Url;

use crate::{FerretError, Result};

/// A parsed HTML document.
pub struct Document {
    html: Html,
    base_url: Option<Url>,
}

impl Document {
    /// Parses HTML from a string. Parsing is lenient and never fails.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html), base_url: None }
    }

    /// Parses HTML and remembers the page URL for resolving relative links.
    pub fn parse_with_url(html: &str, url: &str) -> Self {
        Self { html: Html::parse_document(html), base_url: Url::parse(url).ok() }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`FerretError::HtmlParseError`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Content of the `<title>` element, trimmed, if present and non-empty.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Parses a CSS selector, mapping failures to [`FerretError::HtmlParseError`].
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| FerretError::HtmlParseError(format!("Invalid selector: {}", e)))
}

/// A single element inside a [`Document`].
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: scraper::ElementRef<'a>,
}

impl<'a> Element<'a> {
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title> Test Page </title>
        </head>
        <body>
            <h1>Heading</h1>
            <p class="content">Paragraph 1</p>
            <p class="content">Paragraph 2</p>
            <a href="https://example.com">Link</a>
        </body>
        </html>
    "#;

    #[test]
    fn test_parse_document() {
        let doc = Document::parse(SAMPLE_HTML);
        assert_eq!(doc.title(), Some("Test Page".to_string()));
        assert!(doc.base_url().is_none());
    }

    #[test]
    fn test_parse_with_url() {
        let doc = Document::parse_with_url(SAMPLE_HTML, "https://example.com/a");
        assert_eq!(doc.base_url().and_then(|u| u.host_str()), Some("example.com"));
    }

    #[test]
    fn test_select_elements() {
        let doc = Document::parse(SAMPLE_HTML);
        let elements = doc.select("p.content").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "Paragraph 1");
        assert_eq!(elements[1].text(), "Paragraph 2");
    }

    #[test]
    fn test_element_attributes() {
        let doc = Document::parse(SAMPLE_HTML);
        let elements = doc.select("a").unwrap();
        assert_eq!(elements[0].attr("href"), Some("https://example.com"));
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SAMPLE_HTML);
        assert!(matches!(doc.select("[[invalid"), Err(FerretError::HtmlParseError(_))));
    }
}
