//! Page-level metadata: title, byline, dates, images and the canonical URL.
//!
//! Collected from OpenGraph and Twitter tags, plain `<meta>` names and
//! JSON-LD. Each field documents its own precedence.

use serde::Serialize;
use url::Url;

use crate::Document;

/// Structured metadata declared by the page itself.
///
/// Gathered from Schema.org JSON-LD, Open Graph and Twitter Card tags. This
/// must be read from the document before cleaning, which may strip the
/// tags that carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub image: Option<String>,
    pub favicon: Option<String>,
}

impl Document {
    /// Extract all structured metadata at once
    pub fn extract_metadata(&self) -> StructuredMetadata {
        let json_ld = self.extract_json_ld();

        StructuredMetadata {
            title: self.extract_title(json_ld.as_ref()),
            author: self.extract_author(json_ld.as_ref()),
            published: self.extract_published(json_ld.as_ref()),
            description: self.extract_description(json_ld.as_ref()),
            site_name: self.extract_site_name(json_ld.as_ref()),
            image: self.extract_image(json_ld.as_ref()),
            favicon: self.extract_favicon(),
        }
    }

    /// Title with priority fallback:
    /// 1. JSON-LD `headline`
    /// 2. Open Graph `og:title`
    /// 3. Twitter `twitter:title`
    fn extract_title(&self, json_ld: Option<&serde_json::Value>) -> Option<String> {
        json_ld
            .and_then(|v| json_str(v, "headline"))
            .or_else(|| self.get_meta_content("og:title"))
            .or_else(|| self.get_meta_content("twitter:title"))
    }

    /// Author with priority fallback:
    /// 1. JSON-LD `author` (string, object or array)
    /// 2. Meta `author` / `article:author`
    /// 3. Twitter `twitter:creator`
    fn extract_author(&self, json_ld: Option<&serde_json::Value>) -> Option<String> {
        json_ld
            .and_then(|v| v.get("author"))
            .and_then(author_from_json_ld)
            .or_else(|| self.get_meta_content("author"))
            .or_else(|| self.get_meta_content("article:author").filter(|a| !a.starts_with("http")))
            .or_else(|| self.get_meta_content("twitter:creator"))
    }

    fn extract_published(&self, json_ld: Option<&serde_json::Value>) -> Option<String> {
        json_ld
            .and_then(|v| json_str(v, "datePublished"))
            .or_else(|| self.get_meta_content("article:published_time"))
            .or_else(|| {
                self.select("time[datetime]")
                    .ok()?
                    .first()
                    .and_then(|el| el.attr("datetime"))
                    .map(|s| s.to_string())
            })
    }

    fn extract_description(&self, json_ld: Option<&serde_json::Value>) -> Option<String> {
        json_ld
            .and_then(|v| json_str(v, "description"))
            .or_else(|| self.get_meta_content("og:description"))
            .or_else(|| self.get_meta_content("twitter:description"))
            .or_else(|| self.get_meta_content("description"))
    }

    /// Site name with priority fallback:
    /// 1. JSON-LD `publisher.name`
    /// 2. Open Graph `og:site_name`
    fn extract_site_name(&self, json_ld: Option<&serde_json::Value>) -> Option<String> {
        json_ld
            .and_then(|v| v.get("publisher"))
            .and_then(|p| json_str(p, "name"))
            .or_else(|| self.get_meta_content("og:site_name"))
    }

    fn extract_image(&self, json_ld: Option<&serde_json::Value>) -> Option<String> {
        json_ld
            .and_then(|v| v.get("image"))
            .and_then(image_from_json_ld)
            .or_else(|| self.get_meta_content("og:image"))
            .or_else(|| self.get_meta_content("twitter:image"))
            .map(|src| self.absolutize(&src))
    }

    fn extract_favicon(&self) -> Option<String> {
        for selector in ["link[rel=\"icon\"]", "link[rel=\"shortcut icon\"]", "link[rel=\"apple-touch-icon\"]"] {
            if let Ok(elements) = self.select(selector)
                && let Some(href) = elements.first().and_then(|el| el.attr("href"))
            {
                return Some(self.absolutize(href));
            }
        }
        None
    }

    /// The URL the page declares as authoritative.
    ///
    /// Precedence: `og:url`, then `twitter:url`, then `<link rel="canonical">`.
    pub fn extract_canonical_url(&self) -> Option<String> {
        self.get_meta_content("og:url")
            .or_else(|| self.get_meta_content("twitter:url"))
            .or_else(|| {
                self.select("link[rel=\"canonical\"]")
                    .ok()?
                    .first()
                    .and_then(|el| el.attr("href"))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
    }

    /// Get meta tag content by name or property attribute
    fn get_meta_content(&self, attr: &str) -> Option<String> {
        for key in ["name", "property"] {
            let selector = format!("meta[{}=\"{}\"]", key, attr);
            if let Ok(elements) = self.select(&selector)
                && let Some(content) = elements.first().and_then(|el| el.attr("content"))
            {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
        None
    }

    /// First JSON-LD block that parses. `@graph` wrappers are unwrapped to
    /// their first article-like node.
    fn extract_json_ld(&self) -> Option<serde_json::Value> {
        let elements = self.select("script[type=\"application/ld+json\"]").ok()?;
        for el in elements.iter() {
            let text = el.text();
            let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) else {
                continue;
            };

            let candidates = match &value {
                serde_json::Value::Array(items) => items.clone(),
                serde_json::Value::Object(obj) => match obj.get("@graph") {
                    Some(serde_json::Value::Array(items)) => items.clone(),
                    _ => vec![value.clone()],
                },
                _ => continue,
            };

            if let Some(article) = candidates.iter().find(|c| is_article_type(c)) {
                return Some(article.clone());
            }
            if let Some(first) = candidates.into_iter().next() {
                return Some(first);
            }
        }
        None
    }

    fn absolutize(&self, href: &str) -> String {
        match self.base_url() {
            Some(base) => base.join(href).map(Url::into).unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}

fn json_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn is_article_type(value: &serde_json::Value) -> bool {
    let matches = |t: &str| t.ends_with("Article") || t == "BlogPosting" || t == "Report";
    match value.get("@type") {
        Some(serde_json::Value::String(t)) => matches(t),
        Some(serde_json::Value::Array(types)) => types.iter().filter_map(|t| t.as_str()).any(matches),
        _ => false,
    }
}

/// Handles string, object and array forms of the JSON-LD `author` field
fn author_from_json_ld(author: &serde_json::Value) -> Option<String> {
    match author {
        serde_json::Value::String(name) => Some(name.trim().to_string()).filter(|n| !n.is_empty()),
        serde_json::Value::Object(_) => json_str(author, "name"),
        serde_json::Value::Array(items) => items.first().and_then(author_from_json_ld),
        _ => None,
    }
}

fn image_from_json_ld(image: &serde_json::Value) -> Option<String> {
    match image {
        serde_json::Value::String(src) => Some(src.clone()),
        serde_json::Value::Object(_) => json_str(image, "url"),
        serde_json::Value::Array(items) => items.first().and_then(image_from_json_ld),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML_WITH_META: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <title>Test Page Title</title>
            <meta name="author" content="John Doe">
            <meta name="description" content="Plain description.">
            <meta property="og:title" content="OG Title">
            <meta property="og:description" content="OG Description">
            <meta property="og:site_name" content="Example Site">
            <meta property="og:image" content="/images/lead.jpg">
            <meta property="og:url" content="https://example.com/canonical">
            <link rel="icon" href="/favicon.ico">
            <script type="application/ld+json">
            {
                "@context": "https://schema.org",
                "@type": "NewsArticle",
                "headline": "JSON-LD Headline",
                "author": [{"@type": "Person", "name": "Jane Smith"}],
                "datePublished": "2024-01-15T10:30:00Z",
                "description": "JSON-LD Description",
                "publisher": {"@type": "Organization", "name": "JSON-LD Publisher"}
            }
            </script>
        </head>
        <body><p>Body</p></body>
        </html>
    "#;

    #[test]
    fn test_json_ld_wins() {
        let doc = Document::parse_with_url(HTML_WITH_META, "https://example.com/story");
        let meta = doc.extract_metadata();

        assert_eq!(meta.title.as_deref(), Some("JSON-LD Headline"));
        assert_eq!(meta.author.as_deref(), Some("Jane Smith"));
        assert_eq!(meta.published.as_deref(), Some("2024-01-15T10:30:00Z"));
        assert_eq!(meta.description.as_deref(), Some("JSON-LD Description"));
        assert_eq!(meta.site_name.as_deref(), Some("JSON-LD Publisher"));
    }

    #[test]
    fn test_image_and_favicon_are_absolute() {
        let doc = Document::parse_with_url(HTML_WITH_META, "https://example.com/story");
        let meta = doc.extract_metadata();

        assert_eq!(meta.image.as_deref(), Some("https://example.com/images/lead.jpg"));
        assert_eq!(meta.favicon.as_deref(), Some("https://example.com/favicon.ico"));
    }

    #[test]
    fn test_open_graph_fallback() {
        let html = r#"
            <html><head>
                <meta property="og:title" content="OG Title">
                <meta name="twitter:description" content="Twitter Description">
            </head><body></body></html>
        "#;
        let doc = Document::parse_with_url(html, "https://news.example.org/a");
        let meta = doc.extract_metadata();

        assert_eq!(meta.title.as_deref(), Some("OG Title"));
        assert_eq!(meta.description.as_deref(), Some("Twitter Description"));
        assert!(meta.site_name.is_none());
        assert!(meta.author.is_none());
    }

    #[test]
    fn test_json_ld_graph() {
        let html = r#"
            <html><head><script type="application/ld+json">
            {"@graph": [
                {"@type": "WebSite", "name": "Site"},
                {"@type": "BlogPosting", "headline": "From Graph", "author": "Solo Writer"}
            ]}
            </script></head><body></body></html>
        "#;
        let meta = Document::parse(html).extract_metadata();
        assert_eq!(meta.title.as_deref(), Some("From Graph"));
        assert_eq!(meta.author.as_deref(), Some("Solo Writer"));
    }

    #[test]
    fn test_canonical_precedence() {
        let html = r#"
            <html><head>
                <link rel="canonical" href="https://example.com/link">
                <meta name="twitter:url" content="https://example.com/twitter">
                <meta property="og:url" content="https://example.com/og">
            </head></html>
        "#;
        assert_eq!(
            Document::parse(html).extract_canonical_url().as_deref(),
            Some("https://example.com/og")
        );

        let html = r#"<html><head><link rel="canonical" href="https://example.com/link"></head></html>"#;
        assert_eq!(
            Document::parse(html).extract_canonical_url().as_deref(),
            Some("https://example.com/link")
        );
    }

    #[test]
    fn test_no_canonical() {
        assert!(Document::parse("<p>nothing</p>").extract_canonical_url().is_none());
    }
}
