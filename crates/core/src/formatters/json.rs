use serde::Serialize;

use crate::Result;
use crate::article::ArticleState;
use crate::formatters::markdown::{LinkReference, extract_links};

/// Complete JSON output structure
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    #[serde(flatten)]
    pub article: &'a ArticleState,
    pub word_count: usize,
    /// Rendered Markdown, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<JsonReference>>,
}

/// A reference link for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct JsonReference {
    pub index: usize,
    pub text: String,
    pub url: String,
}

/// Configuration for JSON output
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Include references array
    pub include_references: bool,
    /// Pretty print JSON output
    pub pretty: bool,
}

fn indexed(links: Vec<LinkReference>) -> Vec<JsonReference> {
    links
        .into_iter()
        .enumerate()
        .map(|(i, link)| JsonReference { index: i + 1, text: link.text, url: link.url })
        .collect()
}

/// Serialize an article, optionally with pre-rendered Markdown
pub fn convert_to_json(article: &ArticleState, config: &JsonConfig, markdown: Option<&str>) -> Result<String> {
    let output = JsonOutput {
        article,
        word_count: article.word_count(),
        markdown: markdown.map(|s| s.to_string()),
        references: config.include_references.then(|| indexed(extract_links(&article.body_content))),
    };

    let json = if config.pretty { serde_json::to_string_pretty(&output)? } else { serde_json::to_string(&output)? };
    Ok(json)
}

/// JSON formatter with configurable options
pub struct JsonFormatter {
    config: JsonConfig,
}

impl JsonFormatter {
    pub fn new(config: JsonConfig) -> Self {
        Self { config }
    }

    pub fn convert(&self, article: &ArticleState, markdown: Option<&str>) -> Result<String> {
        convert_to_json(article, &self.config, markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleContent;
    use serde_json::Value;

    fn article() -> ArticleState {
        let content = ArticleContent {
            title: "Test Title".to_string(),
            content: r#"<p>See <a href="https://example.com">Example</a> and <a href="/b">B</a>.</p>"#.to_string(),
            text_content: "See Example and B.".to_string(),
            site_name: Some("Example".to_string()),
            ..Default::default()
        };
        ArticleState::new(content, "https://example.com/a", "argument")
    }

    #[test]
    fn test_convert_to_json_fields() {
        let json = convert_to_json(&article(), &JsonConfig::default(), None).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], "Test Title");
        assert_eq!(value["url"], "https://example.com/a");
        assert_eq!(value["site_name"], "Example");
        assert_eq!(value["source"], "argument");
        assert_eq!(value["word_count"], 4);
        assert_eq!(value["bypassed_readability_check"], false);
        assert!(value["archive_annotation"].is_null());
        assert!(value.get("markdown").is_none());
        assert!(value.get("references").is_none());
    }

    #[test]
    fn test_references_and_markdown() {
        let config = JsonConfig { include_references: true, pretty: true };
        let json = convert_to_json(&article(), &config, Some("See [Example](https://example.com)")).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert!(json.contains('\n'));
        assert_eq!(value["markdown"], "See [Example](https://example.com)");
        assert_eq!(value["references"][0]["index"], 1);
        assert_eq!(value["references"][1]["url"], "/b");
    }
}
