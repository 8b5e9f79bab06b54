//! Output renderers for a loaded [`ArticleState`].

pub mod json;
pub mod markdown;
pub mod text;

pub use json::{JsonConfig, JsonFormatter, convert_to_json};
pub use markdown::{MarkdownConfig, MarkdownFormatter, convert_to_markdown};
pub use text::{TextConfig, TextFormatter, convert_to_text};

use std::str::FromStr;

use crate::Result;
use crate::article::ArticleState;

/// Output format for a rendered article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: markdown, html, text, json", s)),
        }
    }
}

/// Renders with each format's default settings plus a title heading for
/// Markdown.
pub fn render(article: &ArticleState, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => {
            let config = MarkdownConfig { include_title_heading: true, simplify_images: true, ..Default::default() };
            convert_to_markdown(article, &config)
        }
        OutputFormat::Html => Ok(article.body_content.clone()),
        OutputFormat::Text => Ok(convert_to_text(article, &TextConfig { include_header: true, ..Default::default() })),
        OutputFormat::Json => convert_to_json(article, &JsonConfig { pretty: true, ..Default::default() }, None),
    }
}
