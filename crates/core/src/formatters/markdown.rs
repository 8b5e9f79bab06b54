use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::article::ArticleState;
use crate::{FerretError, Result};

static TITLED_IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?s)!\[[^\]]*\]\(([^\s)]+)\s+".+?"\)"#).unwrap());
static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^\s)]+)\)").unwrap());

/// Configuration for Markdown conversion
#[derive(Debug, Clone, Default)]
pub struct MarkdownConfig {
    /// Include TOML frontmatter with article fields
    pub include_frontmatter: bool,
    /// Generate reference table for all links
    pub include_references: bool,
    /// Strip images from output
    pub strip_images: bool,
    /// Include title as H1 heading at the start of content
    pub include_title_heading: bool,
    /// Reduce `![alt](src "title")` to `![](src)`
    pub simplify_images: bool,
}

/// A collected link reference
#[derive(Debug, Clone)]
pub struct LinkReference {
    pub text: String,
    pub url: String,
}

/// Render an article body as Markdown with optional frontmatter and references
pub fn convert_to_markdown(article: &ArticleState, config: &MarkdownConfig) -> Result<String> {
    let mut output = String::new();

    if config.include_frontmatter {
        output.push_str(&generate_frontmatter(article));
        output.push('\n');
    }

    if config.include_title_heading {
        output.push_str(&format!("# {}\n\n", article.title));
    }

    if let Some(note) = archive_note(article) {
        output.push_str(&note);
        output.push_str("\n\n");
    }

    let html = if config.strip_images { strip_images(&article.body_content)? } else { article.body_content.clone() };

    let mut markdown = html_to_markdown(&html);
    if config.simplify_images && !config.strip_images {
        markdown = simplify_images(&markdown);
    }
    output.push_str(markdown.trim());

    if config.include_references {
        let links = extract_links(&html);
        if !links.is_empty() {
            output.push_str("\n\n## References\n\n");
            output.push_str(&generate_reference_table(&links));
        }
    }

    debug!(markdown_len = output.len(), "markdown rendered");
    Ok(output)
}

/// Generate TOML frontmatter from article fields
fn generate_frontmatter(article: &ArticleState) -> String {
    let mut frontmatter = String::from("+++");
    frontmatter.push_str(&format!("\ntitle = {}", toml_escape_string(&article.title)));
    frontmatter.push_str(&format!("\nurl = {}", toml_escape_string(&article.url)));

    if let Some(byline) = &article.byline {
        frontmatter.push_str(&format!("\nauthor = {}", toml_escape_string(byline)));
    }

    if let Some(site) = &article.site_name {
        frontmatter.push_str(&format!("\nsite = {}", toml_escape_string(site)));
    }

    frontmatter.push_str(&format!("\nsource = {}", toml_escape_string(&article.source)));
    frontmatter.push_str(&format!("\nword_count = {}", article.word_count()));

    if let Some(archive) = &article.archive_annotation {
        if let Some(url) = &archive.url {
            frontmatter.push_str(&format!("\narchive_url = {}", toml_escape_string(url)));
        }
        if let Some(timestamp) = &archive.timestamp {
            frontmatter.push_str(&format!("\narchived = {}", toml_escape_string(timestamp)));
        }
    }

    frontmatter.push_str("\n+++\n");
    frontmatter
}

/// One-line provenance note for bypassed content.
fn archive_note(article: &ArticleState) -> Option<String> {
    let archive = article.archive_annotation.as_ref()?;
    let mut note = format!("> Retrieved via {}", archive.service.label().to_lowercase());
    if let Some(timestamp) = &archive.timestamp {
        note.push_str(&format!(", archived {}", timestamp));
    }
    if let Some(url) = &archive.url {
        note.push_str(&format!(" ([archived copy]({}))", url));
    }
    Some(note)
}

/// Escape a string for TOML format
fn toml_escape_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('\"', "\\\"").replace('\n', "\\n"))
}

#[cfg(feature = "markdown")]
fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_default()
}

/// Fallback when the markdown feature is disabled
#[cfg(not(feature = "markdown"))]
fn html_to_markdown(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.root_element().text().collect::<String>()
}

fn simplify_images(markdown: &str) -> String {
    let markdown = TITLED_IMAGE.replace_all(markdown, "![]($1)");
    IMAGE.replace_all(&markdown, "![]($1)").into_owned()
}

/// Strip all img tags from HTML
fn strip_images(html: &str) -> Result<String> {
    let mut output = Vec::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("img", |el| {
                el.remove();
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    if rewriter.write(html.as_bytes()).is_err() {
        return Ok(html.to_string());
    }
    if rewriter.end().is_err() {
        return Ok(html.to_string());
    }

    String::from_utf8(output).map_err(|e| FerretError::HtmlParseError(e.to_string()))
}

/// Extract all links from HTML content, first occurrence of each URL wins
pub fn extract_links(html: &str) -> Vec<LinkReference> {
    let document = Html::parse_fragment(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let text = element.text().collect::<String>().trim().to_string();
        let Some(url) = element.value().attr("href") else {
            continue;
        };

        if text.is_empty() || url.is_empty() {
            continue;
        }

        if seen.insert(url.to_string()) {
            links.push(LinkReference { text, url: url.to_string() });
        }
    }

    links
}

/// Generate a reference table from collected links
fn generate_reference_table(links: &[LinkReference]) -> String {
    let mut table = String::from("| # | Text | URL |\n");
    table.push_str("|---|------|-----|\n");

    for (i, link) in links.iter().enumerate() {
        table.push_str(&format!("| {} | {} | {} |\n", i + 1, escape_pipe(&link.text), escape_pipe(&link.url)));
    }

    table
}

fn escape_pipe(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Markdown formatter with configurable options
pub struct MarkdownFormatter {
    config: MarkdownConfig,
}

impl MarkdownFormatter {
    pub fn new(config: MarkdownConfig) -> Self {
        Self { config }
    }

    pub fn convert(&self, article: &ArticleState) -> Result<String> {
        convert_to_markdown(article, &self.config)
    }
}
