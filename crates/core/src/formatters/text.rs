use scraper::{ElementRef, Html};

use crate::article::ArticleState;

const BLOCK_ELEMENTS: [&str; 14] =
    ["p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "td", "th", "figcaption"];

/// Configuration for plain text output
#[derive(Debug, Clone, Default)]
pub struct TextConfig {
    /// Wrap lines at specified width (0 = no wrapping)
    pub line_width: usize,
    /// Include a title, byline and site header
    pub include_header: bool,
}

/// Render an article as plain text, one block per paragraph.
pub fn convert_to_text(article: &ArticleState, config: &TextConfig) -> String {
    let mut output = String::new();

    if config.include_header {
        output.push_str(&generate_header(article));
        output.push('\n');
    }

    let body = block_text(&article.body_content);
    let body = if body.trim().is_empty() { article.text_content.trim().to_string() } else { body };
    output.push_str(&wrap_text(&body, config.line_width));

    output.trim().to_string()
}

fn generate_header(article: &ArticleState) -> String {
    let mut header = format!("{}\n{}\n", article.title, "=".repeat(article.title.chars().count()));

    let mut parts = Vec::new();
    if let Some(byline) = &article.byline {
        parts.push(format!("By: {}", byline));
    }
    if let Some(site) = &article.site_name {
        parts.push(format!("Site: {}", site));
    }
    parts.push(format!("URL: {}", article.url));

    header.push_str(&parts.join(" | "));
    header.push('\n');
    header
}

/// Text of the innermost block elements, separated by blank lines.
fn block_text(html: &str) -> String {
    let document = Html::parse_fragment(html);
    let mut blocks = Vec::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if !is_block(&element) || element.descendants().skip(1).filter_map(ElementRef::wrap).any(|e| is_block(&e)) {
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    blocks.join("\n\n")
}

fn is_block(element: &ElementRef<'_>) -> bool {
    BLOCK_ELEMENTS.contains(&element.value().name())
}

/// Wrap each paragraph to the given width. Width 0 leaves text unchanged.
fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    text.split("\n\n")
        .map(|paragraph| {
            let words: Vec<&str> = paragraph.split_whitespace().collect();
            wrap_words(&words, width)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn wrap_words(words: &[&str], width: usize) -> String {
    let mut lines = Vec::new();
    let mut current_line: Vec<&str> = Vec::new();
    let mut current_length = 0;

    for &word in words {
        let word_len = word.chars().count();

        if current_length == 0 {
            current_line.push(word);
            current_length = word_len;
        } else if current_length + 1 + word_len <= width {
            current_length += 1 + word_len;
            current_line.push(word);
        } else {
            lines.push(current_line.join(" "));
            current_line = vec![word];
            current_length = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line.join(" "));
    }

    lines.join("\n")
}

/// Plain text formatter
pub struct TextFormatter {
    config: TextConfig,
}

impl TextFormatter {
    pub fn new(config: TextConfig) -> Self {
        Self { config }
    }

    pub fn convert(&self, article: &ArticleState) -> String {
        convert_to_text(article, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleContent;

    fn article(body: &str) -> ArticleState {
        let content = ArticleContent {
            title: "Test Article".to_string(),
            content: body.to_string(),
            text_content: "fallback text".to_string(),
            byline: Some("John Doe".to_string()),
            ..Default::default()
        };
        ArticleState::new(content, "https://example.com/a", "argument")
    }

    #[test]
    fn test_paragraphs_are_separated() {
        let text = convert_to_text(
            &article("<div><p>First paragraph.</p><p>Second <strong>bold</strong> paragraph.</p></div>"),
            &TextConfig::default(),
        );
        assert_eq!(text, "First paragraph.\n\nSecond bold paragraph.");
    }

    #[test]
    fn test_header() {
        let config = TextConfig { include_header: true, ..Default::default() };
        let text = convert_to_text(&article("<p>Content here.</p>"), &config);

        assert!(text.starts_with("Test Article\n============\n"));
        assert!(text.contains("By: John Doe | URL: https://example.com/a"));
        assert!(text.ends_with("Content here."));
    }

    #[test]
    fn test_falls_back_to_text_content() {
        let text = convert_to_text(&article(""), &TextConfig::default());
        assert_eq!(text, "fallback text");
    }

    #[test]
    fn test_lists() {
        let text = convert_to_text(&article("<ul><li>First item</li><li>Second item</li></ul>"), &TextConfig::default());
        assert_eq!(text, "First item\n\nSecond item");
    }

    #[test]
    fn test_wrap_text() {
        let wrapped = wrap_text("This is a long line that should be wrapped at a smaller width", 20);
        assert!(wrapped.lines().all(|line| line.chars().count() <= 20));
        assert_eq!(wrap_text("This is a line", 0), "This is a line");
    }

    #[test]
    fn test_wrap_keeps_paragraphs() {
        let wrapped = wrap_text("one two three\n\nfour five", 8);
        assert_eq!(wrapped, "one two\nthree\n\nfour\nfive");
    }
}
