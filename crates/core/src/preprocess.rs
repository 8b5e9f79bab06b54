//! Streaming HTML rewrites that run on serialized markup.
//!
//! These passes only touch attributes or drop whole elements, so they run
//! through `lol_html` without building a tree. Structural removals that
//! need ancestry live in [`crate::clean`].

use lol_html::{HtmlRewriter, Settings, doc_comments, element};
use url::Url;

/// Lazy-load attributes, highest priority first.
pub const LAZY_LOAD_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "datasrc",
    "original-src",
    "data-srcset",
    "data-lazy-srcset",
    "data-hi-res-src",
    "data-native-src",
];

/// Elements whose URL-bearing attribute is rewritten by [`absolutize_urls`].
const URL_ATTRIBUTES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[href]", "href"),
    ("img[src]", "src"),
    ("source[src]", "src"),
    ("video[src]", "src"),
    ("video[poster]", "poster"),
    ("audio[src]", "src"),
    ("iframe[src]", "src"),
    ("embed[src]", "src"),
];

/// Rewrites relative `href`/`src` values to absolute URLs against `base_url`.
///
/// Pure fragment links (`#section`) are left alone so link-density scoring
/// can still tell them apart from real navigation.
pub fn absolutize_urls(html: &str, base_url: &Url) -> String {
    let handlers = URL_ATTRIBUTES
        .iter()
        .map(|(selector, attr)| {
            element!(*selector, move |el| {
                if let Some(value) = el.get_attribute(attr) {
                    let value = value.trim();
                    if !value.is_empty()
                        && !value.starts_with('#')
                        && let Ok(absolute) = base_url.join(value)
                    {
                        el.set_attribute(attr, absolute.as_str()).ok();
                    }
                }
                Ok(())
            })
        })
        .collect();

    run_rewriter(html, Settings { element_content_handlers: handlers, ..Default::default() })
}

/// Drops scripts, styles, templates and comments.
///
/// Structured metadata lives in `<script type="application/ld+json">`, so
/// read it from the raw document before calling this.
pub fn strip_non_content(html: &str) -> String {
    let handlers = ["script", "style", "noscript", "template"]
        .into_iter()
        .map(|tag| {
            element!(tag, |el| {
                el.remove();
                Ok(())
            })
        })
        .collect();

    run_rewriter(
        html,
        Settings {
            element_content_handlers: handlers,
            document_content_handlers: vec![doc_comments!(|c| {
                c.remove();
                Ok(())
            })],
            ..Default::default()
        },
    )
}

/// Whether an `<img>` `src` value is missing or a known placeholder.
pub fn is_placeholder_src(src: Option<&str>) -> bool {
    match src.map(str::trim) {
        None | Some("") => true,
        Some(src) => {
            src.starts_with("data:") || src.contains("placeholder") || src.contains("transparent") || src.contains("blank")
        }
    }
}

/// Promotes lazy-load attributes into `src`/`srcset` on placeholder images.
///
/// Returns the rewritten HTML and the number of images resolved.
pub fn resolve_lazy_images(html: &str) -> (String, usize) {
    let mut resolved = 0usize;

    let output = run_rewriter(
        html,
        Settings {
            element_content_handlers: vec![element!("img", |el| {
                let src = el.get_attribute("src");
                if !is_placeholder_src(src.as_deref()) {
                    return Ok(());
                }

                for attr in LAZY_LOAD_ATTRIBUTES {
                    let Some(lazy) = el.get_attribute(attr) else { continue };
                    let lazy = lazy.trim();
                    if lazy.is_empty() || lazy.starts_with("data:") {
                        continue;
                    }

                    let target = if attr.contains("srcset") { "srcset" } else { "src" };
                    el.set_attribute(target, lazy).ok();
                    resolved += 1;
                    break;
                }
                Ok(())
            })],
            ..Default::default()
        },
    );

    (output, resolved)
}

/// Runs a rewriter over `html`. On any rewriting error the input comes back
/// unchanged.
fn run_rewriter(html: &str, settings: Settings<'_, '_>) -> String {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(settings, |c: &[u8]| output.extend_from_slice(c));

    if rewriter.write(html.as_bytes()).is_err() {
        return html.to_string();
    }
    if rewriter.end().is_err() {
        return html.to_string();
    }

    match String::from_utf8(output) {
        Ok(s) if !s.is_empty() => s,
        Ok(_) => html.to_string(),
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize_urls() {
        let base = Url::parse("https://example.com/blog/").unwrap();
        let html = r##"
            <html>
                <body>
                    <a href="/about">About</a>
                    <a href="post.html">Post</a>
                    <a href="#notes">Notes</a>
                    <a href="https://other.org/x">Other</a>
                    <img src="image.jpg" />
                </body>
            </html>
        "##;

        let result = absolutize_urls(html, &base);
        assert!(result.contains("href=\"https://example.com/about\""));
        assert!(result.contains("href=\"https://example.com/blog/post.html\""));
        assert!(result.contains("href=\"#notes\""));
        assert!(result.contains("href=\"https://other.org/x\""));
        assert!(result.contains("src=\"https://example.com/blog/image.jpg\""));
    }

    #[test]
    fn test_strip_non_content() {
        let html = r#"
            <html>
                <head><script>alert('test');</script><style>body{color:red;}</style></head>
                <body>
                    <!-- a comment -->
                    <noscript>Enable JavaScript</noscript>
                    <p>Content</p>
                </body>
            </html>
        "#;

        let result = strip_non_content(html);
        assert!(!result.contains("alert"));
        assert!(!result.contains("color:red"));
        assert!(!result.contains("<!--"));
        assert!(!result.contains("Enable JavaScript"));
        assert!(result.contains("<p>Content</p>"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder_src(None));
        assert!(is_placeholder_src(Some("  ")));
        assert!(is_placeholder_src(Some("data:image/gif;base64,R0lGOD")));
        assert!(is_placeholder_src(Some("/img/placeholder.png")));
        assert!(is_placeholder_src(Some("/img/transparent.gif")));
        assert!(is_placeholder_src(Some("/img/blank.gif")));
        assert!(!is_placeholder_src(Some("/img/photo.jpg")));
    }

    #[test]
    fn test_resolve_lazy_images() {
        let html = r#"
            <body>
                <img src="data:image/gif;base64,AAAA" data-src="/real.jpg">
                <img data-lazy-srcset="/a.jpg 1x, /b.jpg 2x">
                <img src="/already.jpg" data-src="/ignored.jpg">
                <img src="blank.gif" data-src="data:image/png;base64,BBBB" data-original="/orig.jpg">
            </body>
        "#;

        let (result, resolved) = resolve_lazy_images(html);
        assert_eq!(resolved, 3);
        assert!(result.contains(" src=\"/real.jpg\""));
        assert!(!result.contains(" src=\"data:image/gif"));
        assert!(result.contains("srcset=\"/a.jpg 1x, /b.jpg 2x\""));
        assert!(result.contains("src=\"/already.jpg\""));
        assert!(result.contains("src=\"/orig.jpg\""));
    }

    #[test]
    fn test_multibyte_text_survives() {
        let html = "<p>Ünïcödé — 日本語</p>";
        assert_eq!(strip_non_content(html), html);
    }
}
