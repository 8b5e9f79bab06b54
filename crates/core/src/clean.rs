//! Boilerplate removal that runs before readability extraction.
//!
//! The cleaner is a pure function of its input and the static quirks table.
//! Passes run in a fixed order:
//!
//! 1. Schema.org article detection (recorded only)
//! 2. Site quirks: unconditional removals for the matched host
//! 3. Protected region: main-content matches and their ancestors
//! 4. Negative selectors, skipping anything protected
//! 5. Link-dense blocks, skipping anything protected
//! 6. Lazy-loaded image resolution

use std::collections::HashSet;
use std::sync::LazyLock;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::preprocess::{resolve_lazy_images, strip_non_content};
use crate::quirks::{COMMON_REMOVE_SELECTORS, quirks_for_url};

/// Density above which a block is removed unconditionally.
pub const HIGH_LINK_DENSITY: f64 = 0.5;
/// Density above which a block is removed if it also looks like navigation.
pub const NAV_LINK_DENSITY: f64 = 0.25;
/// Blocks with less text than this are never scored for link density.
pub const MIN_DENSITY_TEXT_LEN: usize = 50;

const SCHEMA_ARTICLE_SELECTOR: &str =
    r#"[itemprop="articleBody"], [itemtype*="schema.org/Article"], [itemtype*="schema.org/NewsArticle"]"#;

const PROTECTED_SELECTORS: &[&str] = &[
    "article",
    "[role=\"main\"]",
    "main",
    "[itemprop=\"articleBody\"]",
    "[itemtype*=\"schema.org/Article\"]",
    "[itemtype*=\"schema.org/NewsArticle\"]",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content-body",
    ".story-body",
];

const NEGATIVE_SELECTORS: &[&str] = &[
    // sidebars
    "[class*=\"sidebar\"]",
    "[id*=\"sidebar\"]",
    "[class*=\"side-bar\"]",
    "[id*=\"side-bar\"]",
    // comments
    "[class*=\"comment\"]",
    "[id*=\"comment\"]",
    ".disqus",
    // subscription boxes
    "[class*=\"subscribe\"]",
    "[id*=\"subscribe\"]",
    "[class*=\"newsletter\"]",
    "[id*=\"newsletter\"]",
    "[class*=\"signup\"]",
    "[id*=\"signup\"]",
    "[class*=\"sign-up\"]",
    "[id*=\"sign-up\"]",
    "[aria-label*=\"newsletter\"]",
    "[aria-label*=\"subscribe\"]",
    // ads
    "[class*=\"advertisement\"]",
    "[id*=\"advertisement\"]",
    "[class*=\"ad-container\"]",
    "[class*=\"ad-wrapper\"]",
    "[class*=\"ad-slot\"]",
    "[class*=\"advert\"]",
    "[id*=\"advert\"]",
    "[class*=\"sponsored\"]",
    "[id*=\"sponsored\"]",
    "[data-ad]",
    "[data-advertisement]",
    // share widgets
    "[class*=\"social\"]",
    "[id*=\"social\"]",
    "[class*=\"share\"]",
    "[id*=\"share\"]",
    "[class*=\"sharing\"]",
    "[id*=\"sharing\"]",
    // recirculation
    "[class*=\"related\"]",
    "[id*=\"related\"]",
    "[class*=\"recommended\"]",
    "[id*=\"recommended\"]",
    "[class*=\"promo\"]",
    "[id*=\"promo\"]",
    "[class*=\"more-stories\"]",
    "[class*=\"more-articles\"]",
    // navigation
    "nav",
    "[role=\"navigation\"]",
    "[class*=\"breadcrumb\"]",
    "[id*=\"breadcrumb\"]",
    "[class*=\"pagination\"]",
    "[class*=\"pager\"]",
    "[role=\"complementary\"]",
    "[class*=\"footer\"]",
    "[id*=\"footer\"]",
    // widgets
    "[class*=\"widget\"]",
    "[id*=\"widget\"]",
    "[class*=\"toolbar\"]",
    "[id*=\"toolbar\"]",
    "[class*=\"toolbox\"]",
    "[class*=\"carousel\"]",
    "[id*=\"carousel\"]",
    "[class*=\"swiper\"]",
    "[class*=\"slider\"]",
    "[id*=\"slider\"]",
    "[class*=\"tags\"]",
    "[class*=\"meta\"]",
    "[class*=\"talkback\"]",
    // overlays and consent
    "[class*=\"popup\"]",
    "[class*=\"modal\"]",
    "[class*=\"overlay\"]",
    "[class*=\"cookie\"]",
    "[id*=\"cookie\"]",
    "[class*=\"consent\"]",
    "[id*=\"consent\"]",
    "[class*=\"call-to-action\"]",
    // forms and hidden content
    "form",
    "[hidden]",
    "[aria-hidden=\"true\"]",
    "[style*=\"display:none\"]",
    "[style*=\"display: none\"]",
];

static SCHEMA_ARTICLE: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse(SCHEMA_ARTICLE_SELECTOR).ok());

static NEGATIVE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    NEGATIVE_SELECTORS
        .iter()
        .chain(COMMON_REMOVE_SELECTORS.iter())
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

static PROTECTED: LazyLock<Vec<Selector>> =
    LazyLock::new(|| PROTECTED_SELECTORS.iter().filter_map(|s| Selector::parse(s).ok()).collect());

static DENSITY_CANDIDATES: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("div, section, aside, ul").ok());

static ANCHORS: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("a").ok());

/// Tunable thresholds for the link-density pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanConfig {
    pub high_link_density: f64,
    pub nav_link_density: f64,
    pub min_density_text_len: usize,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            high_link_density: HIGH_LINK_DENSITY,
            nav_link_density: NAV_LINK_DENSITY,
            min_density_text_len: MIN_DENSITY_TEXT_LEN,
        }
    }
}

/// Output of [`clean_html`]. Counters are diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningResult {
    pub html: String,
    pub quirk_removed: usize,
    pub negative_removed: usize,
    pub link_dense_removed: usize,
    pub lazy_images_resolved: usize,
    pub schema_article_found: bool,
    /// Name of the site quirks applied, if the host matched one.
    pub quirks_applied: Option<&'static str>,
}

impl CleaningResult {
    /// Total elements removed across every pass.
    pub fn removed_count(&self) -> usize {
        self.quirk_removed + self.negative_removed + self.link_dense_removed
    }
}

/// Link statistics for one candidate block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkDensity {
    pub text_len: usize,
    pub link_text_len: usize,
    pub looks_like_navigation: bool,
}

impl LinkDensity {
    pub fn density(&self) -> f64 {
        if self.text_len == 0 { 0.0 } else { self.link_text_len as f64 / self.text_len as f64 }
    }
}

/// Decides whether a block is removed by the link-density pass.
///
/// Above the high threshold a block goes regardless of shape. Between the
/// two thresholds it goes only when it also looks like navigation. Below
/// the lower threshold it always stays.
pub fn should_remove_for_density(stats: &LinkDensity, config: &CleanConfig) -> bool {
    if stats.text_len < config.min_density_text_len {
        return false;
    }

    let density = stats.density();
    if density > config.high_link_density {
        true
    } else if density > config.nav_link_density {
        stats.looks_like_navigation
    } else {
        false
    }
}

/// Elements matched by a main-content selector (or the host's quirk
/// article selector), plus every ancestor of one.
///
/// An element is exempt when it is in either set or sits below a matched
/// root. Siblings of the content path (a `<nav>` beside the `<article>`
/// inside `<body>`) stay removable.
struct ProtectedRegion {
    roots: HashSet<NodeId>,
    ancestors: HashSet<NodeId>,
}

impl ProtectedRegion {
    fn build(doc: &Html, site_article: Option<&Selector>) -> Self {
        let mut roots = HashSet::new();
        let mut ancestors = HashSet::new();

        for selector in PROTECTED.iter().chain(site_article) {
            for el in doc.select(selector) {
                roots.insert(el.id());
                ancestors.extend(el.ancestors().map(|a| a.id()));
            }
        }

        Self { roots, ancestors }
    }

    fn covers(&self, el: &ElementRef<'_>) -> bool {
        let id = el.id();
        self.roots.contains(&id)
            || self.ancestors.contains(&id)
            || el.ancestors().any(|a| self.roots.contains(&a.id()))
    }
}

/// Pre-cleans a page before readability extraction.
pub fn clean_html(html: &str, url: &str, config: &CleanConfig) -> CleaningResult {
    let mut doc = Html::parse_document(&strip_non_content(html));
    let mut result = CleaningResult::default();

    if let Some(selector) = SCHEMA_ARTICLE.as_ref() {
        result.schema_article_found = doc.select(selector).next().is_some();
    }

    let quirks = quirks_for_url(url);
    if let Some(quirks) = quirks {
        result.quirks_applied = Some(quirks.name);
        for selector in quirks.remove_selectors.iter().filter_map(|s| Selector::parse(s).ok()) {
            result.quirk_removed += remove_matching(&mut doc, &selector, |_| false);
        }
    }

    let site_article = quirks.and_then(|q| q.article_selector).and_then(|s| Selector::parse(s).ok());
    let protected = ProtectedRegion::build(&doc, site_article.as_ref());

    for selector in NEGATIVE.iter() {
        result.negative_removed += remove_matching(&mut doc, selector, |el| protected.covers(el));
    }

    if let Some(selector) = DENSITY_CANDIDATES.as_ref() {
        result.link_dense_removed += remove_matching(&mut doc, selector, |el| {
            protected.covers(el) || !should_remove_for_density(&measure_links(el), config)
        });
    }

    let (html, lazy_images_resolved) = resolve_lazy_images(&doc.html());
    result.html = html;
    result.lazy_images_resolved = lazy_images_resolved;

    debug!(
        url,
        quirks = result.quirks_applied.unwrap_or("none"),
        quirk_removed = result.quirk_removed,
        negative_removed = result.negative_removed,
        link_dense_removed = result.link_dense_removed,
        lazy_images_resolved = result.lazy_images_resolved,
        schema_article_found = result.schema_article_found,
        "cleaning complete"
    );

    result
}

/// Measures anchor text against total text for a block. Pure fragment links
/// (`href="#..."`) do not count as link text.
pub fn measure_links(el: &ElementRef<'_>) -> LinkDensity {
    let total_len = text_len(el);

    let link_text_len = ANCHORS
        .as_ref()
        .map(|anchors| {
            el.select(anchors)
                .filter(|a| !a.value().attr("href").is_some_and(|h| h.trim_start().starts_with('#')))
                .map(|a| text_len(&a))
                .sum()
        })
        .unwrap_or(0);

    let tag = el.value().name();
    let marker = format!("{} {}", el.value().attr("class").unwrap_or(""), el.value().attr("id").unwrap_or(""))
        .to_lowercase();
    let looks_like_navigation = matches!(tag, "ul" | "aside")
        || marker.contains("menu")
        || marker.contains("nav")
        || marker.contains("links");

    LinkDensity { text_len: total_len, link_text_len, looks_like_navigation }
}

/// Character count with runs of whitespace collapsed to one space.
fn text_len(el: &ElementRef<'_>) -> usize {
    let words: Vec<&str> = el.text().flat_map(str::split_whitespace).collect();
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len().saturating_sub(1)
}

/// Detaches every element matching `selector` that `keep` does not exempt.
/// Returns how many were removed; nested matches inside an already removed
/// element are not counted twice.
fn remove_matching<F>(doc: &mut Html, selector: &Selector, keep: F) -> usize
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    let ids: Vec<NodeId> = doc
        .select(selector)
        .filter(|el| !matches!(el.value().name(), "html" | "head" | "body"))
        .filter(|el| !keep(el))
        .map(|el| el.id())
        .collect();

    let root = doc.tree.root().id();
    let mut removed = 0;
    for id in ids {
        let attached = doc.tree.get(id).is_some_and(|node| node.ancestors().any(|a| a.id() == root));
        if !attached {
            continue;
        }
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> CleaningResult {
        clean_html(html, "https://example.com/story", &CleanConfig::default())
    }

    fn stats(text_len: usize, link_text_len: usize, looks_like_navigation: bool) -> LinkDensity {
        LinkDensity { text_len, link_text_len, looks_like_navigation }
    }

    #[test]
    fn test_density_thresholds() {
        let config = CleanConfig::default();

        assert!(should_remove_for_density(&stats(100, 60, false), &config));
        assert!(should_remove_for_density(&stats(100, 60, true), &config));
        assert!(!should_remove_for_density(&stats(100, 10, false), &config));
        assert!(!should_remove_for_density(&stats(100, 10, true), &config));
        assert!(should_remove_for_density(&stats(100, 40, true), &config));
        assert!(!should_remove_for_density(&stats(100, 40, false), &config));
    }

    #[test]
    fn test_density_boundaries() {
        let config = CleanConfig::default();
        assert!(!should_remove_for_density(&stats(100, 50, false), &config));
        assert!(should_remove_for_density(&stats(100, 50, true), &config));
        assert!(!should_remove_for_density(&stats(100, 25, true), &config));
    }

    #[test]
    fn test_short_blocks_are_never_scored() {
        let config = CleanConfig::default();
        assert!(!should_remove_for_density(&stats(49, 49, true), &config));
    }

    #[test]
    fn test_density_is_monotonic() {
        let config = CleanConfig::default();
        for nav in [false, true] {
            let mut was_removed = false;
            for links in 0..=100 {
                let removed = should_remove_for_density(&stats(100, links, nav), &config);
                assert!(!was_removed || removed, "density {} kept after a lower density was removed", links);
                was_removed = removed;
            }
        }
    }

    #[test]
    fn test_measure_ignores_fragment_links() {
        let html = r##"<div id="x"><a href="#top">Back to the top of this page please</a> and some prose here.</div>"##;
        let doc = Html::parse_document(html);
        let selector = Selector::parse("#x").unwrap();
        let el = doc.select(&selector).next().unwrap();

        let measured = measure_links(&el);
        assert_eq!(measured.link_text_len, 0);
        assert!(measured.text_len > 0);
        assert!(!measured.looks_like_navigation);
    }

    #[test]
    fn test_measure_counts_link_and_total_text() {
        let html = r#"<ul id="x"><li><a href="/a">Alpha story</a></li><li>plain words</li></ul>"#;
        let doc = Html::parse_document(html);
        let selector = Selector::parse("#x").unwrap();
        let el = doc.select(&selector).next().unwrap();

        let measured = measure_links(&el);
        assert_eq!(measured.link_text_len, "Alpha story".len());
        assert_eq!(measured.text_len, "Alpha story plain words".len());
        assert!(measured.looks_like_navigation);
    }

    #[test]
    fn test_link_dense_block_removed() {
        let html = r#"
            <html><body>
                <div class="columns">
                    <a href="/one">First related headline here</a>
                    <a href="/two">Second related headline here</a>
                    <a href="/three">Third related headline here</a>
                    more
                </div>
                <div class="prose">
                    This paragraph is ordinary prose with a single <a href="/ref">citation</a> in it,
                    and plenty of surrounding words to keep the density low.
                </div>
            </body></html>
        "#;

        let result = clean(html);
        assert_eq!(result.link_dense_removed, 1);
        assert!(!result.html.contains("First related headline"));
        assert!(result.html.contains("ordinary prose"));
    }

    #[test]
    fn test_negative_selectors_removed() {
        let html = r#"
            <html><body>
                <nav><a href="/">Home</a></nav>
                <div class="sidebar">Sidebar</div>
                <div id="cookie-banner">We use cookies</div>
                <div class="content">Body text</div>
            </body></html>
        "#;

        let result = clean(html);
        assert!(!result.html.contains("Home"));
        assert!(!result.html.contains("Sidebar"));
        assert!(!result.html.contains("We use cookies"));
        assert!(result.html.contains("Body text"));
        assert_eq!(result.negative_removed, 3);
    }

    #[test]
    fn test_protected_region_survives() {
        let html = r#"
            <html><body>
                <div class="page-wrapper share-enabled">
                    <article class="sidebar-layout">
                        <nav class="toc"><a href="/a">Section A</a></nav>
                        <div class="related-figure">Figure caption stays</div>
                        <p>Article text stays.</p>
                    </article>
                </div>
                <nav><a href="/">Site navigation</a></nav>
            </body></html>
        "#;

        let result = clean(html);
        assert!(result.html.contains("<article"));
        assert!(result.html.contains("page-wrapper"));
        assert!(result.html.contains("Section A"));
        assert!(result.html.contains("Figure caption stays"));
        assert!(result.html.contains("Article text stays."));
        assert!(!result.html.contains("Site navigation"));
    }

    #[test]
    fn test_protected_region_exempt_from_density() {
        let links: String = (0..10).map(|i| format!("<a href=\"/p{i}\">Linked paragraph number {i}</a> ")).collect();
        let html = format!("<html><body><main><section>{links}</section></main></body></html>");

        let result = clean(&html);
        assert_eq!(result.link_dense_removed, 0);
        assert!(result.html.contains("Linked paragraph number 9"));
    }

    #[test]
    fn test_quirks_applied_by_host() {
        let html = r#"
            <html><body>
                <div id="mw-content-text">
                    <p>Encyclopedia text.</p>
                    <span class="mw-editsection">[edit]</span>
                </div>
            </body></html>
        "#;

        let result = clean_html(html, "https://en.wikipedia.org/wiki/Rust", &CleanConfig::default());
        assert_eq!(result.quirks_applied, Some("Wikipedia"));
        assert_eq!(result.quirk_removed, 1);
        assert!(!result.html.contains("[edit]"));
        assert!(result.html.contains("Encyclopedia text."));
    }

    #[test]
    fn test_invalid_url_skips_quirks() {
        let result = clean_html("<p>Text</p>", "not a url", &CleanConfig::default());
        assert!(result.quirks_applied.is_none());
        assert!(result.html.contains("Text"));
    }

    #[test]
    fn test_schema_article_detected() {
        let html = r#"<html><body><div itemprop="articleBody"><p>Text</p></div></body></html>"#;
        assert!(clean(html).schema_article_found);
        assert!(!clean("<html><body><p>Text</p></body></html>").schema_article_found);
    }

    #[test]
    fn test_lazy_images_counted() {
        let html = r#"<html><body><article><img data-src="/photo.jpg"><p>Text</p></article></body></html>"#;
        let result = clean(html);
        assert_eq!(result.lazy_images_resolved, 1);
        assert!(result.html.contains(" src=\"/photo.jpg\""));
    }

    #[test]
    fn test_nested_matches_counted_once() {
        let html = r#"<html><body><div class="sidebar"><div class="widget">W</div></div><p>Keep</p></body></html>"#;
        let result = clean(html);
        assert_eq!(result.negative_removed, 1);
        assert_eq!(result.removed_count(), 1);
    }
}
