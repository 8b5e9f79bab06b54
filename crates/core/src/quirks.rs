//! Per-site cleaning and extraction hints.
//!
//! An ordered list of `(hostname pattern, SiteQuirks)` pairs. Patterns are
//! tested in declaration order and the first match wins, so a specific host
//! listed early can pre-empt a broader pattern further down.

use std::sync::LazyLock;

use regex::Regex;

/// Hints for one site or platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteQuirks {
    pub name: &'static str,
    /// Selector for the element(s) holding the article body.
    pub article_selector: Option<&'static str>,
    /// Removed unconditionally before any other cleaning.
    pub remove_selectors: &'static [&'static str],
    pub prefer_schema_org: Option<bool>,
}

impl SiteQuirks {
    const fn new(name: &'static str, article_selector: &'static str, remove_selectors: &'static [&'static str]) -> Self {
        Self { name, article_selector: Some(article_selector), remove_selectors, prefer_schema_org: None }
    }

    const fn prefer_schema_org(mut self, prefer: bool) -> Self {
        self.prefer_schema_org = Some(prefer);
        self
    }
}

/// Ad, recirculation and share-bar selectors seen across many publishers.
pub const COMMON_REMOVE_SELECTORS: &[&str] = &[
    "#taboola-below-article-thumbnails",
    ".OUTBRAIN",
    "[data-widget-id^='outbrain']",
    ".taboola-container",
    "[id^='div-gpt-ad']",
    ".ad-container",
    ".sidebar-ad",
    ".banner-ad",
    ".share-buttons",
    ".social-share",
    "[data-testid='share-button']",
    "#disqus_thread",
    ".userComments",
    ".comments-section",
    "#primis-holder",
    ".aniview-inline-player",
    ".amp-connatix-player",
    ".newsletter-signup",
    ".newsletter-inline",
    ".email-signup",
];

const QUIRKS_TABLE: &[(&str, SiteQuirks)] = &[
    (
        r"^(.*\.)?wikipedia\.org$",
        SiteQuirks::new(
            "Wikipedia",
            "#mw-content-text",
            &[
                ".mw-editsection",
                ".navbox",
                ".vertical-navbox",
                ".sistersitebox",
                ".mbox-small",
                "#coordinates",
                ".reference",
                ".reflist",
                "#toc",
                ".toc",
                ".infobox",
                ".sidebar",
                ".hatnote",
                ".metadata",
            ],
        ),
    ),
    (
        r"^(.*\.)?medium\.com$",
        SiteQuirks::new(
            "Medium",
            "article",
            &[
                "[data-testid=\"headerSocialShareButton\"]",
                "[data-testid=\"audioPlayButton\"]",
                ".pw-multi-vote-count",
                "[aria-label=\"responses\"]",
                "[data-testid=\"storyFooter\"]",
            ],
        ),
    ),
    (
        r"^(.*\.)?substack\.com$",
        SiteQuirks::new(
            "Substack",
            ".body",
            &[".subscribe-widget", ".subscription-widget", ".footer", ".comments-section", ".share-dialog", ".post-footer"],
        ),
    ),
    (
        r"^(.*\.)?nytimes\.com$",
        SiteQuirks::new(
            "NYTimes",
            "article",
            &[
                "[data-testid=\"share-tools\"]",
                ".ad",
                ".newsletter-signup",
                "[data-testid=\"inline-message\"]",
                ".story-footer",
            ],
        ),
    ),
    (
        r"^(.*\.)?theguardian\.com$",
        SiteQuirks::new(
            "Guardian",
            "[itemprop=\"articleBody\"]",
            &[".submeta", ".content-footer", ".contributions__epic", ".ad-slot", ".js-most-popular-footer"],
        ),
    ),
    (
        r"^(.*\.)?bbc\.(com|co\.uk)$",
        SiteQuirks::new(
            "BBC",
            "article",
            &[
                "[data-component=\"related-topics\"]",
                "[data-component=\"links-block\"]",
                ".ssrcss-1q0x1qg-Promo",
                ".ssrcss-1mrs5ns-PromoLink",
            ],
        ),
    ),
    (
        r"^(.*\.)?washingtonpost\.com$",
        SiteQuirks::new(
            "WashingtonPost",
            "article",
            &[".hide-for-print", ".dn-print", "[data-qa=\"subscribe-promo\"]", ".newsletter-inline"],
        ),
    ),
    (
        r"^(.*\.)?arstechnica\.com$",
        SiteQuirks::new("ArsTechnica", ".article-content", &[".sidebar", ".ad", ".related-stories", ".comment-counts"]),
    ),
    (
        r"^(.*\.)?theverge\.com$",
        SiteQuirks::new(
            "TheVerge",
            ".duet--article--article-body-component",
            &[".duet--ad--ad-wrapper", ".duet--recirculation--related-list"],
        ),
    ),
    (
        r"^(.*\.)?wired\.com$",
        SiteQuirks::new("Wired", ".body__inner-container", &[".ad", ".newsletter-subscribe-form", ".related-content"]),
    ),
    (
        r"^(.*\.)?techcrunch\.com$",
        SiteQuirks::new(
            "TechCrunch",
            ".entry-content",
            &[".embed-tc-newsletter", ".related-posts", ".ad-unit", ".wp-block-techcrunch-inline-cta"],
        ),
    ),
    (
        r"^news\.ycombinator\.com$",
        SiteQuirks::new(
            "HackerNews",
            ".fatitem",
            &[
                ".votearrow",
                ".votelinks",
                ".hnmore",
                ".morelink",
                "form[action='comment']",
                ".reply",
                "input",
                "textarea",
                ".navs",
                ".pagetop",
                "#hnmain > tbody > tr:first-child",
                "#hnmain > tbody > tr:last-child",
            ],
        )
        .prefer_schema_org(false),
    ),
    (
        r"^(.*\.)?github\.com$",
        SiteQuirks::new(
            "GitHub",
            "[data-testid=\"issue-viewer-issue-container\"], .markdown-body, .js-comment-body",
            &[
                ".octicon",
                ".anchor",
                ".zeroclipboard-container",
                ".js-clipboard-copy",
                "button",
                "[data-testid*=\"button\"]",
                "[data-testid*=\"menu\"]",
                ".gh-header-sticky",
                "[data-testid=\"issue-metadata-sticky\"]",
                ".timeline-comment-actions",
                ".comment-reactions",
                ".js-comment-edit-button",
                ".details-overlay",
                ".select-menu",
                ".dropdown-menu",
                ".tooltipped",
                ".Label",
                ".IssueLabel",
                ".State",
                "[data-view-component='true'][class*='Button']",
                ".ActionListItem",
                ".AppHeader",
                ".js-header-wrapper",
                ".footer",
            ],
        )
        .prefer_schema_org(true),
    ),
    (
        r"^(.*\.)?stackoverflow\.com$",
        SiteQuirks::new(
            "StackOverflow",
            ".question, .answer",
            &[".js-vote-count", ".post-menu", ".comments", ".s-anchors"],
        ),
    ),
    (
        r"^(.*\.)?reddit\.com$",
        SiteQuirks::new(
            "Reddit",
            "[data-test-id=\"post-content\"], .expando, .usertext-body, [slot=\"text-body\"]",
            &[
                "[data-testid=\"vote-arrows\"]",
                ".promotedlink",
                "[data-testid=\"share-button\"]",
                ".share-button",
                ".post-voting",
                ".tagline",
                ".buttons",
                ".report-button",
                ".crosspost-preview",
                "[data-click-id='share']",
                "[data-click-id='award']",
                ".award-button",
                "shreddit-post-overflow-menu",
                "faceplate-dropdown-menu",
            ],
        )
        .prefer_schema_org(true),
    ),
    (
        r"^(.*\.)?(youtube\.com|youtu\.be)$",
        SiteQuirks::new(
            "YouTube",
            "#description, ytd-text-inline-expander, #content",
            &[
                "#chat",
                "#comments",
                "#related",
                "#secondary",
                "ytd-watch-next-secondary-results-renderer",
                "ytd-comments",
                "ytd-merch-shelf-renderer",
                "#ticket-shelf",
                "#clarify-box",
                "#info-strings",
                "#menu",
                "#actions",
                "#subscribe-button",
                "ytd-subscribe-button-renderer",
                ".ytp-ce-element",
                ".ytp-cards-teaser",
            ],
        )
        .prefer_schema_org(true),
    ),
    (r"^(.*\.)?apple\.com$", SiteQuirks::new("Apple", "*[itemprop=\"articleBody\"]", &[]).prefer_schema_org(true)),
    (r"^(.*\.)?engadget\.com$", SiteQuirks::new("Engadget", "main article #page_body", &[".ad", ".newsletter-signup"])),
    (r"^(.*\.)?cnet\.com$", SiteQuirks::new("CNET", "#rbContent.container", &[".ad", ".newsletter-signup"])),
    (
        r"^(.*\.)?mashable\.com$",
        SiteQuirks::new("Mashable", ".parsec-body .parsec-container", &[".ad", ".newsletter-signup"]),
    ),
    (
        r"^(.*\.)?buzzfeed\.com$",
        SiteQuirks::new("BuzzFeed", "article #buzz_sub_buzz", &[".ad", ".newsletter-signup", ".share-buttons"]),
    ),
    (
        r"^(.*\.)?theintercept\.com$",
        SiteQuirks::new("TheIntercept", ".PostContent", &[".ad", ".newsletter-signup", ".share-tools"]),
    ),
    (r"^(.*\.)?ietf\.org$", SiteQuirks::new("IETF", "div.content", &[".nav", ".sidebar"])),
    (
        r"^(.*\.)?bloomberg\.com$",
        SiteQuirks::new(
            "Bloomberg",
            "article",
            &[".ad", "[data-component=\"paywall\"]", ".newsletter-signup", ".sticky-ad", ".right-rail"],
        ),
    ),
    (
        r"^(.*\.)?reuters\.com$",
        SiteQuirks::new(
            "Reuters",
            "[data-testid=\"article-body\"]",
            &[".ad", "[data-testid=\"Slideshow\"]", ".related-coverage", ".trust-principles"],
        ),
    ),
    (
        r"^(.*\.)?forbes\.com$",
        SiteQuirks::new(
            "Forbes",
            ".article-body",
            &[".ad", ".forbes-subscribe", ".newsletter-tout", "#taboola-below-article-thumbnails", ".fs-ad"],
        ),
    ),
    (
        r"^(.*\.)?theatlantic\.com$",
        SiteQuirks::new(
            "TheAtlantic",
            "article .article-body",
            &[".ad", ".newsletter-inline-unit", ".related-articles", "#paywall-portal-root"],
        ),
    ),
    (
        r"^(.*\.)?vice\.com$",
        SiteQuirks::new("Vice", ".article__body", &[".ad", ".newsletter-signup", ".related-articles", ".topics-strip"]),
    ),
    (
        r"^(.*\.)?vox\.com$",
        SiteQuirks::new(
            "Vox",
            ".c-entry-content",
            &[".ad", ".m-newsletter-signup", ".c-article-footer", ".c-read-more"],
        ),
    ),
    (
        r"^(.*\.)?polygon\.com$",
        SiteQuirks::new("Polygon", ".c-entry-content", &[".ad", ".m-newsletter-signup", ".c-article-footer"]),
    ),
    (
        r"^(.*\.)?cnn\.com$",
        SiteQuirks::new(
            "CNN",
            ".article__content",
            &[
                ".ad",
                ".el__leafmedia--source-link",
                ".related-content",
                "[data-zone-label=\"modal\"]",
                ".ad-feedback-link-container",
                ".video-resource-elevate",
            ],
        ),
    ),
    (
        r"^(.*\.)?axios\.com$",
        SiteQuirks::new(
            "Axios",
            ".article-content",
            &[".ad", ".newsletter-signup", ".story-footer", ".stream-item-container"],
        ),
    ),
    (
        r"^(.*\.)?qz\.com$",
        SiteQuirks::new(
            "Quartz",
            "article .article-content",
            &[".ad", ".paywall-gate", ".newsletter-signup", ".related-content"],
        ),
    ),
    (
        r"^(.*\.)?ghost\.(io|org)$",
        SiteQuirks::new(
            "Ghost",
            ".gh-content, .post-content",
            &[".gh-sidebar", ".gh-subscribe", ".gh-navigation", ".gh-footer"],
        ),
    ),
    (
        r"squarespace\.com$",
        SiteQuirks::new(
            "Squarespace",
            ".blog-item-content, .entry-content",
            &[".sqs-block-newsletter", ".sqs-block-social-accounts", ".sqs-block-archive"],
        ),
    ),
    (
        r"drupal\.(org|com)$",
        SiteQuirks::new(
            "Drupal",
            ".field--name-body, .node__content",
            &[".field--name-field-tags", ".links", ".comment-wrapper"],
        ),
    ),
    (
        r"^(.*\.)?wordpress\.com$",
        SiteQuirks::new(
            "WordPress.com",
            ".entry-content, .post-content",
            &[".sharedaddy", ".jp-relatedposts", ".wpl-likebox", ".post-likes-widget"],
        ),
    ),
    (
        r"^(.*\.)?blogspot\.com$",
        SiteQuirks::new(
            "Blogger",
            ".post-body, .entry-content",
            &[".blog-pager", ".post-share-buttons", ".reactions", ".post-footer"],
        ),
    ),
    (
        r"^(.*\.)?tumblr\.com$",
        SiteQuirks::new(
            "Tumblr",
            ".post-content, .body-text",
            &[".post-notes", ".reblog-header", ".post-controls", ".like-button"],
        ),
    ),
];

static QUIRKS: LazyLock<Vec<(Regex, &'static SiteQuirks)>> = LazyLock::new(|| {
    QUIRKS_TABLE
        .iter()
        .filter_map(|(pattern, quirks)| Regex::new(&format!("(?i){}", pattern)).ok().map(|re| (re, quirks)))
        .collect()
});

/// Looks up quirks for a hostname. The hostname is lowercased and a
/// trailing dot is stripped before matching.
pub fn quirks_for_hostname(hostname: &str) -> Option<&'static SiteQuirks> {
    let normalized = hostname.to_lowercase();
    let normalized = normalized.strip_suffix('.').unwrap_or(&normalized);

    QUIRKS.iter().find(|(pattern, _)| pattern.is_match(normalized)).map(|(_, quirks)| *quirks)
}

/// Quirks for the host of a full URL, if the URL parses.
pub fn quirks_for_url(url: &str) -> Option<&'static SiteQuirks> {
    let parsed = url::Url::parse(url).ok()?;
    quirks_for_hostname(parsed.host_str()?)
}
