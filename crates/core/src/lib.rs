pub mod archive;
pub mod article;
pub mod browser;
pub mod clean;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formatters;
pub mod hopper;
pub mod loader;
pub mod metadata;
pub mod parse;
pub mod preprocess;
pub mod quirks;
pub mod readability;

pub use archive::{
    ArchiveConfig, ArchiveLookup, ArchiveMirror, ArchiveResult, ArchiveService, ArchivedPage, SnapshotService,
    format_snapshot_timestamp,
};
pub use article::{ArticleContent, ArticleState};
pub use browser::{
    BrowserBridge, BrowserTab, ExtensionAvailability, TabCollaborator, TabContent, UnavailableBrowser, UrlMatch,
    normalize_url, urls_match,
};
pub use clean::{CleanConfig, CleaningResult, clean_html};
pub use error::{ArchiveError, BrowserError, BypassError, ExtractionError, FerretError, FetchError, FetchErrorKind, Result};
pub use extract::{ExtractOptions, Extractor, extract};
pub use fetch::{FetchConfig, FetchOutcome, FetchedPage, HttpFetcher, Identity, PageFetcher};
pub use formatters::{JsonConfig, JsonFormatter, MarkdownConfig, MarkdownFormatter, TextConfig, TextFormatter};
pub use formatters::{OutputFormat, convert_to_json, convert_to_markdown, convert_to_text, render};
pub use hopper::{ArchiveSource, ArchiveStrategy, BypassResult, BypassSource, BypassStrategy, BypassedPage, CrawlerStrategy, Hopper};
pub use loader::{LoadOutcome, LoadState, Loader, LoaderConfig, LoaderConfigBuilder, ReimportOutcome};
pub use metadata::StructuredMetadata;
pub use parse::Document;
pub use quirks::{SiteQuirks, quirks_for_hostname, quirks_for_url};
pub use readability::is_probably_readable;
