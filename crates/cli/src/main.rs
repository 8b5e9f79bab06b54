use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use ferret_core::{
    ArchiveConfig, ArticleState, BrowserBridge, ExtractOptions, Extractor, FetchConfig, JsonConfig, LoadOutcome,
    Loader, LoaderConfig, MarkdownConfig, OutputFormat, TextConfig, convert_to_json, convert_to_markdown,
    convert_to_text,
};
use owo_colors::OwoColorize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_FILTER: &str = "ferret_core=warn,ferret=warn";
const VERBOSE_FILTER: &str = "ferret_core=debug,ferret=debug";

/// Base URL for stdin input when none is given.
const STDIN_BASE_URL: &str = "about:blank";

/// Load an article from the web, a local file or stdin
#[derive(Parser, Debug)]
#[command(name = "ferret")]
#[command(author = "Ferret Contributors")]
#[command(version)]
#[command(about = "Load articles from web pages, with archive fallbacks for blocked pages", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (markdown, html, text, json)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    format: OutputFormat,

    /// Include reference table with all links (Markdown/JSON only)
    #[arg(long)]
    references: bool,

    /// Include TOML frontmatter (Markdown only)
    #[arg(long)]
    frontmatter: bool,

    /// Try crawler identity and web archives when the page is blocked
    #[arg(long)]
    bypass: bool,

    /// Extract even when the page does not look like an article
    #[arg(long)]
    force: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Base URL for resolving links in file or stdin input
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Strip images from output
    #[arg(long)]
    no_images: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn is_url(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions { skip_precheck: self.force }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

/// Local file base URL, for relative link resolution.
fn file_base_url(path: &Path) -> String {
    fs::canonicalize(path)
        .ok()
        .and_then(|abs| Url::from_file_path(abs).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| STDIN_BASE_URL.to_string())
}

async fn load_url(args: &Args) -> anyhow::Result<ArticleState> {
    let mut fetch_config = FetchConfig { browser_timeout: Duration::from_secs(args.timeout), ..Default::default() };
    if let Some(ua) = &args.user_agent {
        fetch_config.browser_user_agent = ua.clone();
    }
    let config = LoaderConfig::builder().bypass_enabled(args.bypass).build();

    let loader = Loader::standard(config, fetch_config, &ArchiveConfig::default(), BrowserBridge::unavailable())
        .context("Failed to build HTTP client")?;

    let sources = loader.bypass_sources();
    if args.verbose && !sources.is_empty() {
        let chain: Vec<&str> = sources.iter().map(|s| s.label()).collect();
        echo::print_info(&format!("Bypass chain: {}", chain.join(", ")));
    }

    let outcome = loader.load(&args.input, "argument", args.extract_options()).await;
    info!(url = %args.input, state = ?outcome.state(), "load finished");
    echo::print_hint(&outcome, args.bypass);

    match outcome {
        LoadOutcome::Success(article) => Ok(article),
        LoadOutcome::Blocked { error, .. } => bail!("Page is blocked: {}", error),
        LoadOutcome::NotReadable { error, .. } | LoadOutcome::EmptyContent { error, .. } => bail!("{}", error),
        LoadOutcome::Error { error } => bail!("Failed to load URL: {}", error),
    }
}

fn extract_local(args: &Args, html: &str, base_url: &str, source: &str) -> anyhow::Result<ArticleState> {
    debug!(source, base_url, html_len = html.len(), force = args.force, "extracting local input");
    let content = Extractor::default()
        .extract(html, base_url, args.extract_options())
        .inspect_err(|e| warn!(source, error = %e, "local extraction failed"))
        .context("Failed to extract content")?;
    Ok(ArticleState::new(content, base_url, source).with_bypassed_check(args.force))
}

fn render(args: &Args, article: &ArticleState) -> anyhow::Result<String> {
    let output = match args.format {
        OutputFormat::Markdown => {
            let config = MarkdownConfig {
                include_frontmatter: args.frontmatter,
                include_references: args.references,
                strip_images: args.no_images,
                include_title_heading: true,
                simplify_images: true,
            };
            convert_to_markdown(article, &config).context("Failed to convert to Markdown")?
        }
        OutputFormat::Html => article.body_content.clone(),
        OutputFormat::Text => convert_to_text(article, &TextConfig { include_header: true, ..Default::default() }),
        OutputFormat::Json => {
            let config = JsonConfig { include_references: args.references, pretty: true };
            convert_to_json(article, &config, None).context("Failed to convert to JSON")?
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let article = if args.is_url() {
        if args.verbose {
            echo::print_step(1, 2, &format!("Loading {}", args.input.bright_white().underline()));
        }
        load_url(&args).await?
    } else if args.input == "-" {
        if args.verbose {
            echo::print_step(1, 2, "Reading from stdin");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("Failed to read from stdin")?;
        if args.verbose {
            eprintln!("  {} {}", "Size:".dimmed(), echo::format_size(buffer.len()).bright_white());
        }
        let base_url = args.base_url.clone().unwrap_or_else(|| STDIN_BASE_URL.to_string());
        extract_local(&args, &buffer, &base_url, "stdin")?
    } else {
        if args.verbose {
            echo::print_step(1, 2, &format!("Reading from file {}", args.input.bright_white()));
        }
        let html = fs::read_to_string(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?;
        if args.verbose {
            eprintln!("  {} {}", "Size:".dimmed(), echo::format_size(html.len()).bright_white());
        }
        let base_url = args.base_url.clone().unwrap_or_else(|| file_base_url(Path::new(&args.input)));
        extract_local(&args, &html, &base_url, "file")?
    };

    if args.verbose {
        echo::print_article_details(&article);
        echo::print_step(2, 2, &format!("Rendering {:?}", args.format));
    }

    if article.bypassed_readability_check && !args.force {
        echo::print_warning("Content came through a fallback and skipped the article check");
    }

    let output = render(&args, &article)?;

    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => {
            print!("{}", output);
        }
    }

    Ok(())
}
