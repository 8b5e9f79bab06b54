use ferret_core::{ArticleState, LoadOutcome};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "Ferret".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Load articles, even when the front door is shut\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

fn print_field(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// Print the loaded article's provenance
pub fn print_article_details(article: &ArticleState) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Article Details".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    print_field("Title", &article.title);
    if let Some(site) = &article.site_name {
        print_field("Site", site);
    }
    print_field("URL", &article.url);
    print_field("Source", &article.source);
    print_field("Words", &article.word_count().to_string());
    print_field("Reading time", &format!("{:.1} min", article.reading_time()));
    if article.bypassed_readability_check {
        print_field("Precheck", "skipped");
    }
    if let Some(archive) = &article.archive_annotation {
        print_field("Retrieved via", archive.service.label());
        if let Some(url) = &archive.url {
            print_field("Archive URL", url);
        }
        if let Some(timestamp) = &archive.timestamp {
            print_field("Archived", timestamp);
        }
    }
    eprintln!();
}

/// Suggest what to try next for an outcome that did not produce an article
pub fn print_hint(outcome: &LoadOutcome, bypass_enabled: bool) {
    match outcome {
        LoadOutcome::Blocked { found_tab: Some(tab), .. } => {
            print_info(&format!("The page is open in tab {}; reload it there and try again", tab.id));
        }
        LoadOutcome::Blocked { .. } if !bypass_enabled => {
            print_info("Retry with --bypass to try crawler and archive fallbacks");
        }
        LoadOutcome::NotReadable { .. } => {
            print_info("Retry with --force to extract anyway");
        }
        _ => {}
    }
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
