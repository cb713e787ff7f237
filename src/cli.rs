//! Command-line interface definitions for News Scout.
//!
//! Searches come either from a work-item file (a JSON array of
//! `{ "search_phrase": ..., "number_months": ... }` payloads) or from a
//! single `--search-phrase` on the command line.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the News Scout application.
///
/// # Examples
///
/// ```sh
/// # Process every queued search
/// news_scout --config config.yaml --work-items work_items.json
///
/// # One ad-hoc search covering the last three months
/// news_scout -p "interest rates" -n 3 -o ./output
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration (URLs, pauses, retries, element locators)
    #[arg(short, long, env = "NEWS_SCOUT_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// JSON file with the queued search work items
    #[arg(short, long, required_unless_present = "search_phrase", conflicts_with = "search_phrase")]
    pub work_items: Option<PathBuf>,

    /// Phrase for a single search
    #[arg(short = 'p', long)]
    pub search_phrase: Option<String>,

    /// Requested period in months for a single search
    #[arg(short = 'n', long, default_value_t = 1)]
    pub number_months: i64,

    /// Output directory for spreadsheets, screenshots and results
    #[arg(short, long, env = "NEWS_SCOUT_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Run the browser without a visible window, overriding the configuration
    #[arg(long)]
    pub headless: Option<bool>,
}
