//! # News Scout
//!
//! Searches a news aggregation website for a phrase, keeps the articles
//! published inside a recency window, and exports them to a spreadsheet
//! together with a zip of per-article screenshots.
//!
//! ## Usage
//!
//! ```sh
//! news_scout --config config.yaml --work-items work_items.json
//! news_scout -p "interest rates" -n 3
//! ```
//!
//! ## Architecture
//!
//! Each search runs as a pipeline on one browser session:
//! 1. **Search**: open the website, submit the phrase, switch to the news results
//! 2. **Crawl**: inspect each result page, admitting recent and unseen articles
//! 3. **Stop**: after three rejections in a row, when no next page exists,
//!    or at the article ceiling
//! 4. **Export**: spreadsheet of accepted articles plus a zip of their screenshots
//!
//! Searches run one after another; a failed search is reported with a
//! failure code and the next one proceeds.

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod analysis;
mod cli;
mod config;
mod crawler;
mod error;
mod models;
mod outputs;
mod recency;
mod register;
mod retry;
mod session;
mod tasks;
mod utils;

use cli::Cli;
use config::Config;
use crawler::CrawlSettings;
use models::{TaskOutcome, WorkItem};
use outputs::json;
use session::browser::BrowserSession;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_scout starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.work_items, ?args.output_dir, "Parsed CLI arguments");

    let mut config = Config::load(&args.config)?;
    if let Some(headless) = args.headless {
        config.browser.headless = headless;
    }
    let config = Arc::new(config);

    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let items = match (&args.work_items, &args.search_phrase) {
        (Some(path), _) => tasks::load_work_items(path)?,
        (None, Some(phrase)) => vec![WorkItem {
            search_phrase: phrase.clone(),
            number_months: args.number_months,
        }],
        (None, None) => return Err("either --work-items or --search-phrase is required".into()),
    };

    let settings = CrawlSettings::new(&args.output_dir, config.pause(config::PAUSE_SUPER_SHORT)?);
    let reports = tasks::process_work_items(
        &items,
        || BrowserSession::new(Arc::clone(&config), &args.output_dir),
        &settings,
    )
    .await;

    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, TaskOutcome::Failed { .. }))
        .count();
    if let Err(e) = json::write_results(&reports, &args.output_dir).await {
        error!(error = %e, "Failed to write work item results");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        searches = reports.len(),
        failed,
        "Execution complete"
    );

    Ok(())
}
