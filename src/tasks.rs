//! Work-item processing.
//!
//! Each work item is one independent search: open a session, crawl, export,
//! close. A failed search is reported with a [`FailureCode`] taken from the
//! error's origin and does not stop the remaining items.

use crate::crawler::{CrawlSettings, Crawler, CrawlSummary};
use crate::error::SearchError;
use crate::models::{SearchRequest, TaskOutcome, TaskReport, WorkItem};
use crate::session::SearchSession;
use crate::utils::truncate_for_log;
use std::path::Path;
use tracing::{error, info, instrument, warn};

pub const EXCEPTION_TYPE: &str = "APPLICATION";

/// Load the queued search payloads from a JSON array.
pub fn load_work_items(path: &Path) -> Result<Vec<WorkItem>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let items: Vec<WorkItem> = serde_json::from_str(&raw)?;
    info!(count = items.len(), path = %path.display(), "Loaded work items");
    Ok(items)
}

/// Run one search end to end on an already created session.
#[instrument(level = "info", skip(session, settings))]
pub async fn run_search<S: SearchSession>(
    session: &mut S,
    item: &WorkItem,
    settings: &CrawlSettings,
) -> Result<CrawlSummary, SearchError> {
    let request = SearchRequest::new(item.search_phrase.clone(), item.number_months)?;
    info!(phrase = %request.phrase(), window_months = request.window_months(), "Processing search");

    session.open_search(request.phrase()).await?;
    let summary = Crawler::new(session, &request, settings.clone()).run().await?;
    session.close().await?;
    Ok(summary)
}

/// Process every work item in order, creating a fresh session for each.
///
/// A failing item is closed, reported with its failure code, and the next
/// item still runs.
///
/// # Arguments
///
/// * `items` - Queued searches
/// * `new_session` - Factory for the session of each item
/// * `settings` - Output locations shared by all items
///
/// # Returns
///
/// One [`TaskReport`] per item, in input order.
pub async fn process_work_items<S, F>(
    items: &[WorkItem],
    mut new_session: F,
    settings: &CrawlSettings,
) -> Vec<TaskReport>
where
    S: SearchSession,
    F: FnMut() -> S,
{
    let mut reports = Vec::with_capacity(items.len());
    for item in items {
        let mut session = new_session();
        let outcome = match run_search(&mut session, item, settings).await {
            Ok(summary) => {
                info!(
                    accepted = summary.accepted,
                    pages = summary.pages_inspected,
                    stop_reason = ?summary.stop_reason,
                    archived = summary.export.as_ref().map(|e| e.archived_files),
                    "Search completed successfully"
                );
                TaskOutcome::Done {
                    accepted: summary.accepted,
                    spreadsheet: summary
                        .export
                        .map(|e| e.spreadsheet.display().to_string()),
                }
            }
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to close session after error");
                }
                failure_outcome(&e)
            }
        };
        reports.push(TaskReport {
            search_phrase: item.search_phrase.clone(),
            number_months: item.number_months,
            outcome,
        });
    }
    reports
}

pub fn failure_outcome(err: &SearchError) -> TaskOutcome {
    let code = err.failure_code();
    let message = err.to_string();
    error!(
        code = code.as_str(),
        kind = ?err.kind(),
        message = %truncate_for_log(&message, 500),
        "Search failed"
    );
    TaskOutcome::Failed {
        exception_type: EXCEPTION_TYPE.to_string(),
        code,
        message,
    }
}
