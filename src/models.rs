//! Data models for a single search crawl.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SearchRequest`]: The phrase and recency window of one search
//! - [`ArticleBatch`] / [`RawArticleSighting`]: Articles as surfaced on a result page
//! - [`ArticleRecord`]: An accepted article as stored in the register
//! - [`CrawlState`]: Mutable bookkeeping for the crawl loop
//! - [`WorkItem`] / [`TaskReport`]: Input payloads and their outcomes

use crate::error::{FailureCode, SearchError};
use itertools::izip;
use serde::{Deserialize, Serialize};

/// The largest recency window, in months, a search may request.
pub const MAX_WINDOW_MONTHS: u32 = 11;

/// An immutable search: phrase plus recency window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    phrase: String,
    window_months: u32,
}

impl SearchRequest {
    /// Build a request from the raw requested period.
    ///
    /// A requested period of 0 or 1 months only admits articles younger than a
    /// month; larger periods allow `requested - 1` whole months, capped at
    /// [`MAX_WINDOW_MONTHS`].
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidRequest`] when the phrase is empty or blank.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// assert_eq!(SearchRequest::new("economy", 1)?.window_months(), 0);
    /// assert_eq!(SearchRequest::new("economy", 3)?.window_months(), 2);
    /// assert_eq!(SearchRequest::new("economy", 24)?.window_months(), 11);
    /// ```
    pub fn new(phrase: impl Into<String>, requested_months: i64) -> Result<Self, SearchError> {
        let phrase = phrase.into();
        if phrase.trim().is_empty() {
            return Err(SearchError::InvalidRequest(
                "search phrase must not be empty".to_string(),
            ));
        }
        let window_months = if requested_months > 1 {
            (requested_months - 1).clamp(0, MAX_WINDOW_MONTHS as i64) as u32
        } else {
            0
        };
        Ok(Self {
            phrase,
            window_months,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn window_months(&self) -> u32 {
        self.window_months
    }
}

/// One article as seen on a result page, before any validation.
///
/// `handle` is opaque to the crawler and only handed back to the session
/// for screenshotting.
#[derive(Debug, Clone)]
pub struct RawArticleSighting<H> {
    pub title: String,
    pub link: String,
    pub source: String,
    pub description: String,
    pub relative_date: String,
    pub handle: H,
}

/// The visible articles of one page as parallel, index-aligned sequences.
#[derive(Debug, Clone)]
pub struct ArticleBatch<H> {
    pub handles: Vec<H>,
    pub titles: Vec<String>,
    pub dates: Vec<String>,
    pub links: Vec<String>,
    pub sources: Vec<String>,
    pub descriptions: Vec<String>,
}

impl<H> Default for ArticleBatch<H> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
            titles: Vec::new(),
            dates: Vec::new(),
            links: Vec::new(),
            sources: Vec::new(),
            descriptions: Vec::new(),
        }
    }
}

impl<H> ArticleBatch<H> {
    /// Zip the parallel sequences into sightings, refusing misaligned pages.
    pub fn into_sightings(self) -> Result<Vec<RawArticleSighting<H>>, SearchError> {
        let n = self.handles.len();
        let aligned = [
            self.titles.len(),
            self.dates.len(),
            self.links.len(),
            self.sources.len(),
            self.descriptions.len(),
        ]
        .iter()
        .all(|&len| len == n);
        if !aligned {
            return Err(SearchError::MisalignedBatch {
                titles: self.titles.len(),
                dates: self.dates.len(),
                links: self.links.len(),
                sources: self.sources.len(),
                descriptions: self.descriptions.len(),
            });
        }

        Ok(izip!(
            self.handles,
            self.titles,
            self.dates,
            self.links,
            self.sources,
            self.descriptions
        )
        .map(
            |(handle, title, relative_date, link, source, description)| RawArticleSighting {
                title,
                link,
                source,
                description,
                relative_date,
                handle,
            },
        )
        .collect())
    }
}

/// An accepted article. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub source: String,
    pub date: String,
    pub description: String,
    pub link: String,
    pub picture_filename: String,
    pub occurrence_count: usize,
    pub contains_money: bool,
}

/// Bookkeeping for one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlState {
    /// Next screenshot index; starts at 1 so the first capture is `screenshot-1.png`.
    pub accepted_count: usize,
    pub consecutive_rejections: usize,
    pub pages_inspected: usize,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            accepted_count: 1,
            consecutive_rejections: 0,
            pages_inspected: 0,
        }
    }
}

impl CrawlState {
    pub fn record_rejection(&mut self) {
        self.consecutive_rejections += 1;
    }

    pub fn record_acceptance(&mut self) {
        self.accepted_count += 1;
    }

    /// Number of articles actually accepted so far.
    pub fn total_accepted(&self) -> usize {
        self.accepted_count - 1
    }

    pub fn anything_accepted(&self) -> bool {
        self.accepted_count > 1
    }

    pub fn picture_filename(&self) -> String {
        format!("screenshot-{}.png", self.accepted_count)
    }
}

/// Payload of one queued search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkItem {
    pub search_phrase: String,
    pub number_months: i64,
}

/// Outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskOutcome {
    Done {
        accepted: usize,
        spreadsheet: Option<String>,
    },
    Failed {
        exception_type: String,
        code: FailureCode,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub search_phrase: String,
    pub number_months: i64,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}
