//! Error taxonomy for a single search.
//!
//! Every failure is tagged with an [`ErrorKind`] where it originates, so the
//! task layer can pick a [`FailureCode`] without inspecting message text.
//!
//! | Kind | Raised by | Policy |
//! |------|-----------|--------|
//! | `TransientUi` | element lookups / clicks | bounded retry where wrapped, else fatal |
//! | `Navigation` | page advance, window switch | stops the crawl, or fatal before the first page |
//! | `UnavailableSite` | session open | fatal, no retry |
//! | `Export` | spreadsheet / archive writes | fatal, no retry |
//! | `Configuration` | config lookups | fatal |
//! | `Driver` | anything else in the browser layer | fatal |

use crate::config::ConfigError;
use crate::outputs::ExportError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification attached to every [`SearchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientUi,
    Navigation,
    UnavailableSite,
    Export,
    Configuration,
    Driver,
}

/// Structured failure code reported for a failed work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    MissingElement,
    WindowNotFound,
    UncaughtError,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::MissingElement => "MISSING_ELEMENT",
            FailureCode::WindowNotFound => "WINDOW_NOT_FOUND",
            FailureCode::UncaughtError => "UNCAUGHT_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("element '{name}' with locator '{locator}' not found: {reason}")]
    MissingElement {
        name: String,
        locator: String,
        reason: String,
    },

    #[error("results window not found: expected window #{expected}, browser has {found}")]
    WindowNotFound { expected: usize, found: usize },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("website unavailable at {url}: {reason}")]
    UnavailableSite { url: String, reason: String },

    #[error("result page is misaligned: {titles} titles, {dates} dates, {links} links, {sources} sources, {descriptions} descriptions")]
    MisalignedBatch {
        titles: usize,
        dates: usize,
        links: usize,
        sources: usize,
        descriptions: usize,
    },

    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("'{keyword}' did not succeed after {attempts} attempts: {last}")]
    RetriesExhausted {
        keyword: String,
        attempts: u32,
        #[source]
        last: Box<SearchError>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::MissingElement { .. } => ErrorKind::TransientUi,
            SearchError::WindowNotFound { .. } | SearchError::Navigation(_) => ErrorKind::Navigation,
            SearchError::UnavailableSite { .. } => ErrorKind::UnavailableSite,
            SearchError::Export(_) => ErrorKind::Export,
            SearchError::Config(_) => ErrorKind::Configuration,
            SearchError::MisalignedBatch { .. }
            | SearchError::InvalidRequest(_)
            | SearchError::Driver(_) => ErrorKind::Driver,
            SearchError::RetriesExhausted { last, .. } => last.kind(),
        }
    }

    /// Failure code reported to the work-item queue.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            SearchError::MissingElement { .. } => FailureCode::MissingElement,
            SearchError::WindowNotFound { .. } => FailureCode::WindowNotFound,
            SearchError::RetriesExhausted { last, .. } => last.failure_code(),
            _ => FailureCode::UncaughtError,
        }
    }

    /// Whether a failed page advance simply means the results ran out.
    pub fn is_end_of_results(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientUi | ErrorKind::Navigation)
    }
}
