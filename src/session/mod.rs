//! The search session: the crawler's only view of the browser.
//!
//! The crawler owns a [`SearchSession`] and never touches browser
//! primitives directly. [`browser::BrowserSession`] drives Chrome over the
//! DevTools protocol; tests substitute scripted sessions.
//!
//! Sessions are responsible for their own diagnostics: when one of their
//! internal steps fails they save a full-page screenshot before returning
//! the error.

pub mod browser;

use crate::error::SearchError;
use crate::models::ArticleBatch;
use std::path::Path;

pub trait SearchSession {
    /// Opaque per-article handle used only for screenshots.
    type Handle;

    /// Open the website, submit `phrase` and switch to the news results.
    async fn open_search(&mut self, phrase: &str) -> Result<(), SearchError>;

    /// The visible articles of the current page, index-aligned.
    async fn visible_articles(&mut self) -> Result<ArticleBatch<Self::Handle>, SearchError>;

    /// Move to the next result page. Failure means there is no next page to inspect.
    async fn advance_to_next_page(&mut self) -> Result<(), SearchError>;

    async fn capture_screenshot(
        &mut self,
        handle: &Self::Handle,
        destination: &Path,
    ) -> Result<(), SearchError>;

    async fn close(&mut self) -> Result<(), SearchError>;
}
