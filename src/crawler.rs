//! Crawl loop: page through results, admit articles, decide when to stop.
//!
//! ```text
//! FetchingPage ──► InspectingArticles ──► AdvancingPage ──► FetchingPage
//!                                    └──► Stopping ──► export ──► done
//! ```
//!
//! A page is always inspected in full. After it, the crawl stops when the
//! rejection streak reached [`MAX_NO_VALID_NEWS`]; otherwise the streak is
//! reset and the session advances. A failed advance, whatever the error,
//! also stops the crawl; the articles accepted so far are still exported.
//! Independently, no more than [`MAX_NEWS`]` - 1` articles are ever accepted.
//!
//! Result pages are assumed to be roughly chronological, so a streak of
//! stale or repeated articles means the window has been left behind.

use crate::error::SearchError;
use crate::models::{CrawlState, RawArticleSighting, SearchRequest};
use crate::outputs::{self, ExportError, ExportSummary};
use crate::recency::{admit, extract_relative_phrase};
use crate::register::{ArticleRegister, DerivedFields};
use crate::session::SearchSession;
use crate::utils::{clear_dir, sanitize_file_stem};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Rejections in a row after which the crawl stops.
pub const MAX_NO_VALID_NEWS: usize = 3;

/// Ceiling on `CrawlState::accepted_count`.
pub const MAX_NEWS: usize = 500;

/// Where outputs go and how long to let screenshot I/O settle.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub output_dir: PathBuf,
    /// Parent of the per-search screenshot folders.
    pub pictures_dir: PathBuf,
    pub capture_pause: Duration,
}

impl CrawlSettings {
    /// Settings rooted at `output_dir`, with screenshots under `output_dir/pictures`.
    ///
    /// # Arguments
    ///
    /// * `output_dir` - Directory receiving spreadsheets, archives and screenshots
    /// * `capture_pause` - Sleep after each screenshot so the file is flushed
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let settings = CrawlSettings::new("output", Duration::from_millis(500));
    /// assert_eq!(settings.pictures_dir, PathBuf::from("output/pictures"));
    /// ```
    pub fn new(output_dir: impl Into<PathBuf>, capture_pause: Duration) -> Self {
        let output_dir = output_dir.into();
        Self {
            pictures_dir: output_dir.join("pictures"),
            output_dir,
            capture_pause,
        }
    }

    /// Folder holding the screenshots of the search for `phrase`.
    pub fn pictures_dir_for(&self, phrase: &str) -> PathBuf {
        self.pictures_dir.join(sanitize_file_stem(phrase))
    }
}

/// Why a crawl stopped paging. Every reason leads to the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// [`MAX_NO_VALID_NEWS`] rejections in a row on the last page.
    RejectionStreak,
    /// The next-page control was missing or never settled.
    NoNextPage(String),
    /// Advancing failed for any other reason, e.g. the driver connection dropped.
    AdvanceFailed(String),
    /// `accepted_count` reached [`MAX_NEWS`].
    Ceiling,
    /// A result page after the first could not be read.
    PageUnavailable(String),
}

#[derive(Debug)]
pub struct CrawlSummary {
    pub accepted: usize,
    pub pages_inspected: usize,
    pub stop_reason: StopReason,
    pub export: Option<ExportSummary>,
}

enum Phase<H> {
    FetchingPage,
    InspectingArticles(Vec<RawArticleSighting<H>>),
    AdvancingPage,
    Stopping(StopReason),
}

/// Drives one search's result pages through the admission checks.
pub struct Crawler<'a, S: SearchSession> {
    session: &'a mut S,
    request: &'a SearchRequest,
    settings: CrawlSettings,
    pictures_dir: PathBuf,
    register: ArticleRegister,
    state: CrawlState,
}

impl<'a, S: SearchSession> Crawler<'a, S> {
    /// Create a crawler over a session whose search is already open.
    ///
    /// # Arguments
    ///
    /// * `session` - Session positioned on the first news result page
    /// * `request` - The phrase and recency window being searched
    /// * `settings` - Output locations and the screenshot pause
    ///
    /// # Returns
    ///
    /// A crawler with an empty register; call [`Crawler::run`] to crawl and export.
    pub fn new(session: &'a mut S, request: &'a SearchRequest, settings: CrawlSettings) -> Self {
        Self {
            session,
            request,
            pictures_dir: settings.pictures_dir_for(request.phrase()),
            settings,
            register: ArticleRegister::new(),
            state: CrawlState::default(),
        }
    }

    pub fn register(&self) -> &ArticleRegister {
        &self.register
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    fn at_ceiling(&self) -> bool {
        self.state.accepted_count >= MAX_NEWS
    }

    /// Run the crawl to completion and export whatever was accepted.
    ///
    /// The search's screenshot folder is emptied first so the archive only
    /// holds this crawl's pictures.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Why paging stopped, what was accepted and exported
    /// * `Err(SearchError)` - The first page could not be read, a screenshot
    ///   failed, or the export failed
    #[instrument(level = "info", skip(self), fields(phrase = %self.request.phrase(), window_months = self.request.window_months()))]
    pub async fn run(&mut self) -> Result<CrawlSummary, SearchError> {
        self.state = CrawlState::default();
        clear_dir(&self.pictures_dir).await.map_err(ExportError::from)?;
        let mut phase = Phase::FetchingPage;

        let stop_reason = loop {
            phase = match phase {
                Phase::FetchingPage if self.at_ceiling() => Phase::Stopping(StopReason::Ceiling),
                Phase::FetchingPage => match self.fetch_page().await {
                    Ok(sightings) => Phase::InspectingArticles(sightings),
                    Err(e) if self.state.pages_inspected > 0 => {
                        warn!(error = %e, "Result page unavailable; stopping crawl");
                        Phase::Stopping(StopReason::PageUnavailable(e.to_string()))
                    }
                    Err(e) => return Err(e),
                },
                Phase::InspectingArticles(sightings) => {
                    self.inspect_page(sightings).await?;
                    if self.state.consecutive_rejections >= MAX_NO_VALID_NEWS {
                        Phase::Stopping(StopReason::RejectionStreak)
                    } else if self.at_ceiling() {
                        Phase::Stopping(StopReason::Ceiling)
                    } else {
                        Phase::AdvancingPage
                    }
                }
                Phase::AdvancingPage => {
                    self.state.consecutive_rejections = 0;
                    match self.session.advance_to_next_page().await {
                        Ok(()) => Phase::FetchingPage,
                        Err(e) if e.is_end_of_results() => {
                            info!(error = %e, "No further result page");
                            Phase::Stopping(StopReason::NoNextPage(e.to_string()))
                        }
                        Err(e) => {
                            warn!(error = %e, kind = ?e.kind(), "Page advance failed; stopping crawl");
                            Phase::Stopping(StopReason::AdvanceFailed(e.to_string()))
                        }
                    }
                }
                Phase::Stopping(reason) => break reason,
            };
        };

        info!(
            accepted = self.state.total_accepted(),
            pages = self.state.pages_inspected,
            ?stop_reason,
            "Crawl stopped"
        );

        let export = outputs::export(
            &self.register,
            &self.state,
            self.request.phrase(),
            &self.settings.output_dir,
            &self.pictures_dir,
            chrono::Local::now(),
        )
        .await?;

        Ok(CrawlSummary {
            accepted: self.state.total_accepted(),
            pages_inspected: self.state.pages_inspected,
            stop_reason,
            export,
        })
    }

    async fn fetch_page(&mut self) -> Result<Vec<RawArticleSighting<S::Handle>>, SearchError> {
        let batch = self.session.visible_articles().await?;
        let sightings = batch.into_sightings()?;
        debug!(page = self.state.pages_inspected + 1, count = sightings.len(), "Fetched result page");
        Ok(sightings)
    }

    /// Evaluate every sighting of one page in order.
    async fn inspect_page(&mut self, sightings: Vec<RawArticleSighting<S::Handle>>) -> Result<(), SearchError> {
        self.state.pages_inspected += 1;
        for mut sighting in sightings {
            if self.at_ceiling() {
                info!(max = MAX_NEWS, "Article ceiling reached");
                break;
            }

            let Some(phrase) = extract_relative_phrase(&sighting.relative_date) else {
                debug!(title = %sighting.title, date = %sighting.relative_date, "No relative date; rejected");
                self.state.record_rejection();
                continue;
            };
            sighting.relative_date = phrase.to_string();

            if !admit(&sighting.relative_date, self.request.window_months(), &mut self.state) {
                debug!(title = %sighting.title, date = %sighting.relative_date, "Outside window; rejected");
                continue;
            }
            if !self.register.is_new(&sighting.title, &mut self.state) {
                debug!(title = %sighting.title, "Already registered; rejected");
                continue;
            }
            self.record(&sighting).await?;
        }
        Ok(())
    }

    async fn record(&mut self, sighting: &RawArticleSighting<S::Handle>) -> Result<(), SearchError> {
        let fields = DerivedFields::compute(sighting, self.request.phrase(), &self.state);
        let destination = self.pictures_dir.join(&fields.picture_filename);
        self.session
            .capture_screenshot(&sighting.handle, &destination)
            .await?;
        sleep(self.settings.capture_pause).await;

        match self.register.accept(sighting, fields) {
            Ok(record) => {
                info!(
                    title = %record.title,
                    date = %record.date,
                    picture = %record.picture_filename,
                    occurrences = record.occurrence_count,
                    money = record.contains_money,
                    "Accepted article"
                );
                self.state.record_acceptance();
            }
            Err(e) => {
                warn!(error = %e, "Register refused article");
                self.state.record_rejection();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FailureCode;
    use crate::models::ArticleBatch;
    use crate::session::SearchSession;
    use std::path::Path;

    /// (title, relative date, description)
    pub(crate) type Row = (&'static str, &'static str, &'static str);

    /// Serves canned result pages; advancing past the last page fails.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedSession {
        pub pages: Vec<Vec<Row>>,
        pub current: usize,
        pub fetches: usize,
        pub advances: usize,
        pub captures: Vec<PathBuf>,
        pub fail_open: Option<fn() -> SearchError>,
        pub fail_fetch_on_page: Option<usize>,
        pub fail_advance: Option<fn() -> SearchError>,
        pub closed: bool,
    }

    impl ScriptedSession {
        pub(crate) fn with_pages(pages: Vec<Vec<Row>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }
    }

    impl SearchSession for ScriptedSession {
        type Handle = usize;

        async fn open_search(&mut self, _phrase: &str) -> Result<(), SearchError> {
            match self.fail_open {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        async fn visible_articles(&mut self) -> Result<ArticleBatch<usize>, SearchError> {
            self.fetches += 1;
            if self.fail_fetch_on_page == Some(self.current) {
                return Err(SearchError::Driver("page did not render".to_string()));
            }
            let mut batch = ArticleBatch::default();
            for (i, (title, date, description)) in self.pages[self.current].iter().enumerate() {
                batch.handles.push(i);
                batch.titles.push(title.to_string());
                batch.dates.push(format!("Example Wire · {date}"));
                batch.links.push(format!("https://news.example.com/{}/{}", self.current, i));
                batch.sources.push("Example Wire".to_string());
                batch.descriptions.push(description.to_string());
            }
            Ok(batch)
        }

        async fn advance_to_next_page(&mut self) -> Result<(), SearchError> {
            if let Some(make) = self.fail_advance {
                return Err(make());
            }
            if self.current + 1 >= self.pages.len() {
                return Err(SearchError::MissingElement {
                    name: "button_next".to_string(),
                    locator: "a.next".to_string(),
                    reason: "no next page".to_string(),
                });
            }
            self.advances += 1;
            self.current += 1;
            Ok(())
        }

        async fn capture_screenshot(&mut self, _handle: &usize, destination: &Path) -> Result<(), SearchError> {
            if let Some(dir) = destination.parent() {
                std::fs::create_dir_all(dir).map_err(|e| SearchError::Driver(e.to_string()))?;
            }
            std::fs::write(destination, b"\x89PNG").map_err(|e| SearchError::Driver(e.to_string()))?;
            self.captures.push(destination.to_path_buf());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SearchError> {
            self.closed = true;
            Ok(())
        }
    }

    fn settings(dir: &Path) -> CrawlSettings {
        CrawlSettings::new(dir, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_stale_streak_stops_without_advancing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![
            vec![
                ("Fresh story", "2 days ago", ""),
                ("Old one", "5 months ago", ""),
                ("Older one", "6 months ago", ""),
                ("Oldest one", "7 months ago", ""),
            ],
            vec![("Never seen", "1 day ago", "")],
        ]);
        let request = SearchRequest::new("story", 2).unwrap();
        let summary = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::RejectionStreak);
        assert_eq!(summary.accepted, 1);
        assert_eq!(session.advances, 0);
        assert_eq!(session.fetches, 1);
    }

    #[tokio::test]
    async fn test_mixed_rejections_stop_crawl() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![vec![
            ("Same", "1 day ago", ""),
            ("Same", "1 day ago", ""),
            ("Stale", "3 months ago", ""),
            ("No date", "last spring", ""),
        ]]);
        let request = SearchRequest::new("same", 1).unwrap();
        let mut crawler = Crawler::new(&mut session, &request, settings(tmp.path()));
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::RejectionStreak);
        assert_eq!(crawler.register().size(), 1);
        assert_eq!(crawler.state().consecutive_rejections, 3);
    }

    #[tokio::test]
    async fn test_pages_until_no_next_page() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![
            vec![("A", "1 hour ago", ""), ("B", "2 days ago", "")],
            vec![("C", "1 month ago", ""), ("D", "stale", "")],
            vec![("E", "3 days ago", "")],
        ]);
        let request = SearchRequest::new("x", 2).unwrap();
        let mut crawler = Crawler::new(&mut session, &request, settings(tmp.path()));
        let summary = crawler.run().await.unwrap();

        assert!(matches!(summary.stop_reason, StopReason::NoNextPage(_)));
        assert_eq!(summary.accepted, 4);
        assert_eq!(summary.pages_inspected, 3);
        let titles: Vec<&str> = crawler.register().all().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["E", "C", "B", "A"]);
        let pictures: Vec<&str> = crawler
            .register()
            .all()
            .map(|r| r.picture_filename.as_str())
            .collect();
        assert_eq!(
            pictures,
            vec!["screenshot-4.png", "screenshot-3.png", "screenshot-2.png", "screenshot-1.png"]
        );
        assert_eq!(session.captures.len(), 4);
        assert!(tmp.path().join("pictures").join("x").join("screenshot-4.png").exists());
    }

    #[tokio::test]
    async fn test_streak_resets_between_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![
            vec![("A", "1 day ago", ""), ("Old 1", "9 months ago", ""), ("Old 2", "9 months ago", "")],
            vec![("B", "1 day ago", ""), ("Old 3", "9 months ago", ""), ("Old 4", "9 months ago", "")],
        ]);
        let request = SearchRequest::new("x", 1).unwrap();
        let summary = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.accepted, 2);
        assert_eq!(session.advances, 1);
        assert!(matches!(summary.stop_reason, StopReason::NoNextPage(_)));
    }

    #[tokio::test]
    async fn test_duplicates_across_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![
            vec![("Repeat", "1 day ago", "")],
            vec![("Repeat", "1 day ago", ""), ("Fresh", "1 day ago", "")],
        ]);
        let request = SearchRequest::new("x", 1).unwrap();
        let mut crawler = Crawler::new(&mut session, &request, settings(tmp.path()));
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.accepted, 2);
        let titles: Vec<&str> = crawler.register().all().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Fresh", "Repeat"]);
        // the streak is reset before each advance attempt
        assert_eq!(crawler.state().consecutive_rejections, 0);
    }

    #[tokio::test]
    async fn test_ceiling_stops_crawl() {
        let tmp = tempfile::tempdir().unwrap();
        let titles: Vec<&'static str> = (0..600)
            .map(|i| &*Box::leak(format!("Story {i}").into_boxed_str()))
            .collect();
        let pages: Vec<Vec<Row>> = titles
            .chunks(100)
            .map(|chunk| chunk.iter().map(|t| (*t, "1 hour ago", "")).collect())
            .collect();
        let mut session = ScriptedSession::with_pages(pages);
        let request = SearchRequest::new("story", 1).unwrap();
        let mut crawler = Crawler::new(&mut session, &request, settings(tmp.path()));
        let summary = crawler.run().await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Ceiling);
        assert_eq!(crawler.state().accepted_count, MAX_NEWS);
        assert_eq!(crawler.state().consecutive_rejections, 0);
        assert_eq!(summary.accepted, MAX_NEWS - 1);
        assert_eq!(session.fetches, 5);
    }

    #[tokio::test]
    async fn test_nothing_accepted_writes_no_spreadsheet() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![vec![
            ("Old", "4 months ago", ""),
            ("Older", "5 months ago", ""),
            ("Oldest", "6 months ago", ""),
        ]]);
        let request = SearchRequest::new("x", 1).unwrap();
        let summary = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.accepted, 0);
        assert!(summary.export.is_none());
        let xlsx = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "xlsx"))
            .count();
        assert_eq!(xlsx, 0);
    }

    #[tokio::test]
    async fn test_empty_page_advances() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![vec![], vec![("Late", "1 day ago", "")]]);
        let request = SearchRequest::new("late", 1).unwrap();
        let summary = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.pages_inspected, 2);
        assert_eq!(summary.accepted, 1);
        assert!(summary.export.is_some());
    }

    #[tokio::test]
    async fn test_first_page_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![vec![("A", "1 day ago", "")]]);
        session.fail_fetch_on_page = Some(0);
        let request = SearchRequest::new("a", 1).unwrap();
        let err = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.failure_code(), FailureCode::UncaughtError);
    }

    #[tokio::test]
    async fn test_later_page_failure_exports_accumulated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![
            vec![("A", "1 day ago", "Costs 500 dollars")],
            vec![("B", "1 day ago", "")],
        ]);
        session.fail_fetch_on_page = Some(1);
        let request = SearchRequest::new("a", 1).unwrap();
        let summary = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap();

        assert!(matches!(summary.stop_reason, StopReason::PageUnavailable(_)));
        assert_eq!(summary.accepted, 1);
        let export = summary.export.unwrap();
        assert!(export.spreadsheet.exists());
        assert!(export.archive.exists());
    }

    #[tokio::test]
    async fn test_driver_error_on_advance_still_exports() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = ScriptedSession::with_pages(vec![
            vec![("Kept", "1 day ago", "")],
            vec![("Unreached", "1 day ago", "")],
        ]);
        session.fail_advance = Some(|| SearchError::Driver("cdp websocket closed".to_string()));
        let request = SearchRequest::new("kept", 1).unwrap();
        let summary = Crawler::new(&mut session, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap();

        assert!(matches!(
            &summary.stop_reason,
            StopReason::AdvanceFailed(msg) if msg.contains("cdp websocket closed")
        ));
        assert_eq!(summary.accepted, 1);
        assert_eq!(session.fetches, 1);
        let export = summary.export.unwrap();
        assert!(export.spreadsheet.exists());
        assert_eq!(export.archived_files, 1);
    }

    #[tokio::test]
    async fn test_searches_keep_separate_screenshots() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("pictures").join("second");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("screenshot-7.png"), b"leftover").unwrap();

        let mut first = ScriptedSession::with_pages(vec![vec![("One", "1 day ago", ""), ("Two", "1 day ago", "")]]);
        let request = SearchRequest::new("first", 1).unwrap();
        let first_export = Crawler::new(&mut first, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap()
            .export
            .unwrap();

        let mut second = ScriptedSession::with_pages(vec![vec![("Three", "1 day ago", "")]]);
        let request = SearchRequest::new("second", 1).unwrap();
        let second_export = Crawler::new(&mut second, &request, settings(tmp.path()))
            .run()
            .await
            .unwrap()
            .export
            .unwrap();

        assert_eq!(first_export.archived_files, 2);
        assert_eq!(second_export.archived_files, 1);
        assert_ne!(first_export.archive, second_export.archive);
        assert!(!stale.join("screenshot-7.png").exists());
        assert!(tmp.path().join("pictures").join("first").join("screenshot-2.png").exists());
    }
}
