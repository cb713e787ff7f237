//! Chrome-backed search session.
//!
//! Drives a real browser over the DevTools protocol: opens the configured
//! news website, submits the phrase, switches to the news results and pages
//! through them. Element locators are CSS selectors looked up by logical
//! name in [`Config`].
//!
//! Any failing step saves `error_screenshot.png` (full page) next to the
//! other outputs before the error is returned.

use super::SearchSession;
use crate::config::{self, Config};
use crate::error::SearchError;
use crate::models::ArticleBatch;
use crate::retry::wait_until_succeeds;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BrowserSession {
    config: Arc<Config>,
    evidence_path: PathBuf,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("evidence_path", &self.evidence_path)
            .field("open", &self.browser.is_some())
            .finish()
    }
}

fn driver(e: CdpError) -> SearchError {
    SearchError::Driver(e.to_string())
}

impl BrowserSession {
    pub fn new(config: Arc<Config>, output_dir: &Path) -> Self {
        Self {
            config,
            evidence_path: output_dir.join("error_screenshot.png"),
            browser: None,
            handler: None,
            page: None,
        }
    }

    fn page(&self) -> Result<&Page, SearchError> {
        self.page
            .as_ref()
            .ok_or_else(|| SearchError::Driver("no page is open".to_string()))
    }

    fn browser(&self) -> Result<&Browser, SearchError> {
        self.browser
            .as_ref()
            .ok_or_else(|| SearchError::Driver("browser is not running".to_string()))
    }

    fn short_pause(&self) -> Result<Duration, SearchError> {
        Ok(self.config.pause(config::PAUSE_SHORT)?)
    }

    async fn find(&self, name: &str) -> Result<Element, SearchError> {
        let locator = self.config.element(name)?;
        self.page()?
            .find_element(locator)
            .await
            .map_err(|e| SearchError::MissingElement {
                name: name.to_string(),
                locator: locator.to_string(),
                reason: e.to_string(),
            })
    }

    async fn find_all(&self, name: &str) -> Result<Vec<Element>, SearchError> {
        let locator = self.config.element(name)?;
        self.page()?
            .find_elements(locator)
            .await
            .map_err(|e| SearchError::MissingElement {
                name: name.to_string(),
                locator: locator.to_string(),
                reason: e.to_string(),
            })
    }

    /// Save a full-page screenshot, then hand the error back.
    async fn with_evidence<T>(&self, step: &str, result: Result<T, SearchError>) -> Result<T, SearchError> {
        if let Err(e) = &result {
            error!(%step, error = %e, "Search session step failed");
            self.save_error_evidence().await;
        }
        result
    }

    async fn save_error_evidence(&self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };
        let params = ScreenshotParams::builder().full_page(true).build();
        match page.save_screenshot(params, &self.evidence_path).await {
            Ok(_) => info!(path = %self.evidence_path.display(), "Saved error evidence"),
            Err(e) => warn!(error = %e, "Could not save error evidence"),
        }
    }

    /// Fail fast when the website cannot be reached at all.
    #[instrument(level = "info", skip(self))]
    async fn probe_site(&self, url: &str) -> Result<(), SearchError> {
        let unavailable = |reason: String| SearchError::UnavailableSite {
            url: url.to_string(),
            reason,
        };
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| unavailable(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if response.status().is_server_error() {
            return Err(unavailable(format!("server answered {}", response.status())));
        }
        debug!(status = %response.status(), "Website reachable");
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn launch(&mut self, url: &str) -> Result<(), SearchError> {
        let options = &self.config.browser;
        let mut builder = BrowserConfig::builder().window_size(options.window_width, options.window_height);
        if !options.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(SearchError::Driver)?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(driver)?;
        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler error (continuing)");
                }
            }
            debug!("CDP handler task completed");
        }));
        self.browser = Some(browser);

        let page = self
            .browser()?
            .new_page(url)
            .await
            .map_err(|e| SearchError::UnavailableSite {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        self.page = Some(page);
        info!("Browser opened successfully");
        Ok(())
    }

    async fn dismiss_consent_popup(&self) -> Result<(), SearchError> {
        match self.find(config::BUTTON_ACCEPT_ALL).await {
            Ok(button) => {
                if button.click().await.is_ok() {
                    sleep(self.short_pause()?).await;
                    return Ok(());
                }
                info!("Consent popup could not be clicked");
            }
            Err(_) => info!("No consent popup shown"),
        }
        Ok(())
    }

    async fn submit_phrase(&self, phrase: &str) -> Result<(), SearchError> {
        let retries = self.config.retries(config::RETRIES_NORMAL_TASK)?;
        let search_bar = wait_until_succeeds(retries, self.short_pause()?, "wait_for_search_bar", move || {
            self.find(config::SEARCH_BAR)
        })
        .await?;
        search_bar
            .click()
            .await
            .map_err(driver)?
            .type_str(phrase)
            .await
            .map_err(driver)?;
        self.find(config::SEARCH_BUTTON)
            .await?
            .click()
            .await
            .map_err(driver)?;
        Ok(())
    }

    /// Switch to the results window and open the news tab.
    async fn navigate_news_section(&self) -> Result<Page, SearchError> {
        let current = self.page()?;
        let page = if self.config.browser.results_in_new_window {
            let pages = self.browser()?.pages().await.map_err(driver)?;
            let found = pages.len();
            pages
                .into_iter()
                .find(|p| p.target_id() != current.target_id())
                .ok_or(SearchError::WindowNotFound { expected: 2, found })?
        } else {
            current.clone()
        };

        let locator = self.config.element(config::TAB_NEWS)?;
        let tab = page
            .find_element(locator)
            .await
            .map_err(|e| SearchError::MissingElement {
                name: config::TAB_NEWS.to_string(),
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        tab.click().await.map_err(|e| SearchError::Navigation(e.to_string()))?;
        sleep(self.short_pause()?).await;
        Ok(page)
    }

    async fn element_text(element: &Element) -> Result<String, SearchError> {
        Ok(element
            .inner_text()
            .await
            .map_err(driver)?
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    async fn texts(&self, name: &str) -> Result<Vec<String>, SearchError> {
        let mut texts = Vec::new();
        for element in self.find_all(name).await? {
            texts.push(Self::element_text(&element).await?);
        }
        Ok(texts)
    }

    /// Title (the link's `title` attribute, else its text) and resolved href of each link.
    async fn titles_and_links(&self) -> Result<(Vec<String>, Vec<String>), SearchError> {
        let base = self
            .page()?
            .url()
            .await
            .map_err(driver)?
            .and_then(|u| Url::parse(&u).ok());

        let mut titles = Vec::new();
        let mut links = Vec::new();
        for link in self.find_all(config::ALL_NEWS_LINK).await? {
            let title = match link.attribute("title").await.map_err(driver)? {
                Some(title) if !title.trim().is_empty() => title.trim().to_string(),
                _ => Self::element_text(&link).await?,
            };
            let href = link.attribute("href").await.map_err(driver)?.unwrap_or_default();
            let href = match base.as_ref().and_then(|b| b.join(&href).ok()) {
                Some(resolved) => resolved.to_string(),
                None => href,
            };
            titles.push(title);
            links.push(href);
        }
        Ok((titles, links))
    }

    async fn collect_batch(&self) -> Result<ArticleBatch<Element>, SearchError> {
        let handles = self.find_all(config::ALL_NEWS).await?;
        let dates = self.texts(config::ALL_NEWS_DATE).await?;
        let (titles, links) = self.titles_and_links().await?;
        let sources = self.texts(config::ALL_NEWS_SOURCE).await?;
        let descriptions = self.texts(config::ALL_NEWS_DESCRIPTION).await?;
        Ok(ArticleBatch {
            handles,
            titles,
            dates,
            links,
            sources,
            descriptions,
        })
    }

    async fn click_next(&self) -> Result<(), SearchError> {
        self.find(config::BUTTON_NEXT)
            .await?
            .click()
            .await
            .map_err(|e| SearchError::Navigation(e.to_string()))?;
        sleep(self.short_pause()?).await;
        Ok(())
    }
}

impl SearchSession for BrowserSession {
    type Handle = Element;

    #[instrument(level = "info", skip(self))]
    async fn open_search(&mut self, phrase: &str) -> Result<(), SearchError> {
        let url = self.config.url(config::WEBSITE_URL)?.to_string();
        self.probe_site(&url).await?;
        let launched = self.launch(&url).await;
        self.with_evidence("open_news_web", launched).await?;

        self.dismiss_consent_popup().await?;
        let submitted = self.submit_phrase(phrase).await;
        self.with_evidence("generate_search_with_phrase", submitted).await?;

        let retries = self.config.retries(config::RETRIES_NORMAL_TASK)?;
        let interval = self.short_pause()?;
        let this = &*self;
        let navigated = wait_until_succeeds(retries, interval, "navigate_news_section", move || {
            this.navigate_news_section()
        })
        .await;
        let page = self.with_evidence("navigate_news_section", navigated).await?;
        self.page = Some(page);
        info!("News results opened");
        Ok(())
    }

    async fn visible_articles(&mut self) -> Result<ArticleBatch<Element>, SearchError> {
        let batch = self.collect_batch().await;
        let batch = self.with_evidence("get_visible_articles", batch).await?;
        debug!(count = batch.handles.len(), "Collected visible articles");
        Ok(batch)
    }

    async fn advance_to_next_page(&mut self) -> Result<(), SearchError> {
        let advanced = self.click_next().await;
        self.with_evidence("next_page", advanced).await
    }

    async fn capture_screenshot(&mut self, handle: &Element, destination: &Path) -> Result<(), SearchError> {
        let result = async {
            if let Some(dir) = destination.parent() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| SearchError::Driver(e.to_string()))?;
            }
            handle
                .save_screenshot(CaptureScreenshotFormat::Png, destination)
                .await
                .map_err(driver)?;
            Ok::<(), SearchError>(())
        }
        .await;
        self.with_evidence("screenshot", result).await
    }

    async fn close(&mut self) -> Result<(), SearchError> {
        self.page = None;
        let closed = match self.browser.take() {
            Some(mut browser) => browser.close().await.map(|_| ()).map_err(driver),
            None => Ok(()),
        };
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        debug!("Browser closed");
        closed
    }
}
