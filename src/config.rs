//! Runtime configuration loaded from a YAML file.
//!
//! The crawler treats configuration as opaque, named lookups: URLs, pause
//! durations, retry budgets and element locators are all addressed by a
//! logical key. The file is read once at startup and handed to the session
//! and crawler explicitly.
//!
//! # Example
//!
//! ```yaml
//! urls:
//!   news_website: https://www.example-news.com
//! pauses:
//!   short: 2.0
//!   super_short: 0.5
//! retries:
//!   normal_task: 3
//! elements:
//!   button_accept_all: "css:button#accept-all"
//!   search_bar: "input[name=q]"
//! browser:
//!   headless: true
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

pub const WEBSITE_URL: &str = "news_website";

pub const PAUSE_SHORT: &str = "short";
pub const PAUSE_SUPER_SHORT: &str = "super_short";

pub const RETRIES_NORMAL_TASK: &str = "normal_task";

pub const BUTTON_ACCEPT_ALL: &str = "button_accept_all";
pub const SEARCH_BAR: &str = "search_bar";
pub const SEARCH_BUTTON: &str = "search_button";
pub const TAB_NEWS: &str = "tab_news";
pub const BUTTON_NEXT: &str = "button_next";
pub const ALL_NEWS: &str = "all_news";
pub const ALL_NEWS_DATE: &str = "all_news_date";
pub const ALL_NEWS_LINK: &str = "all_news_link";
pub const ALL_NEWS_SOURCE: &str = "all_news_source";
pub const ALL_NEWS_DESCRIPTION: &str = "all_news_description";

const REQUIRED_ELEMENTS: &[&str] = &[
    BUTTON_ACCEPT_ALL,
    SEARCH_BAR,
    SEARCH_BUTTON,
    TAB_NEWS,
    BUTTON_NEXT,
    ALL_NEWS,
    ALL_NEWS_DATE,
    ALL_NEWS_LINK,
    ALL_NEWS_SOURCE,
    ALL_NEWS_DESCRIPTION,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("missing {section} entry '{key}' in configuration")]
    MissingKey { section: &'static str, key: String },

    #[error("invalid {section} entry '{key}': {reason}")]
    Invalid {
        section: &'static str,
        key: String,
        reason: String,
    },
}

/// Browser launch options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    /// The search opens its results in a second window that must be switched to.
    pub results_in_new_window: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            results_in_new_window: true,
            window_width: 1366,
            window_height: 768,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub urls: HashMap<String, String>,
    /// Pause durations in seconds.
    #[serde(default)]
    pub pauses: HashMap<String, f64>,
    #[serde(default)]
    pub retries: HashMap<String, u32>,
    #[serde(default)]
    pub elements: HashMap<String, String>,
    #[serde(default)]
    pub browser: BrowserOptions,
}

impl Config {
    /// Load and validate the configuration at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(
            elements = config.elements.len(),
            pauses = config.pauses.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every key the search session relies on is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let website = self.url(WEBSITE_URL)?;
        url::Url::parse(website).map_err(|e| ConfigError::Invalid {
            section: "urls",
            key: WEBSITE_URL.to_string(),
            reason: e.to_string(),
        })?;
        self.pause(PAUSE_SHORT)?;
        self.pause(PAUSE_SUPER_SHORT)?;
        self.retries(RETRIES_NORMAL_TASK)?;
        for name in REQUIRED_ELEMENTS {
            self.element(name)?;
        }
        Ok(())
    }

    pub fn url(&self, name: &str) -> Result<&str, ConfigError> {
        self.urls
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKey {
                section: "urls",
                key: name.to_string(),
            })
    }

    pub fn pause(&self, name: &str) -> Result<Duration, ConfigError> {
        let secs = *self.pauses.get(name).ok_or_else(|| ConfigError::MissingKey {
            section: "pauses",
            key: name.to_string(),
        })?;
        Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
            section: "pauses",
            key: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn retries(&self, name: &str) -> Result<u32, ConfigError> {
        self.retries
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::MissingKey {
                section: "retries",
                key: name.to_string(),
            })
    }

    /// Locator for a logical element, with any `css:` prefix stripped.
    pub fn element(&self, name: &str) -> Result<&str, ConfigError> {
        let locator = self
            .elements
            .get(name)
            .ok_or_else(|| ConfigError::MissingKey {
                section: "elements",
                key: name.to_string(),
            })?;
        Ok(locator.strip_prefix("css:").unwrap_or(locator).trim())
    }
}
