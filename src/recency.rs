//! Relative-date parsing and the recency window check.
//!
//! Result pages label articles with phrases such as `"3 days ago"` or
//! `"2 months ago"`. Anything younger than a month (days, hours, minutes,
//! seconds) is always inside the window; month-old articles are accepted
//! only up to the request's window.

use crate::models::CrawlState;
use chrono::{DateTime, Days, Local, Months, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE_PHRASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\s\w+\sago)").unwrap());
static AGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s(second|minute|hour|day|month)s?\sago$").unwrap());

/// Parsed form of a relative date label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeAge {
    /// Hours, minutes or seconds old.
    Recent,
    Days(u64),
    Months(u32),
    Unknown,
}

/// Pull the first `"<N> <unit> ago"` phrase out of a date element's text.
///
/// Date elements often carry extra text (`"CNN · 3 days ago"`); an element
/// without such a phrase yields `None`.
pub fn extract_relative_phrase(text: &str) -> Option<&str> {
    RELATIVE_PHRASE.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Parse a whole `"<N> <unit> ago"` label.
///
/// # Arguments
///
/// * `text` - The label, already reduced by [`extract_relative_phrase`]
///
/// # Returns
///
/// The age in days or months, [`RelativeAge::Recent`] for sub-day units, and
/// [`RelativeAge::Unknown`] for any other text, including counts too large
/// to represent.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_relative("3 days ago"), RelativeAge::Days(3));
/// assert_eq!(parse_relative("yesterday"), RelativeAge::Unknown);
/// ```
pub fn parse_relative(text: &str) -> RelativeAge {
    let Some(caps) = AGE.captures(text.trim()) else {
        return RelativeAge::Unknown;
    };
    let count = &caps[1];
    match &caps[2] {
        "day" => count.parse().map_or(RelativeAge::Unknown, RelativeAge::Days),
        "month" => count.parse().map_or(RelativeAge::Unknown, RelativeAge::Months),
        _ if count.parse::<u64>().is_ok() => RelativeAge::Recent,
        _ => RelativeAge::Unknown,
    }
}

/// Whether an article labelled `relative_date` falls inside `window_months`.
pub fn classify(relative_date: &str, window_months: u32) -> bool {
    match parse_relative(relative_date) {
        RelativeAge::Recent | RelativeAge::Days(_) => true,
        RelativeAge::Months(n) => n <= window_months,
        RelativeAge::Unknown => false,
    }
}

/// [`classify`], counting a rejection against the crawl's streak.
pub fn admit(relative_date: &str, window_months: u32, state: &mut CrawlState) -> bool {
    let accepted = classify(relative_date, window_months);
    if !accepted {
        state.record_rejection();
    }
    accepted
}

/// Render the display date of an accepted article relative to now.
pub fn format_date(relative_date: &str) -> String {
    format_date_at(relative_date, Local::now())
}

/// Render the display date of an accepted article relative to `now`.
///
/// Day-old articles render as `DD/MM/YYYY`, month-old ones as `Mon/YYYY`;
/// everything else renders as today.
pub fn format_date_at<Tz: TimeZone>(relative_date: &str, now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match parse_relative(relative_date) {
        RelativeAge::Days(days) => match now.clone().checked_sub_days(Days::new(days)) {
            Some(date) => date.format("%d/%m/%Y").to_string(),
            None => now.format("%d/%m/%Y").to_string(),
        },
        RelativeAge::Months(months) => match now.clone().checked_sub_months(Months::new(months)) {
            Some(date) => date.format("%b/%Y").to_string(),
            None => now.format("%d/%m/%Y").to_string(),
        },
        RelativeAge::Recent | RelativeAge::Unknown => now.format("%d/%m/%Y").to_string(),
    }
}
