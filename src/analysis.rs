//! Text analysis for accepted articles: phrase occurrences and money mentions.

use once_cell::sync::Lazy;
use regex::Regex;

/// `$1,250.00`, or a number followed by the whole word `dollars` / `USD`.
static MONEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[\d,.]+|\d+\s?(?i:dollars|usd)\b").unwrap());

/// Case-insensitive, non-overlapping count of `phrase` in `text`.
pub fn count_occurrences(text: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    text.to_lowercase().matches(&phrase.to_lowercase()).count()
}

/// Occurrences of `phrase` across an article's title and description.
pub fn phrase_occurrences(title: &str, description: &str, phrase: &str) -> usize {
    count_occurrences(title, phrase) + count_occurrences(description, phrase)
}

/// Whether an article mentions an amount of money.
///
/// Title and description are joined with a separating space before matching,
/// so a match never straddles the two.
///
/// # Arguments
///
/// * `title` - The article title
/// * `description` - The article description, possibly empty
///
/// # Examples
///
/// ```ignore
/// assert!(mentions_money("Prices rise", "now $1,250.00"));
/// assert!(mentions_money("Fine of 500 USD", ""));
/// assert!(!mentions_money("I have no money", ""));
/// ```
pub fn mentions_money(title: &str, description: &str) -> bool {
    MONEY.is_match(&format!("{title}  {description}"))
}
