//! The article register: accepted articles, newest first.
//!
//! Titles are unique across the register (exact, case-sensitive match).
//! The crawler checks [`ArticleRegister::is_new`] before building a record,
//! and [`ArticleRegister::accept`] refuses duplicates on its own as well.

use crate::analysis::{mentions_money, phrase_occurrences};
use crate::models::{ArticleRecord, CrawlState, RawArticleSighting};
use crate::recency::format_date;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("article '{0}' is already registered")]
    DuplicateTitle(String),
}

/// Fields computed once for each accepted sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFields {
    pub date: String,
    pub picture_filename: String,
    pub occurrence_count: usize,
    pub contains_money: bool,
}

impl DerivedFields {
    pub fn compute<H>(sighting: &RawArticleSighting<H>, phrase: &str, state: &CrawlState) -> Self {
        Self {
            date: format_date(&sighting.relative_date),
            picture_filename: state.picture_filename(),
            occurrence_count: phrase_occurrences(&sighting.title, &sighting.description, phrase),
            contains_money: mentions_money(&sighting.title, &sighting.description),
        }
    }
}

#[derive(Debug, Default)]
pub struct ArticleRegister {
    records: VecDeque<ArticleRecord>,
}

impl ArticleRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.records.iter().any(|r| r.title == title)
    }

    /// Deduplication check; a known title counts against the rejection streak.
    pub fn is_new(&self, title: &str, state: &mut CrawlState) -> bool {
        if self.contains_title(title) {
            state.record_rejection();
            return false;
        }
        true
    }

    /// Record a sighting at the front of the register.
    ///
    /// # Arguments
    ///
    /// * `sighting` - The admitted article
    /// * `fields` - Values derived from it by [`DerivedFields::compute`]
    ///
    /// # Returns
    ///
    /// The stored record, or [`RegisterError::DuplicateTitle`] when the title is
    /// already registered. The register is unchanged in that case.
    pub fn accept<H>(
        &mut self,
        sighting: &RawArticleSighting<H>,
        fields: DerivedFields,
    ) -> Result<&ArticleRecord, RegisterError> {
        if self.contains_title(&sighting.title) {
            return Err(RegisterError::DuplicateTitle(sighting.title.clone()));
        }
        self.records.push_front(ArticleRecord {
            title: sighting.title.clone(),
            source: sighting.source.clone(),
            date: fields.date,
            description: sighting.description.clone(),
            link: sighting.link.clone(),
            picture_filename: fields.picture_filename,
            occurrence_count: fields.occurrence_count,
            contains_money: fields.contains_money,
        });
        Ok(&self.records[0])
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Records in register order: most recently accepted first.
    pub fn all(&self) -> impl Iterator<Item = &ArticleRecord> {
        self.records.iter()
    }
}
