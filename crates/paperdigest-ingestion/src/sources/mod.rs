//! Paper discovery sources.

pub mod arxiv;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use crate::models::PaperRecord;

/// A category set and date window to search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub categories: Vec<String>,
    /// Inclusive.
    pub start_date: NaiveDate,
    /// Inclusive; sources widen it to the end of the day.
    pub end_date: NaiveDate,
    pub max_results: usize,
}

impl SearchQuery {
    /// Papers submitted on a single day.
    pub fn for_day(categories: Vec<String>, date: NaiveDate, max_results: usize) -> Self {
        Self { categories, start_date: date, end_date: date, max_results }
    }
}

/// Common interface for paper discovery clients.
#[async_trait]
pub trait PaperSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<PaperRecord>>;
}

/// Run a search, logging and swallowing any failure.
pub async fn discover(source: &dyn PaperSearch, query: &SearchQuery) -> Vec<PaperRecord> {
    match source.search(query).await {
        Ok(papers) => papers,
        Err(e) => {
            warn!(error = %e, categories = ?query.categories, "Paper search failed; continuing with no papers");
            Vec::new()
        }
    }
}
