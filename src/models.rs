//! Data models for harvested articles and crawl batches.
//!
//! - [`Record`]: one harvested article, the unit the dataset is made of
//! - [`Batch`]: the records of one crawl run plus provenance metadata
//! - [`StopReason`]: why the frontier stopped paginating

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single harvested article.
///
/// `url` is the identity key of the committed dataset: after a merge no two
/// rows share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Site id the article was harvested from (`jpt`, `worldoil`).
    pub source: String,
    /// Absolute article URL.
    pub url: String,
    pub title: String,
    pub excerpt: String,
    /// Calendar publication date. `None` sorts last.
    pub published_date: Option<NaiveDate>,
    /// Canonical topic labels, deduplicated.
    pub topics: Vec<String>,
    /// Canonical tag labels, deduplicated.
    pub tags: Vec<String>,
    /// When the detail page was fetched.
    pub scraped_at: DateTime<Utc>,
}

/// Why a crawl run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A listing stub dated on or before the hard-stop date was reached.
    HardStop,
    /// `max_pages` listing pages were processed.
    PageBudget,
    /// The last listing page had no next link.
    NoNextPage,
    /// A listing page could not be fetched even after retries.
    ListingFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::HardStop => "hard_stop",
            StopReason::PageBudget => "page_budget",
            StopReason::NoNextPage => "no_next_page",
            StopReason::ListingFailed => "listing_failed",
        };
        f.write_str(s)
    }
}

/// The output of one crawl of one site, handed to the merge engine in-process.
///
/// Re-merging the same batch is harmless: the merge dedupes on `url` and keeps
/// the newest `scraped_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Site id.
    pub source: String,
    /// Listing URLs the crawl started from.
    pub start_urls: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Hard-stop date the crawl ran with, if any.
    pub hard_stop: Option<NaiveDate>,
    /// Listing pages fetched across all start URLs.
    pub pages_visited: u32,
    /// Listing stubs dropped because no date could be parsed.
    pub stubs_skipped: usize,
    /// Detail fetches dropped after exhausting retries.
    pub details_failed: usize,
    /// Stop reason of each start URL, in order.
    pub stop_reasons: Vec<StopReason>,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Newest publication date among the batch records.
    pub fn newest_published(&self) -> Option<NaiveDate> {
        self.records.iter().filter_map(|r| r.published_date).max()
    }
}
