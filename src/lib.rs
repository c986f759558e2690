//! # Oilfield News
//!
//! Harvests oil & gas industry news from JPT and World Oil into one
//! deduplicated CSV history.
//!
//! ## Pipeline
//!
//! 1. **Crawl** ([`frontier`]): paginate each site's listing, fetch article
//!    pages concurrently, stop once already-committed dates show up
//! 2. **Canonicalize** ([`canon`]): one display spelling per topic/tag label
//! 3. **Commit** ([`dataset`]): merge the batch into the committed file,
//!    newest `scraped_at` per url wins, replaced atomically behind
//!    data-loss guards

pub mod canon;
pub mod config;
pub mod dataset;
pub mod fetch;
pub mod frontier;
pub mod models;
pub mod scrapers;
pub mod utils;
