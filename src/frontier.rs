//! Crawl frontier: paginates a site's listing, schedules detail fetches, and
//! stops early once already-committed dates show up.
//!
//! # States
//!
//! ```text
//! LISTING(n) --stubs--> DETAIL(n) --next link, budget left--> LISTING(n+1)
//!      |                   |
//!      | fetch failed      +--hard stop / budget spent / no next link--> STOPPED
//!      +------------------------------------------------------------> STOPPED
//! ```
//!
//! Listing pages are fetched strictly one at a time: the hard-stop decision and
//! the next link both come from the current page. Detail pages of one listing
//! page are fetched concurrently (bounded by `concurrency`); the per-host delay
//! lives in the fetcher.
//!
//! The hard stop assumes stubs are listed newest first. The first stub dated on
//! or before the hard-stop date ends the run: later stubs on that page are not
//! scheduled and no further listing page is fetched. Detail fetches scheduled
//! before that stub still complete.

use crate::canon::Vocabulary;
use crate::fetch::Fetch;
use crate::models::{Batch, Record, StopReason};
use crate::scrapers::{ListingStub, Site};
use crate::utils::truncate_for_log;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where and how far one crawl goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlPlan {
    pub start_url: String,
    /// Listing pages to visit; 0 means until the site runs out.
    pub max_pages: u32,
    /// Stop at the first stub dated on or before this date.
    pub hard_stop: Option<NaiveDate>,
}

/// Result of crawling from one start URL.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub records: Vec<Record>,
    pub pages_visited: u32,
    pub stubs_skipped: usize,
    pub details_failed: usize,
    pub stop_reason: StopReason,
}

impl CrawlOutcome {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            pages_visited: 0,
            stubs_skipped: 0,
            details_failed: 0,
            stop_reason: StopReason::NoNextPage,
        }
    }
}

/// What follows the detail phase of a listing page.
#[derive(Debug)]
enum AfterDetails {
    Listing(String),
    Stop(StopReason),
}

#[derive(Debug)]
enum FrontierState {
    Listing { page: u32, url: String },
    Detail { page: u32, stubs: Vec<ListingStub>, then: AfterDetails },
    Stopped(StopReason),
}

/// Drives one site's crawl.
pub struct Frontier<'a, F> {
    site: &'a dyn Site,
    fetcher: &'a F,
    vocabulary: &'a Vocabulary,
    concurrency: usize,
}

impl<'a, F: Fetch> Frontier<'a, F> {
    pub fn new(site: &'a dyn Site, fetcher: &'a F, vocabulary: &'a Vocabulary) -> Self {
        Self {
            site,
            fetcher,
            vocabulary,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Crawl from a single start URL.
    pub async fn run(&self, plan: &CrawlPlan) -> CrawlOutcome {
        let mut seen = HashSet::new();
        self.run_with_seen(plan, &mut seen).await
    }

    /// Crawl every start URL in order and collect one [`Batch`].
    ///
    /// A URL scheduled from one start URL is not scheduled again from another.
    #[instrument(level = "info", skip_all, fields(site = self.site.id()))]
    pub async fn harvest(
        &self,
        start_urls: &[String],
        max_pages: u32,
        hard_stop: Option<NaiveDate>,
    ) -> Batch {
        let started_at = Utc::now();
        let mut seen = HashSet::new();
        let mut batch = Batch {
            source: self.site.id().to_string(),
            start_urls: start_urls.to_vec(),
            started_at,
            finished_at: started_at,
            hard_stop,
            pages_visited: 0,
            stubs_skipped: 0,
            details_failed: 0,
            stop_reasons: Vec::with_capacity(start_urls.len()),
            records: Vec::new(),
        };

        for start_url in start_urls {
            let plan = CrawlPlan {
                start_url: start_url.clone(),
                max_pages,
                hard_stop,
            };
            let outcome = self.run_with_seen(&plan, &mut seen).await;
            batch.pages_visited += outcome.pages_visited;
            batch.stubs_skipped += outcome.stubs_skipped;
            batch.details_failed += outcome.details_failed;
            batch.stop_reasons.push(outcome.stop_reason);
            batch.records.extend(outcome.records);
        }

        batch.finished_at = Utc::now();
        info!(
            records = batch.records.len(),
            pages = batch.pages_visited,
            skipped = batch.stubs_skipped,
            failed = batch.details_failed,
            "Harvest finished"
        );
        batch
    }

    #[instrument(level = "info", skip_all, fields(site = self.site.id(), start = %plan.start_url))]
    async fn run_with_seen(&self, plan: &CrawlPlan, seen: &mut HashSet<String>) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::new();
        let mut visited_pages = HashSet::new();
        let mut state = FrontierState::Listing {
            page: 1,
            url: plan.start_url.clone(),
        };

        loop {
            state = match state {
                FrontierState::Listing { page, url } => {
                    visited_pages.insert(url.clone());
                    self.visit_listing(plan, page, &url, seen, &visited_pages, &mut outcome)
                        .await
                }
                FrontierState::Detail { page, stubs, then } => {
                    let scheduled = stubs.len();
                    let records = self.fetch_details(stubs).await;
                    let failed = scheduled - records.len();
                    outcome.details_failed += failed;
                    outcome.records.extend(records);
                    debug!(page, scheduled, failed, "Detail phase done");
                    match then {
                        AfterDetails::Listing(url) => FrontierState::Listing {
                            page: page + 1,
                            url,
                        },
                        AfterDetails::Stop(reason) => FrontierState::Stopped(reason),
                    }
                }
                FrontierState::Stopped(reason) => {
                    outcome.stop_reason = reason;
                    break;
                }
            };
        }

        info!(
            records = outcome.records.len(),
            pages = outcome.pages_visited,
            stop = %outcome.stop_reason,
            "Crawl stopped"
        );
        outcome
    }

    /// LISTING(page): fetch, extract stubs, apply the hard stop, decide what comes next.
    async fn visit_listing(
        &self,
        plan: &CrawlPlan,
        page: u32,
        url: &str,
        seen: &mut HashSet<String>,
        visited_pages: &HashSet<String>,
        outcome: &mut CrawlOutcome,
    ) -> FrontierState {
        let page_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(%url, error = %e, "Invalid listing URL");
                return FrontierState::Stopped(StopReason::ListingFailed);
            }
        };
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, page, error = %e, "Listing fetch failed; stopping this crawl");
                return FrontierState::Stopped(StopReason::ListingFailed);
            }
        };
        outcome.pages_visited += 1;

        let listing = self.site.parse_listing(&page_url, &html);
        if listing.stubs.is_empty() {
            warn!(%url, page, preview = %truncate_for_log(&html, 200), "Listing page yielded no items");
        }

        let mut scheduled = Vec::new();
        let mut hard_stopped = false;
        for stub in listing.stubs {
            let Some(date) = stub.published_date else {
                outcome.stubs_skipped += 1;
                warn!(url = %stub.url, byline = %stub.byline, "No parseable date on listing item; skipping");
                continue;
            };
            if let Some(stop) = plan.hard_stop {
                if date <= stop {
                    info!(url = %stub.url, %date, hard_stop = %stop, "Reached already-committed date; stopping");
                    hard_stopped = true;
                    break;
                }
            }
            if !seen.insert(stub.url.clone()) {
                debug!(url = %stub.url, "Already scheduled in this run");
                continue;
            }
            scheduled.push(stub);
        }

        let then = if hard_stopped {
            AfterDetails::Stop(StopReason::HardStop)
        } else if plan.max_pages != 0 && page >= plan.max_pages {
            AfterDetails::Stop(StopReason::PageBudget)
        } else {
            match listing.next_url {
                Some(next) if visited_pages.contains(&next) => {
                    warn!(%next, "Next link points at an already visited page");
                    AfterDetails::Stop(StopReason::NoNextPage)
                }
                Some(next) => AfterDetails::Listing(next),
                None => AfterDetails::Stop(StopReason::NoNextPage),
            }
        };

        info!(page, scheduled = scheduled.len(), "Listing page processed");
        FrontierState::Detail {
            page,
            stubs: scheduled,
            then,
        }
    }

    /// DETAIL: fetch scheduled stubs concurrently, keeping listing order.
    async fn fetch_details(&self, stubs: Vec<ListingStub>) -> Vec<Record> {
        stream::iter(stubs)
            .map(|stub| self.fetch_detail(stub))
            .buffered(self.concurrency)
            .filter_map(std::future::ready)
            .collect()
            .await
    }

    async fn fetch_detail(&self, stub: ListingStub) -> Option<Record> {
        let html = match self.fetcher.fetch(&stub.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %stub.url, error = %e, "Detail fetch failed; dropping item");
                return None;
            }
        };
        let detail = self.site.parse_detail(&stub, &html);
        if detail.topics.is_empty() && detail.tags.is_empty() {
            debug!(url = %stub.url, "Detail page carried no labels");
        }

        let excerpt = if stub.excerpt.is_empty() {
            detail.excerpt.unwrap_or_default()
        } else {
            stub.excerpt
        };
        Some(Record {
            source: self.site.id().to_string(),
            url: stub.url,
            title: stub.title,
            excerpt,
            published_date: stub.published_date,
            topics: self
                .vocabulary
                .canonicalize_all(stub.topics.iter().chain(detail.topics.iter())),
            tags: self
                .vocabulary
                .canonicalize_all(stub.tags.iter().chain(detail.tags.iter())),
            scraped_at: Utc::now(),
        })
    }
}

/// Newest committed publication date belonging to `site`.
///
/// Rows count when their `source` is the site id, or when `source` is empty
/// and the URL is on the site's host.
pub fn hard_stop_date(records: &[Record], site: &dyn Site) -> Option<NaiveDate> {
    records
        .iter()
        .filter(|r| r.source == site.id() || (r.source.is_empty() && site.owns_url(&r.url)))
        .filter_map(|r| r.published_date)
        .max()
}
