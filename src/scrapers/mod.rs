//! Site extractors: page HTML in, structured fields out.
//!
//! Each supported site exposes the same two-level topology:
//!
//! 1. **Listing** pages with item stubs (link, title, a date-bearing byline)
//!    and a "next page" link
//! 2. **Detail** pages carrying the article's topic and tag labels
//!
//! # Supported Sources
//!
//! | Site | Module | Listing item | Detail labels |
//! |------|--------|--------------|---------------|
//! | JPT | [`jpt`] | `div.PromoB` | `ArticlePage-tags` blocks |
//! | WorldOil | [`worldoil`] | `div.news-row` | `div.content-topics` links |
//!
//! Extractors never fail: a page whose structure does not match yields empty
//! stubs or empty labels, and the frontier decides what that means.

pub mod jpt;
pub mod worldoil;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::utils::collapse_whitespace;

static MONTH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),\s+(\d{4})\b",
    )
    .unwrap()
});

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Identifier of a supported site, as used in config files and the `source` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    Jpt,
    WorldOil,
}

impl SiteKind {
    pub fn id(self) -> &'static str {
        match self {
            SiteKind::Jpt => "jpt",
            SiteKind::WorldOil => "worldoil",
        }
    }

    /// Extractor for this site.
    pub fn site(self) -> Box<dyn Site> {
        match self {
            SiteKind::Jpt => Box::new(jpt::Jpt),
            SiteKind::WorldOil => Box::new(worldoil::WorldOil),
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One item of a listing page, before its detail page is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingStub {
    /// Absolute article URL.
    pub url: String,
    pub title: String,
    pub excerpt: String,
    /// Raw text the date was parsed from, kept for logging.
    pub byline: String,
    /// `None` when the byline carries no `Month D, YYYY` date.
    pub published_date: Option<NaiveDate>,
    /// Labels already visible on the listing.
    pub topics: Vec<String>,
    pub tags: Vec<String>,
}

/// Everything extracted from one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Stubs in page order (newest first on both sites).
    pub stubs: Vec<ListingStub>,
    /// Absolute URL of the next listing page.
    pub next_url: Option<String>,
}

/// Labels (and possibly an excerpt) found on a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetail {
    pub topics: Vec<String>,
    pub tags: Vec<String>,
    pub excerpt: Option<String>,
}

/// A fixed site topology.
pub trait Site: Send + Sync {
    fn kind(&self) -> SiteKind;

    /// Value written to the `source` column.
    fn id(&self) -> &'static str {
        self.kind().id()
    }

    /// Listing URLs crawled when the configuration names none.
    fn default_start_urls(&self) -> Vec<String>;

    /// Whether `url` points at this site (used to attribute legacy rows
    /// without a `source`).
    fn owns_url(&self, url: &str) -> bool;

    fn parse_listing(&self, page_url: &Url, html: &str) -> ListingPage;

    fn parse_detail(&self, stub: &ListingStub, html: &str) -> ArticleDetail;
}

/// Parse the first `Month D, YYYY` date found in free text.
pub fn parse_month_date(text: &str) -> Option<NaiveDate> {
    let caps = MONTH_DATE_RE.captures(text)?;
    let month = MONTHS.iter().position(|m| *m == &caps[1])? as u32 + 1;
    let day = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// All descendant text of an element, whitespace-collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Resolve an `href` against the page it was found on.
pub(crate) fn resolve_href(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

pub(crate) fn host_matches(url: &str, hosts: &[&str]) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| hosts.contains(&h)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_date_from_byline() {
        assert_eq!(
            parse_month_date("By Jane Doe, JPT Technology Editor  March 4, 2025"),
            NaiveDate::from_ymd_opt(2025, 3, 4)
        );
        assert_eq!(
            parse_month_date("December 31,\n 2019 | News"),
            NaiveDate::from_ymd_opt(2019, 12, 31)
        );
    }

    #[test]
    fn test_parse_month_date_rejects_other_formats() {
        assert_eq!(parse_month_date("2025-03-04"), None);
        assert_eq!(parse_month_date("Mar 4, 2025"), None);
        assert_eq!(parse_month_date("February 30, 2025"), None);
        assert_eq!(parse_month_date(""), None);
    }

    #[test]
    fn test_site_kind_ids() {
        assert_eq!(SiteKind::Jpt.to_string(), "jpt");
        assert_eq!(SiteKind::WorldOil.site().id(), "worldoil");
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("https://jpt.spe.org/x", &["jpt.spe.org"]));
        assert!(!host_matches("https://example.com/x", &["jpt.spe.org"]));
        assert!(!host_matches("not a url", &["jpt.spe.org"]));
    }
}
