//! Journal of Petroleum Technology (<https://jpt.spe.org>) extractor.
//!
//! # Listing
//!
//! `https://jpt.spe.org/latest-news` renders one `div.PromoB` per article with
//! the link in `div.PromoB-title`, an excerpt in `div.PromoB-description` and
//! an author/date byline in `div.PromoB-by-line`. Pagination goes through
//! `div.ListE-nextPage a[rel='next']`.
//!
//! # Detail
//!
//! Labels live in `div.ArticlePage-tags-container`, split into a "Topics" and a
//! "Tags" block. When the blocks are missing their headings, any `/topic/` or
//! `/tag/` link inside the container is taken instead.

use super::{element_text, host_matches, resolve_href, ArticleDetail, ListingPage, ListingStub, Site, SiteKind};
use crate::utils::clean_list;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const START_URL: &str = "https://jpt.spe.org/latest-news";
const HOSTS: &[&str] = &["jpt.spe.org"];

fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

static PROMO: Lazy<Selector> = Lazy::new(|| sel("div.PromoB"));
static PROMO_LINK: Lazy<Selector> = Lazy::new(|| sel("div.PromoB-title a[href]"));
static PROMO_DESCRIPTION: Lazy<Selector> = Lazy::new(|| sel("div.PromoB-description"));
static PROMO_BYLINE: Lazy<Selector> = Lazy::new(|| sel("div.PromoB-by-line"));
static NEXT_PAGE: Lazy<Selector> = Lazy::new(|| sel("div.ListE-nextPage a[rel='next']"));

static TAG_BLOCKS: Lazy<Selector> =
    Lazy::new(|| sel("div.ArticlePage-tags-container div.ArticlePage-tags"));
static BLOCK_HEADING: Lazy<Selector> = Lazy::new(|| sel("h2"));
static BLOCK_TOPIC_LINKS: Lazy<Selector> =
    Lazy::new(|| sel("div.ArticlePage-tags-list a[href*='/topic/']"));
static BLOCK_TAG_LINKS: Lazy<Selector> =
    Lazy::new(|| sel("div.ArticlePage-tags-list a[href*='/tag/']"));
static FALLBACK_TOPIC_LINKS: Lazy<Selector> =
    Lazy::new(|| sel("div.ArticlePage-tags-container a[href*='/topic/']"));
static FALLBACK_TAG_LINKS: Lazy<Selector> =
    Lazy::new(|| sel("div.ArticlePage-tags-container a[href*='/tag/']"));

#[derive(Debug, Clone, Copy, Default)]
pub struct Jpt;

fn texts(root: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    root.select(selector).map(element_text).collect()
}

impl Site for Jpt {
    fn kind(&self) -> SiteKind {
        SiteKind::Jpt
    }

    fn default_start_urls(&self) -> Vec<String> {
        vec![START_URL.to_string()]
    }

    fn owns_url(&self, url: &str) -> bool {
        host_matches(url, HOSTS)
    }

    fn parse_listing(&self, page_url: &Url, html: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let mut stubs = Vec::new();

        for promo in document.select(&PROMO) {
            let Some(link) = promo.select(&PROMO_LINK).next() else {
                continue;
            };
            let Some(url) = link
                .value()
                .attr("href")
                .and_then(|href| resolve_href(page_url, href))
            else {
                continue;
            };

            let excerpt = promo
                .select(&PROMO_DESCRIPTION)
                .next()
                .map(element_text)
                .unwrap_or_default();
            let byline = texts(promo, &PROMO_BYLINE).join(" ");

            stubs.push(ListingStub {
                url,
                title: element_text(link),
                excerpt,
                published_date: super::parse_month_date(&byline),
                byline,
                topics: vec![],
                tags: vec![],
            });
        }

        let next_url = document
            .select(&NEXT_PAGE)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_href(page_url, href));

        debug!(page = %page_url, stubs = stubs.len(), next = ?next_url, "Parsed JPT listing");
        ListingPage { stubs, next_url }
    }

    fn parse_detail(&self, _stub: &ListingStub, html: &str) -> ArticleDetail {
        let document = Html::parse_document(html);
        let mut topics = Vec::new();
        let mut tags = Vec::new();

        for block in document.select(&TAG_BLOCKS) {
            let heading = block
                .select(&BLOCK_HEADING)
                .map(element_text)
                .collect::<Vec<_>>()
                .join(" ");
            if heading.contains("Topics") {
                topics.extend(texts(block, &BLOCK_TOPIC_LINKS));
            }
            if heading.contains("Tags") {
                tags.extend(texts(block, &BLOCK_TAG_LINKS));
            }
        }

        if topics.is_empty() {
            topics.extend(document.select(&FALLBACK_TOPIC_LINKS).map(element_text));
        }
        if tags.is_empty() {
            tags.extend(document.select(&FALLBACK_TAG_LINKS).map(element_text));
        }

        ArticleDetail {
            topics: clean_list(topics),
            tags: clean_list(tags),
            excerpt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const LISTING: &str = r#"
<html><body>
  <div class="PromoB">
    <div class="PromoB-title"><a href="/energy-transition/first-story">First   story</a></div>
    <div class="PromoB-description">Operators expand CCS pilots.</div>
    <div class="PromoB-by-line">By <span>Staff</span> <span>March 4, 2025</span></div>
  </div>
  <div class="PromoB">
    <div class="PromoB-title"><a href="https://jpt.spe.org/second">Second</a></div>
    <div class="PromoB-by-line">Undated byline</div>
  </div>
  <div class="PromoB">
    <div class="PromoB-title"><span>no link here</span></div>
  </div>
  <div class="ListE-nextPage"><a rel="next" href="/latest-news?p=2">Next</a></div>
</body></html>"#;

    const DETAIL: &str = r#"
<html><body>
  <div class="ArticlePage-tags-container">
    <div class="ArticlePage-tags">
      <h2>Topics</h2>
      <div class="ArticlePage-tags-list">
        <a href="/topic/production">Production</a>
        <a href="/topic/production">Production</a>
        <a href="/topic/digital">Digital  Transformation</a>
      </div>
    </div>
    <div class="ArticlePage-tags">
      <h2>Tags</h2>
      <div class="ArticlePage-tags-list">
        <a href="/tag/lng">lng</a>
        <a href="/tag/norway">Norway</a>
      </div>
    </div>
  </div>
</body></html>"#;

    #[test]
    fn test_parse_listing() {
        let page = Url::parse("https://jpt.spe.org/latest-news").unwrap();
        let listing = Jpt.parse_listing(&page, LISTING);

        assert_eq!(listing.stubs.len(), 2);
        let first = &listing.stubs[0];
        assert_eq!(first.url, "https://jpt.spe.org/energy-transition/first-story");
        assert_eq!(first.title, "First story");
        assert_eq!(first.excerpt, "Operators expand CCS pilots.");
        assert_eq!(first.published_date, NaiveDate::from_ymd_opt(2025, 3, 4));

        assert_eq!(listing.stubs[1].published_date, None);
        assert_eq!(
            listing.next_url.as_deref(),
            Some("https://jpt.spe.org/latest-news?p=2")
        );
    }

    #[test]
    fn test_parse_detail_primary_blocks() {
        let detail = Jpt.parse_detail(&ListingStub::default(), DETAIL);
        assert_eq!(detail.topics, vec!["Production", "Digital Transformation"]);
        assert_eq!(detail.tags, vec!["lng", "Norway"]);
        assert_eq!(detail.excerpt, None);
    }

    #[test]
    fn test_parse_detail_fallback_without_headings() {
        let html = r#"
<div class="ArticlePage-tags-container">
  <a href="/topic/drilling">Drilling</a>
  <a href="/tag/hpht">HPHT</a>
</div>"#;
        let detail = Jpt.parse_detail(&ListingStub::default(), html);
        assert_eq!(detail.topics, vec!["Drilling"]);
        assert_eq!(detail.tags, vec!["HPHT"]);
    }

    #[test]
    fn test_unexpected_structure_degrades_to_empty() {
        let page = Url::parse("https://jpt.spe.org/latest-news").unwrap();
        let listing = Jpt.parse_listing(&page, "<html><body><p>maintenance</p></body></html>");
        assert!(listing.stubs.is_empty());
        assert!(listing.next_url.is_none());

        let detail = Jpt.parse_detail(&ListingStub::default(), "");
        assert!(detail.topics.is_empty() && detail.tags.is_empty());
    }

    #[test]
    fn test_owns_url() {
        assert!(Jpt.owns_url("https://jpt.spe.org/anything"));
        assert!(!Jpt.owns_url("https://www.worldoil.com/news"));
    }
}
