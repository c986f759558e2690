//! World Oil (<https://www.worldoil.com>) extractor.
//!
//! `/news`, `/company-news` and the `/topics/*` sections share one listing
//! layout: `div.news-row` items carrying title, date and a strip of labels.
//! Labels mix the site's five topics with free tags (companies, countries).
//! Rows listed under `/company-news` also get the "Company News" topic.

use super::{element_text, host_matches, resolve_href, ArticleDetail, ListingPage, ListingStub, Site, SiteKind};
use crate::utils::{clean_list, collapse_whitespace};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const BASE: &str = "https://www.worldoil.com";
const HOSTS: &[&str] = &["www.worldoil.com", "worldoil.com"];
const COMPANY_NEWS: &str = "Company News";

const TOPIC_WHITELIST: &[&str] = &[
    "onshore",
    "offshore",
    "digital transformation",
    "energy transition",
    "industry & analysis",
];

fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

static ROW: Lazy<Selector> = Lazy::new(|| sel("div.news-row"));
static ROW_LINK: Lazy<Selector> = Lazy::new(|| sel("div.news-title a[href]"));
static ROW_TITLE: Lazy<Selector> = Lazy::new(|| sel("div.news-title h2"));
static ROW_DATE: Lazy<Selector> = Lazy::new(|| sel("div.news-date"));
static ROW_LABELS: Lazy<Selector> = Lazy::new(|| sel("div.content-topics a"));

static NEXT_AFTER_ACTIVE: Lazy<Selector> =
    Lazy::new(|| sel("ul.pagination li.page-item.active + li.page-item a.page-link"));
static PAGE_LINKS: Lazy<Selector> = Lazy::new(|| sel("ul.pagination a.page-link"));
static CHEVRON_RIGHT: Lazy<Selector> = Lazy::new(|| sel("i.bi-chevron-right"));
static REL_NEXT: Lazy<Selector> = Lazy::new(|| sel("a[rel='next']"));

static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| sel("meta[name='description']"));
static FIRST_PARAGRAPH: Lazy<Selector> = Lazy::new(|| sel("article p, .article p, .content p"));
static DETAIL_LABELS: Lazy<Selector> = Lazy::new(|| sel("div.content-topics a"));
static DETAIL_LABELS_FALLBACK: Lazy<Selector> = Lazy::new(|| sel("a[href^='/topics/']"));

#[derive(Debug, Clone, Copy, Default)]
pub struct WorldOil;

/// Split raw labels into whitelisted topics and free tags.
pub fn split_topics_tags<I, S>(labels: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    clean_list(labels)
        .into_iter()
        .partition(|l| TOPIC_WHITELIST.contains(&l.to_lowercase().as_str()))
}

fn next_page(document: &Html, page_url: &Url) -> Option<String> {
    let href = document
        .select(&NEXT_AFTER_ACTIVE)
        .next()
        .and_then(|a| a.value().attr("href"))
        .or_else(|| {
            document
                .select(&PAGE_LINKS)
                .find(|a| a.select(&CHEVRON_RIGHT).next().is_some())
                .and_then(|a| a.value().attr("href"))
        })
        .or_else(|| {
            document
                .select(&REL_NEXT)
                .next()
                .and_then(|a| a.value().attr("href"))
        })?;
    resolve_href(page_url, href)
}

impl Site for WorldOil {
    fn kind(&self) -> SiteKind {
        SiteKind::WorldOil
    }

    fn default_start_urls(&self) -> Vec<String> {
        vec![format!("{BASE}/news")]
    }

    fn owns_url(&self, url: &str) -> bool {
        host_matches(url, HOSTS)
    }

    fn parse_listing(&self, page_url: &Url, html: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let company_section = page_url.path().contains("/company-news");
        let mut stubs = Vec::new();

        for row in document.select(&ROW) {
            let Some(link) = row.select(&ROW_LINK).next() else {
                continue;
            };
            let Some(url) = link
                .value()
                .attr("href")
                .and_then(|href| resolve_href(page_url, href))
            else {
                continue;
            };

            let mut title = collapse_whitespace(
                &row.select(&ROW_TITLE).map(element_text).collect::<Vec<_>>().join(" "),
            );
            if title.is_empty() {
                title = element_text(link);
            }
            let byline = row
                .select(&ROW_DATE)
                .map(element_text)
                .collect::<Vec<_>>()
                .join(" ");

            let (mut topics, tags) = split_topics_tags(row.select(&ROW_LABELS).map(element_text));
            if company_section && !topics.iter().any(|t| t == COMPANY_NEWS) {
                topics.push(COMPANY_NEWS.to_string());
            }

            stubs.push(ListingStub {
                url,
                title,
                excerpt: String::new(),
                published_date: super::parse_month_date(&byline),
                byline,
                topics,
                tags,
            });
        }

        let next_url = next_page(&document, page_url);
        debug!(page = %page_url, stubs = stubs.len(), next = ?next_url, "Parsed WorldOil listing");
        ListingPage { stubs, next_url }
    }

    fn parse_detail(&self, _stub: &ListingStub, html: &str) -> ArticleDetail {
        let document = Html::parse_document(html);

        let excerpt = document
            .select(&META_DESCRIPTION)
            .next()
            .and_then(|m| m.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|e| !e.is_empty())
            .or_else(|| {
                document
                    .select(&FIRST_PARAGRAPH)
                    .next()
                    .map(element_text)
                    .filter(|e| !e.is_empty())
            });

        let mut labels: Vec<String> = document.select(&DETAIL_LABELS).map(element_text).collect();
        if labels.is_empty() {
            labels = document
                .select(&DETAIL_LABELS_FALLBACK)
                .map(element_text)
                .collect();
        }
        let (topics, tags) = split_topics_tags(labels);

        ArticleDetail {
            topics,
            tags,
            excerpt,
        }
    }
}
