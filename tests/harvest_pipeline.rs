use chrono::NaiveDate;
use oilfield_news::canon::Vocabulary;
use oilfield_news::dataset::{commit_batch, load_records, MergeOptions};
use oilfield_news::fetch::{Fetch, FetchError};
use oilfield_news::frontier::{hard_stop_date, Frontier};
use oilfield_news::models::StopReason;
use oilfield_news::scrapers::worldoil::WorldOil;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::tempdir;

const NEWS: &str = "https://www.worldoil.com/news";
const NEWS_P2: &str = "https://www.worldoil.com/news?page=2";
const COMPANY: &str = "https://www.worldoil.com/company-news";

/// Canned pages keyed by URL; anything else fails like a dropped connection.
#[derive(Default)]
struct CannedSite {
    pages: Mutex<HashMap<String, String>>,
    fetched: Mutex<Vec<String>>,
}

impl CannedSite {
    fn put(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    fn take_fetched(&self) -> Vec<String> {
        std::mem::take(&mut *self.fetched.lock().unwrap())
    }
}

impl Fetch for CannedSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Transient {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            })
    }
}

fn row(slug: &str, date: &str, labels: &[&str]) -> String {
    let labels: String = labels
        .iter()
        .map(|l| format!(r#"<a href="/tags/{l}">{l}</a>"#))
        .collect();
    format!(
        r#"<div class="news-row">
             <div class="news-title"><a href="/news/{slug}"><h2>{slug}</h2></a></div>
             <div class="news-date">{date}</div>
             <div class="content-topics">{labels}</div>
           </div>"#
    )
}

fn listing(rows: &[String], next: Option<&str>) -> String {
    let pagination = next
        .map(|n| {
            format!(
                r##"<ul class="pagination">
                     <li class="page-item active"><a class="page-link" href="#">1</a></li>
                     <li class="page-item"><a class="page-link" href="{n}">2</a></li>
                   </ul>"##
            )
        })
        .unwrap_or_default();
    format!("<html><body>{}{pagination}</body></html>", rows.concat())
}

fn article(description: &str, labels: &[&str]) -> String {
    let labels: String = labels
        .iter()
        .map(|l| format!(r#"<a href="/topics/{l}">{l}</a>"#))
        .collect();
    format!(
        r#"<html><head><meta name="description" content="{description}"></head>
           <body><div class="content-topics">{labels}</div></body></html>"#
    )
}

fn seed_first_run(site: &CannedSite) {
    site.put(
        NEWS,
        listing(
            &[
                row("lng-deal", "March 6, 2025", &["offshore", "u.s."]),
                row("undated", "Sponsored", &[]),
                row("rig-count", "March 5, 2025", &["Onshore"]),
            ],
            Some("/news?page=2"),
        ),
    );
    site.put(
        NEWS_P2,
        listing(&[row("angola-blocks", "March 3, 2025", &["Angola"])], None),
    );
    site.put(
        COMPANY,
        listing(&[row("lng-deal", "March 6, 2025", &["Offshore"])], None),
    );
    site.put(
        "https://www.worldoil.com/news/lng-deal",
        article("Operator signs lng offtake deal.", &["energy transition", "lng"]),
    );
    site.put(
        "https://www.worldoil.com/news/rig-count",
        article("Rig count slips.", &[]),
    );
    site.put(
        "https://www.worldoil.com/news/angola-blocks",
        article("", &["Offshore"]),
    );
}

#[tokio::test]
async fn crawl_commit_then_hard_stop_on_next_run() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("data").join("news.csv");
    let site = CannedSite::default();
    let vocabulary = Vocabulary::from_terms(["LNG", "U.S."]);
    seed_first_run(&site);

    // First run: nothing committed yet, crawl everything reachable.
    let committed = load_records(&dataset).unwrap();
    assert!(committed.is_empty());
    let hard_stop = hard_stop_date(&committed, &WorldOil);
    assert_eq!(hard_stop, None);

    let starts = vec![NEWS.to_string(), COMPANY.to_string()];
    let batch = Frontier::new(&WorldOil, &site, &vocabulary)
        .with_concurrency(4)
        .harvest(&starts, 0, hard_stop)
        .await;

    assert_eq!(batch.source, "worldoil");
    assert_eq!(batch.stop_reasons, vec![StopReason::NoNextPage, StopReason::NoNextPage]);
    assert_eq!(batch.pages_visited, 3);
    assert_eq!(batch.stubs_skipped, 1);
    assert_eq!(batch.details_failed, 0);
    let urls: Vec<_> = batch.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.worldoil.com/news/lng-deal",
            "https://www.worldoil.com/news/rig-count",
            "https://www.worldoil.com/news/angola-blocks",
        ]
    );

    let lng = &batch.records[0];
    assert_eq!(lng.topics, vec!["Offshore", "Energy Transition"]);
    assert_eq!(lng.tags, vec!["U.S.", "LNG"]);
    assert_eq!(lng.excerpt, "Operator signs lng offtake deal.");
    assert!(batch.records[2].excerpt.is_empty());

    let report = commit_batch(&dataset, &batch, &MergeOptions::default()).unwrap();
    assert_eq!(report.added, 3);
    site.take_fetched();

    // Second run: one new story on top of the already-committed ones.
    site.put(
        NEWS,
        listing(
            &[
                row("new-discovery", "March 8, 2025", &["Offshore"]),
                row("lng-deal", "March 6, 2025", &["Offshore"]),
                row("rig-count", "March 5, 2025", &["Onshore"]),
            ],
            Some("/news?page=2"),
        ),
    );
    site.put(
        "https://www.worldoil.com/news/new-discovery",
        article("Discovery offshore Namibia.", &["Namibia"]),
    );

    let committed = load_records(&dataset).unwrap();
    let hard_stop = hard_stop_date(&committed, &WorldOil);
    assert_eq!(hard_stop, NaiveDate::from_ymd_opt(2025, 3, 6));

    let batch = Frontier::new(&WorldOil, &site, &vocabulary)
        .harvest(&[NEWS.to_string()], 0, hard_stop)
        .await;
    assert_eq!(batch.stop_reasons, vec![StopReason::HardStop]);
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].tags, vec!["Namibia"]);

    let fetched = site.take_fetched();
    assert_eq!(
        fetched,
        vec![NEWS.to_string(), "https://www.worldoil.com/news/new-discovery".to_string()]
    );

    let report = commit_batch(&dataset, &batch, &MergeOptions::default()).unwrap();
    assert_eq!(report.output_rows, 4);
    let records = load_records(&dataset).unwrap();
    assert_eq!(records[0].url, "https://www.worldoil.com/news/new-discovery");
}
