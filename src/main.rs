//! # Oilfield News
//!
//! Crawls JPT and World Oil news listings, canonicalizes topic and tag
//! labels, and folds the new articles into one committed CSV history.
//!
//! ## Usage
//!
//! ```sh
//! oilfield_news --config harvest.yaml harvest
//! oilfield_news --dataset data/news.csv merge --batch data/news_new.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Vocabulary**: load the trusted tag list once; it is passed by reference
//! 2. **Crawl**: one frontier per site, hard-stopped at the newest committed date
//! 3. **Commit**: each site's batch is merged in-process, atomically, behind guards
//! 4. **Report**: log a freshness summary of the committed file

use clap::Parser;
use oilfield_news::canon::{CountryAliases, Vocabulary};
use oilfield_news::config::HarvestConfig;
use oilfield_news::dataset::{
    commit_batch, load_records, merge_commit, write_batch_file, DatasetSummary, MergeOptions,
};
use oilfield_news::fetch::build_fetcher;
use oilfield_news::frontier::{hard_stop_date, Frontier};
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("oilfield_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    if let Some(dataset) = args.dataset {
        config.dataset = dataset;
    }

    match args.command {
        Command::Harvest {
            max_pages,
            no_hard_stop,
            dry_run,
        } => {
            if let Some(max_pages) = max_pages {
                config.crawler.max_pages = max_pages;
            }
            if no_hard_stop {
                config.crawler.hard_stop = false;
            }
            harvest(&config, dry_run).await?;
        }
        Command::Merge { batch, dry_run } => {
            let options = MergeOptions {
                guards: config.guards.clone(),
                dry_run,
            };
            let rows = merge_commit(&config.dataset, &batch, &options)?;
            info!(rows, batch = %batch.display(), "Merge complete");
        }
    }

    report_freshness(&config.dataset)?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Crawl every configured site and commit each site's batch.
#[instrument(level = "info", skip_all, fields(dataset = %config.dataset.display(), dry_run = dry_run))]
async fn harvest(config: &HarvestConfig, dry_run: bool) -> Result<(), Box<dyn Error>> {
    let vocabulary = match &config.vocabulary {
        Some(path) => Vocabulary::load(path)?,
        None => Vocabulary::base(),
    };
    let fetcher = build_fetcher(&config.crawler)?;
    let committed = load_records(&config.dataset)?;
    info!(rows = committed.len(), "Loaded committed dataset");

    let options = MergeOptions {
        guards: config.guards.clone(),
        dry_run,
    };

    for site_config in &config.sites {
        let site = site_config.site.site();
        let start_urls = if site_config.start_urls.is_empty() {
            site.default_start_urls()
        } else {
            site_config.start_urls.clone()
        };
        let hard_stop = if config.crawler.hard_stop {
            hard_stop_date(&committed, site.as_ref())
        } else {
            None
        };
        info!(site = %site_config.site, ?hard_stop, starts = start_urls.len(), "Crawling site");

        let batch = Frontier::new(site.as_ref(), &fetcher, &vocabulary)
            .with_concurrency(config.crawler.concurrency)
            .harvest(&start_urls, config.crawler.max_pages, hard_stop)
            .await;

        if let Some(dir) = &config.batch_dir {
            write_batch_file(dir, &batch)?;
        }
        if batch.is_empty() {
            info!(site = %site_config.site, stop = ?batch.stop_reasons, "No new records");
            continue;
        }
        if batch.details_failed > 0 || batch.stubs_skipped > 0 {
            warn!(
                site = %site_config.site,
                failed = batch.details_failed,
                skipped = batch.stubs_skipped,
                "Some items were dropped"
            );
        }

        let report = commit_batch(&config.dataset, &batch, &options)?;
        info!(
            site = %site_config.site,
            added = report.added,
            total = report.output_rows,
            newest = ?batch.newest_published(),
            written = report.written,
            "Batch committed"
        );
    }
    Ok(())
}

fn report_freshness(dataset: &Path) -> Result<(), Box<dyn Error>> {
    let records = load_records(dataset)?;
    let summary = DatasetSummary::from_records(&records, &CountryAliases::standard());
    info!(
        rows = summary.rows,
        latest_scraped_at = ?summary.latest_scraped_at,
        sources = ?summary.per_source,
        countries = summary.countries.len(),
        "Dataset freshness"
    );
    Ok(())
}
