//! Run configuration loaded from YAML.
//!
//! Every section has defaults, so an empty file (or no file at all) gives a
//! working setup that crawls both sites into `data/news.csv`.
//!
//! ```yaml
//! dataset: data/news.csv
//! vocabulary: all_tags.csv
//! crawler:
//!   concurrency: 8
//!   per_host_delay_ms: 350
//!   max_pages: 10
//! sites:
//!   - site: jpt
//!   - site: worldoil
//!     start_urls:
//!       - https://www.worldoil.com/news
//!       - https://www.worldoil.com/company-news
//! guards:
//!   min_unique_urls: 7000
//!   max_earliest_date: 2014-01-01
//! ```

use crate::scrapers::SiteKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Committed dataset (CSV) the merge engine owns.
    pub dataset: PathBuf,
    /// Trusted vocabulary CSV with a `tag` column.
    pub vocabulary: Option<PathBuf>,
    /// When set, every crawl batch is also written here as `<site>_<timestamp>.csv`.
    pub batch_dir: Option<PathBuf>,
    pub crawler: CrawlerConfig,
    pub sites: Vec<SiteConfig>,
    pub guards: GuardConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/news.csv"),
            vocabulary: None,
            batch_dir: None,
            crawler: CrawlerConfig::default(),
            sites: vec![
                SiteConfig {
                    site: SiteKind::Jpt,
                    start_urls: vec![],
                },
                SiteConfig {
                    site: SiteKind::WorldOil,
                    start_urls: vec![],
                },
            ],
            guards: GuardConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub user_agent: String,
    /// Detail fetches in flight per listing page.
    pub concurrency: usize,
    /// Minimum spacing between requests to one host.
    pub per_host_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Listing pages per start URL; 0 means no limit.
    pub max_pages: u32,
    /// Stop paginating once already-committed dates are reached.
    pub hard_stop: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "Mozilla/5.0 (compatible; OilfieldNewsBot/{})",
                env!("CARGO_PKG_VERSION")
            ),
            concurrency: 8,
            per_host_delay_ms: 350,
            timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 10_000,
            max_pages: 10,
            hard_stop: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub site: SiteKind,
    /// Listing URLs to start from; empty uses the site's defaults.
    #[serde(default)]
    pub start_urls: Vec<String>,
}

/// Expectations the committed history must meet before it may be rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub min_unique_urls: Option<usize>,
    /// The earliest committed `published_date` must not be later than this.
    pub max_earliest_date: Option<NaiveDate>,
}

impl HarvestConfig {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(
            dataset = %config.dataset.display(),
            sites = config.sites.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}
