use crate::canon::{extract_countries, CountryAliases};
use crate::models::Record;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// What a reader of the committed dataset sees at a glance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub latest_scraped_at: Option<DateTime<Utc>>,
    /// Rows per `source`; legacy rows without one count under `unknown`.
    pub per_source: BTreeMap<String, usize>,
    /// Country codes found in any row's tags.
    pub countries: BTreeSet<String>,
}

impl DatasetSummary {
    pub fn from_records(records: &[Record], countries: &CountryAliases) -> Self {
        let per_source = records
            .iter()
            .map(|r| {
                if r.source.is_empty() {
                    "unknown".to_string()
                } else {
                    r.source.clone()
                }
            })
            .counts()
            .into_iter()
            .collect();

        Self {
            rows: records.len(),
            latest_scraped_at: records.iter().map(|r| r.scraped_at).max(),
            per_source,
            countries: records
                .iter()
                .flat_map(|r| extract_countries(&r.tags, countries))
                .collect(),
        }
    }
}
