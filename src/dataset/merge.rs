//! Merge-commit: fold a batch into the committed dataset without losing history.
//!
//! Steps: read both inputs tolerantly, bring them onto the dataset schema,
//! concatenate (committed first), keep one row per url (newest `scraped_at`,
//! later row on ties), order newest `published_date` first, check the
//! data-loss guards, then replace the committed file atomically. Any guard
//! failure returns an error before the committed file is touched.

use super::error::MergeError;
use super::table::{parse_date, parse_timestamp, Table, CANONICAL_COLUMNS};
use crate::config::GuardConfig;
use crate::models::{Batch, Record};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub guards: GuardConfig,
    /// Compute and check the merge but leave the committed file alone.
    pub dry_run: bool,
}

impl MergeOptions {
    pub fn new(guards: GuardConfig) -> Self {
        Self {
            guards,
            dry_run: false,
        }
    }
}

/// Row counts before and after one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub committed_rows: usize,
    pub committed_unique_urls: usize,
    pub batch_rows: usize,
    /// Rows written; equal to the unique url count.
    pub output_rows: usize,
    /// Urls not present in the committed dataset before.
    pub added: usize,
    pub written: bool,
}

/// Merge the batch file at `batch_path` into `committed_path`.
///
/// Returns the committed row count.
#[instrument(level = "info", skip_all, fields(committed = %committed_path.display(), batch = %batch_path.display()))]
pub fn merge_commit(
    committed_path: &Path,
    batch_path: &Path,
    options: &MergeOptions,
) -> Result<usize, MergeError> {
    let batch = Table::read(batch_path)?;
    let report = merge_table(committed_path, batch, &batch_path.display().to_string(), options)?;
    Ok(report.output_rows)
}

/// Merge an in-process crawl batch into `committed_path`.
#[instrument(level = "info", skip_all, fields(committed = %committed_path.display(), source = %batch.source, records = batch.records.len()))]
pub fn commit_batch(
    committed_path: &Path,
    batch: &Batch,
    options: &MergeOptions,
) -> Result<MergeReport, MergeError> {
    let origin = format!("{} batch", batch.source);
    merge_table(committed_path, Table::from_records(&batch.records), &origin, options)
}

/// Write a crawl batch as `<source>_<started_at>.csv` under `dir`.
///
/// The file can be merged later with [`merge_commit`]; re-merging it is harmless.
pub fn write_batch_file(dir: &Path, batch: &Batch) -> Result<PathBuf, MergeError> {
    let path = dir.join(format!(
        "{}_{}.csv",
        batch.source,
        batch.started_at.format("%Y%m%dT%H%M%SZ")
    ));
    Table::from_records(&batch.records).write_atomic(&path)?;
    info!(path = %path.display(), records = batch.records.len(), "Wrote batch file");
    Ok(path)
}

/// Committed dataset as typed records. A missing file yields no records.
pub fn load_records(path: &Path) -> Result<Vec<Record>, MergeError> {
    let origin = path.display().to_string();
    Ok(Table::read(path)?.normalize(&origin).to_records())
}

fn merge_table(
    committed_path: &Path,
    batch_raw: Table,
    batch_origin: &str,
    options: &MergeOptions,
) -> Result<MergeReport, MergeError> {
    let committed_origin = committed_path.display().to_string();
    let committed_raw = Table::read(committed_path)?;
    let committed_raw_rows = committed_raw.len();

    let committed = committed_raw.normalize(&committed_origin);
    let batch = batch_raw.normalize(batch_origin);

    if committed_raw_rows > 0 && committed.is_empty() {
        error!(raw_rows = committed_raw_rows, "Committed dataset parsed to zero rows");
        return Err(MergeError::CommittedParsedEmpty {
            path: committed_origin,
            raw_rows: committed_raw_rows,
        });
    }
    if committed.is_empty() && batch.is_empty() {
        error!("Both inputs are empty");
        return Err(MergeError::NothingToMerge);
    }
    if committed_raw_rows > 0 {
        check_history(&committed, &options.guards)?;
    }

    let committed_unique = committed.unique_urls();
    let merged = merge_tables(&committed, &batch);
    let output_rows = merged.len();

    if output_rows < committed_unique {
        error!(before = committed_unique, after = output_rows, "Merge would shrink history");
        return Err(MergeError::WouldShrink {
            before: committed_unique,
            after: output_rows,
        });
    }

    let report = MergeReport {
        committed_rows: committed.len(),
        committed_unique_urls: committed_unique,
        batch_rows: batch.len(),
        output_rows,
        added: output_rows - committed_unique,
        written: !options.dry_run,
    };

    if options.dry_run {
        info!(?report, "Dry run; committed file left unchanged");
    } else {
        merged.write_atomic(committed_path)?;
        info!(
            old = report.committed_rows,
            new = report.batch_rows,
            out = report.output_rows,
            added = report.added,
            "Merged"
        );
    }
    Ok(report)
}

/// Refuse to rewrite a committed dataset that looks truncated or mis-parsed.
fn check_history(committed: &Table, guards: &GuardConfig) -> Result<(), MergeError> {
    if let Some(min) = guards.min_unique_urls {
        let found = committed.unique_urls();
        if found < min {
            error!(found, min, "Committed dataset has too few unique urls");
            return Err(MergeError::TooFewUrls { found, min });
        }
    }
    if let Some(max) = guards.max_earliest_date {
        let earliest = committed
            .rows
            .iter()
            .filter_map(|row| parse_date(committed.value(row, "published_date")))
            .min();
        if let Some(earliest) = earliest.filter(|e| *e > max) {
            error!(%earliest, %max, "Committed history starts too late");
            return Err(MergeError::HistoryTooRecent { earliest, max });
        }
    }
    Ok(())
}

/// Output columns: canonical order, then extras in first-seen order.
fn output_columns(inputs: &[&Table]) -> Vec<String> {
    let mut columns: Vec<String> = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
    for table in inputs {
        for c in &table.columns {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
    }
    columns
}

/// Concatenate, dedupe by url and sort. Both inputs must be normalized.
fn merge_tables(committed: &Table, batch: &Table) -> Table {
    let columns = output_columns(&[committed, batch]);

    let rows: Vec<Vec<String>> = [committed, batch]
        .into_iter()
        .flat_map(|table| {
            let indices: Vec<Option<usize>> =
                columns.iter().map(|c| table.column_index(c)).collect();
            table.rows.iter().map(move |row| {
                indices
                    .iter()
                    .map(|i| i.map(|i| row[i].clone()).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut merged = Table { columns, rows };
    let url = merged.column_index("url").unwrap_or_default();
    let scraped = merged.column_index("scraped_at").unwrap_or_default();
    let published = merged.column_index("published_date").unwrap_or_default();

    // Newest scraped_at wins; a parseable timestamp beats a missing one; the
    // later row wins ties.
    let mut winners: HashMap<&str, (Option<DateTime<Utc>>, usize)> = HashMap::new();
    for (i, row) in merged.rows.iter().enumerate() {
        let ts = parse_timestamp(&row[scraped]);
        winners
            .entry(row[url].as_str())
            .and_modify(|best| {
                if ts >= best.0 {
                    *best = (ts, i);
                }
            })
            .or_insert((ts, i));
    }
    let mut keep = vec![false; merged.rows.len()];
    for (_, i) in winners.into_values() {
        keep[i] = true;
    }

    let mut rows: Vec<Vec<String>> = std::mem::take(&mut merged.rows)
        .into_iter()
        .zip(keep)
        .filter_map(|(row, kept)| kept.then_some(row))
        .collect();

    rows.sort_by_cached_key(|row| {
        let date: Option<NaiveDate> = parse_date(&row[published]);
        (
            date.is_none(),
            Reverse(date),
            Reverse(parse_timestamp(&row[scraped])),
        )
    });
    merged.rows = rows;
    merged
}
