//! Tolerant reading and atomic writing of the row-oriented dataset file.

use super::error::MergeError;
use super::labels::{parse_label_list, render_label_list};
use crate::models::Record;
use crate::utils::ensure_parent_dir;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Output column order; extra columns follow in first-seen order.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "source",
    "url",
    "title",
    "excerpt",
    "published_date",
    "topics",
    "tags",
    "scraped_at",
];

/// Header names accepted for the identity column, in priority order.
const URL_HEADERS: [&str; 4] = ["url", "link", "permalink", "href"];

/// Header row plus string cells. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
    move |source| MergeError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn clean_header(h: &str) -> String {
    h.trim().trim_start_matches('\u{feff}').trim().to_string()
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` under column `name`, or `""` when the column is absent.
    pub fn value<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.column_index(name)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Number of distinct non-empty urls.
    pub fn unique_urls(&self) -> usize {
        let Some(i) = self.column_index("url") else {
            return 0;
        };
        self.rows
            .iter()
            .map(|r| r[i].as_str())
            .filter(|u| !u.is_empty())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Read a table from disk. A missing file reads as an empty table.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self, MergeError> {
        if !path.exists() {
            info!("No file yet; treating as empty");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(io_err(path))?;
        let table = Self::parse(&raw, &path.display().to_string())?;
        debug!(rows = table.len(), columns = table.columns.len(), "Read table");
        Ok(table)
    }

    /// Parse delimited text, preferring comma, then tab, then a sniffed delimiter.
    ///
    /// A delimiter is accepted when it yields a url header and no row longer
    /// than that header. Rows with extra cells are never cut down: when no
    /// delimiter reads cleanly the first [`MergeError::MalformedRow`] is
    /// returned.
    pub fn parse(raw: &str, origin: &str) -> Result<Self, MergeError> {
        let raw = raw.trim_start_matches('\u{feff}');
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut malformed = None;
        for delimiter in [b',', b'\t'] {
            match Self::parse_with(raw, delimiter, origin) {
                Ok(table) if table.has_url_header() => {
                    if delimiter == b'\t' {
                        warn!(%origin, "No clean url table with comma delimiter; read as tab-separated");
                    }
                    return Ok(table);
                }
                Ok(_) => {}
                Err(err @ MergeError::MalformedRow { .. }) => {
                    debug!(%origin, delimiter = %(delimiter as char), error = %err, "Delimiter rejected");
                    malformed.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        let delimiter = sniff_delimiter(raw);
        warn!(%origin, delimiter = %(delimiter as char), "No url column with comma or tab; using sniffed delimiter");
        match (Self::parse_with(raw, delimiter, origin), malformed) {
            (Ok(table), _) if table.has_url_header() => Ok(table),
            (Ok(_), Some(err)) | (Err(MergeError::MalformedRow { .. }), Some(err)) => Err(err),
            (result, _) => result,
        }
    }

    fn parse_with(raw: &str, delimiter: u8, origin: &str) -> Result<Self, MergeError> {
        let csv_err = |source: csv::Error| MergeError::Csv {
            path: origin.to_string(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(raw.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(clean_header)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            if record.len() > columns.len() {
                return Err(MergeError::MalformedRow {
                    path: origin.to_string(),
                    line: record.position().map_or(0, |p| p.line()),
                    expected: columns.len(),
                    found: record.len(),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    fn has_url_header(&self) -> bool {
        self.columns
            .iter()
            .any(|c| URL_HEADERS.contains(&c.to_lowercase().as_str()))
    }

    /// Bring a raw table onto the dataset schema.
    ///
    /// Maps a url alias header onto `url`, adds missing canonical columns as
    /// empty, trims canonical cells and drops rows without a url. Extra
    /// columns are kept as read.
    pub fn normalize(mut self, origin: &str) -> Self {
        if self.column_index("url").is_none() {
            let alias = URL_HEADERS.iter().find_map(|candidate| {
                self.columns
                    .iter()
                    .position(|c| c.to_lowercase() == *candidate)
            });
            if let Some(i) = alias {
                debug!(%origin, from = %self.columns[i], "Using column as url");
                self.columns[i] = "url".to_string();
            }
        }

        let mut synthesized = Vec::new();
        for name in CANONICAL_COLUMNS {
            if self.column_index(name).is_none() {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                synthesized.push(name);
            }
        }
        if !synthesized.is_empty() && !self.rows.is_empty() {
            warn!(%origin, columns = ?synthesized, "Missing columns filled with empty values");
        }

        let canonical: Vec<usize> = CANONICAL_COLUMNS
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        for row in &mut self.rows {
            for &i in &canonical {
                let trimmed = row[i].trim();
                if trimmed.len() != row[i].len() {
                    row[i] = trimmed.to_string();
                }
            }
        }

        let url = self.column_index("url").unwrap_or_default();
        let before = self.rows.len();
        self.rows.retain(|row| !row[url].is_empty());
        let dropped = before - self.rows.len();
        if dropped > 0 {
            warn!(%origin, dropped, "Dropped rows without url");
        }
        self
    }

    /// Rows for freshly harvested records, in canonical column order.
    pub fn from_records(records: &[Record]) -> Self {
        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.source.clone(),
                    r.url.clone(),
                    r.title.clone(),
                    r.excerpt.clone(),
                    r.published_date.map(|d| d.to_string()).unwrap_or_default(),
                    render_label_list(&r.topics),
                    render_label_list(&r.tags),
                    format_timestamp(&r.scraped_at),
                ]
            })
            .collect();
        Self {
            columns: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Typed view of a normalized table.
    ///
    /// Unparseable `scraped_at` values read as the Unix epoch so they never
    /// look fresh.
    pub fn to_records(&self) -> Vec<Record> {
        let mut stale = 0usize;
        let records = self
            .rows
            .iter()
            .map(|row| {
                let scraped_at = parse_timestamp(self.value(row, "scraped_at")).unwrap_or_else(|| {
                    stale += 1;
                    DateTime::<Utc>::UNIX_EPOCH
                });
                Record {
                    source: self.value(row, "source").to_string(),
                    url: self.value(row, "url").to_string(),
                    title: self.value(row, "title").to_string(),
                    excerpt: self.value(row, "excerpt").to_string(),
                    published_date: parse_date(self.value(row, "published_date")),
                    topics: parse_label_list(self.value(row, "topics")),
                    tags: parse_label_list(self.value(row, "tags")),
                    scraped_at,
                }
            })
            .collect();
        if stale > 0 {
            warn!(rows = stale, "Rows without a parseable scraped_at");
        }
        records
    }

    /// Write to a temporary sibling, fsync, then rename over `path`.
    ///
    /// Readers of `path` see either the previous file or the complete new one.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), rows = self.rows.len()))]
    pub fn write_atomic(&self, path: &Path) -> Result<(), MergeError> {
        ensure_parent_dir(path).map_err(io_err(path))?;
        let tmp = temp_path(path);

        let result = self
            .write_to(&tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(io_err(path)));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;
        info!("Committed");
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), MergeError> {
        let file = File::create(path).map_err(io_err(path))?;
        let mut writer = csv::Writer::from_writer(file);
        let csv_err = |source: csv::Error| MergeError::Csv {
            path: path.display().to_string(),
            source,
        };
        writer.write_record(&self.columns).map_err(csv_err)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_err)?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| io_err(path)(e.into_error()))?;
        file.sync_all().map_err(io_err(path))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset.csv".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Most frequent candidate delimiter in the header line; comma on ties.
fn sniff_delimiter(raw: &str) -> u8 {
    let header = raw.lines().next().unwrap_or_default();
    [b'|', b';', b'\t', b',']
        .into_iter()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .unwrap_or(b',')
}

/// `scraped_at` as written: RFC 3339, second precision, `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Lenient timestamp parse: RFC 3339, `YYYY-MM-DD HH:MM:SS[.f][+hh:mm]`,
/// naive date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// Lenient calendar-date parse: `YYYY-MM-DD`, optionally followed by a time.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}
