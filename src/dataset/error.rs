use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the merge engine.
///
/// The guard variants mean the committed file was left untouched on purpose.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("malformed table {path}: line {line} has {found} fields, header has {expected}")]
    MalformedRow {
        path: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("both the committed dataset and the batch are empty; nothing to merge")]
    NothingToMerge,

    #[error("committed dataset {path} has {raw_rows} rows but none survived parsing; refusing to overwrite")]
    CommittedParsedEmpty { path: String, raw_rows: usize },

    #[error("merge would shrink history from {before} to {after} unique urls; refusing to overwrite")]
    WouldShrink { before: usize, after: usize },

    #[error("committed dataset looks truncated: {found} unique urls, expected at least {min}")]
    TooFewUrls { found: usize, min: usize },

    #[error("committed history starts at {earliest}, expected on or before {max}")]
    HistoryTooRecent { earliest: NaiveDate, max: NaiveDate },
}

impl MergeError {
    /// Whether the error is a data-loss guard rather than an i/o or parse failure.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            MergeError::NothingToMerge
                | MergeError::CommittedParsedEmpty { .. }
                | MergeError::WouldShrink { .. }
                | MergeError::TooFewUrls { .. }
                | MergeError::HistoryTooRecent { .. }
        )
    }
}
