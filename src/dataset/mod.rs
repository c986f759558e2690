//! The committed dataset: one CSV file, one row per article url.
//!
//! - [`table`]: tolerant reader (delimiter fallback, BOM, url header aliases)
//!   and the atomic writer
//! - [`labels`]: the lenient `topics`/`tags` cell parser
//! - [`merge`]: merge-commit with data-loss guards
//! - [`summary`]: freshness overview for readers of the dataset
//!
//! Readers of the dataset never need a lock: it is only ever replaced by
//! renaming a complete temporary file over it. Writers are expected to run
//! one at a time.

pub mod error;
pub mod labels;
pub mod merge;
pub mod summary;
pub mod table;

pub use error::MergeError;
pub use labels::{parse_label_list, render_label_list};
pub use merge::{commit_batch, load_records, merge_commit, write_batch_file, MergeOptions, MergeReport};
pub use summary::DatasetSummary;
pub use table::{Table, CANONICAL_COLUMNS};
