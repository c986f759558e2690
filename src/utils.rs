//! Small text and filesystem helpers shared by the crawler and the merge engine.
//!
//! - Whitespace collapsing and order-preserving label deduplication
//! - String truncation for log previews
//! - Parent-directory creation for output paths

use itertools::Itertools;
use std::io;
use std::path::Path;
use tracing::{debug, instrument};

/// Collapse every run of whitespace into a single space and trim both ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(collapse_whitespace("  LNG \n\t export "), "LNG export");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Whitespace-collapse each label, drop blanks, and dedupe keeping first-seen order.
pub fn clean_list<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| collapse_whitespace(l.as_ref()))
        .filter(|l| !l.is_empty())
        .unique()
        .collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a char boundary) with
/// an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Make sure the directory that will hold `path` exists.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            debug!(dir = %parent.display(), "Parent directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}
