//! Reading and writing the `topics`/`tags` cells.
//!
//! Historic rows store labels in three shapes: a JSON array
//! (`["LNG", "Offshore"]`), a single-quoted literal list
//! (`['LNG', 'Offshore']`) or a plain comma-joined string
//! (`LNG, Offshore`). [`parse_label_list`] accepts all of them with a fixed
//! fallback order: structured list, then comma split, then empty.

use itertools::Itertools;
use serde_json::Value;

/// Parse one label cell into a deduplicated, order-preserving list.
pub fn parse_label_list(cell: &str) -> Vec<String> {
    let s = cell.trim();
    if s.is_empty() {
        return Vec::new();
    }

    let items = if s.starts_with('[') && s.ends_with(']') {
        parse_json_list(s)
            .or_else(|| parse_quoted_list(&s[1..s.len() - 1]))
            .unwrap_or_else(|| split_commas(&s[1..s.len() - 1]))
    } else {
        split_commas(s)
    };

    items
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unique()
        .collect()
}

/// Serialise labels the way new rows are written (a JSON array).
pub fn render_label_list(labels: &[String]) -> String {
    serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string())
}

/// JSON array with scalars rendered as text; `null` entries are dropped.
fn parse_json_list(s: &str) -> Option<Vec<String>> {
    let values: Vec<Value> = serde_json::from_str(s).ok()?;
    Some(
        values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
    )
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).collect()
}

/// `'a', "b", 'c'` with backslash escapes; `None` on anything else.
fn parse_quoted_list(inner: &str) -> Option<Vec<String>> {
    let mut out = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        out.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_list() {
        assert_eq!(parse_label_list(r#"["LNG", "Offshore"]"#), vec!["LNG", "Offshore"]);
    }

    #[test]
    fn test_json_list_with_non_string_items() {
        assert_eq!(parse_label_list(r#"["LNG", 1, null, true]"#), vec!["LNG", "1", "true"]);
        assert_eq!(parse_label_list(r#"["Offshore", 2.5]"#), vec!["Offshore", "2.5"]);
    }

    #[test]
    fn test_single_quoted_list() {
        assert_eq!(
            parse_label_list("['LNG', 'M&A', \"Shell's Prelude\"]"),
            vec!["LNG", "M&A", "Shell's Prelude"]
        );
        assert_eq!(parse_label_list(r"['it\'s']"), vec!["it's"]);
    }

    #[test]
    fn test_comma_joined() {
        assert_eq!(parse_label_list("LNG, Offshore ,,Norway"), vec!["LNG", "Offshore", "Norway"]);
    }

    #[test]
    fn test_broken_bracketed_falls_back_to_comma_split() {
        assert_eq!(parse_label_list("[LNG, 'Offshore]"), vec!["LNG", "'Offshore"]);
    }

    #[test]
    fn test_empty_forms() {
        assert!(parse_label_list("").is_empty());
        assert!(parse_label_list("   ").is_empty());
        assert!(parse_label_list("[]").is_empty());
        assert!(parse_label_list("['', ' ']").is_empty());
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        assert_eq!(parse_label_list("b, a, b"), vec!["b", "a"]);
    }

    #[test]
    fn test_rendered_lists_parse_back() {
        let labels = vec!["LNG".to_string(), "Oil, Gas".to_string()];
        assert_eq!(parse_label_list(&render_label_list(&labels)), labels);
        assert_eq!(render_label_list(&[]), "[]");
    }
}
