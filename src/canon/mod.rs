//! Canonical spelling of topic and tag labels.
//!
//! Source sites spell the same label in many ways ("lng", "Lng", "LNG",
//! "co₂ capture", "CO2 capture"). Everything that ends up in the dataset goes
//! through [`Vocabulary::canonicalize`] so the display layer and the dedupe
//! logic see one spelling per label.
//!
//! # Casing rules
//!
//! A phrase is split on whitespace, `-` and `/` (separators are kept) and every
//! word is rendered by the first matching rule:
//!
//! 1. Acronym-like (in the [`AcronymSet`], `1-4 letters + 1-3 digits`, all caps,
//!    or carrying `&`/`.` next to a letter): fully upper-cased.
//! 2. Intentional inner casing (`iPhone`, `McDermott`): kept as is.
//! 3. Anything else: first letter upper, the rest lower.
//!
//! The trusted vocabulary wins over the heuristic: a phrase whose lower-cased
//! form is a vocabulary entry gets that entry's canonical spelling.

pub mod countries;

use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub use countries::{extract_countries, CountryAliases};

/// Acronyms and unit codes every run starts from.
pub const BASE_ACRONYMS: &[&str] = &[
    "AI", "ML", "US", "UK", "UAE", "LNG", "CCS", "CO2", "CO₂", "M&A", "HSE", "OPEC", "NGL",
    "FPSO", "FLNG", "EOR", "IOR", "NPT", "R&D", "API", "ISO", "NACE", "IIoT", "OT", "IT",
    "SCADA", "PLC", "DCS", "ESG", "GHG",
];

static LETTERS_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{1,4}[0-9]{1,3}$").unwrap());
static ALL_CAPS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,}$").unwrap());
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+|[-/]").unwrap());
static VOCAB_ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9&./-]{2,}$").unwrap());

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("failed reading vocabulary {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("vocabulary {path} has no `tag` column")]
    MissingTagColumn { path: String },
}

/// Case-folded set of tokens that render fully upper-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcronymSet(HashSet<String>);

impl AcronymSet {
    /// The fixed [`BASE_ACRONYMS`] list.
    pub fn base() -> Self {
        Self(BASE_ACRONYMS.iter().map(|a| a.to_uppercase()).collect())
    }

    /// Base list extended with acronym-looking vocabulary entries.
    ///
    /// An entry is taken when it is at least two characters of upper-case
    /// letters, digits, `&`, `.`, `/` or `-` with at least one letter, or when it
    /// carries `&`/`.` next to any letter.
    pub fn from_vocabulary<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::base();
        for term in terms {
            let t = collapse_whitespace(term.as_ref());
            if t.is_empty() {
                continue;
            }
            let has_upper = t.chars().any(|c| c.is_ascii_uppercase());
            if (VOCAB_ACRONYM_RE.is_match(&t) && has_upper) || has_amp_or_dot_with_letter(&t) {
                set.0.insert(t.to_uppercase());
            }
        }
        set
    }

    /// Case-insensitive membership.
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(&token.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn has_amp_or_dot_with_letter(t: &str) -> bool {
    t.contains(['&', '.']) && t.chars().any(|c| c.is_ascii_alphabetic())
}

fn looks_like_acronym(token: &str, acronyms: &AcronymSet) -> bool {
    acronyms.contains(token)
        || LETTERS_DIGITS_RE.is_match(token)
        || ALL_CAPS_RE.is_match(token)
        || has_amp_or_dot_with_letter(token)
}

fn render_token(token: &str, acronyms: &AcronymSet) -> String {
    if looks_like_acronym(token, acronyms) {
        let up = token.to_uppercase();
        return if up == "CO₂" { "CO2".to_string() } else { up };
    }

    // keep intentional inner casing: iPhone, eBay, McDermott
    let mut rest = token.chars().skip(1);
    if rest.any(char::is_uppercase) && token.chars().any(char::is_lowercase) {
        return token.to_string();
    }

    let mut chars = token.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    }
}

/// Render a free-text label in canonical display casing.
///
/// Pure: identical inputs always give identical output, and applying it twice
/// changes nothing.
///
/// ```ignore
/// let acronyms = AcronymSet::base();
/// assert_eq!(normalize_phrase("lng export terminal", &acronyms), "LNG Export Terminal");
/// assert_eq!(normalize_phrase("co₂ capture", &acronyms), "CO2 Capture");
/// ```
pub fn normalize_phrase(text: &str, acronyms: &AcronymSet) -> String {
    let s = collapse_whitespace(text);
    if s.is_empty() {
        return s;
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for sep in SEPARATOR_RE.find_iter(&s) {
        if sep.start() > last {
            out.push_str(&render_token(&s[last..sep.start()], acronyms));
        }
        out.push_str(sep.as_str());
        last = sep.end();
    }
    if last < s.len() {
        out.push_str(&render_token(&s[last..], acronyms));
    }

    collapse_whitespace(&out).replace("Co2", "CO2").replace("Co₂", "CO2")
}

/// Acronym set plus canonical tag map, built once per run from the trusted
/// vocabulary and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    acronyms: AcronymSet,
    canonical: HashMap<String, String>,
}

impl Vocabulary {
    /// Vocabulary with no trusted entries, only [`BASE_ACRONYMS`].
    pub fn base() -> Self {
        Self {
            acronyms: AcronymSet::base(),
            canonical: HashMap::new(),
        }
    }

    /// Build the acronym set and canonical tag map from trusted entries.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| collapse_whitespace(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        let acronyms = AcronymSet::from_vocabulary(&terms);
        let canonical = terms
            .iter()
            .map(|t| (t.to_lowercase(), normalize_phrase(t, &acronyms)))
            .collect();
        Self {
            acronyms,
            canonical,
        }
    }

    /// Load trusted entries from a CSV with a `tag` column.
    ///
    /// A missing file is not an error: the base vocabulary is returned.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        if !path.exists() {
            warn!("Vocabulary file not found; using base acronyms only");
            return Ok(Self::base());
        }
        let csv_err = |source: csv::Error| VocabularyError::Csv {
            path: path.display().to_string(),
            source,
        };

        let file = File::open(path).map_err(|e| csv_err(e.into()))?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader.headers().map_err(csv_err)?.clone();
        let tag_idx = headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case("tag"))
            .ok_or_else(|| VocabularyError::MissingTagColumn {
                path: path.display().to_string(),
            })?;

        let mut terms = Vec::new();
        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            if let Some(tag) = row.get(tag_idx) {
                terms.push(tag.to_string());
            }
        }

        let vocab = Self::from_terms(terms);
        info!(
            entries = vocab.canonical.len(),
            acronyms = vocab.acronyms.len(),
            "Loaded trusted vocabulary"
        );
        Ok(vocab)
    }

    pub fn acronyms(&self) -> &AcronymSet {
        &self.acronyms
    }

    /// Canonical spelling of one label: vocabulary entry first, casing heuristic otherwise.
    pub fn canonicalize(&self, text: &str) -> String {
        let s = collapse_whitespace(text);
        if let Some(hit) = self.canonical.get(&s.to_lowercase()) {
            return hit.clone();
        }
        normalize_phrase(&s, &self.acronyms)
    }

    /// Canonicalize a label list, dropping blanks and duplicates (first wins).
    pub fn canonicalize_all<I, S>(&self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        crate::utils::clean_list(labels.into_iter().map(|l| self.canonicalize(l.as_ref())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AcronymSet {
        AcronymSet::base()
    }

    #[test]
    fn test_lng_export_terminal() {
        assert_eq!(normalize_phrase("lng export terminal", &base()), "LNG Export Terminal");
    }

    #[test]
    fn test_subscript_co2() {
        assert_eq!(normalize_phrase("co₂ capture", &base()), "CO2 Capture");
        assert_eq!(normalize_phrase("Co2 storage", &base()), "CO2 Storage");
    }

    #[test]
    fn test_separators_are_preserved() {
        assert_eq!(normalize_phrase("oil-and-gas / lng", &base()), "Oil-And-Gas / LNG");
        assert_eq!(normalize_phrase("  deepwater \t  drilling ", &base()), "Deepwater Drilling");
    }

    #[test]
    fn test_letters_digits_and_punctuated_tokens() {
        assert_eq!(normalize_phrase("h2 hubs", &base()), "H2 Hubs");
        assert_eq!(normalize_phrase("u.s. gulf", &base()), "U.S. Gulf");
        assert_eq!(normalize_phrase("p&a wells", &base()), "P&A Wells");
    }

    #[test]
    fn test_inner_casing_is_kept() {
        assert_eq!(normalize_phrase("McDermott iPhone", &base()), "McDermott iPhone");
    }

    #[test]
    fn test_standard_casing() {
        assert_eq!(normalize_phrase("OFFSHORE", &base()), "OFFSHORE");
        assert_eq!(normalize_phrase("offshore WIND farm", &base()), "Offshore WIND Farm");
        assert_eq!(normalize_phrase("eNERGY", &base()), "eNERGY");
        assert_eq!(normalize_phrase("energy", &base()), "Energy");
        assert_eq!(normalize_phrase("", &base()), "");
    }

    #[test]
    fn test_normalize_phrase_is_idempotent() {
        let acronyms = AcronymSet::from_vocabulary(["HPHT", "Shell plc"]);
        for phrase in [
            "lng export terminal",
            "co₂ capture",
            "m&a / divestitures",
            "hpht wells",
            "ExxonMobil",
            "well-integrity",
            "3d seismic",
            "  Carbon   capture and storage ",
            "iIoT",
            "U.K. north sea",
        ] {
            let once = normalize_phrase(phrase, &acronyms);
            assert_eq!(normalize_phrase(&once, &acronyms), once, "phrase {phrase:?}");
        }
    }

    #[test]
    fn test_acronym_set_from_vocabulary() {
        let set = AcronymSet::from_vocabulary(["HPHT", "Offshore", "S&P Global", "E&P", "123"]);
        assert!(set.contains("hpht"));
        assert!(set.contains("E&P"));
        assert!(set.contains("S&P GLOBAL"));
        assert!(!set.contains("OFFSHORE"));
        assert!(!set.contains("123"));
        assert!(set.contains("lng"));
    }

    #[test]
    fn test_vocabulary_spelling_wins() {
        let vocab = Vocabulary::from_terms(["ExxonMobil", "subsea tiebacks"]);
        assert_eq!(vocab.canonicalize("exxonmobil"), "ExxonMobil");
        assert_eq!(vocab.canonicalize("EXXONMOBIL"), "ExxonMobil");
        assert_eq!(vocab.canonicalize("Subsea  Tiebacks"), "Subsea Tiebacks");
        // not in the vocabulary: heuristic
        assert_eq!(vocab.canonicalize("exxon"), "Exxon");
    }

    #[test]
    fn test_canonicalize_all_dedupes_after_canonicalization() {
        let vocab = Vocabulary::base();
        let out = vocab.canonicalize_all(["lng", "LNG", " Lng ", "", "offshore"]);
        assert_eq!(out, vec!["LNG".to_string(), "Offshore".to_string()]);
    }

    #[test]
    fn test_load_vocabulary_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("all_tags.csv");
        std::fs::write(&path, "\u{feff}tag,count\nHPHT,3\nsubsea  tiebacks,1\n,0\n").unwrap();
        let vocab = Vocabulary::load(&path).unwrap();
        assert!(vocab.acronyms().contains("HPHT"));
        assert_eq!(vocab.canonicalize("hpht"), "HPHT");
        assert_eq!(vocab.canonicalize("SUBSEA TIEBACKS"), "Subsea Tiebacks");
    }

    #[test]
    fn test_load_vocabulary_missing_file_is_base() {
        let vocab = Vocabulary::load(Path::new("/definitely/not/here.csv")).unwrap();
        assert_eq!(vocab.acronyms(), &AcronymSet::base());
    }

    #[test]
    fn test_load_vocabulary_without_tag_column() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.csv");
        std::fs::write(&path, "label\nLNG\n").unwrap();
        assert!(matches!(
            Vocabulary::load(&path),
            Err(VocabularyError::MissingTagColumn { .. })
        ));
    }
}
