//! Country codes derived from tag labels.
//!
//! WorldOil files countries as plain tags ("Angola", "U.S.") next to topical
//! ones. A tag contributes a country when the whole tag is a known alias
//! ("United Kingdom" -> `UK`) or a recognised country name (kept as the name).

use std::collections::{BTreeSet, HashMap};

const ALIASES: &[(&str, &str)] = &[
    ("US", "US"),
    ("U.S.", "US"),
    ("USA", "US"),
    ("U.S.A.", "US"),
    ("United States", "US"),
    ("United States Of America", "US"),
    ("UK", "UK"),
    ("U.K.", "UK"),
    ("United Kingdom", "UK"),
    ("Great Britain", "UK"),
    ("Britain", "UK"),
    ("UAE", "UAE"),
    ("U.A.E.", "UAE"),
    ("United Arab Emirates", "UAE"),
];

const RECOGNIZED: &[&str] = &[
    "Afghanistan", "Albania", "Algeria", "Angola", "Argentina", "Armenia", "Australia",
    "Austria", "Azerbaijan", "Bahamas", "Bahrain", "Bangladesh", "Barbados", "Belarus",
    "Belgium", "Belize", "Benin", "Bolivia", "Bosnia And Herzegovina", "Botswana", "Brazil",
    "Brunei", "Bulgaria", "Cambodia", "Cameroon", "Canada", "Chad", "Chile", "China",
    "Colombia", "Congo", "Costa Rica", "Croatia", "Cuba", "Cyprus", "Czech Republic",
    "Denmark", "Dominican Republic", "Ecuador", "Egypt", "Equatorial Guinea", "Eritrea",
    "Estonia", "Ethiopia", "Finland", "France", "Gabon", "Gambia", "Georgia", "Germany",
    "Ghana", "Greece", "Greenland", "Guatemala", "Guinea", "Guyana", "Honduras", "Hungary",
    "Iceland", "India", "Indonesia", "Iran", "Iraq", "Ireland", "Israel", "Italy",
    "Ivory Coast", "Jamaica", "Japan", "Jordan", "Kazakhstan", "Kenya", "Kuwait",
    "Kyrgyzstan", "Latvia", "Lebanon", "Liberia", "Libya", "Lithuania", "Luxembourg",
    "Madagascar", "Malaysia", "Mali", "Malta", "Mauritania", "Mexico", "Moldova",
    "Mongolia", "Montenegro", "Morocco", "Mozambique", "Myanmar", "Namibia", "Nepal",
    "Netherlands", "New Zealand", "Nicaragua", "Niger", "Nigeria", "North Korea",
    "North Macedonia", "Norway", "Oman", "Pakistan", "Panama", "Papua New Guinea",
    "Paraguay", "Peru", "Philippines", "Poland", "Portugal", "Qatar", "Romania", "Russia",
    "Rwanda", "Saudi Arabia", "Senegal", "Serbia", "Sierra Leone", "Singapore", "Slovakia",
    "Slovenia", "Somalia", "South Africa", "South Korea", "South Sudan", "Spain",
    "Sri Lanka", "Sudan", "Suriname", "Sweden", "Switzerland", "Syria", "Taiwan",
    "Tajikistan", "Tanzania", "Thailand", "Timor-Leste", "Togo", "Trinidad And Tobago",
    "Tunisia", "Turkey", "Turkmenistan", "Uganda", "Ukraine", "Uruguay", "Uzbekistan",
    "Venezuela", "Vietnam", "Yemen", "Zambia", "Zimbabwe",
];

/// Alias table plus the broader set of recognised country names.
///
/// Lookups compare whole tags case-insensitively; a tag never matches on a
/// substring.
#[derive(Debug, Clone)]
pub struct CountryAliases {
    aliases: HashMap<String, String>,
    recognized: HashMap<String, String>,
}

impl Default for CountryAliases {
    fn default() -> Self {
        Self::standard()
    }
}

impl CountryAliases {
    /// Built-in aliases and country names.
    pub fn standard() -> Self {
        Self::new(
            ALIASES.iter().map(|(a, c)| (a.to_string(), c.to_string())),
            RECOGNIZED.iter().copied(),
        )
    }

    pub fn new<A, R, S>(aliases: A, recognized: R) -> Self
    where
        A: IntoIterator<Item = (String, String)>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases = aliases
            .into_iter()
            .map(|(alias, code)| (alias.to_lowercase(), code))
            .collect();
        let recognized = recognized
            .into_iter()
            .map(|name| (name.as_ref().to_lowercase(), name.as_ref().to_string()))
            .collect();
        Self {
            aliases,
            recognized,
        }
    }

    /// Country code for a single tag, if it names a country.
    pub fn lookup(&self, tag: &str) -> Option<&str> {
        let key = tag.trim().to_lowercase();
        self.aliases
            .get(&key)
            .or_else(|| self.recognized.get(&key))
            .map(String::as_str)
    }
}

/// Country codes named by a record's tags. Unordered and deduplicated.
pub fn extract_countries<I, S>(tags: I, countries: &CountryAliases) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|t| countries.lookup(t.as_ref()).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_win() {
        let c = CountryAliases::standard();
        assert_eq!(c.lookup("U.S."), Some("US"));
        assert_eq!(c.lookup("United Kingdom"), Some("UK"));
        assert_eq!(c.lookup("united arab emirates"), Some("UAE"));
    }

    #[test]
    fn test_recognized_names_map_to_themselves() {
        let c = CountryAliases::standard();
        assert_eq!(c.lookup("Angola"), Some("Angola"));
        assert_eq!(c.lookup("trinidad and tobago"), Some("Trinidad And Tobago"));
        assert_eq!(c.lookup("Offshore"), None);
    }

    #[test]
    fn test_extract_countries_is_a_set() {
        let c = CountryAliases::standard();
        let tags = ["U.S.", "Offshore", "United States", "Norway", "North Sea Basin"];
        let found = extract_countries(tags, &c);
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["Norway".to_string(), "US".to_string()]
        );
    }

    #[test]
    fn test_extract_countries_no_substring_match() {
        let c = CountryAliases::standard();
        assert!(extract_countries(["Guyana Basin", "Brazilian pre-salt"], &c).is_empty());
    }

    #[test]
    fn test_custom_tables() {
        let c = CountryAliases::new(
            [("KSA".to_string(), "Saudi Arabia".to_string())],
            ["Oman"],
        );
        assert_eq!(c.lookup("ksa"), Some("Saudi Arabia"));
        assert_eq!(c.lookup(" oman "), Some("Oman"));
        assert_eq!(c.lookup("Norway"), None);
    }
}
