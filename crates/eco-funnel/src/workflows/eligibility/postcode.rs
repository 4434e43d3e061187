use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Raised when input cannot be shaped into a valid UK postcode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{raw}' is not a valid UK postcode")]
pub struct PostcodeError {
    pub raw: String,
}

fn grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^[A-Z]{1,2}\d[A-Z\d]?\s\d[A-Z]{2}$").expect("postcode grammar compiles")
    })
}

/// Validated UK postcode held in canonical spaced form (`SW1A 1AA`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Postcode(String);

impl Postcode {
    /// Canonicalize raw input: keep alphanumerics, uppercase, and split the
    /// inward code off with a single space once five or more characters
    /// remain. Shorter input comes back unsplit so validation can reject it.
    pub fn normalize(raw: &str) -> String {
        let alnum: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_uppercase();
        if alnum.len() < 5 {
            return alnum;
        }
        let split = alnum.len() - 3;
        format!("{} {}", &alnum[..split], &alnum[split..])
    }

    pub fn parse(raw: &str) -> Result<Self, PostcodeError> {
        let normalized = Self::normalize(raw);
        if grammar().is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(PostcodeError {
                raw: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Space-free form; the certificate registry expects no separator.
    pub fn compact(&self) -> String {
        self.0.replace(' ', "")
    }

    /// Leading one or two letter area code (`SW` for `SW1A 1AA`).
    pub fn area_code(&self) -> &str {
        let letters = self
            .0
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .count();
        &self.0[..letters]
    }
}

impl fmt::Display for Postcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Postcode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Postcode::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Which certificate registry region a postcode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Primary,
    Secondary,
}

impl Region {
    pub const fn label(self) -> &'static str {
        match self {
            Region::Primary => "primary",
            Region::Secondary => "secondary",
        }
    }
}

/// Postcode areas whose certificates live in a separate registry the primary
/// integration does not cover (Scotland and Northern Ireland).
pub const DEFAULT_SECONDARY_AREAS: [&str; 17] = [
    "AB", "BT", "DD", "DG", "EH", "FK", "G", "HS", "IV", "KA", "KW", "KY", "ML", "PA", "PH", "TD",
    "ZE",
];

/// Pure area-code dispatch over a configured secondary-prefix set.
#[derive(Debug, Clone)]
pub struct RegionClassifier {
    secondary_areas: Vec<String>,
}

impl RegionClassifier {
    pub fn new(secondary_areas: impl IntoIterator<Item = String>) -> Self {
        Self {
            secondary_areas: secondary_areas.into_iter().collect(),
        }
    }

    pub fn classify(&self, postcode: &Postcode) -> Region {
        let area = postcode.area_code();
        if self
            .secondary_areas
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(area))
        {
            Region::Secondary
        } else {
            Region::Primary
        }
    }
}

impl Default for RegionClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SECONDARY_AREAS.map(str::to_string))
    }
}
