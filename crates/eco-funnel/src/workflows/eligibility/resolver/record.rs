use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

/// One row from the certificate registry, normalized at the ingestion
/// boundary. The upstream emits either underscore- or hyphen-separated keys
/// for the same logical field, and numeric scores arrive as numbers or
/// strings depending on the endpoint; both forms are accepted here so the
/// rest of the resolver only ever sees one canonical shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateRecord {
    #[serde(default, alias = "current-energy-rating")]
    pub current_energy_rating: Option<String>,
    #[serde(
        default,
        alias = "current-energy-efficiency",
        deserialize_with = "flexible_score"
    )]
    pub current_energy_efficiency: Option<u32>,
    #[serde(default, alias = "potential-energy-rating")]
    pub potential_energy_rating: Option<String>,
    #[serde(
        default,
        alias = "potential-energy-efficiency",
        deserialize_with = "flexible_score"
    )]
    pub potential_energy_efficiency: Option<u32>,
    #[serde(default, alias = "lmk-key")]
    pub lmk_key: Option<String>,
    #[serde(default, alias = "lodgement-date")]
    pub lodgement_date: Option<String>,
    #[serde(default, alias = "inspection-date")]
    pub inspection_date: Option<String>,
    #[serde(default, alias = "address-1")]
    pub address1: Option<String>,
    #[serde(default, alias = "address-2")]
    pub address2: Option<String>,
    #[serde(default, alias = "address-3")]
    pub address3: Option<String>,
    #[serde(default, alias = "post-town")]
    pub posttown: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

impl CertificateRecord {
    /// Date part of the lodgement timestamp, falling back to the inspection
    /// date when the lodgement value is missing or unparsable.
    pub fn certificate_date(&self) -> Option<NaiveDate> {
        [self.lodgement_date.as_deref(), self.inspection_date.as_deref()]
            .into_iter()
            .flatten()
            .find_map(parse_date_prefix)
    }

    /// Single-line address reconstructed for similarity scoring.
    pub fn raw_address(&self) -> String {
        [
            &self.address1,
            &self.address2,
            &self.address3,
            &self.posttown,
            &self.postcode,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let prefix = value.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn flexible_score<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Number(value)) if value >= 0.0 => Some(value.round() as u32),
        Some(Raw::Number(_)) => None,
        Some(Raw::Text(text)) => text.trim().parse::<u32>().ok(),
    })
}
