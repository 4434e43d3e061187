use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use super::postcode::Postcode;
use crate::config::{AddressLookupConfig, ConfigError};

/// One selectable result from the address search, consumed read-only by the
/// wizard to populate the choice list and carry the property reference
/// forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCandidate {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub property_ref: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub town: String,
    pub postcode: String,
}

/// Address search collaborator; zero results is a valid outcome that sends
/// the wizard down the manual-entry path.
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn search(&self, postcode: &Postcode) -> Result<Vec<AddressCandidate>, LookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup returned status {0}")]
    Status(u16),
    #[error("lookup request failed")]
    Transport(#[source] reqwest::Error),
}

/// Client for an Ideal-Postcodes-shaped address API.
pub struct HttpAddressLookup {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAddressLookup {
    pub fn from_config(config: &AddressLookupConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ConfigError::MissingAddressApiKey)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl AddressLookup for HttpAddressLookup {
    async fn search(&self, postcode: &Postcode) -> Result<Vec<AddressCandidate>, LookupError> {
        let url = format!("{}/v1/postcodes/{}", self.base_url, postcode.compact());
        let response = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(LookupError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: AddressSearchBody = response.json().await.map_err(LookupError::Transport)?;
        Ok(body
            .result
            .into_iter()
            .enumerate()
            .map(|(index, raw)| candidate_from(index, raw, postcode))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct AddressSearchBody {
    #[serde(default)]
    result: Vec<RawAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAddress {
    #[serde(default)]
    line_1: Option<String>,
    #[serde(default)]
    building_name: Option<String>,
    #[serde(default)]
    thoroughfare: Option<String>,
    #[serde(default)]
    post_town: Option<String>,
    #[serde(default)]
    postcode: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    uprn: Option<String>,
}

fn candidate_from(index: usize, raw: RawAddress, postcode: &Postcode) -> AddressCandidate {
    let line1 = raw
        .line_1
        .or(raw.building_name)
        .or(raw.thoroughfare)
        .unwrap_or_default();
    let town = raw.post_town.unwrap_or_default();
    let candidate_postcode = raw
        .postcode
        .filter(|pc| !pc.trim().is_empty())
        .unwrap_or_else(|| postcode.as_str().to_string());
    let label = [line1.as_str(), town.as_str(), candidate_postcode.as_str()]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    AddressCandidate {
        id: index.to_string(),
        label,
        property_ref: raw.uprn,
        line1,
        town,
        postcode: candidate_postcode,
    }
}

// The upstream emits UPRNs as numbers or strings depending on the dataset.
fn flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?
        .map(|raw| match raw {
            Raw::Number(value) => value.to_string(),
            Raw::Text(value) => value,
        })
        .filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_candidates_from_the_search_body() {
        let body: AddressSearchBody = serde_json::from_str(
            r#"{
                "result": [
                    {"line_1": "10 Downing Street", "post_town": "London", "postcode": "SW1A 2AA", "uprn": 100023336956},
                    {"building_name": "The Old Mill", "post_town": "York", "uprn": "10001234"}
                ]
            }"#,
        )
        .expect("body parses");

        let postcode = Postcode::parse("SW1A 2AA").expect("valid postcode");
        let candidates: Vec<AddressCandidate> = body
            .result
            .into_iter()
            .enumerate()
            .map(|(index, raw)| candidate_from(index, raw, &postcode))
            .collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "0");
        assert_eq!(
            candidates[0].label,
            "10 Downing Street, London, SW1A 2AA"
        );
        assert_eq!(
            candidates[0].property_ref.as_deref(),
            Some("100023336956")
        );
        // Missing postcode falls back to the searched one.
        assert_eq!(candidates[1].postcode, "SW1A 2AA");
        assert_eq!(candidates[1].line1, "The Old Mill");
    }

    #[test]
    fn http_lookup_requires_the_api_key() {
        let config = AddressLookupConfig {
            base_url: "https://addresses.example".to_string(),
            api_key: None,
        };
        assert!(matches!(
            HttpAddressLookup::from_config(&config),
            Err(ConfigError::MissingAddressApiKey)
        ));
    }
}
