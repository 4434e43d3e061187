use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::lookup::LookupError;
use super::postcode::Postcode;
use crate::config::CouncilConfig;

/// Council/boundary enrichment attached to a submission when available.
/// Never blocks the wizard; absence is always acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilArea {
    pub council: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constituency: Option<String>,
}

#[async_trait]
pub trait CouncilLookup: Send + Sync {
    async fn lookup(&self, postcode: &Postcode) -> Result<Option<CouncilArea>, LookupError>;
}

/// Client for a MapIt-shaped boundary API.
pub struct HttpCouncilLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCouncilLookup {
    pub fn from_config(config: &CouncilConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CouncilLookup for HttpCouncilLookup {
    async fn lookup(&self, postcode: &Postcode) -> Result<Option<CouncilArea>, LookupError> {
        // The boundary API expects no space in the postcode.
        let url = format!("{}/postcode/{}", self.base_url, postcode.compact());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(LookupError::Transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: BoundaryBody = response.json().await.map_err(LookupError::Transport)?;
        Ok(body.into_area())
    }
}

#[derive(Debug, Default, Deserialize)]
struct BoundaryBody {
    #[serde(default)]
    shortcuts: Shortcuts,
    #[serde(default)]
    areas: HashMap<String, BoundaryArea>,
}

#[derive(Debug, Default, Deserialize)]
struct Shortcuts {
    #[serde(default)]
    council: Option<Shortcut>,
    #[serde(default)]
    ward: Option<Shortcut>,
    #[serde(default, rename = "WMC")]
    constituency: Option<AreaId>,
}

/// Single-tier lookups give one area id; two-tier ones split county and
/// district.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Shortcut {
    Single(AreaId),
    TwoTier { county: AreaId, district: AreaId },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AreaId {
    Number(u64),
    Text(String),
}

impl AreaId {
    fn key(&self) -> String {
        match self {
            AreaId::Number(value) => value.to_string(),
            AreaId::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BoundaryArea {
    #[serde(default)]
    name: Option<String>,
}

impl BoundaryBody {
    fn name_of(&self, id: &AreaId) -> Option<String> {
        self.areas.get(&id.key()).and_then(|area| area.name.clone())
    }

    fn into_area(self) -> Option<CouncilArea> {
        let (council, county) = match self.shortcuts.council.as_ref()? {
            Shortcut::Single(id) => (self.name_of(id)?, None),
            Shortcut::TwoTier { county, district } => {
                (self.name_of(district)?, self.name_of(county))
            }
        };

        let ward = match &self.shortcuts.ward {
            Some(Shortcut::Single(id)) => self.name_of(id),
            Some(Shortcut::TwoTier { district, .. }) => self.name_of(district),
            None => None,
        };

        let constituency = self
            .shortcuts
            .constituency
            .as_ref()
            .and_then(|id| self.name_of(id));

        Some(CouncilArea {
            council,
            county,
            ward,
            constituency,
        })
    }
}
