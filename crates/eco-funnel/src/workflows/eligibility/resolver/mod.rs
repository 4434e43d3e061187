//! Certificate resolution: reduce the registry's candidate rows for a
//! postcode/identifier/label triple to at most one confidently-attributed
//! record.

mod record;
mod registry;

pub use record::CertificateRecord;
pub use registry::{CertificateRegistry, HttpCertificateRegistry, RegistryError, RetryPolicy};

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::postcode::{Postcode, Region, RegionClassifier, DEFAULT_SECONDARY_AREAS};
use super::similarity::address_similarity;

/// Tunable selection behavior. The confidence threshold is business policy,
/// not a protocol constant; integrators override it per deployment.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub min_address_confidence: f64,
    pub max_postcode_results: usize,
    pub secondary_areas: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_address_confidence: 0.35,
            max_postcode_results: 80,
            secondary_areas: DEFAULT_SECONDARY_AREAS.map(str::to_string).to_vec(),
        }
    }
}

/// One resolution request.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateQuery {
    pub postcode: Postcode,
    #[serde(default)]
    pub property_ref: Option<String>,
    #[serde(default)]
    pub address_label: Option<String>,
}

/// Outcome of a resolution. `found: false` is an ordinary answer — many
/// properties simply have no certificate — never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub found: bool,
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_band: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_date: Option<NaiveDate>,
}

impl ResolutionResult {
    pub fn not_found(region: Region) -> Self {
        Self {
            found: false,
            region,
            band: None,
            score: None,
            potential_band: None,
            potential_score: None,
            certificate_id: None,
            certificate_date: None,
        }
    }

    fn from_record(region: Region, record: &CertificateRecord) -> Self {
        Self {
            found: record.current_energy_rating.is_some(),
            region,
            band: record.current_energy_rating.clone(),
            score: record.current_energy_efficiency,
            potential_band: record.potential_energy_rating.clone(),
            potential_score: record.potential_energy_efficiency,
            certificate_id: record.lmk_key.clone(),
            certificate_date: record.certificate_date(),
        }
    }
}

/// Two-phase resolver: identifier search first, postcode search second, with
/// a similarity threshold guarding against attaching a stranger's
/// certificate to the wrong applicant.
pub struct CertificateResolver<R> {
    registry: Arc<R>,
    classifier: RegionClassifier,
    config: ResolverConfig,
}

impl<R: CertificateRegistry> CertificateResolver<R> {
    pub fn new(registry: Arc<R>, config: ResolverConfig) -> Self {
        let classifier = RegionClassifier::new(config.secondary_areas.iter().cloned());
        Self {
            registry,
            classifier,
            config,
        }
    }

    pub async fn resolve(
        &self,
        query: &CertificateQuery,
    ) -> Result<ResolutionResult, RegistryError> {
        let region = self.classifier.classify(&query.postcode);
        if region == Region::Secondary {
            // No registry integration exists for the secondary region; this
            // is a deliberate stub outcome, not a failure.
            return Ok(ResolutionResult::not_found(Region::Secondary));
        }

        if let Some(property_ref) = trimmed(query.property_ref.as_deref()) {
            match self.registry.search_by_identifier(property_ref).await {
                Ok(rows) => {
                    if let Some(best) = most_recent(&rows) {
                        return Ok(ResolutionResult::from_record(region, best));
                    }
                }
                // A failed identifier phase degrades to the postcode phase;
                // there is still data to fall back to.
                Err(err) => {
                    warn!(error = %err, "identifier search failed, falling back to postcode search");
                }
            }
        }

        let rows = self
            .registry
            .search_by_postcode(&query.postcode.compact(), self.config.max_postcode_results)
            .await?;
        if rows.is_empty() {
            return Ok(ResolutionResult::not_found(region));
        }

        let picked = match trimmed(query.address_label.as_deref()) {
            Some(label) => match self.best_scoring(&rows, label) {
                Some(record) => record,
                None => return Ok(ResolutionResult::not_found(region)),
            },
            None => match most_recent(&rows) {
                Some(record) => record,
                None => return Ok(ResolutionResult::not_found(region)),
            },
        };

        Ok(ResolutionResult::from_record(region, picked))
    }

    /// Max-similarity row, ties broken by recency then first-seen. A best
    /// score below the confidence threshold yields no pick at all: a
    /// low-confidence match must read as "not found", never as a guess.
    fn best_scoring<'a>(
        &self,
        rows: &'a [CertificateRecord],
        label: &str,
    ) -> Option<&'a CertificateRecord> {
        let mut best: Option<(&CertificateRecord, f64)> = None;
        for record in rows {
            let score = address_similarity(&record.raw_address(), label);
            let better = match best {
                None => true,
                Some((current, best_score)) => {
                    score > best_score
                        || (score == best_score
                            && record.certificate_date() > current.certificate_date())
                }
            };
            if better {
                best = Some((record, score));
            }
        }

        match best {
            Some((record, score)) if score >= self.config.min_address_confidence => Some(record),
            Some((_, score)) => {
                debug!(
                    score,
                    threshold = self.config.min_address_confidence,
                    "best address match below confidence threshold"
                );
                None
            }
            None => None,
        }
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn most_recent(rows: &[CertificateRecord]) -> Option<&CertificateRecord> {
    rows.iter().reduce(|best, row| {
        if row.certificate_date() > best.certificate_date() {
            row
        } else {
            best
        }
    })
}
