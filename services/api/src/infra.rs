use async_trait::async_trait;
use eco_funnel::workflows::eligibility::{
    AddressCandidate, AddressLookup, CertificateRecord, CertificateRegistry, FunnelConfig,
    IntakeError, LeadIntake, LeadSubmission, LookupError, Postcode, RegistryError, ScorePolicy,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Deployment policy for the funnel. Spelled out rather than relying on
/// `Default` so the dials an integrator tunes are visible in one place.
pub(crate) fn default_funnel_config() -> FunnelConfig {
    FunnelConfig {
        score_policy: ScorePolicy {
            max_qualifying_score: 60,
            boundary_exception: None,
        },
        ..FunnelConfig::default()
    }
}

/// Address book backed by a fixed candidate map, for the demo and tests.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAddressBook {
    candidates: Arc<Mutex<HashMap<String, Vec<AddressCandidate>>>>,
}

impl InMemoryAddressBook {
    pub(crate) fn insert(&self, postcode: &str, candidates: Vec<AddressCandidate>) {
        self.candidates
            .lock()
            .expect("address book mutex poisoned")
            .insert(postcode.to_string(), candidates);
    }
}

#[async_trait]
impl AddressLookup for InMemoryAddressBook {
    async fn search(&self, postcode: &Postcode) -> Result<Vec<AddressCandidate>, LookupError> {
        let guard = self.candidates.lock().expect("address book mutex poisoned");
        Ok(guard.get(postcode.as_str()).cloned().unwrap_or_default())
    }
}

/// Certificate registry backed by fixed rows keyed on compact postcode and
/// property reference.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCertificateRegistry {
    by_reference: Arc<Mutex<HashMap<String, Vec<CertificateRecord>>>>,
    by_postcode: Arc<Mutex<HashMap<String, Vec<CertificateRecord>>>>,
}

impl InMemoryCertificateRegistry {
    pub(crate) fn insert_for_postcode(&self, postcode: &str, rows: Vec<CertificateRecord>) {
        self.by_postcode
            .lock()
            .expect("registry mutex poisoned")
            .insert(postcode.replace(' ', ""), rows);
    }

    pub(crate) fn insert_for_reference(&self, property_ref: &str, rows: Vec<CertificateRecord>) {
        self.by_reference
            .lock()
            .expect("registry mutex poisoned")
            .insert(property_ref.to_string(), rows);
    }
}

#[async_trait]
impl CertificateRegistry for InMemoryCertificateRegistry {
    async fn search_by_identifier(
        &self,
        property_ref: &str,
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        let guard = self.by_reference.lock().expect("registry mutex poisoned");
        Ok(guard.get(property_ref).cloned().unwrap_or_default())
    }

    async fn search_by_postcode(
        &self,
        postcode: &str,
        max_results: usize,
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        let guard = self.by_postcode.lock().expect("registry mutex poisoned");
        let mut rows = guard.get(postcode).cloned().unwrap_or_default();
        rows.truncate(max_results);
        Ok(rows)
    }
}

/// Intake sink capturing submissions for inspection.
#[derive(Default, Clone)]
pub(crate) struct RecordingLeadIntake {
    leads: Arc<Mutex<Vec<LeadSubmission>>>,
}

impl RecordingLeadIntake {
    pub(crate) fn submissions(&self) -> Vec<LeadSubmission> {
        self.leads.lock().expect("intake mutex poisoned").clone()
    }
}

#[async_trait]
impl LeadIntake for RecordingLeadIntake {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), IntakeError> {
        self.leads
            .lock()
            .expect("intake mutex poisoned")
            .push(lead.clone());
        Ok(())
    }
}
