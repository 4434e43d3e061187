use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::workflows::eligibility::council::{CouncilArea, CouncilLookup};
use crate::workflows::eligibility::intake::{IntakeError, LeadIntake, LeadSubmission};
use crate::workflows::eligibility::lookup::{AddressCandidate, AddressLookup, LookupError};
use crate::workflows::eligibility::postcode::Postcode;
use crate::workflows::eligibility::resolver::{
    CertificateRecord, CertificateRegistry, RegistryError, ResolutionResult,
};
use crate::workflows::eligibility::service::EligibilityService;
use crate::workflows::eligibility::wizard::{
    ContactDetails, EligibilitySession, FunnelConfig, PropertyAnswers, StepInput, YesNo,
};

pub(super) fn funnel_config() -> FunnelConfig {
    FunnelConfig::default()
}

pub(super) fn record(
    band: &str,
    score: u32,
    lodged: &str,
    address1: &str,
) -> CertificateRecord {
    CertificateRecord {
        current_energy_rating: Some(band.to_string()),
        current_energy_efficiency: Some(score),
        potential_energy_rating: Some("B".to_string()),
        potential_energy_efficiency: Some(score + 10),
        lmk_key: Some(format!("lmk-{address1}-{lodged}")),
        lodgement_date: Some(lodged.to_string()),
        inspection_date: None,
        address1: Some(address1.to_string()),
        address2: None,
        address3: None,
        posttown: Some("Leeds".to_string()),
        postcode: Some("LS1 4DY".to_string()),
    }
}

pub(super) fn candidate(id: &str, line1: &str, property_ref: Option<&str>) -> AddressCandidate {
    AddressCandidate {
        id: id.to_string(),
        label: format!("{line1}, Leeds, LS1 4DY"),
        property_ref: property_ref.map(str::to_string),
        line1: line1.to_string(),
        town: "Leeds".to_string(),
        postcode: "LS1 4DY".to_string(),
    }
}

pub(super) fn found_result(band: &str, score: u32) -> ResolutionResult {
    ResolutionResult {
        found: true,
        band: Some(band.to_string()),
        score: Some(score),
        ..ResolutionResult::not_found(crate::workflows::eligibility::postcode::Region::Primary)
    }
}

pub(super) fn property_answers(solar: YesNo) -> PropertyAnswers {
    PropertyAnswers {
        heating: "Gas central heating".to_string(),
        walls: "Cavity".to_string(),
        building_type: "Semi-detached house".to_string(),
        boiler: "Combi".to_string(),
        homeowner: YesNo::Yes,
        solar,
        listed_building: YesNo::No,
        reason: Some("Cold in winter".to_string()),
    }
}

pub(super) fn contact() -> ContactDetails {
    ContactDetails {
        name: "Jo Bloggs".to_string(),
        phone: "07123456789".to_string(),
        email: "jo@example.co.uk".to_string(),
        follow_up_committed: true,
    }
}

/// Registry double with independently scriptable phases and a call counter
/// per phase, so precedence can be asserted.
#[derive(Default)]
pub(super) struct StubRegistry {
    pub(super) identifier_rows: Vec<CertificateRecord>,
    pub(super) postcode_rows: Vec<CertificateRecord>,
    pub(super) identifier_fails: bool,
    pub(super) postcode_fails: bool,
    pub(super) identifier_calls: AtomicUsize,
    pub(super) postcode_calls: AtomicUsize,
}

#[async_trait]
impl CertificateRegistry for StubRegistry {
    async fn search_by_identifier(
        &self,
        _property_ref: &str,
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        self.identifier_calls.fetch_add(1, Ordering::SeqCst);
        if self.identifier_fails {
            return Err(RegistryError::Status(500));
        }
        Ok(self.identifier_rows.clone())
    }

    async fn search_by_postcode(
        &self,
        _postcode: &str,
        _max_results: usize,
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        self.postcode_calls.fetch_add(1, Ordering::SeqCst);
        if self.postcode_fails {
            return Err(RegistryError::Status(502));
        }
        Ok(self.postcode_rows.clone())
    }
}

#[derive(Default)]
pub(super) struct StubAddressBook {
    pub(super) candidates: Vec<AddressCandidate>,
    pub(super) fails: bool,
}

#[async_trait]
impl AddressLookup for StubAddressBook {
    async fn search(&self, _postcode: &Postcode) -> Result<Vec<AddressCandidate>, LookupError> {
        if self.fails {
            return Err(LookupError::Status(503));
        }
        Ok(self.candidates.clone())
    }
}

#[derive(Default)]
pub(super) struct RecordingIntake {
    pub(super) leads: Mutex<Vec<LeadSubmission>>,
    pub(super) fails: bool,
}

impl RecordingIntake {
    pub(super) fn submissions(&self) -> Vec<LeadSubmission> {
        self.leads.lock().expect("intake mutex poisoned").clone()
    }
}

#[async_trait]
impl LeadIntake for RecordingIntake {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), IntakeError> {
        if self.fails {
            return Err(IntakeError::Status(502));
        }
        self.leads
            .lock()
            .expect("intake mutex poisoned")
            .push(lead.clone());
        Ok(())
    }
}

pub(super) struct StubCouncil;

#[async_trait]
impl CouncilLookup for StubCouncil {
    async fn lookup(&self, _postcode: &Postcode) -> Result<Option<CouncilArea>, LookupError> {
        Ok(Some(CouncilArea {
            council: "Leeds City Council".to_string(),
            county: None,
            ward: Some("Hunslet".to_string()),
            constituency: Some("Leeds Central".to_string()),
        }))
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) type StubService = EligibilityService<StubAddressBook, StubRegistry, RecordingIntake>;

pub(super) fn build_service(
    registry: StubRegistry,
    candidates: Vec<AddressCandidate>,
) -> (Arc<StubService>, Arc<RecordingIntake>) {
    let intake = Arc::new(RecordingIntake::default());
    let lookup = Arc::new(StubAddressBook {
        candidates,
        fails: false,
    });
    let service = Arc::new(
        EligibilityService::new(lookup, Arc::new(registry), intake.clone(), funnel_config())
            .with_council(Arc::new(StubCouncil)),
    );
    (service, intake)
}

/// Drive a fresh session through the machine (no service, no I/O) up to the
/// property step, using the given certificate outcome and the benefit route.
pub(super) fn session_at_property(config: &FunnelConfig) -> EligibilitySession {
    let postcode = Postcode::parse("LS1 4DY").expect("valid postcode");
    let mut session = EligibilitySession::start(postcode, vec![candidate("0", "12 Acacia Avenue", None)]);
    session
        .advance(
            StepInput::Address {
                selection: crate::workflows::eligibility::wizard::AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
            config,
        )
        .expect("address accepted");
    session
        .advance(
            StepInput::Certificate {
                result: found_result("D", 55),
            },
            config,
        )
        .expect("certificate folded in");
    session
        .advance(
            StepInput::Benefit {
                benefit: Some("Universal Credit".to_string()),
            },
            config,
        )
        .expect("benefit accepted");
    session
}
