//! Integration specifications for the eligibility funnel.
//!
//! Scenarios run end-to-end through the public service facade with stub
//! collaborators, so resolution, the wizard, and lead dispatch are exercised
//! without reaching into private modules.

mod common {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use eco_funnel::workflows::eligibility::{
        AddressCandidate, AddressLookup, CertificateRecord, CertificateRegistry, EligibilityService,
        FunnelConfig, IntakeError, LeadIntake, LeadSubmission, LookupError, Postcode,
        RegistryError,
    };

    pub(super) struct FixedAddressBook {
        pub(super) candidates: Vec<AddressCandidate>,
    }

    #[async_trait]
    impl AddressLookup for FixedAddressBook {
        async fn search(
            &self,
            _postcode: &Postcode,
        ) -> Result<Vec<AddressCandidate>, LookupError> {
            Ok(self.candidates.clone())
        }
    }

    #[derive(Default)]
    pub(super) struct FixedRegistry {
        pub(super) postcode_rows: Vec<CertificateRecord>,
    }

    #[async_trait]
    impl CertificateRegistry for FixedRegistry {
        async fn search_by_identifier(
            &self,
            _property_ref: &str,
        ) -> Result<Vec<CertificateRecord>, RegistryError> {
            Ok(Vec::new())
        }

        async fn search_by_postcode(
            &self,
            _postcode: &str,
            _max_results: usize,
        ) -> Result<Vec<CertificateRecord>, RegistryError> {
            Ok(self.postcode_rows.clone())
        }
    }

    #[derive(Default)]
    pub(super) struct CapturingIntake {
        pub(super) leads: Mutex<Vec<LeadSubmission>>,
    }

    impl CapturingIntake {
        pub(super) fn submissions(&self) -> Vec<LeadSubmission> {
            self.leads.lock().expect("intake mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl LeadIntake for CapturingIntake {
        async fn submit(&self, lead: &LeadSubmission) -> Result<(), IntakeError> {
            self.leads
                .lock()
                .expect("intake mutex poisoned")
                .push(lead.clone());
            Ok(())
        }
    }

    pub(super) fn certificate_row(band: &str, score: u32, lodged: &str) -> CertificateRecord {
        CertificateRecord {
            current_energy_rating: Some(band.to_string()),
            current_energy_efficiency: Some(score),
            potential_energy_rating: Some("B".to_string()),
            potential_energy_efficiency: Some(84),
            lmk_key: Some(format!("lmk-{lodged}")),
            lodgement_date: Some(lodged.to_string()),
            inspection_date: None,
            address1: Some("12 Acacia Avenue".to_string()),
            address2: None,
            address3: None,
            posttown: Some("Leeds".to_string()),
            postcode: Some("LS1 4DY".to_string()),
        }
    }

    pub(super) fn acacia_candidate() -> AddressCandidate {
        AddressCandidate {
            id: "0".to_string(),
            label: "12 Acacia Avenue, Leeds, LS1 4DY".to_string(),
            property_ref: None,
            line1: "12 Acacia Avenue".to_string(),
            town: "Leeds".to_string(),
            postcode: "LS1 4DY".to_string(),
        }
    }

    pub(super) type Service =
        EligibilityService<FixedAddressBook, FixedRegistry, CapturingIntake>;

    pub(super) fn build_service(rows: Vec<CertificateRecord>) -> (Service, Arc<CapturingIntake>) {
        let intake = Arc::new(CapturingIntake::default());
        let service = EligibilityService::new(
            Arc::new(FixedAddressBook {
                candidates: vec![acacia_candidate()],
            }),
            Arc::new(FixedRegistry {
                postcode_rows: rows,
            }),
            intake.clone(),
            FunnelConfig::default(),
        );
        (service, intake)
    }
}

use common::*;
use eco_funnel::workflows::eligibility::{
    AddressSelection, ContactDetails, DisqualificationReason, LeadStatus, PropertyAnswers, StepId,
    StepInput, YesNo,
};

fn property_answers(solar: YesNo) -> PropertyAnswers {
    PropertyAnswers {
        heating: "Gas central heating".to_string(),
        walls: "Cavity".to_string(),
        building_type: "Semi-detached house".to_string(),
        boiler: "Combi".to_string(),
        homeowner: YesNo::Yes,
        solar,
        listed_building: YesNo::No,
        reason: None,
    }
}

fn contact() -> ContactDetails {
    ContactDetails {
        name: "Jo Bloggs".to_string(),
        phone: "+447123456789".to_string(),
        email: "jo@example.co.uk".to_string(),
        follow_up_committed: true,
    }
}

#[tokio::test]
async fn qualified_applicant_reaches_submission() {
    let (service, intake) = build_service(vec![certificate_row("D", 55, "2024-05-20")]);

    let advance = service.start("ls14dy").await.expect("session starts");
    assert_eq!(advance.step, StepId::Address);
    assert_eq!(advance.progress, 0.0);

    let advance = service
        .advance(
            advance.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await
        .expect("certificate resolves inline");
    assert_eq!(advance.step, StepId::BenefitRoute);

    let advance = service
        .advance(
            advance.session,
            StepInput::Benefit {
                benefit: Some("Universal Credit".to_string()),
            },
        )
        .await
        .expect("benefit route taken");
    assert_eq!(advance.step, StepId::Property);

    let advance = service
        .advance(
            advance.session,
            StepInput::Property {
                answers: property_answers(YesNo::No),
            },
        )
        .await
        .expect("property step passes");
    let advance = service
        .advance(
            advance.session,
            StepInput::Measure {
                selection: Some("Cavity wall insulation".to_string()),
            },
        )
        .await
        .expect("measure selected");
    let advance = service
        .advance(advance.session, StepInput::Contact { details: contact() })
        .await
        .expect("contact submits");

    assert_eq!(advance.step, StepId::Submit);
    assert!(advance.submitted);
    assert_eq!(advance.progress, 1.0);

    let leads = intake.submissions();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].status, LeadStatus::Qualified);
    assert_eq!(leads[0].measure.as_deref(), Some("Cavity wall insulation"));
    assert_eq!(leads[0].meta.source, "eco-funnel");
    assert!(leads[0].follow_up_committed);
}

#[tokio::test]
async fn efficient_property_is_turned_away_before_route_questions() {
    let (service, intake) = build_service(vec![certificate_row("B", 82, "2024-05-20")]);

    let advance = service.start("LS1 4DY").await.expect("session starts");
    let advance = service
        .advance(
            advance.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await
        .expect("certificate resolves inline");

    assert_eq!(advance.step, StepId::Disqualified);
    assert_eq!(
        advance.disqualification,
        Some(DisqualificationReason::ScoreTooHigh)
    );
    assert!(!advance.submitted);
    assert!(intake.submissions().is_empty());
}

#[tokio::test]
async fn missing_certificate_does_not_block_the_funnel() {
    let (service, _intake) = build_service(Vec::new());

    let advance = service.start("LS1 4DY").await.expect("session starts");
    let advance = service
        .advance(
            advance.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await
        .expect("absence folds in cleanly");

    assert_eq!(advance.step, StepId::BenefitRoute);
    let certificate = advance
        .session
        .answers()
        .certificate
        .as_ref()
        .expect("resolution recorded");
    assert!(!certificate.found);
}

#[tokio::test]
async fn solar_ownership_ends_the_session_without_a_lead() {
    let (service, intake) = build_service(vec![certificate_row("E", 45, "2023-01-10")]);

    let advance = service.start("LS1 4DY").await.expect("session starts");
    let advance = service
        .advance(
            advance.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await
        .expect("certificate resolves inline");
    let advance = service
        .advance(
            advance.session,
            StepInput::Benefit {
                benefit: Some("Housing Benefit".to_string()),
            },
        )
        .await
        .expect("benefit route taken");
    let advance = service
        .advance(
            advance.session,
            StepInput::Property {
                answers: property_answers(YesNo::Yes),
            },
        )
        .await
        .expect("solar answer processed");

    assert_eq!(
        advance.disqualification,
        Some(DisqualificationReason::ExistingSolar)
    );
    assert!(intake.submissions().is_empty());
}
