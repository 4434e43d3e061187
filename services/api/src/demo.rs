use crate::infra::{
    default_funnel_config, InMemoryAddressBook, InMemoryCertificateRegistry, RecordingLeadIntake,
};
use clap::Args;
use eco_funnel::error::AppError;
use eco_funnel::workflows::eligibility::{
    AddressCandidate, AddressSelection, CertificateRecord, ContactDetails, EligibilityService,
    FunnelAdvance, PropertyAnswers, StepInput, YesNo,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the disqualification walkthrough and only run the happy path.
    #[arg(long)]
    pub(crate) skip_disqualified: bool,
}

const DEMO_POSTCODE: &str = "LS1 4DY";

type DemoService =
    EligibilityService<InMemoryAddressBook, InMemoryCertificateRegistry, RecordingLeadIntake>;

fn demo_service() -> (Arc<DemoService>, RecordingLeadIntake) {
    let addresses = InMemoryAddressBook::default();
    addresses.insert(
        DEMO_POSTCODE,
        vec![
            AddressCandidate {
                id: "0".to_string(),
                label: "12 Acacia Avenue, Leeds, LS1 4DY".to_string(),
                property_ref: Some("100023336956".to_string()),
                line1: "12 Acacia Avenue".to_string(),
                town: "Leeds".to_string(),
                postcode: DEMO_POSTCODE.to_string(),
            },
            AddressCandidate {
                id: "1".to_string(),
                label: "14 Acacia Avenue, Leeds, LS1 4DY".to_string(),
                property_ref: None,
                line1: "14 Acacia Avenue".to_string(),
                town: "Leeds".to_string(),
                postcode: DEMO_POSTCODE.to_string(),
            },
        ],
    );

    let registry = InMemoryCertificateRegistry::default();
    registry.insert_for_reference(
        "100023336956",
        vec![CertificateRecord {
            current_energy_rating: Some("D".to_string()),
            current_energy_efficiency: Some(55),
            potential_energy_rating: Some("B".to_string()),
            potential_energy_efficiency: Some(84),
            lmk_key: Some("demo-lmk-0001".to_string()),
            lodgement_date: Some("2024-05-20".to_string()),
            inspection_date: None,
            address1: Some("12 Acacia Avenue".to_string()),
            address2: None,
            address3: None,
            posttown: Some("Leeds".to_string()),
            postcode: Some(DEMO_POSTCODE.to_string()),
        }],
    );
    registry.insert_for_postcode(DEMO_POSTCODE, Vec::new());

    let intake = RecordingLeadIntake::default();
    let service = Arc::new(EligibilityService::new(
        Arc::new(addresses),
        Arc::new(registry),
        Arc::new(intake.clone()),
        default_funnel_config(),
    ));
    (service, intake)
}

fn print_step(advance: &FunnelAdvance) {
    println!(
        "  -> {} ({:.0}% through the funnel)",
        advance.step_label,
        advance.progress * 100.0
    );
}

fn demo_property() -> PropertyAnswers {
    PropertyAnswers {
        heating: "Gas central heating".to_string(),
        walls: "Cavity".to_string(),
        building_type: "Semi-detached house".to_string(),
        boiler: "Combi".to_string(),
        homeowner: YesNo::Yes,
        solar: YesNo::No,
        listed_building: YesNo::No,
        reason: Some("House is cold every winter".to_string()),
    }
}

async fn run_qualified_journey(service: &DemoService) -> Result<(), AppError> {
    println!("== Qualified applicant ==");
    println!("  Postcode {DEMO_POSTCODE}, address picked from the lookup list");

    let advance = service.start(DEMO_POSTCODE).await?;
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await?;
    if let Some(certificate) = &advance.session.answers().certificate {
        println!(
            "  Certificate: band {:?}, score {:?}",
            certificate.band, certificate.score
        );
    }
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Benefit {
                benefit: Some("Universal Credit".to_string()),
            },
        )
        .await?;
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Property {
                answers: demo_property(),
            },
        )
        .await?;
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Measure {
                selection: Some("Cavity wall insulation".to_string()),
            },
        )
        .await?;
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Contact {
                details: ContactDetails {
                    name: "Jo Bloggs".to_string(),
                    phone: "07123456789".to_string(),
                    email: "jo@example.co.uk".to_string(),
                    follow_up_committed: true,
                },
            },
        )
        .await?;
    print_step(&advance);
    println!("  Submitted: {}", advance.submitted);
    Ok(())
}

async fn run_disqualified_journey(service: &DemoService) -> Result<(), AppError> {
    println!("== Disqualified applicant (no route) ==");

    let advance = service.start(DEMO_POSTCODE).await?;
    let advance = service
        .advance(
            advance.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "1".to_string(),
                },
            },
        )
        .await?;
    print_step(&advance);

    let advance = service
        .advance(advance.session, StepInput::Benefit { benefit: None })
        .await?;
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Medical {
                qualifies: YesNo::No,
                condition: None,
            },
        )
        .await?;
    print_step(&advance);

    let advance = service
        .advance(
            advance.session,
            StepInput::Income {
                below_threshold: YesNo::No,
            },
        )
        .await?;
    print_step(&advance);
    if let Some(reason) = advance.disqualification {
        println!("  Outcome: {} ({})", reason.label(), reason.summary());
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let (service, intake) = demo_service();

    run_qualified_journey(&service).await?;
    if !args.skip_disqualified {
        println!();
        run_disqualified_journey(&service).await?;
    }

    println!();
    let leads = intake.submissions();
    println!("== Intake sink received {} lead(s) ==", leads.len());
    for lead in leads {
        match serde_json::to_string_pretty(&lead) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("  (payload unavailable: {err})"),
        }
    }
    Ok(())
}
