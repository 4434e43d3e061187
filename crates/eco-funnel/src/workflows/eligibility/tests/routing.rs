use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::eligibility::intake::LeadStatus;
use crate::workflows::eligibility::router::eligibility_router;
use crate::workflows::eligibility::service::FunnelError;
use crate::workflows::eligibility::wizard::{
    AddressSelection, DisqualificationReason, EligibilitySession, OptInDetails, StepId, StepInput,
    YesNo,
};

fn qualified_registry() -> StubRegistry {
    StubRegistry {
        postcode_rows: vec![record("D", 55, "2024-05-20", "12 Acacia Avenue")],
        ..StubRegistry::default()
    }
}

async fn drive_to_contact(service: &StubService) -> EligibilitySession {
    let started = service.start("ls1 4dy").await.expect("session starts");
    assert_eq!(started.step, StepId::Address);

    let advanced = service
        .advance(
            started.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await
        .expect("address accepted and certificate resolved");
    // The machine-owned certificate check ran inside the service.
    assert_eq!(advanced.step, StepId::BenefitRoute);

    let advanced = service
        .advance(
            advanced.session,
            StepInput::Benefit {
                benefit: Some("Universal Credit".to_string()),
            },
        )
        .await
        .expect("benefit accepted");
    let advanced = service
        .advance(
            advanced.session,
            StepInput::Property {
                answers: property_answers(YesNo::No),
            },
        )
        .await
        .expect("property accepted");
    let advanced = service
        .advance(
            advanced.session,
            StepInput::Measure {
                selection: Some("Loft insulation".to_string()),
            },
        )
        .await
        .expect("measure accepted");
    assert_eq!(advanced.step, StepId::Contact);
    advanced.session
}

#[tokio::test]
async fn full_funnel_submits_an_enriched_qualified_lead() {
    let (service, intake) = build_service(
        qualified_registry(),
        vec![candidate("0", "12 Acacia Avenue", Some("10001234"))],
    );

    let session = drive_to_contact(&service).await;
    let outcome = service
        .advance(session, StepInput::Contact { details: contact() })
        .await
        .expect("submission succeeds");

    assert_eq!(outcome.step, StepId::Submit);
    assert!(outcome.submitted);

    let leads = intake.submissions();
    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.status, LeadStatus::Qualified);
    assert_eq!(lead.postcode, "LS1 4DY");
    assert_eq!(lead.certificate.as_ref().and_then(|c| c.score), Some(55));
    assert_eq!(lead.measure.as_deref(), Some("Loft insulation"));
    assert_eq!(
        lead.council.as_ref().map(|c| c.council.as_str()),
        Some("Leeds City Council")
    );
}

#[tokio::test]
async fn optin_dispatches_a_reduced_payload() {
    let (service, intake) = build_service(
        qualified_registry(),
        vec![candidate("0", "12 Acacia Avenue", None)],
    );

    let started = service.start("LS1 4DY").await.expect("session starts");
    let advanced = service
        .advance(
            started.session,
            StepInput::Address {
                selection: AddressSelection::Candidate {
                    id: "0".to_string(),
                },
            },
        )
        .await
        .expect("address accepted");
    let advanced = service
        .advance(
            advanced.session,
            StepInput::Benefit {
                benefit: Some("Income Support".to_string()),
            },
        )
        .await
        .expect("benefit accepted");
    let advanced = service
        .advance(
            advanced.session,
            StepInput::Property {
                answers: property_answers(YesNo::No),
            },
        )
        .await
        .expect("property accepted");
    let advanced = service
        .advance(advanced.session, StepInput::Measure { selection: None })
        .await
        .expect("none disqualifies");
    assert_eq!(
        advanced.disqualification,
        Some(DisqualificationReason::NoMeasure)
    );
    assert!(!advanced.submitted);

    let outcome = service
        .advance(
            advanced.session,
            StepInput::NotifyOptIn {
                details: OptInDetails {
                    name: "Jo Bloggs".to_string(),
                    phone: "07123456789".to_string(),
                    email: "jo@example.co.uk".to_string(),
                },
            },
        )
        .await
        .expect("opt-in submits");
    assert!(outcome.submitted);

    let leads = intake.submissions();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].status, LeadStatus::DisqualifiedOptin);
    assert_eq!(
        leads[0].disqualification,
        Some(DisqualificationReason::NoMeasure)
    );
    assert!(leads[0].council.is_none());
}

#[tokio::test]
async fn intake_failure_surfaces_as_an_upstream_error_and_the_session_can_retry() {
    let lookup = Arc::new(StubAddressBook {
        candidates: vec![candidate("0", "12 Acacia Avenue", None)],
        fails: false,
    });
    let intake = Arc::new(RecordingIntake {
        fails: true,
        ..RecordingIntake::default()
    });
    let service = crate::workflows::eligibility::service::EligibilityService::new(
        lookup,
        Arc::new(qualified_registry()),
        intake,
        funnel_config(),
    );

    let session = drive_to_contact(&service).await;
    let err = service
        .advance(
            session.clone(),
            StepInput::Contact { details: contact() },
        )
        .await
        .expect_err("intake failure propagates");
    assert!(matches!(err, FunnelError::Intake(_)));

    // The caller still holds the pre-submit snapshot and can retry the step.
    assert_eq!(session.step(), StepId::Contact);
}

#[tokio::test]
async fn start_endpoint_returns_candidates_and_a_snapshot() {
    let (service, _intake) = build_service(
        qualified_registry(),
        vec![candidate("0", "12 Acacia Avenue", Some("10001234"))],
    );
    let router = eligibility_router(service);

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/eligibility/sessions")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&json!({ "postcode": "ls1 4dy" })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["step"], json!("address"));
    assert_eq!(payload["progress"], json!(0.0));
    assert_eq!(
        payload["session"]["answers"]["candidates"][0]["property_ref"],
        json!("10001234")
    );
}

#[tokio::test]
async fn start_endpoint_rejects_bad_postcodes() {
    let (service, _intake) = build_service(StubRegistry::default(), Vec::new());
    let router = eligibility_router(service);

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/eligibility/sessions")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&json!({ "postcode": "nope" })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("postcode"));
}

#[tokio::test]
async fn advance_endpoint_round_trips_the_session_snapshot() {
    let (service, _intake) = build_service(
        qualified_registry(),
        vec![candidate("0", "12 Acacia Avenue", None)],
    );
    let router = eligibility_router(service.clone());

    let started = service.start("LS1 4DY").await.expect("session starts");
    let request_body = json!({
        "session": started.session,
        "input": { "kind": "address", "selection": { "mode": "candidate", "id": "0" } }
    });

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/eligibility/sessions/advance")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&request_body).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["step"], json!("benefit_route"));
    assert_eq!(payload["session"]["answers"]["certificate"]["found"], json!(true));
}

#[tokio::test]
async fn certificates_endpoint_reports_low_confidence_as_found_false() {
    let (service, _intake) = build_service(
        StubRegistry {
            postcode_rows: vec![record("D", 55, "2024-01-01", "99 Unrelated Street")],
            ..StubRegistry::default()
        },
        Vec::new(),
    );
    let router = eligibility_router(service);

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/eligibility/certificates")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&json!({
                        "postcode": "LS1 4DY",
                        "address_label": "7 Orchard Close, Harrogate"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["found"], json!(false));
}

#[tokio::test]
async fn addresses_endpoint_surfaces_upstream_failure_as_bad_gateway() {
    let lookup = Arc::new(StubAddressBook {
        candidates: Vec::new(),
        fails: true,
    });
    let intake = Arc::new(RecordingIntake::default());
    let service = Arc::new(crate::workflows::eligibility::service::EligibilityService::new(
        lookup,
        Arc::new(StubRegistry::default()),
        intake,
        funnel_config(),
    ));
    let router = eligibility_router(service);

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/eligibility/addresses?postcode=LS1%204DY")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("address lookup failed"));
}
