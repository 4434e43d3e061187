use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::intake::LeadIntake;
use super::lookup::AddressLookup;
use super::resolver::{CertificateQuery, CertificateRegistry};
use super::service::{EligibilityService, FunnelError};
use super::wizard::{EligibilitySession, StepInput};

/// Router builder exposing the funnel over HTTP. Session snapshots travel
/// in request and response bodies; no state is held server-side.
pub fn eligibility_router<L, R, I>(service: Arc<EligibilityService<L, R, I>>) -> Router
where
    L: AddressLookup + 'static,
    R: CertificateRegistry + 'static,
    I: LeadIntake + 'static,
{
    Router::new()
        .route(
            "/api/v1/eligibility/sessions",
            post(start_handler::<L, R, I>),
        )
        .route(
            "/api/v1/eligibility/sessions/advance",
            post(advance_handler::<L, R, I>),
        )
        .route(
            "/api/v1/eligibility/addresses",
            get(addresses_handler::<L, R, I>),
        )
        .route(
            "/api/v1/eligibility/certificates",
            post(certificates_handler::<L, R, I>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartRequest {
    pub(crate) postcode: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdvanceRequest {
    pub(crate) session: EligibilitySession,
    pub(crate) input: StepInput,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressQuery {
    pub(crate) postcode: String,
}

pub(crate) async fn start_handler<L, R, I>(
    State(service): State<Arc<EligibilityService<L, R, I>>>,
    axum::Json(request): axum::Json<StartRequest>,
) -> Response
where
    L: AddressLookup + 'static,
    R: CertificateRegistry + 'static,
    I: LeadIntake + 'static,
{
    match service.start(&request.postcode).await {
        Ok(advance) => (StatusCode::OK, axum::Json(advance)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler<L, R, I>(
    State(service): State<Arc<EligibilityService<L, R, I>>>,
    axum::Json(request): axum::Json<AdvanceRequest>,
) -> Response
where
    L: AddressLookup + 'static,
    R: CertificateRegistry + 'static,
    I: LeadIntake + 'static,
{
    match service.advance(request.session, request.input).await {
        Ok(advance) => (StatusCode::OK, axum::Json(advance)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn addresses_handler<L, R, I>(
    State(service): State<Arc<EligibilityService<L, R, I>>>,
    Query(query): Query<AddressQuery>,
) -> Response
where
    L: AddressLookup + 'static,
    R: CertificateRegistry + 'static,
    I: LeadIntake + 'static,
{
    match service.search_addresses(&query.postcode).await {
        Ok(candidates) => (
            StatusCode::OK,
            axum::Json(json!({ "options": candidates })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn certificates_handler<L, R, I>(
    State(service): State<Arc<EligibilityService<L, R, I>>>,
    axum::Json(query): axum::Json<CertificateQuery>,
) -> Response
where
    L: AddressLookup + 'static,
    R: CertificateRegistry + 'static,
    I: LeadIntake + 'static,
{
    match service.resolve_certificate(&query).await {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: FunnelError) -> Response {
    let status = match &error {
        FunnelError::Validation(_) => StatusCode::BAD_REQUEST,
        FunnelError::AddressLookup(_) | FunnelError::Certificate(_) | FunnelError::Intake(_) => {
            StatusCode::BAD_GATEWAY
        }
    };

    if status == StatusCode::BAD_GATEWAY {
        // Full detail stays in the logs; the body carries the coarse message.
        warn!(error = ?error, "upstream failure surfaced to client");
    }

    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}
