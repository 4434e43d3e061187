use crate::cli::{CheckArgs, ServeArgs};
use crate::infra::{default_funnel_config, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use eco_funnel::config::AppConfig;
use eco_funnel::error::AppError;
use eco_funnel::telemetry;
use eco_funnel::workflows::eligibility::{
    CertificateQuery, CertificateResolver, EligibilityService, HttpAddressLookup,
    HttpCertificateRegistry, HttpCouncilLookup, HttpLeadIntake, Postcode, ValidationError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let lookup = Arc::new(HttpAddressLookup::from_config(&config.upstream.address)?);
    let registry = Arc::new(HttpCertificateRegistry::from_config(
        &config.upstream.registry,
    )?);
    let intake = Arc::new(HttpLeadIntake::from_config(&config.upstream.intake)?);
    let council = Arc::new(HttpCouncilLookup::from_config(&config.upstream.council));

    let service = Arc::new(
        EligibilityService::new(lookup, registry, intake, default_funnel_config())
            .with_council(council),
    );

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "eligibility funnel ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// One-shot certificate resolution against the live registry, for smoke
/// checks and support queries.
pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let postcode = Postcode::parse(&args.postcode)
        .map_err(|err| eco_funnel::workflows::eligibility::FunnelError::Validation(
            ValidationError::from(err),
        ))?;

    let registry = Arc::new(HttpCertificateRegistry::from_config(
        &config.upstream.registry,
    )?);
    let resolver = CertificateResolver::new(registry, default_funnel_config().resolver);

    let query = CertificateQuery {
        postcode,
        property_ref: args.property_ref,
        address_label: args.address,
    };
    let result = resolver
        .resolve(&query)
        .await
        .map_err(eco_funnel::workflows::eligibility::FunnelError::Certificate)?;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{result:?}"),
    }
    Ok(())
}
