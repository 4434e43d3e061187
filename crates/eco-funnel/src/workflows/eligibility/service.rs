use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::council::{CouncilArea, CouncilLookup};
use super::intake::{IntakeError, LeadIntake, LeadSubmission};
use super::lookup::{AddressCandidate, AddressLookup, LookupError};
use super::postcode::Postcode;
use super::resolver::{
    CertificateQuery, CertificateRegistry, CertificateResolver, RegistryError, ResolutionResult,
};
use super::wizard::{
    DisqualificationReason, EligibilitySession, FunnelConfig, StepId, StepInput, StepState,
    ValidationError,
};

/// Council enrichment is best-effort; it never holds the submit path open
/// for long.
const COUNCIL_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Facade composing the address lookup, certificate resolver, lead intake,
/// and optional council enrichment behind the wizard.
pub struct EligibilityService<L, R, I> {
    lookup: Arc<L>,
    resolver: CertificateResolver<R>,
    intake: Arc<I>,
    council: Option<Arc<dyn CouncilLookup>>,
    config: FunnelConfig,
}

impl<L, R, I> EligibilityService<L, R, I>
where
    L: AddressLookup + 'static,
    R: CertificateRegistry + 'static,
    I: LeadIntake + 'static,
{
    pub fn new(lookup: Arc<L>, registry: Arc<R>, intake: Arc<I>, config: FunnelConfig) -> Self {
        let resolver = CertificateResolver::new(registry, config.resolver.clone());
        Self {
            lookup,
            resolver,
            intake,
            council: None,
            config,
        }
    }

    pub fn with_council(mut self, council: Arc<dyn CouncilLookup>) -> Self {
        self.council = Some(council);
        self
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Open a session: validate the postcode and fetch the candidate list.
    /// An empty list is not an error; the wizard falls back to manual entry.
    pub async fn start(&self, raw_postcode: &str) -> Result<FunnelAdvance, FunnelError> {
        let postcode = Postcode::parse(raw_postcode).map_err(ValidationError::from)?;
        let candidates = self
            .lookup
            .search(&postcode)
            .await
            .map_err(FunnelError::AddressLookup)?;
        let session = EligibilitySession::start(postcode, candidates);
        Ok(FunnelAdvance::from_session(session, false))
    }

    /// Apply one wizard input. The machine-owned certificate check runs
    /// here as soon as the address step completes, and terminal outcomes
    /// dispatch to the intake sink before the snapshot is returned.
    pub async fn advance(
        &self,
        mut session: EligibilitySession,
        input: StepInput,
    ) -> Result<FunnelAdvance, FunnelError> {
        let optin_requested = matches!(input, StepInput::NotifyOptIn { .. });
        session.advance(input, &self.config)?;

        if session.step() == StepId::Certificate {
            let query = certificate_query(&session)?;
            let result = self
                .resolver
                .resolve(&query)
                .await
                .map_err(FunnelError::Certificate)?;
            session.advance(StepInput::Certificate { result }, &self.config)?;
        }

        let mut submitted = false;
        match session.state() {
            StepState::Submit => {
                let council = self.council_enrichment(&session).await;
                let lead = LeadSubmission::qualified(session.answers(), council)?;
                lead.validate()?;
                self.intake
                    .submit(&lead)
                    .await
                    .map_err(FunnelError::Intake)?;
                info!(postcode = %lead.postcode, "qualified lead submitted");
                submitted = true;
            }
            StepState::Disqualified {
                reason,
                optin_recorded: true,
            } if optin_requested => {
                let details = session
                    .answers()
                    .notify_optin
                    .as_ref()
                    .ok_or(ValidationError::MissingField("notify_optin"))?;
                let lead =
                    LeadSubmission::disqualified_optin(session.answers(), *reason, details)?;
                lead.validate()?;
                self.intake
                    .submit(&lead)
                    .await
                    .map_err(FunnelError::Intake)?;
                info!(
                    postcode = %lead.postcode,
                    reason = reason.label(),
                    "disqualified opt-in submitted"
                );
                submitted = true;
            }
            _ => {}
        }

        Ok(FunnelAdvance::from_session(session, submitted))
    }

    /// One-shot resolution for the pre-wizard certificate endpoint.
    pub async fn resolve_certificate(
        &self,
        query: &CertificateQuery,
    ) -> Result<ResolutionResult, FunnelError> {
        self.resolver
            .resolve(query)
            .await
            .map_err(FunnelError::Certificate)
    }

    /// Candidate lookup for a bare postcode, used outside a session.
    pub async fn search_addresses(
        &self,
        raw_postcode: &str,
    ) -> Result<Vec<AddressCandidate>, FunnelError> {
        let postcode = Postcode::parse(raw_postcode).map_err(ValidationError::from)?;
        self.lookup
            .search(&postcode)
            .await
            .map_err(FunnelError::AddressLookup)
    }

    async fn council_enrichment(&self, session: &EligibilitySession) -> Option<CouncilArea> {
        let lookup = self.council.as_ref()?;
        let postcode = session
            .answers()
            .address
            .as_ref()
            .map(|address| &address.postcode)
            .or(session.answers().postcode.as_ref())?;

        match tokio::time::timeout(COUNCIL_LOOKUP_TIMEOUT, lookup.lookup(postcode)).await {
            Ok(Ok(area)) => area,
            Ok(Err(err)) => {
                warn!(error = %err, "council enrichment failed, submitting without it");
                None
            }
            Err(_) => {
                warn!("council enrichment timed out, submitting without it");
                None
            }
        }
    }
}

fn certificate_query(session: &EligibilitySession) -> Result<CertificateQuery, FunnelError> {
    let address = session
        .answers()
        .address
        .as_ref()
        .ok_or(ValidationError::MissingField("address"))?;
    Ok(CertificateQuery {
        postcode: address.postcode.clone(),
        property_ref: address.property_ref.clone(),
        address_label: Some(address.label.clone()),
    })
}

/// Outcome of one wizard interaction, shaped for the UI layer. The session
/// snapshot travels with the client; the server keeps nothing.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelAdvance {
    pub step: StepId,
    pub step_label: &'static str,
    pub progress: f64,
    pub submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disqualification: Option<DisqualificationReason>,
    pub session: EligibilitySession,
}

impl FunnelAdvance {
    fn from_session(session: EligibilitySession, submitted: bool) -> Self {
        let disqualification = match session.state() {
            StepState::Disqualified { reason, .. } => Some(*reason),
            _ => None,
        };
        Self {
            step: session.step(),
            step_label: session.step().label(),
            progress: session.progress(),
            submitted,
            disqualification,
            session,
        }
    }
}

/// Service-level failure taxonomy. Display strings are deliberately coarse:
/// upstream detail is logged where it happens and never crosses this
/// boundary.
#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("address lookup failed")]
    AddressLookup(#[source] LookupError),
    #[error("certificate lookup failed")]
    Certificate(#[source] RegistryError),
    #[error("lead submission failed")]
    Intake(#[source] IntakeError),
}
