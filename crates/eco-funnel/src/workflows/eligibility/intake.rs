use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::council::CouncilArea;
use super::resolver::ResolutionResult;
use super::wizard::{
    is_valid_email, Answers, ChosenAddress, DisqualificationReason, EligibilityRoute,
    OptInDetails, PropertyAnswers, ValidationError,
};
use crate::config::{ConfigError, IntakeConfig};

/// Which funnel outcome a submission represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Qualified,
    DisqualifiedOptin,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Qualified => "qualified",
            LeadStatus::DisqualifiedOptin => "disqualified_optin",
        }
    }
}

/// Source/receipt stamp carried on every submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    pub source: String,
    pub received_at: DateTime<Utc>,
}

impl SubmissionMeta {
    fn stamp() -> Self {
        Self {
            source: "eco-funnel".to_string(),
            received_at: Utc::now(),
        }
    }
}

/// The single payload shape handed to the lead-intake webhook, for both
/// qualified leads and disqualified opt-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub status: LeadStatus,
    pub postcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ChosenAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<ResolutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<EligibilityRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyAnswers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disqualification: Option<DisqualificationReason>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub follow_up_committed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council: Option<CouncilArea>,
    pub meta: SubmissionMeta,
}

impl LeadSubmission {
    /// Full payload for an applicant who reached the submit step.
    pub fn qualified(
        answers: &Answers,
        council: Option<CouncilArea>,
    ) -> Result<Self, ValidationError> {
        let contact = answers
            .contact
            .as_ref()
            .ok_or(ValidationError::MissingField("contact"))?;
        let postcode = answers
            .postcode
            .as_ref()
            .ok_or(ValidationError::MissingField("postcode"))?;

        Ok(Self {
            status: LeadStatus::Qualified,
            postcode: postcode.as_str().to_string(),
            address: answers.address.clone(),
            certificate: answers.certificate.clone(),
            route: answers.route.clone(),
            property: answers.property.clone(),
            measure: answers.measure.clone(),
            disqualification: None,
            name: contact.name.clone(),
            phone: contact.phone.clone(),
            email: contact.email.clone(),
            follow_up_committed: contact.follow_up_committed,
            council,
            meta: SubmissionMeta::stamp(),
        })
    }

    /// Reduced payload for the "notify me if rules change" opt-in captured
    /// on an eligible disqualification.
    pub fn disqualified_optin(
        answers: &Answers,
        reason: DisqualificationReason,
        details: &OptInDetails,
    ) -> Result<Self, ValidationError> {
        let postcode = answers
            .postcode
            .as_ref()
            .ok_or(ValidationError::MissingField("postcode"))?;

        Ok(Self {
            status: LeadStatus::DisqualifiedOptin,
            postcode: postcode.as_str().to_string(),
            address: answers.address.clone(),
            certificate: answers.certificate.clone(),
            route: answers.route.clone(),
            property: answers.property.clone(),
            measure: None,
            disqualification: Some(reason),
            name: details.name.clone(),
            phone: details.phone.clone(),
            email: details.email.clone(),
            follow_up_committed: false,
            council: None,
            meta: SubmissionMeta::stamp(),
        })
    }

    /// Last-line sanity check before dispatch; the machine validates at
    /// capture time, but the sink contract is enforced here regardless of
    /// how the payload was assembled.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError::MissingField("phone"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }
}

/// Single sink for both funnel outcomes.
#[async_trait]
pub trait LeadIntake: Send + Sync {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), IntakeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("lead intake returned status {0}")]
    Status(u16),
    #[error("lead intake request failed")]
    Transport(#[source] reqwest::Error),
    #[error("lead intake timed out after {0:?}")]
    Timeout(Duration),
}

/// Webhook client with a hard timeout; expiry cancels the in-flight request
/// and surfaces as an upstream failure, never a silent drop.
pub struct HttpLeadIntake {
    client: reqwest::Client,
    webhook_url: String,
    timeout: Duration,
}

impl HttpLeadIntake {
    pub fn from_config(config: &IntakeConfig) -> Result<Self, ConfigError> {
        let webhook_url = config
            .webhook_url
            .clone()
            .ok_or(ConfigError::MissingWebhookUrl)?;
        Ok(Self {
            client: reqwest::Client::new(),
            webhook_url,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl LeadIntake for HttpLeadIntake {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), IntakeError> {
        let request = self.client.post(&self.webhook_url).json(lead).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| IntakeError::Timeout(self.timeout))?
            .map_err(IntakeError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        debug!(
            status = status.as_u16(),
            body = %body.chars().take(500).collect::<String>(),
            "lead intake rejected the payload"
        );
        Err(IntakeError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::eligibility::postcode::Postcode;
    use crate::workflows::eligibility::wizard::ContactDetails;

    fn answers_with_contact() -> Answers {
        Answers {
            postcode: Some(Postcode::parse("LS1 4DY").expect("valid postcode")),
            contact: Some(ContactDetails {
                name: "Jo Bloggs".to_string(),
                phone: "07123456789".to_string(),
                email: "jo@example.co.uk".to_string(),
                follow_up_committed: true,
            }),
            measure: Some("Loft insulation".to_string()),
            ..Answers::default()
        }
    }

    #[test]
    fn qualified_payload_carries_the_contact_and_status() {
        let lead =
            LeadSubmission::qualified(&answers_with_contact(), None).expect("payload builds");
        assert_eq!(lead.status, LeadStatus::Qualified);
        assert_eq!(lead.status.label(), "qualified");
        assert_eq!(lead.name, "Jo Bloggs");
        assert_eq!(lead.measure.as_deref(), Some("Loft insulation"));
        assert!(lead.follow_up_committed);
        assert!(lead.validate().is_ok());
    }

    #[test]
    fn qualified_payload_requires_contact_details() {
        let mut answers = answers_with_contact();
        answers.contact = None;
        assert_eq!(
            LeadSubmission::qualified(&answers, None).err(),
            Some(ValidationError::MissingField("contact"))
        );
    }

    #[test]
    fn optin_payload_is_reduced() {
        let answers = answers_with_contact();
        let details = OptInDetails {
            name: "Jo Bloggs".to_string(),
            phone: "07123456789".to_string(),
            email: "jo@example.co.uk".to_string(),
        };
        let lead = LeadSubmission::disqualified_optin(
            &answers,
            DisqualificationReason::NoMeasure,
            &details,
        )
        .expect("payload builds");

        assert_eq!(lead.status.label(), "disqualified_optin");
        assert_eq!(lead.disqualification, Some(DisqualificationReason::NoMeasure));
        assert_eq!(lead.measure, None);
        assert!(!lead.follow_up_committed);
        assert!(lead.validate().is_ok());
    }

    #[test]
    fn validation_rejects_malformed_email() {
        let mut lead =
            LeadSubmission::qualified(&answers_with_contact(), None).expect("payload builds");
        lead.email = "broken".to_string();
        assert_eq!(lead.validate(), Err(ValidationError::InvalidEmail));
    }
}
