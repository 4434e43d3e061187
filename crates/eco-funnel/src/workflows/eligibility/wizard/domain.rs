use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::super::lookup::AddressCandidate;
use super::super::postcode::{Postcode, PostcodeError};
use super::super::resolver::ResolutionResult;

/// Binary answer collected at several wizard steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub const fn is_yes(self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

/// Step identities in funnel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Address,
    Certificate,
    BenefitRoute,
    MedicalRoute,
    IncomeRoute,
    Property,
    Measure,
    Contact,
    Submit,
    Disqualified,
}

impl StepId {
    pub const fn label(self) -> &'static str {
        match self {
            StepId::Address => "address",
            StepId::Certificate => "certificate",
            StepId::BenefitRoute => "benefit_route",
            StepId::MedicalRoute => "medical_route",
            StepId::IncomeRoute => "income_route",
            StepId::Property => "property",
            StepId::Measure => "measure",
            StepId::Contact => "contact",
            StepId::Submit => "submit",
            StepId::Disqualified => "disqualified",
        }
    }
}

/// Ordered step sequence backing the progress fraction. Disqualification is
/// an exit, not a position in the sequence.
pub const STEP_SEQUENCE: [StepId; 9] = [
    StepId::Address,
    StepId::Certificate,
    StepId::BenefitRoute,
    StepId::MedicalRoute,
    StepId::IncomeRoute,
    StepId::Property,
    StepId::Measure,
    StepId::Contact,
    StepId::Submit,
];

/// Terminal failure outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisqualificationReason {
    ScoreTooHigh,
    ExistingSolar,
    NoRoute,
    NoMeasure,
}

impl DisqualificationReason {
    pub const fn label(self) -> &'static str {
        match self {
            DisqualificationReason::ScoreTooHigh => "score-too-high",
            DisqualificationReason::ExistingSolar => "existing-solar",
            DisqualificationReason::NoRoute => "no-route",
            DisqualificationReason::NoMeasure => "no-measure",
        }
    }

    /// Only the no-measure exit offers the rules-change notification
    /// sub-flow; every other disqualifier is final.
    pub const fn allows_notify_optin(self) -> bool {
        matches!(self, DisqualificationReason::NoMeasure)
    }

    pub const fn summary(self) -> &'static str {
        match self {
            DisqualificationReason::ScoreTooHigh => {
                "the property's energy efficiency score is already above the scheme maximum"
            }
            DisqualificationReason::ExistingSolar => {
                "properties with existing solar panels are not eligible under the scheme"
            }
            DisqualificationReason::NoRoute => {
                "no qualifying benefit, medical, or income route applies"
            }
            DisqualificationReason::NoMeasure => "no funded improvement measure was selected",
        }
    }
}

/// The qualifying pathway an applicant passed the eligibility gate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityRoute {
    Benefit { benefit: String },
    Medical { condition: Option<String> },
    Income,
}

impl EligibilityRoute {
    pub const fn label(&self) -> &'static str {
        match self {
            EligibilityRoute::Benefit { .. } => "benefit",
            EligibilityRoute::Medical { .. } => "medical",
            EligibilityRoute::Income => "income",
        }
    }
}

/// The applicant's confirmed property address, either picked from the
/// candidate list or typed manually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenAddress {
    pub label: String,
    pub line1: String,
    #[serde(default)]
    pub town: Option<String>,
    pub postcode: Postcode,
    #[serde(default)]
    pub property_ref: Option<String>,
    pub manual: bool,
}

/// Property attributes collected before measure selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAnswers {
    pub heating: String,
    pub walls: String,
    pub building_type: String,
    pub boiler: String,
    pub homeowner: YesNo,
    pub solar: YesNo,
    pub listed_building: YesNo,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PropertyAnswers {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (value, field) in [
            (&self.heating, "heating"),
            (&self.walls, "walls"),
            (&self.building_type, "building_type"),
            (&self.boiler, "boiler"),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Contact details collected at the final step. The commitment flag is
/// business policy: leads unwilling to take a follow-up call are filtered
/// before they ever reach the intake sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub follow_up_committed: bool,
}

impl ContactDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if !is_valid_uk_mobile(&self.phone) {
            return Err(ValidationError::InvalidPhone);
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        if !self.follow_up_committed {
            return Err(ValidationError::CommitmentRequired);
        }
        Ok(())
    }
}

/// Reduced contact capture for the "notify me if rules change" sub-flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptInDetails {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl OptInDetails {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if !is_valid_uk_mobile(&self.phone) {
            return Err(ValidationError::InvalidPhone);
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }
}

fn uk_mobile_grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^(?:\+44|44|0)7\d{9}$").expect("mobile grammar compiles")
    })
}

fn email_grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email grammar compiles"))
}

/// UK mobile numbering check; separators are tolerated and stripped first.
pub fn is_valid_uk_mobile(phone: &str) -> bool {
    let compact: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect();
    uk_mobile_grammar().is_match(&compact)
}

pub fn is_valid_email(email: &str) -> bool {
    email_grammar().is_match(email.trim())
}

/// Monotonically accreting record of everything collected so far. Fields are
/// only ever written by the step that owns them; earlier answers survive
/// back-navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answers {
    #[serde(default)]
    pub postcode: Option<Postcode>,
    #[serde(default)]
    pub candidates: Vec<AddressCandidate>,
    #[serde(default)]
    pub address: Option<ChosenAddress>,
    #[serde(default)]
    pub certificate: Option<ResolutionResult>,
    #[serde(default)]
    pub route: Option<EligibilityRoute>,
    #[serde(default)]
    pub property: Option<PropertyAnswers>,
    #[serde(default)]
    pub measure: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactDetails>,
    #[serde(default)]
    pub notify_optin: Option<OptInDetails>,
}

/// Tagged per-step state. Terminal variants carry their outcome; every other
/// variant is positional, with collected data living in [`Answers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepState {
    Address,
    Certificate,
    BenefitRoute,
    MedicalRoute,
    IncomeRoute,
    Property,
    Measure,
    Contact,
    Submit,
    Disqualified {
        reason: DisqualificationReason,
        #[serde(default)]
        optin_recorded: bool,
    },
}

impl StepState {
    pub const fn id(&self) -> StepId {
        match self {
            StepState::Address => StepId::Address,
            StepState::Certificate => StepId::Certificate,
            StepState::BenefitRoute => StepId::BenefitRoute,
            StepState::MedicalRoute => StepId::MedicalRoute,
            StepState::IncomeRoute => StepId::IncomeRoute,
            StepState::Property => StepId::Property,
            StepState::Measure => StepId::Measure,
            StepState::Contact => StepId::Contact,
            StepState::Submit => StepId::Submit,
            StepState::Disqualified { .. } => StepId::Disqualified,
        }
    }
}

/// How the applicant identified their property at the address step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AddressSelection {
    Candidate {
        id: String,
    },
    Manual {
        line1: String,
        #[serde(default)]
        town: Option<String>,
        postcode: String,
    },
}

/// One validated wizard input. Each variant is only legal at its own step;
/// anything else is a [`ValidationError::WrongStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepInput {
    Address {
        selection: AddressSelection,
    },
    Certificate {
        result: ResolutionResult,
    },
    Benefit {
        #[serde(default)]
        benefit: Option<String>,
    },
    Medical {
        qualifies: YesNo,
        #[serde(default)]
        condition: Option<String>,
    },
    Income {
        below_threshold: YesNo,
    },
    Property {
        answers: PropertyAnswers,
    },
    Measure {
        #[serde(default)]
        selection: Option<String>,
    },
    Contact {
        details: ContactDetails,
    },
    NotifyOptIn {
        details: OptInDetails,
    },
    Back,
}

impl StepInput {
    pub const fn label(&self) -> &'static str {
        match self {
            StepInput::Address { .. } => "address",
            StepInput::Certificate { .. } => "certificate",
            StepInput::Benefit { .. } => "benefit",
            StepInput::Medical { .. } => "medical",
            StepInput::Income { .. } => "income",
            StepInput::Property { .. } => "property",
            StepInput::Measure { .. } => "measure",
            StepInput::Contact { .. } => "contact",
            StepInput::NotifyOptIn { .. } => "notify_optin",
            StepInput::Back => "back",
        }
    }
}

/// Recoverable input problems; the caller re-prompts the same step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Postcode(#[from] PostcodeError),
    #[error("no address option with id '{0}'")]
    UnknownCandidate(String),
    #[error("'{0}' is not one of the offered benefits")]
    UnknownBenefit(String),
    #[error("'{0}' is not one of the offered measures")]
    UnknownMeasure(String),
    #[error("'{0}' is not one of the listed medical conditions")]
    UnknownCondition(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("phone must be a UK mobile number")]
    InvalidPhone,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("the follow-up commitment must be accepted before submission")]
    CommitmentRequired,
    #[error("the notification opt-in is not offered for this outcome")]
    OptInNotOffered,
    #[error("'{input}' is not a valid input at the {step} step")]
    WrongStep {
        step: &'static str,
        input: &'static str,
    },
    #[error("the session has already reached a terminal outcome")]
    Terminal,
}
