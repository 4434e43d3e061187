//! The branching eligibility wizard: a tagged-state machine over a fixed
//! step sequence, with early disqualification exits and a terminal
//! ready-to-submit state.

mod config;
mod domain;
mod machine;
pub mod policy;

pub use config::{BandScoreException, FunnelConfig, ScorePolicy};
pub use domain::{
    is_valid_email, is_valid_uk_mobile, AddressSelection, Answers, ChosenAddress, ContactDetails,
    DisqualificationReason, EligibilityRoute, OptInDetails, PropertyAnswers, StepId, StepInput,
    StepState, ValidationError, YesNo, STEP_SEQUENCE,
};
pub use machine::{EligibilitySession, LEGAL_TRANSITIONS};
