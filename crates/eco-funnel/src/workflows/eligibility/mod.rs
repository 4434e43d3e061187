//! Eligibility resolution pipeline: postcode normalization, region
//! dispatch, certificate resolution, and the branching applicant wizard.

pub mod council;
pub mod intake;
pub mod lookup;
pub mod postcode;
pub mod resolver;
pub mod router;
pub mod service;
pub mod similarity;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use council::{CouncilArea, CouncilLookup, HttpCouncilLookup};
pub use intake::{HttpLeadIntake, IntakeError, LeadIntake, LeadStatus, LeadSubmission};
pub use lookup::{AddressCandidate, AddressLookup, HttpAddressLookup, LookupError};
pub use postcode::{Postcode, PostcodeError, Region, RegionClassifier};
pub use resolver::{
    CertificateQuery, CertificateRecord, CertificateRegistry, CertificateResolver,
    HttpCertificateRegistry, RegistryError, ResolutionResult, ResolverConfig, RetryPolicy,
};
pub use router::eligibility_router;
pub use service::{EligibilityService, FunnelAdvance, FunnelError};
pub use wizard::{
    AddressSelection, Answers, ChosenAddress, ContactDetails, DisqualificationReason,
    EligibilityRoute, EligibilitySession, FunnelConfig, OptInDetails, PropertyAnswers, ScorePolicy,
    StepId, StepInput, StepState, ValidationError, YesNo,
};
