//! Qualification service for a home energy-efficiency grant scheme.
//!
//! The crate resolves a property's energy certificate from a postcode,
//! optional property reference, and address label, then walks an applicant
//! through a branching eligibility wizard that ends in either a lead
//! submission or a disqualification outcome.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
