use serde::{Deserialize, Serialize};

use super::super::resolver::ResolverConfig;

/// Certificate gate policy. `max_qualifying_score` is the highest efficiency
/// score that still qualifies; a record matching the optional boundary
/// exception passes the gate despite exceeding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePolicy {
    pub max_qualifying_score: u32,
    #[serde(default)]
    pub boundary_exception: Option<BandScoreException>,
}

/// Band/score pair carved out of the score cut by scheme policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandScoreException {
    pub band: String,
    pub score: u32,
}

/// Every business-tunable dial for the funnel in one explicit value, passed
/// to the state machine and resolver at construction. Nothing here is read
/// from ambient state.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    pub score_policy: ScorePolicy,
    pub resolver: ResolverConfig,
    /// Qualifying benefit types offered at the benefit-route step.
    pub benefits: Vec<String>,
    /// Funded improvement packages offered at the measure step.
    pub measures: Vec<String>,
    /// Named conditions an applicant may cite on the medical route.
    pub medical_conditions: Vec<String>,
    /// Annual household income ceiling (GBP) for the income route.
    pub income_threshold: u32,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            score_policy: ScorePolicy {
                max_qualifying_score: 60,
                boundary_exception: None,
            },
            resolver: ResolverConfig::default(),
            benefits: [
                "Universal Credit",
                "Pension Credit (Guarantee Credit)",
                "Income-based Jobseeker's Allowance",
                "Income-related Employment and Support Allowance",
                "Income Support",
                "Housing Benefit",
                "Child Tax Credit",
            ]
            .map(str::to_string)
            .to_vec(),
            measures: [
                "Loft insulation",
                "Cavity wall insulation",
                "Internal wall insulation",
                "Underfloor insulation",
                "Air source heat pump",
                "Solar PV",
            ]
            .map(str::to_string)
            .to_vec(),
            medical_conditions: [
                "Cardiovascular condition",
                "Respiratory condition",
                "Limited mobility",
                "Immunosuppression",
            ]
            .map(str::to_string)
            .to_vec(),
            income_threshold: 31_000,
        }
    }
}
