//! Stateless disqualification predicates consulted by the state machine.

use super::config::ScorePolicy;
use super::domain::YesNo;

/// `true` when the certificate's efficiency score exceeds the qualifying
/// maximum and no boundary exception applies.
pub fn score_too_high(band: Option<&str>, score: u32, policy: &ScorePolicy) -> bool {
    if score <= policy.max_qualifying_score {
        return false;
    }
    if let (Some(exception), Some(band)) = (&policy.boundary_exception, band) {
        if exception.band.eq_ignore_ascii_case(band) && exception.score == score {
            return false;
        }
    }
    true
}

/// Existing solar ownership is an absolute disqualifier under the scheme's
/// funding rules.
pub fn has_existing_solar(answer: YesNo) -> bool {
    answer.is_yes()
}

/// `true` once every route question has been answered negatively; the funnel
/// has no further branch to offer.
pub fn exhausted_all_routes(benefit: Option<&str>, medical: YesNo, income: YesNo) -> bool {
    benefit.is_none() && !medical.is_yes() && !income.is_yes()
}

pub fn no_measure_chosen(selection: Option<&str>) -> bool {
    selection.is_none()
}
