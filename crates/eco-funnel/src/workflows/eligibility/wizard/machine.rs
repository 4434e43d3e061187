use serde::{Deserialize, Serialize};

use super::super::lookup::AddressCandidate;
use super::super::postcode::Postcode;
use super::config::FunnelConfig;
use super::domain::{
    AddressSelection, Answers, ChosenAddress, DisqualificationReason, EligibilityRoute, StepId,
    StepInput, StepState, ValidationError, YesNo, STEP_SEQUENCE,
};
use super::policy;

/// Every branch the funnel may take. The transition function below is
/// checked against this table in tests, so each legal path stays statically
/// enumerable.
pub const LEGAL_TRANSITIONS: &[(StepId, StepId)] = &[
    (StepId::Address, StepId::Certificate),
    (StepId::Certificate, StepId::BenefitRoute),
    (StepId::Certificate, StepId::Disqualified),
    (StepId::BenefitRoute, StepId::Property),
    (StepId::BenefitRoute, StepId::MedicalRoute),
    (StepId::MedicalRoute, StepId::Property),
    (StepId::MedicalRoute, StepId::IncomeRoute),
    (StepId::IncomeRoute, StepId::Property),
    (StepId::IncomeRoute, StepId::Disqualified),
    (StepId::Property, StepId::Measure),
    (StepId::Property, StepId::Disqualified),
    (StepId::Measure, StepId::Contact),
    (StepId::Measure, StepId::Disqualified),
    (StepId::Contact, StepId::Submit),
    (StepId::Disqualified, StepId::Disqualified),
];

/// One applicant's wizard session: the tagged current step plus the
/// accreted answers. Created at the address step, discarded after a
/// terminal outcome; nothing is persisted server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilitySession {
    step: StepState,
    answers: Answers,
}

impl EligibilitySession {
    pub fn start(postcode: Postcode, candidates: Vec<AddressCandidate>) -> Self {
        Self {
            step: StepState::Address,
            answers: Answers {
                postcode: Some(postcode),
                candidates,
                ..Answers::default()
            },
        }
    }

    pub fn step(&self) -> StepId {
        self.step.id()
    }

    pub fn state(&self) -> &StepState {
        &self.step
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.step,
            StepState::Submit | StepState::Disqualified { .. }
        )
    }

    /// `stepIndex / (totalSteps - 1)`; terminal outcomes report 1.0.
    pub fn progress(&self) -> f64 {
        let id = self.step.id();
        if id == StepId::Disqualified {
            return 1.0;
        }
        let index = STEP_SEQUENCE
            .iter()
            .position(|step| *step == id)
            .unwrap_or(STEP_SEQUENCE.len() - 1);
        index as f64 / (STEP_SEQUENCE.len() - 1) as f64
    }

    /// Apply one validated input. Pure in (current state, input): replaying
    /// the same input on the same state always lands on the same step.
    pub fn advance(
        &mut self,
        input: StepInput,
        config: &FunnelConfig,
    ) -> Result<StepId, ValidationError> {
        if matches!(input, StepInput::Back) {
            return self.back();
        }
        let next = transition(&self.step, input, &mut self.answers, config)?;
        self.step = next;
        Ok(self.step.id())
    }

    /// Re-enter the previous step's view. Accreted answers stay committed;
    /// only the cursor moves.
    pub fn back(&mut self) -> Result<StepId, ValidationError> {
        if self.is_terminal() {
            return Err(ValidationError::Terminal);
        }

        let target = match self.step.id() {
            StepId::Address => StepId::Address,
            // The certificate check is machine-driven, so backing out of the
            // first route question lands on the address step.
            StepId::BenefitRoute => StepId::Address,
            // Property was reached by whichever route question set the route.
            StepId::Property => match &self.answers.route {
                Some(EligibilityRoute::Benefit { .. }) | None => StepId::BenefitRoute,
                Some(EligibilityRoute::Medical { .. }) => StepId::MedicalRoute,
                Some(EligibilityRoute::Income) => StepId::IncomeRoute,
            },
            other => {
                let index = STEP_SEQUENCE
                    .iter()
                    .position(|step| *step == other)
                    .unwrap_or(0);
                STEP_SEQUENCE[index.saturating_sub(1)]
            }
        };

        self.step = reenter(target);
        Ok(self.step.id())
    }
}

fn reenter(target: StepId) -> StepState {
    match target {
        StepId::Address => StepState::Address,
        StepId::Certificate => StepState::Certificate,
        StepId::BenefitRoute => StepState::BenefitRoute,
        StepId::MedicalRoute => StepState::MedicalRoute,
        StepId::IncomeRoute => StepState::IncomeRoute,
        StepId::Property => StepState::Property,
        StepId::Measure => StepState::Measure,
        StepId::Contact => StepState::Contact,
        StepId::Submit => StepState::Submit,
        // Terminal states are never re-entered via back-navigation.
        StepId::Disqualified => StepState::Contact,
    }
}

fn transition(
    step: &StepState,
    input: StepInput,
    answers: &mut Answers,
    config: &FunnelConfig,
) -> Result<StepState, ValidationError> {
    match (step, input) {
        (StepState::Address, StepInput::Address { selection }) => {
            let chosen = resolve_selection(&answers.candidates, selection)?;
            answers.address = Some(chosen);
            Ok(StepState::Certificate)
        }

        (StepState::Certificate, StepInput::Certificate { result }) => {
            let over_cut = match (result.found, result.score) {
                (true, Some(score)) => {
                    policy::score_too_high(result.band.as_deref(), score, &config.score_policy)
                }
                _ => false,
            };
            answers.certificate = Some(result);
            if over_cut {
                Ok(disqualified(DisqualificationReason::ScoreTooHigh))
            } else {
                // No certificate, or one under the cut: carry on either way.
                Ok(StepState::BenefitRoute)
            }
        }

        (StepState::BenefitRoute, StepInput::Benefit { benefit }) => {
            match normalize_choice(benefit) {
                Some(benefit) => {
                    if !contains_ignore_case(&config.benefits, &benefit) {
                        return Err(ValidationError::UnknownBenefit(benefit));
                    }
                    answers.route = Some(EligibilityRoute::Benefit { benefit });
                    Ok(StepState::Property)
                }
                None => Ok(StepState::MedicalRoute),
            }
        }

        (StepState::MedicalRoute, StepInput::Medical {
            qualifies,
            condition,
        }) => {
            if qualifies.is_yes() {
                let condition = match normalize_choice(condition) {
                    Some(condition) => {
                        if !contains_ignore_case(&config.medical_conditions, &condition) {
                            return Err(ValidationError::UnknownCondition(condition));
                        }
                        Some(condition)
                    }
                    None => None,
                };
                answers.route = Some(EligibilityRoute::Medical { condition });
                Ok(StepState::Property)
            } else {
                Ok(StepState::IncomeRoute)
            }
        }

        (StepState::IncomeRoute, StepInput::Income { below_threshold }) => {
            // Benefit and medical were declined on the way to this step, so
            // a negative answer here exhausts every route.
            if policy::exhausted_all_routes(None, YesNo::No, below_threshold) {
                Ok(disqualified(DisqualificationReason::NoRoute))
            } else {
                answers.route = Some(EligibilityRoute::Income);
                Ok(StepState::Property)
            }
        }

        (StepState::Property, StepInput::Property { answers: property }) => {
            property.validate()?;
            let solar = property.solar;
            answers.property = Some(property);
            if policy::has_existing_solar(solar) {
                Ok(disqualified(DisqualificationReason::ExistingSolar))
            } else {
                Ok(StepState::Measure)
            }
        }

        (StepState::Measure, StepInput::Measure { selection }) => {
            let selection = normalize_choice(selection);
            if policy::no_measure_chosen(selection.as_deref()) {
                return Ok(disqualified(DisqualificationReason::NoMeasure));
            }
            if let Some(measure) = selection {
                if !contains_ignore_case(&config.measures, &measure) {
                    return Err(ValidationError::UnknownMeasure(measure));
                }
                answers.measure = Some(measure);
            }
            Ok(StepState::Contact)
        }

        (StepState::Contact, StepInput::Contact { details }) => {
            details.validate()?;
            answers.contact = Some(details);
            Ok(StepState::Submit)
        }

        (
            StepState::Disqualified {
                reason,
                optin_recorded: _,
            },
            StepInput::NotifyOptIn { details },
        ) => {
            if !reason.allows_notify_optin() {
                return Err(ValidationError::OptInNotOffered);
            }
            details.validate()?;
            answers.notify_optin = Some(details);
            Ok(StepState::Disqualified {
                reason: *reason,
                optin_recorded: true,
            })
        }

        (state, input) => Err(ValidationError::WrongStep {
            step: state.id().label(),
            input: input.label(),
        }),
    }
}

const fn disqualified(reason: DisqualificationReason) -> StepState {
    StepState::Disqualified {
        reason,
        optin_recorded: false,
    }
}

/// `None`, an empty string, and a literal `none` all mean "nothing chosen".
fn normalize_choice(choice: Option<String>) -> Option<String> {
    choice
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("none"))
}

fn contains_ignore_case(options: &[String], value: &str) -> bool {
    options.iter().any(|option| option.eq_ignore_ascii_case(value))
}

fn resolve_selection(
    candidates: &[AddressCandidate],
    selection: AddressSelection,
) -> Result<ChosenAddress, ValidationError> {
    match selection {
        AddressSelection::Candidate { id } => {
            let candidate = candidates
                .iter()
                .find(|candidate| candidate.id == id)
                .ok_or(ValidationError::UnknownCandidate(id))?;
            Ok(ChosenAddress {
                label: candidate.label.clone(),
                line1: candidate.line1.clone(),
                town: Some(candidate.town.clone()).filter(|town| !town.trim().is_empty()),
                postcode: Postcode::parse(&candidate.postcode)?,
                property_ref: candidate.property_ref.clone(),
                manual: false,
            })
        }
        AddressSelection::Manual {
            line1,
            town,
            postcode,
        } => {
            let line1 = line1.trim().to_string();
            if line1.is_empty() {
                return Err(ValidationError::MissingField("address line"));
            }
            let postcode = Postcode::parse(&postcode)?;
            let town = town
                .map(|town| town.trim().to_string())
                .filter(|town| !town.is_empty());
            let label = [
                Some(line1.as_str()),
                town.as_deref(),
                Some(postcode.as_str()),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
            Ok(ChosenAddress {
                label,
                line1,
                town,
                postcode,
                property_ref: None,
                manual: true,
            })
        }
    }
}
