// src/agent/form.rs
//! Pure per-step state machine for one Easy Apply attempt.
//!
//! All loop state lives in [`ApplicationFormState`] and everything seen
//! on the page in [`StepObservation`]; [`decide`] maps the pair to a
//! plan without touching the driver, so the machine is testable without
//! a session.

use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct ApplicationFormState {
    pub step_index: u32,
    pub current_questions: BTreeSet<String>,
    /// Questions answered earlier in this job attempt. Seeing only these
    /// again means answering once more cannot help.
    pub previously_answered: BTreeSet<String>,
    pub resume_uploaded: bool,
    pub cover_letter_uploaded: bool,
    pub submitted: bool,
    /// Consecutive steps with nothing actionable.
    pub idle_steps: u32,
}

impl ApplicationFormState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What the driver could see on the current form step.
#[derive(Debug, Clone, Default)]
pub struct StepObservation {
    pub resume_upload: bool,
    pub cover_letter_upload: bool,
    pub submit: bool,
    pub questions: Vec<String>,
    pub advance: bool,
}

/// The gate the step resolves through, after any uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Submit,
    Answer(Vec<String>),
    Advance,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub upload_resume: bool,
    pub upload_cover_letter: bool,
    pub gate: Gate,
}

/// Decide what one step does. Strict priority: uploads happen whenever
/// their affordance is present and unused; then submit wins over
/// questions, questions over advance.
pub fn decide(state: &ApplicationFormState, observation: &StepObservation) -> StepPlan {
    let upload_resume = observation.resume_upload && !state.resume_uploaded;
    let upload_cover_letter = observation.cover_letter_upload && !state.cover_letter_uploaded;

    let gate = if observation.submit {
        Gate::Submit
    } else if !observation.questions.is_empty() {
        let all_seen = observation
            .questions
            .iter()
            .all(|question| state.previously_answered.contains(question));
        if all_seen {
            if observation.advance {
                Gate::Advance
            } else {
                Gate::Nothing
            }
        } else {
            Gate::Answer(observation.questions.clone())
        }
    } else if observation.advance {
        Gate::Advance
    } else {
        Gate::Nothing
    };

    StepPlan {
        upload_resume,
        upload_cover_letter,
        gate,
    }
}
