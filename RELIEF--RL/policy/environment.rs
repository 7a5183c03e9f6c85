use crate::{action::DisasterAction, reward::Outcome, state::DisasterState};

/// Provider of training scenarios and their outcomes.
///
/// The agent makes no assumption about how states or outcomes are produced beyond the
/// field contracts of [`DisasterState`] and [`Outcome`].
pub trait ScenarioSource {
    /// Draws the next scenario.
    fn generate_state(&mut self) -> DisasterState;

    /// Outcome of responding to `state` with `action`.
    fn simulate_outcome(&mut self, state: &DisasterState, action: &DisasterAction) -> Outcome;
}

/// Source replaying one state and one outcome forever.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedScenario {
    state: DisasterState,
    outcome: Outcome,
}

impl FixedScenario {
    /// Creates a source that always yields `state` and `outcome`.
    #[must_use]
    pub const fn new(state: DisasterState, outcome: Outcome) -> Self {
        Self { state, outcome }
    }
}

impl ScenarioSource for FixedScenario {
    fn generate_state(&mut self) -> DisasterState {
        self.state.clone()
    }

    fn simulate_outcome(&mut self, _state: &DisasterState, _action: &DisasterAction) -> Outcome {
        self.outcome
    }
}
