use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    action::{ActionCategory, ActionFeatures, DisasterAction, MAX_ALLOCATION},
    config::{non_negative, unit_interval, ConfigError},
    state::{DisasterState, StateFeatures},
    value::{features, LinearValueFunction, DEFAULT_INIT_SCALE},
};

/// Candidates sampled per category during greedy selection.
pub const CANDIDATES_PER_CATEGORY: usize = 5;

/// Inclusive range for the two randomised fields of a greedy candidate.
const CANDIDATE_MIN: u32 = 1;
const CANDIDATE_MAX: u32 = 5;

/// Focus allocation per severity level for greedy candidates.
const FOCUS_PER_SEVERITY: u32 = 3;

/// Used only if no candidate scores above negative infinity.
const FALLBACK_ACTION: DisasterAction = DisasterAction::new(5, 5, 5);

/// Learning hyperparameters, fixed for the lifetime of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Step size of the TD update.
    pub learning_rate: f64,
    /// Discount applied to the bootstrapped next-state value, in `[0, 1]`.
    pub discount_factor: f64,
    /// Exploration probability, in `[0, 1]`.
    pub epsilon: f64,
}

impl Hyperparameters {
    /// Rejects a non-finite or negative learning rate, and a discount or epsilon outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("agent.learning_rate", self.learning_rate)?;
        unit_interval("agent.discount_factor", self.discount_factor)?;
        unit_interval("agent.epsilon", self.epsilon)
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            discount_factor: 0.95,
            epsilon: 0.2,
        }
    }
}

/// Where the agent is in its select/update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    /// Between calls.
    Idle,
    /// Inside [`PolicyAgent::select_action`].
    Selecting,
    /// Inside [`PolicyAgent::update`].
    Updating,
}

/// Which branch of the epsilon-greedy rule produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Uniformly random category and allocation.
    Explore,
    /// Highest-scoring sampled candidate.
    Greedy,
    /// No candidate produced a comparable score.
    Fallback,
}

/// Result of [`PolicyAgent::select_action`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Chosen allocation.
    pub action: DisasterAction,
    /// Weight vector the action is scored with.
    pub category: ActionCategory,
    /// Branch taken.
    pub mode: SelectionMode,
}

/// Diagnostic record of one update. Never read back by the learning logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStep {
    /// Encoded state.
    pub state: StateFeatures,
    /// Encoded action.
    pub action: ActionFeatures,
    /// Category whose weights were updated.
    pub action_type: ActionCategory,
    /// Observed reward.
    pub reward: f64,
    /// Bootstrapped target.
    pub td_target: f64,
    /// `td_target - q_value`.
    pub td_error: f64,
    /// Q-value before the update.
    pub q_value: f64,
}

/// Epsilon-greedy agent over a [`LinearValueFunction`] trained with one-step TD(0).
///
/// Every random draw comes from the generator passed to each call, so runs are
/// reproducible under a fixed seed.
#[derive(Debug, Clone)]
pub struct PolicyAgent {
    hyperparameters: Hyperparameters,
    value: LinearValueFunction,
    history: Vec<TrainingStep>,
    phase: AgentPhase,
}

impl PolicyAgent {
    /// Creates an agent around existing weights.
    ///
    /// Hyperparameters are trusted; use [`PolicyAgent::try_new`] for unchecked input.
    #[must_use]
    pub fn new(hyperparameters: Hyperparameters, value: LinearValueFunction) -> Self {
        debug_assert!(hyperparameters.validate().is_ok(), "{hyperparameters:?}");
        Self {
            hyperparameters,
            value,
            history: Vec::new(),
            phase: AgentPhase::Idle,
        }
    }

    /// Creates an agent after checking the hyperparameter ranges.
    pub fn try_new(
        hyperparameters: Hyperparameters,
        value: LinearValueFunction,
    ) -> Result<Self, ConfigError> {
        hyperparameters.validate()?;
        Ok(Self::new(hyperparameters, value))
    }

    /// Creates an agent with Gaussian weights of standard deviation 0.1.
    pub fn with_random_weights<R: Rng + ?Sized>(hyperparameters: Hyperparameters, rng: &mut R) -> Self {
        Self::new(
            hyperparameters,
            LinearValueFunction::random(rng, DEFAULT_INIT_SCALE),
        )
    }

    /// Hyperparameters.
    #[must_use]
    pub const fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Current weights.
    #[must_use]
    pub const fn value_function(&self) -> &LinearValueFunction {
        &self.value
    }

    /// Replaces every weight vector, keeping hyperparameters and history.
    pub fn replace_value_function(&mut self, value: LinearValueFunction) {
        self.value = value;
    }

    /// Updates recorded so far.
    #[must_use]
    pub fn history(&self) -> &[TrainingStep] {
        &self.history
    }

    /// Number of updates recorded so far.
    #[must_use]
    pub fn training_episodes(&self) -> usize {
        self.history.len()
    }

    /// Current phase; `Idle` whenever the caller holds the agent.
    #[must_use]
    pub const fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Q-value under the current weights.
    #[must_use]
    pub fn q_value(&self, state: &DisasterState, action: &DisasterAction, category: ActionCategory) -> f64 {
        self.value.q_value(state, action, category)
    }

    /// Epsilon-greedy selection.
    ///
    /// With `explore` set and a uniform draw below epsilon, picks a random category and
    /// draws each field independently from `0..=min(10, available_resources)`. Otherwise
    /// scores five sampled candidates per category and keeps the first best one.
    pub fn select_action<R: Rng + ?Sized>(
        &mut self,
        state: &DisasterState,
        explore: bool,
        rng: &mut R,
    ) -> Selection {
        self.phase = AgentPhase::Selecting;
        let selection = if explore && rng.gen::<f64>() < self.hyperparameters.epsilon {
            Self::explore(state, rng)
        } else {
            self.greedy(state, rng)
        };
        self.phase = AgentPhase::Idle;
        selection
    }

    fn explore<R: Rng + ?Sized>(state: &DisasterState, rng: &mut R) -> Selection {
        let category = ActionCategory::ALL[rng.gen_range(0..ActionCategory::COUNT)];
        let cap = state.available_resources().min(MAX_ALLOCATION);
        let action = DisasterAction::new(
            rng.gen_range(0..=cap),
            rng.gen_range(0..=cap),
            rng.gen_range(0..=cap),
        );
        Selection {
            action,
            category,
            mode: SelectionMode::Explore,
        }
    }

    /// Greedy branch of [`PolicyAgent::select_action`]; consumes ten draws per category.
    pub fn greedy<R: Rng + ?Sized>(&self, state: &DisasterState, rng: &mut R) -> Selection {
        let focus = (state.severity().ordinal() * FOCUS_PER_SEVERITY).min(MAX_ALLOCATION);
        let mut best: Option<(f64, DisasterAction, ActionCategory)> = None;
        for category in ActionCategory::ALL {
            for _ in 0..CANDIDATES_PER_CATEGORY {
                let first = rng.gen_range(CANDIDATE_MIN..=CANDIDATE_MAX);
                let second = rng.gen_range(CANDIDATE_MIN..=CANDIDATE_MAX);
                let action = DisasterAction::focused(category, focus, first, second);
                let q = self.value.q_value(state, &action, category);
                let best_q = best.map_or(f64::NEG_INFINITY, |(q, _, _)| q);
                if q > best_q {
                    best = Some((q, action, category));
                }
            }
        }
        match best {
            Some((_, action, category)) => Selection {
                action,
                category,
                mode: SelectionMode::Greedy,
            },
            None => Selection {
                action: FALLBACK_ACTION,
                category: ActionCategory::Rescue,
                mode: SelectionMode::Fallback,
            },
        }
    }

    /// One semi-gradient TD(0) step on the weights of `category`.
    ///
    /// Without `next_state` the target is the reward itself. Otherwise the target adds
    /// the discounted value of a greedy selection in `next_state`, drawn from `rng`.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        state: &DisasterState,
        action: &DisasterAction,
        category: ActionCategory,
        reward: f64,
        next_state: Option<&DisasterState>,
        rng: &mut R,
    ) -> &TrainingStep {
        self.phase = AgentPhase::Updating;
        let phi = features(state, action);
        let q_current = self.value.q_value(state, action, category);

        let td_target = match next_state {
            None => reward,
            Some(next) => {
                let lookahead = self.greedy(next, rng);
                let q_next = self
                    .value
                    .q_value(next, &lookahead.action, lookahead.category);
                reward + self.hyperparameters.discount_factor * q_next
            }
        };
        let td_error = td_target - q_current;

        self.value
            .apply_td_step(category, self.hyperparameters.learning_rate * td_error, &phi);

        self.history.push(TrainingStep {
            state: state.to_vector(),
            action: action.to_vector(),
            action_type: category,
            reward,
            td_target,
            td_error,
            q_value: q_current,
        });
        self.phase = AgentPhase::Idle;
        &self.history[self.history.len() - 1]
    }
}

/// Agent shared between training episodes.
///
/// A full select-and-update cycle runs under a single lock, so concurrent episodes never
/// interleave inside one cycle.
#[derive(Debug, Clone)]
pub struct SharedPolicyAgent {
    inner: Arc<Mutex<PolicyAgent>>,
}

impl SharedPolicyAgent {
    /// Wraps an agent.
    #[must_use]
    pub fn new(agent: PolicyAgent) -> Self {
        Self {
            inner: Arc::new(Mutex::new(agent)),
        }
    }

    /// Exclusive access for ad-hoc reads or writes.
    pub fn lock(&self) -> MutexGuard<'_, PolicyAgent> {
        self.inner.lock()
    }

    /// Selects an action, obtains its reward from `reward_for`, and updates, all under one lock.
    pub fn cycle<R, F>(
        &self,
        state: &DisasterState,
        explore: bool,
        next_state: Option<&DisasterState>,
        rng: &mut R,
        reward_for: F,
    ) -> (Selection, TrainingStep)
    where
        R: Rng + ?Sized,
        F: FnOnce(&DisasterAction) -> f64,
    {
        let mut agent = self.inner.lock();
        let selection = agent.select_action(state, explore, rng);
        let reward = reward_for(&selection.action);
        let step = agent
            .update(state, &selection.action, selection.category, reward, next_state, rng)
            .clone();
        (selection, step)
    }

    /// Copy of the current agent.
    #[must_use]
    pub fn snapshot(&self) -> PolicyAgent {
        self.inner.lock().clone()
    }
}
