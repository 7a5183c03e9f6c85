#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Relief RL policy core: scenario featurization, reward model, linear Q-learning agent,
//! and the priority ranking paths used to order disaster-response actions.

/// Disaster state and scenario encoding.
#[path = "../state.rs"]
pub mod state;

/// Resource allocations and action categories.
#[path = "../action.rs"]
pub mod action;

/// Reward model and feedback reward.
#[path = "../reward.rs"]
pub mod reward;

/// Per-category linear value function.
#[path = "../value.rs"]
pub mod value;

/// Epsilon-greedy agent with TD(0) updates.
#[path = "../agent.rs"]
pub mod agent;

/// JSON policy persistence.
#[path = "../persistence.rs"]
pub mod persistence;

/// Fixed-weight priority optimizer.
#[path = "../priority.rs"]
pub mod priority;

/// Rule-based action planner and decision log.
#[path = "../planner.rs"]
pub mod planner;

/// TOML configuration.
#[path = "../config.rs"]
pub mod config;

/// Scenario provider boundary.
#[path = "../environment.rs"]
pub mod environment;

/// Telemetry helpers for logging/event emission.
#[path = "../helper.rs"]
pub mod helper;

pub use action::{ActionCategory, ActionEncoder, DisasterAction, PriorityActionType};
pub use agent::{
    AgentPhase, Hyperparameters, PolicyAgent, Selection, SelectionMode, SharedPolicyAgent,
    TrainingStep,
};
pub use config::{ConfigError, ReliefConfig};
pub use environment::{FixedScenario, ScenarioSource};
pub use helper::{random_seed, seeded_rng, PolicyTelemetry, PolicyTelemetryBuilder};
pub use persistence::{PolicyDocument, PolicyLoadError};
pub use planner::{ActionPlanner, DecisionRecord, DisasterReport, PlannedAction};
pub use priority::{PriorityOptimizer, PriorityWeightTable, RankedAction};
pub use reward::{feedback_reward, ActionTaken, FeedbackOutcome, Outcome, RewardModel};
pub use state::{DisasterState, DisasterType, ScenarioReport, Severity, StateEncoder};
pub use value::{LinearValueFunction, WeightError, WeightVector};
