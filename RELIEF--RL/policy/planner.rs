//! Rule-based action planner used when no learned policy is consulted.
//!
//! Every report yields logistics and communication actions; rescue and medical actions are
//! added only for high and critical severities. Scores come from a fixed severity base, a
//! capped population term, and a per-type multiplier.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared_logging::JsonLogger;

use crate::{action::PriorityActionType, state::Severity};

/// Model version stamped on decision records.
pub const DEFAULT_MODEL_VERSION: &str = "relief-rl-v1.0";

const POPULATION_WEIGHT_CAP: f64 = 50.0;
const MAX_PRIORITY: f64 = 100.0;

/// Disaster as reported to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterReport {
    /// Optional upstream identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable title used in descriptions.
    pub title: String,
    /// Severity label.
    pub severity: String,
    /// Disaster type label.
    #[serde(default)]
    pub disaster_type: String,
    /// People affected.
    #[serde(default)]
    pub affected_population: u64,
}

impl DisasterReport {
    /// Creates a report without an identifier.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        severity: impl Into<String>,
        disaster_type: impl Into<String>,
        affected_population: u64,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            severity: severity.into(),
            disaster_type: disaster_type.into(),
            affected_population,
        }
    }
}

/// One generated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: PriorityActionType,
    /// Operator-facing instruction.
    pub description: String,
    /// People expected to benefit.
    pub estimated_impact: u64,
    /// Completion deadline.
    pub deadline: DateTime<Utc>,
    /// Priority in `0..=100`.
    pub priority_score: u32,
}

/// Disaster attributes at decision time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Severity label as reported.
    pub disaster_severity: String,
    /// People affected.
    pub affected_population: u64,
    /// Disaster type label as reported.
    pub disaster_type: String,
    /// Decision time.
    pub timestamp: DateTime<Utc>,
}

/// Summary of the generated actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    /// Number of actions.
    pub actions_generated: usize,
    /// Types in plan order.
    pub action_types: Vec<PriorityActionType>,
    /// Scores in plan order.
    pub priority_scores: Vec<u32>,
}

/// One line of the decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Identifier of the report, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disaster_id: Option<String>,
    /// Disaster attributes.
    pub state_snapshot: StateSnapshot,
    /// Actions produced.
    pub action_taken: ActionSummary,
    /// Always `0.0` when written; filled in by later feedback.
    pub reward: f64,
    /// Planner version.
    pub model_version: String,
}

/// Heuristic planner.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    model_version: String,
}

impl Default for ActionPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_VERSION)
    }
}

impl ActionPlanner {
    /// Creates a planner stamping `model_version` on its decision records.
    #[must_use]
    pub fn new(model_version: impl Into<String>) -> Self {
        Self {
            model_version: model_version.into(),
        }
    }

    /// Version stamped on decision records.
    #[must_use]
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// `min(round((base + min(pop/100, 50)) * multiplier), 100)`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn priority(report: &DisasterReport, action_type: PriorityActionType) -> u32 {
        let population_weight = (report.affected_population as f64 / 100.0).min(POPULATION_WEIGHT_CAP);
        let score = ((severity_base(&report.severity) + population_weight) * multiplier(action_type))
            .round()
            .min(MAX_PRIORITY);
        score as u32
    }

    /// Generates actions for `report` with deadlines relative to `now`.
    #[must_use]
    pub fn plan(&self, report: &DisasterReport, now: DateTime<Utc>) -> Vec<PlannedAction> {
        let severe = matches!(
            Severity::parse_lenient(&report.severity),
            Severity::High | Severity::Critical
        );
        let types: &[PriorityActionType] = if severe {
            &PriorityActionType::ALL
        } else {
            &[PriorityActionType::Logistics, PriorityActionType::Communication]
        };
        types
            .iter()
            .map(|&action_type| PlannedAction {
                action_type,
                description: description(action_type, &report.title),
                estimated_impact: estimated_impact(action_type, report.affected_population),
                deadline: now + Duration::hours(deadline_hours(action_type)),
                priority_score: Self::priority(report, action_type),
            })
            .collect()
    }

    /// Snapshot of a planning decision.
    #[must_use]
    pub fn decision_record(
        &self,
        report: &DisasterReport,
        actions: &[PlannedAction],
        now: DateTime<Utc>,
    ) -> DecisionRecord {
        DecisionRecord {
            disaster_id: report.id.clone(),
            state_snapshot: StateSnapshot {
                disaster_severity: report.severity.clone(),
                affected_population: report.affected_population,
                disaster_type: report.disaster_type.clone(),
                timestamp: now,
            },
            action_taken: ActionSummary {
                actions_generated: actions.len(),
                action_types: actions.iter().map(|a| a.action_type).collect(),
                priority_scores: actions.iter().map(|a| a.priority_score).collect(),
            },
            reward: 0.0,
            model_version: self.model_version.clone(),
        }
    }

    /// Plans `report` and appends the decision to `log`.
    pub fn plan_and_record(
        &self,
        report: &DisasterReport,
        log: &JsonLogger,
    ) -> anyhow::Result<(Vec<PlannedAction>, DecisionRecord)> {
        let now = Utc::now();
        let actions = self.plan(report, now);
        let record = self.decision_record(report, &actions, now);
        log.append(&record)?;
        Ok((actions, record))
    }
}

fn severity_base(label: &str) -> f64 {
    match label.trim().to_ascii_lowercase().as_str() {
        "critical" => 100.0,
        "high" => 75.0,
        "low" => 25.0,
        _ => 50.0,
    }
}

const fn multiplier(action_type: PriorityActionType) -> f64 {
    match action_type {
        PriorityActionType::Rescue => 1.2,
        PriorityActionType::Medical => 1.15,
        PriorityActionType::Logistics => 0.9,
        PriorityActionType::Communication => 0.85,
    }
}

const fn deadline_hours(action_type: PriorityActionType) -> i64 {
    match action_type {
        PriorityActionType::Rescue => 2,
        PriorityActionType::Medical => 4,
        PriorityActionType::Logistics => 8,
        PriorityActionType::Communication => 6,
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn estimated_impact(action_type: PriorityActionType, population: u64) -> u64 {
    let share = match action_type {
        PriorityActionType::Rescue => 0.3,
        PriorityActionType::Medical => 0.4,
        PriorityActionType::Logistics => 0.6,
        PriorityActionType::Communication => return population,
    };
    (population as f64 * share).floor() as u64
}

fn description(action_type: PriorityActionType, title: &str) -> String {
    match action_type {
        PriorityActionType::Rescue => {
            format!("Deploy search and rescue teams to {title} location immediately")
        }
        PriorityActionType::Medical => {
            "Establish emergency medical triage and treatment facilities".to_owned()
        }
        PriorityActionType::Logistics => {
            "Set up supply distribution points for food, water, and shelter materials".to_owned()
        }
        PriorityActionType::Communication => {
            "Establish emergency communication network and information hotline".to_owned()
        }
    }
}
