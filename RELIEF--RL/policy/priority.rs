//! Non-learning priority scorer over the four response action types.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
    action::PriorityActionType,
    state::{ScenarioReport, StateEncoder, StateFeatures, STATE_DIM},
};

/// Hand-tuned weights per action type over the scenario features
/// `[severity, type, population, resources, elapsed]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeightTable {
    /// Rescue weights.
    #[serde(default = "default_rescue")]
    pub rescue: StateFeatures,
    /// Medical weights.
    #[serde(default = "default_medical")]
    pub medical: StateFeatures,
    /// Logistics weights.
    #[serde(default = "default_logistics")]
    pub logistics: StateFeatures,
    /// Communication weights.
    #[serde(default = "default_communication")]
    pub communication: StateFeatures,
}

const fn default_rescue() -> StateFeatures {
    [0.9, 0.7, 0.8, 0.6, 0.9]
}

const fn default_medical() -> StateFeatures {
    [0.85, 0.6, 0.75, 0.7, 0.8]
}

const fn default_logistics() -> StateFeatures {
    [0.7, 0.5, 0.9, 0.8, 0.5]
}

const fn default_communication() -> StateFeatures {
    [0.6, 0.4, 0.7, 0.5, 0.6]
}

impl Default for PriorityWeightTable {
    fn default() -> Self {
        Self {
            rescue: default_rescue(),
            medical: default_medical(),
            logistics: default_logistics(),
            communication: default_communication(),
        }
    }
}

impl PriorityWeightTable {
    fn into_rows(self) -> [StateFeatures; PriorityActionType::COUNT] {
        [self.rescue, self.medical, self.logistics, self.communication]
    }

    /// Whether every weight is finite and inside `[0, 1]`.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.clone()
            .into_rows()
            .iter()
            .flatten()
            .all(|w| (0.0..=1.0).contains(w))
    }
}

/// One action type with its score for a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAction {
    /// Action type.
    pub action_type: PriorityActionType,
    /// `clamp(raw_score * 100, 0, 100)`.
    pub priority_score: f64,
    /// Dot product before scaling and clipping.
    pub raw_score: f64,
    /// Features the score was computed from.
    pub state_features: StateFeatures,
}

/// Linear priority scorer with an online, clipped feedback update.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityOptimizer {
    weights: [StateFeatures; PriorityActionType::COUNT],
    learning_rate: f64,
    default_resources: u32,
}

impl Default for PriorityOptimizer {
    fn default() -> Self {
        Self::new(PriorityWeightTable::default(), 0.01, 7)
    }
}

impl PriorityOptimizer {
    /// Creates a scorer from an explicit weight table.
    #[must_use]
    pub fn new(table: PriorityWeightTable, learning_rate: f64, default_resources: u32) -> Self {
        Self {
            weights: table.into_rows(),
            learning_rate,
            default_resources,
        }
    }

    /// Current weights for an action type.
    #[must_use]
    pub const fn weights(&self, action_type: PriorityActionType) -> &StateFeatures {
        &self.weights[action_type.index()]
    }

    /// Current weights as a table.
    #[must_use]
    pub const fn table(&self) -> PriorityWeightTable {
        PriorityWeightTable {
            rescue: self.weights[0],
            medical: self.weights[1],
            logistics: self.weights[2],
            communication: self.weights[3],
        }
    }

    fn raw_score(&self, features: &StateFeatures, action_type: PriorityActionType) -> f64 {
        self.weights(action_type)
            .iter()
            .zip(features)
            .map(|(w, f)| w * f)
            .sum()
    }

    /// Priority in `[0, 100]` for an encoded scenario.
    #[must_use]
    pub fn calculate_priority(&self, features: &StateFeatures, action_type: PriorityActionType) -> f64 {
        (self.raw_score(features, action_type) * 100.0).clamp(0.0, 100.0)
    }

    /// Same as [`PriorityOptimizer::calculate_priority`] with a free-form action label;
    /// unknown labels are scored as rescue.
    #[must_use]
    pub fn calculate_priority_for_label(&self, features: &StateFeatures, label: &str) -> f64 {
        self.calculate_priority(features, PriorityActionType::parse_lenient(label))
    }

    /// Scores every action type for `report` with `available_resources` units on hand and
    /// zero elapsed time, best first.
    ///
    /// Equal priorities are ordered by raw score, then by declaration order.
    #[must_use]
    pub fn optimize_actions(&self, report: &ScenarioReport, available_resources: u32) -> Vec<RankedAction> {
        let scenario = ScenarioReport {
            available_resources,
            time_elapsed_hours: 0.0,
            ..report.clone()
        };
        let features = StateEncoder::encode_scenario(&scenario);
        let mut ranked: Vec<RankedAction> = PriorityActionType::ALL
            .into_iter()
            .map(|action_type| {
                let raw_score = self.raw_score(&features, action_type);
                RankedAction {
                    action_type,
                    priority_score: (raw_score * 100.0).clamp(0.0, 100.0),
                    raw_score,
                    state_features: features,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(Ordering::Equal))
        });
        ranked
    }

    /// [`PriorityOptimizer::optimize_actions`] with the configured default resources.
    #[must_use]
    pub fn optimize(&self, report: &ScenarioReport) -> Vec<RankedAction> {
        self.optimize_actions(report, self.default_resources)
    }

    /// `w += learning_rate * reward * features`, then clips every weight to `[0, 1]`.
    pub fn update_from_feedback(
        &mut self,
        features: &StateFeatures,
        action_type: PriorityActionType,
        reward: f64,
    ) {
        let learning_rate = self.learning_rate;
        let row = &mut self.weights[action_type.index()];
        for (weight, feature) in row.iter_mut().zip(features.iter().take(STATE_DIM)) {
            *weight = (*weight + learning_rate * (reward * feature)).clamp(0.0, 1.0);
        }
    }

    /// Feedback update with a free-form action label; unknown labels update rescue.
    pub fn update_from_feedback_label(&mut self, features: &StateFeatures, label: &str, reward: f64) {
        self.update_from_feedback(features, PriorityActionType::parse_lenient(label), reward);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn critical_quake() -> ScenarioReport {
        ScenarioReport::new("critical", "earthquake", 25_000, 0)
    }

    #[test]
    fn ranks_all_four_types() {
        let ranked = PriorityOptimizer::default().optimize(&critical_quake());
        assert_eq!(ranked.len(), 4);
        for pair in ranked.windows(2) {
            assert!(pair[0].priority_score >= pair[1].priority_score);
        }
        assert!(ranked.iter().all(|r| (0.0..=100.0).contains(&r.priority_score)));
    }

    #[test]
    fn rescue_outranks_communication_on_critical_quake() {
        let ranked = PriorityOptimizer::default().optimize_actions(&critical_quake(), 7);
        let position = |kind| ranked.iter().position(|r| r.action_type == kind).unwrap();
        let rescue = &ranked[position(PriorityActionType::Rescue)];
        let communication = &ranked[position(PriorityActionType::Communication)];
        assert!(position(PriorityActionType::Rescue) < position(PriorityActionType::Communication));
        assert!(rescue.raw_score > communication.raw_score);
        assert!(rescue.priority_score >= communication.priority_score);
        assert_eq!(ranked[3].action_type, PriorityActionType::Communication);
    }

    #[test]
    fn priority_is_scaled_and_clipped() {
        let optimizer = PriorityOptimizer::default();
        // low quake, no population, no resources: only severity contributes
        let features = [1.0 / 3.0, 0.0, 0.0, 0.0, 0.0];
        let score = optimizer.calculate_priority(&features, PriorityActionType::Communication);
        assert!((score - 20.0).abs() < 1e-9);
        assert_eq!(
            optimizer.calculate_priority(&[1.0; 5], PriorityActionType::Rescue),
            100.0
        );
        assert_eq!(optimizer.calculate_priority(&[0.0; 5], PriorityActionType::Rescue), 0.0);
    }

    #[test]
    fn unknown_label_scores_as_rescue() {
        let optimizer = PriorityOptimizer::default();
        let features = [0.2, 0.1, 0.1, 0.3, 0.0];
        assert_eq!(
            optimizer.calculate_priority_for_label(&features, "drones"),
            optimizer.calculate_priority(&features, PriorityActionType::Rescue)
        );
    }

    #[test]
    fn feedback_moves_weights_and_clips() {
        let mut optimizer = PriorityOptimizer::default();
        let features = [1.0, 0.0, 0.5, 0.0, 0.0];
        optimizer.update_from_feedback(&features, PriorityActionType::Logistics, 10.0);
        let row = optimizer.weights(PriorityActionType::Logistics);
        assert!((row[0] - 0.8).abs() < 1e-12);
        assert!((row[2] - 0.95).abs() < 1e-12);
        assert_eq!(row[1], 0.5);

        optimizer.update_from_feedback(&features, PriorityActionType::Logistics, 1_000.0);
        assert_eq!(optimizer.weights(PriorityActionType::Logistics)[0], 1.0);
        optimizer.update_from_feedback(&features, PriorityActionType::Logistics, -1_000.0);
        assert_eq!(optimizer.weights(PriorityActionType::Logistics)[0], 0.0);
        assert!(optimizer.table().is_normalized());
        assert_eq!(
            optimizer.weights(PriorityActionType::Rescue),
            &PriorityWeightTable::default().rescue
        );
    }

    #[test]
    fn independent_optimizers_do_not_share_weights() {
        let mut a = PriorityOptimizer::default();
        let b = PriorityOptimizer::default();
        a.update_from_feedback_label(&[1.0; 5], "unknown", -50.0);
        assert_ne!(a.weights(PriorityActionType::Rescue), b.weights(PriorityActionType::Rescue));
    }
}
