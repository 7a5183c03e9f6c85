use serde::{Deserialize, Serialize};

use crate::{action::DisasterAction, state::DisasterState};

/// Lower clip bound shared by both reward functions.
pub const MIN_REWARD: f64 = -50.0;
/// Upper clip bound shared by both reward functions.
pub const MAX_REWARD: f64 = 100.0;

const FAST_RESPONSE_HOURS: f64 = 2.0;
const QUICK_RESPONSE_HOURS: f64 = 6.0;
const MODERATE_RESPONSE_HOURS: f64 = 12.0;
const FAST_RESPONSE_BONUS: f64 = 30.0;
const QUICK_RESPONSE_BONUS: f64 = 20.0;
const MODERATE_RESPONSE_BONUS: f64 = 10.0;
const LATE_PENALTY_PER_HOUR: f64 = 2.0;

const IMPACT_POINTS: f64 = 40.0;
const NEED_PER_SEVERITY: u64 = 500;
const NEED_PER_ALERT: u64 = 100;

const EFFICIENCY_POINTS: f64 = 20.0;
const RESOURCES_PER_SEVERITY: i64 = 3;
const MAX_RESOURCES_NEEDED: i64 = 15;

const OVER_ALLOCATION_PENALTY: i64 = 5;

const APPROPRIATENESS_BONUS: f64 = 5.0;
const RESCUE_THRESHOLD: u32 = 5;
const MEDICAL_THRESHOLD: u32 = 4;

/// Observed result of carrying out an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Hours until responders arrived.
    pub response_time_hours: f64,
    /// People reached.
    pub people_helped: u64,
    /// Units actually consumed.
    pub resources_used: u32,
}

/// Individual reward terms, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Tiered bonus, or a negative lateness penalty.
    pub response_time: f64,
    /// Share of estimated need covered, scaled to 40.
    pub impact: f64,
    /// Closeness of the allocation to the estimated need, scaled to 20.
    pub efficiency: f64,
    /// Non-positive penalty for allocating more than is available.
    pub over_allocation: f64,
    /// Bonus for a heavy rescue allocation on a severe disaster.
    pub rescue_bonus: f64,
    /// Bonus for a heavy medical deployment on a severe disaster.
    pub medical_bonus: f64,
}

impl RewardBreakdown {
    /// Sum of the terms clipped to `[-50, 100]`.
    ///
    /// Terms are accumulated one at a time in a fixed order so the result is reproducible
    /// to the last bit.
    #[must_use]
    pub fn total(&self) -> f64 {
        let mut reward = 0.0;
        reward += self.response_time;
        reward += self.impact;
        reward += self.efficiency;
        reward += self.over_allocation;
        reward += self.rescue_bonus;
        reward += self.medical_bonus;
        reward.clamp(MIN_REWARD, MAX_REWARD)
    }
}

/// Ground-truth reward the agent is trained against.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardModel;

impl RewardModel {
    /// Scores an outcome.
    #[must_use]
    pub fn reward(state: &DisasterState, action: &DisasterAction, outcome: &Outcome) -> f64 {
        Self::breakdown(state, action, outcome).total()
    }

    /// Computes every term without summing.
    ///
    /// Efficiency and over-allocation are measured on the action's own allocation
    /// rather than on `outcome.resources_used`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn breakdown(
        state: &DisasterState,
        action: &DisasterAction,
        outcome: &Outcome,
    ) -> RewardBreakdown {
        let severity = state.severity().ordinal();

        let response_time = response_time_term(outcome.response_time_hours);

        let estimated_need = (u64::from(severity) * NEED_PER_SEVERITY
            + u64::from(state.num_alerts()) * NEED_PER_ALERT)
            .max(1);
        let impact_ratio = (outcome.people_helped as f64 / estimated_need as f64).min(1.0);

        let used = i64::from(action.total_resources());
        let needed = (i64::from(severity) * RESOURCES_PER_SEVERITY + i64::from(state.num_alerts()))
            .min(MAX_RESOURCES_NEEDED);
        let efficiency = 1.0 - (used - needed).abs() as f64 / needed.max(1) as f64;

        let available = i64::from(state.available_resources());
        let over_allocation = if used > available {
            -(((used - available) * OVER_ALLOCATION_PENALTY) as f64)
        } else {
            0.0
        };

        let severe = severity >= 2;
        let rescue_bonus = if severe && action.rescue_allocation >= RESCUE_THRESHOLD {
            APPROPRIATENESS_BONUS
        } else {
            0.0
        };
        let medical_bonus = if severe && action.medical_deployment >= MEDICAL_THRESHOLD {
            APPROPRIATENESS_BONUS
        } else {
            0.0
        };

        RewardBreakdown {
            response_time,
            impact: impact_ratio * IMPACT_POINTS,
            efficiency: efficiency * EFFICIENCY_POINTS,
            over_allocation,
            rescue_bonus,
            medical_bonus,
        }
    }
}

/// A non-finite response time scores as the worst possible delay.
fn response_time_term(hours: f64) -> f64 {
    if !hours.is_finite() {
        MIN_REWARD
    } else if hours <= FAST_RESPONSE_HOURS {
        FAST_RESPONSE_BONUS
    } else if hours <= QUICK_RESPONSE_HOURS {
        QUICK_RESPONSE_BONUS
    } else if hours <= MODERATE_RESPONSE_HOURS {
        MODERATE_RESPONSE_BONUS
    } else {
        -((hours - MODERATE_RESPONSE_HOURS) * LATE_PENALTY_PER_HOUR)
    }
}

/// What a ranked action promised, as recorded when it was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTaken {
    /// People the action was expected to reach.
    #[serde(default = "one")]
    pub estimated_impact: u64,
    /// Units committed.
    #[serde(default = "one_u32")]
    pub resources_allocated: u32,
}

/// Field report for a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    /// People reached.
    #[serde(default)]
    pub people_helped: u64,
    /// Hours until the action was completed.
    #[serde(default = "day_hours")]
    pub completion_time_hours: f64,
    /// Hours allowed.
    #[serde(default = "day_hours")]
    pub deadline_hours: f64,
    /// Units consumed.
    #[serde(default = "one_u32")]
    pub resources_used: u32,
}

impl Default for FeedbackOutcome {
    fn default() -> Self {
        Self {
            people_helped: 0,
            completion_time_hours: day_hours(),
            deadline_hours: day_hours(),
            resources_used: one_u32(),
        }
    }
}

const fn one() -> u64 {
    1
}

const fn one_u32() -> u32 {
    1
}

const fn day_hours() -> f64 {
    24.0
}

/// Reward used to tune the priority optimizer from field feedback, clipped to `[-50, 100]`.
///
/// Effectiveness earns up to 100 (capped at twice the estimate), timeliness up to 20,
/// and allocation accuracy up to 10. Every denominator is floored at 1. A non-finite
/// completion time or deadline costs 50.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn feedback_reward(action: &ActionTaken, outcome: &FeedbackOutcome) -> f64 {
    let mut reward = 0.0;

    let effectiveness =
        (outcome.people_helped as f64 / action.estimated_impact.max(1) as f64).min(2.0);
    reward += effectiveness * 50.0;

    let completion = outcome.completion_time_hours;
    let deadline = outcome.deadline_hours.max(1.0);
    if !completion.is_finite() || !deadline.is_finite() {
        reward += MIN_REWARD;
    } else if completion <= deadline {
        reward += (1.0 - completion / deadline) * 20.0;
    } else {
        reward -= (completion - deadline) / deadline * 30.0;
    }

    let used = i64::from(outcome.resources_used);
    let allocated = i64::from(action.resources_allocated);
    let efficiency = 1.0 - (used - allocated).abs() as f64 / allocated.max(1) as f64;
    reward += efficiency * 10.0;

    reward.clamp(MIN_REWARD, MAX_REWARD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DisasterType, Severity};

    fn outcome(hours: f64, helped: u64, action: &DisasterAction) -> Outcome {
        Outcome {
            response_time_hours: hours,
            people_helped: helped,
            resources_used: action.total_resources(),
        }
    }

    #[test]
    fn matches_hand_computed_reward() {
        // need = 2*500 + 4*100 = 1400, resources needed = min(6 + 4, 15) = 10
        let state = DisasterState::new(Severity::High, 4, 5.0, 12, DisasterType::Flood);
        let action = DisasterAction::new(5, 4, 1);
        let reward = RewardModel::reward(&state, &action, &outcome(4.0, 700, &action));
        // 20 (<=6h) + 0.5*40 + 1.0*20 + 0 + 5 + 5
        assert!((reward - 70.0).abs() < 1e-12);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        let state = DisasterState::new(Severity::Low, 0, 0.0, 20, DisasterType::Fire);
        let action = DisasterAction::new(0, 0, 0);
        let terms = |h| RewardModel::breakdown(&state, &action, &outcome(h, 0, &action)).response_time;
        assert_eq!(terms(2.0), 30.0);
        assert_eq!(terms(2.000_001), 20.0);
        assert_eq!(terms(6.0), 20.0);
        assert_eq!(terms(12.0), 10.0);
        assert!((terms(15.0) + 6.0).abs() < 1e-12);
    }

    #[test]
    fn zero_need_does_not_divide_by_zero() {
        let state = DisasterState::new(Severity::Low, 0, 1.0, 10, DisasterType::Fire);
        let action = DisasterAction::new(1, 1, 1);
        let terms = RewardModel::breakdown(&state, &action, &outcome(1.0, 50, &action));
        // need floors at 1 so impact saturates; resources needed floors at 1 so efficiency = 1 - 3
        assert_eq!(terms.impact, 40.0);
        assert!((terms.efficiency + 40.0).abs() < 1e-12);
        assert!(terms.total().is_finite());
    }

    #[test]
    fn over_allocation_is_penalised_per_unit() {
        let state = DisasterState::new(Severity::Medium, 2, 1.0, 5, DisasterType::Fire);
        let action = DisasterAction::new(4, 3, 1);
        let terms = RewardModel::breakdown(&state, &action, &outcome(1.0, 0, &action));
        assert_eq!(terms.over_allocation, -15.0);
        assert_eq!(terms.rescue_bonus, 0.0);
    }

    #[test]
    fn reward_is_clipped() {
        let state = DisasterState::new(Severity::Critical, 10, 0.0, 0, DisasterType::Tsunami);
        let greedy = DisasterAction::new(10, 10, 10);
        let low = RewardModel::reward(&state, &greedy, &outcome(200.0, 0, &greedy));
        assert_eq!(low, MIN_REWARD);

        let state = DisasterState::new(Severity::Critical, 3, 0.0, 30, DisasterType::Fire);
        let action = DisasterAction::new(6, 4, 2);
        let high = RewardModel::reward(&state, &action, &outcome(1.0, 1_000_000, &action));
        // 30 + 40 + 20 + 5 + 5 = 100 exactly
        assert_eq!(high, MAX_REWARD);
    }

    #[test]
    fn reward_stays_in_bounds_across_grid() {
        for severity in Severity::ALL {
            for alerts in [0, 3, 10] {
                for available in [0, 8, 20] {
                    let state = DisasterState::new(severity, alerts, 3.0, available, DisasterType::Flood);
                    for fields in [(0, 0, 0), (10, 10, 10), (5, 4, 1)] {
                        let action = DisasterAction::new(fields.0, fields.1, fields.2);
                        for hours in [0.5, 2.0, 6.0, 12.0, 30.0, 500.0] {
                            for helped in [0, 100, 10_000] {
                                let r = RewardModel::reward(&state, &action, &outcome(hours, helped, &action));
                                assert!((MIN_REWARD..=MAX_REWARD).contains(&r));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn non_finite_response_time_is_the_worst_delay() {
        let state = DisasterState::new(Severity::High, 4, 5.0, 12, DisasterType::Flood);
        let action = DisasterAction::new(5, 4, 1);
        for hours in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let terms = RewardModel::breakdown(&state, &action, &outcome(hours, 700, &action));
            assert_eq!(terms.response_time, MIN_REWARD);
            let reward = terms.total();
            assert!((MIN_REWARD..=MAX_REWARD).contains(&reward), "{hours}: {reward}");
        }
    }

    #[test]
    fn feedback_reward_survives_non_finite_times() {
        let action = ActionTaken {
            estimated_impact: 100,
            resources_allocated: 2,
        };
        for completion_time_hours in [f64::NAN, f64::INFINITY] {
            let outcome = FeedbackOutcome {
                people_helped: 100,
                completion_time_hours,
                deadline_hours: 24.0,
                resources_used: 2,
            };
            let reward = feedback_reward(&action, &outcome);
            // 50 effectiveness + 10 accuracy - 50 for the unusable time
            assert_eq!(reward, 10.0);
        }
        let outcome = FeedbackOutcome {
            deadline_hours: f64::INFINITY,
            ..FeedbackOutcome::default()
        };
        assert!((MIN_REWARD..=MAX_REWARD).contains(&feedback_reward(&action, &outcome)));
    }

    #[test]
    fn feedback_reward_on_time_and_exact() {
        let action = ActionTaken {
            estimated_impact: 1_000,
            resources_allocated: 4,
        };
        let outcome = FeedbackOutcome {
            people_helped: 1_000,
            completion_time_hours: 6.0,
            deadline_hours: 24.0,
            resources_used: 4,
        };
        // 50 + 0.75*20 + 10
        assert!((feedback_reward(&action, &outcome) - 75.0).abs() < 1e-12);
    }

    #[test]
    fn feedback_reward_late_and_clipped() {
        let action = ActionTaken {
            estimated_impact: 0,
            resources_allocated: 0,
        };
        let late = FeedbackOutcome {
            people_helped: 0,
            completion_time_hours: 240.0,
            deadline_hours: 0.0,
            resources_used: 50,
        };
        assert_eq!(feedback_reward(&action, &late), MIN_REWARD);

        let generous = FeedbackOutcome {
            people_helped: 10,
            completion_time_hours: 0.0,
            ..FeedbackOutcome::default()
        };
        let action = ActionTaken {
            estimated_impact: 1,
            resources_allocated: 1,
        };
        assert_eq!(feedback_reward(&action, &generous), MAX_REWARD);
    }

    #[test]
    fn feedback_defaults_match_missing_fields() {
        let outcome: FeedbackOutcome = serde_json::from_str("{}").unwrap();
        assert_eq!(outcome, FeedbackOutcome::default());
        let action: ActionTaken = serde_json::from_str("{}").unwrap();
        assert_eq!(action.estimated_impact, 1);
    }
}
