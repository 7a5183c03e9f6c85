use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use relief_policy::{
    helper::seeded_rng, ActionCategory, DisasterAction, DisasterState, Outcome, PolicyAgent,
    PolicyTelemetry, RewardModel, ScenarioSource,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_event_bus::EventKind;
use shared_logging::LogLevel;
use uuid::Uuid;

/// Default progress interval, in episodes.
pub const DEFAULT_LOG_EVERY: usize = 100;
/// Default number of trailing episodes averaged in reports.
pub const DEFAULT_REWARD_WINDOW: usize = 100;

/// One simulated episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Scenario.
    pub state: DisasterState,
    /// Chosen allocation.
    pub action: DisasterAction,
    /// Category the action was scored under.
    pub category: ActionCategory,
    /// Simulated outcome.
    pub outcome: Outcome,
    /// Clipped reward.
    pub reward: f64,
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Episodes run.
    pub episodes: usize,
    /// Mean reward over the trailing window; `0.0` when no episode ran.
    pub final_average_reward: f64,
    /// Reward of every episode, in order.
    pub episode_rewards: Vec<f64>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
}

/// Runs episodes of select, simulate, reward, and terminal update.
#[derive(Debug)]
pub struct Trainer<S> {
    agent: PolicyAgent,
    source: S,
    rng: SmallRng,
    telemetry: Option<PolicyTelemetry>,
    log_every: usize,
    reward_window: usize,
    episode_events: bool,
}

impl<S: ScenarioSource> Trainer<S> {
    /// Creates a trainer drawing exploration randomness from `seed`.
    #[must_use]
    pub fn new(agent: PolicyAgent, source: S, seed: u64) -> Self {
        Self {
            agent,
            source,
            rng: seeded_rng(seed),
            telemetry: None,
            log_every: DEFAULT_LOG_EVERY,
            reward_window: DEFAULT_REWARD_WINDOW,
            episode_events: false,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Option<PolicyTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets the progress interval and averaging window; zero is treated as one.
    #[must_use]
    pub fn with_reporting(mut self, log_every: usize, reward_window: usize) -> Self {
        self.log_every = log_every.max(1);
        self.reward_window = reward_window.max(1);
        self
    }

    /// Publishes an event after every episode.
    #[must_use]
    pub const fn with_episode_events(mut self, enabled: bool) -> Self {
        self.episode_events = enabled;
        self
    }

    /// Agent being trained.
    #[must_use]
    pub const fn agent(&self) -> &PolicyAgent {
        &self.agent
    }

    /// Mutable agent, e.g. to load weights.
    pub fn agent_mut(&mut self) -> &mut PolicyAgent {
        &mut self.agent
    }

    /// Releases the agent.
    #[must_use]
    pub fn into_agent(self) -> PolicyAgent {
        self.agent
    }

    /// One exploratory episode followed by a terminal update.
    pub fn run_episode(&mut self) -> Episode {
        let state = self.source.generate_state();
        let selection = self.agent.select_action(&state, true, &mut self.rng);
        let outcome = self.source.simulate_outcome(&state, &selection.action);
        let reward = RewardModel::reward(&state, &selection.action, &outcome);
        self.agent.update(
            &state,
            &selection.action,
            selection.category,
            reward,
            None,
            &mut self.rng,
        );
        Episode {
            state,
            action: selection.action,
            category: selection.category,
            outcome,
            reward,
        }
    }

    /// Runs `episodes` episodes, reporting progress every `log_every` episodes.
    pub fn train(&mut self, episodes: usize) -> Result<TrainingReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.log(
            LogLevel::Info,
            "training.start",
            &json!({ "run_id": run_id, "episodes": episodes }),
        )?;

        let mut episode_rewards = Vec::with_capacity(episodes);
        for index in 1..=episodes {
            let episode = self.run_episode();
            episode_rewards.push(episode.reward);
            if self.episode_events {
                self.emit(
                    EventKind::EpisodeCompleted,
                    json!({
                        "run_id": run_id,
                        "episode": index,
                        "category": episode.category,
                        "reward": episode.reward,
                    }),
                )?;
            }
            if index % self.log_every == 0 {
                let average = trailing_mean(&episode_rewards, self.reward_window);
                let progress = json!({
                    "run_id": run_id,
                    "episode": index,
                    "episodes": episodes,
                    "average_reward": average,
                });
                self.report(EventKind::TrainingProgress, progress)?;
            }
        }

        let report = TrainingReport {
            run_id,
            episodes,
            final_average_reward: trailing_mean(&episode_rewards, self.reward_window),
            episode_rewards,
            started_at,
            finished_at: Utc::now(),
        };
        let summary = json!({
            "run_id": run_id,
            "episodes": episodes,
            "final_average_reward": report.final_average_reward,
        });
        self.report(EventKind::TrainingCompleted, summary)?;
        Ok(report)
    }

    /// Greedy selection on `count` fresh scenarios. Weights are not updated.
    pub fn demonstrate(&mut self, count: usize) -> Vec<Episode> {
        (0..count)
            .map(|_| {
                let state = self.source.generate_state();
                let selection = self.agent.select_action(&state, false, &mut self.rng);
                let outcome = self.source.simulate_outcome(&state, &selection.action);
                let reward = RewardModel::reward(&state, &selection.action, &outcome);
                Episode {
                    state,
                    action: selection.action,
                    category: selection.category,
                    outcome,
                    reward,
                }
            })
            .collect()
    }

    fn log(&self, level: LogLevel, message: &str, metadata: &serde_json::Value) -> Result<()> {
        match &self.telemetry {
            Some(telemetry) => telemetry.log(level, message, metadata),
            None => Ok(()),
        }
    }

    /// Logs `payload` under the event's label, then publishes it.
    fn report(&self, kind: EventKind, payload: serde_json::Value) -> Result<()> {
        self.log(LogLevel::Info, kind.label(), &payload)?;
        self.emit(kind, payload)
    }

    fn emit(&self, kind: EventKind, payload: serde_json::Value) -> Result<()> {
        match &self.telemetry {
            Some(telemetry) => telemetry.event(kind, payload),
            None => Ok(()),
        }
    }
}

/// Mean of the last `window` values; `0.0` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trailing_mean(values: &[f64], window: usize) -> f64 {
    let tail = &values[values.len().saturating_sub(window)..];
    if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_policy::{
        reward::{MAX_REWARD, MIN_REWARD},
        DisasterType, FixedScenario, Hyperparameters, Severity,
    };
    use shared_event_bus::MemoryEventBus;
    use shared_logging::{read_records, LogRecord};
    use std::sync::Arc;
    use tempfile::tempdir;

    use crate::simulator::DisasterSimulator;

    fn agent(seed: u64) -> PolicyAgent {
        PolicyAgent::with_random_weights(Hyperparameters::default(), &mut seeded_rng(seed))
    }

    #[test]
    fn trailing_mean_uses_window() {
        assert_eq!(trailing_mean(&[], 100), 0.0);
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0, 4.0], 2), 3.5);
        assert_eq!(trailing_mean(&[2.0, 4.0], 100), 3.0);
    }

    #[test]
    fn training_updates_once_per_episode() {
        let mut trainer = Trainer::new(agent(1), DisasterSimulator::new(2), 3);
        let report = trainer.train(150).unwrap();
        assert_eq!(report.episodes, 150);
        assert_eq!(report.episode_rewards.len(), 150);
        assert_eq!(trainer.agent().training_episodes(), 150);
        assert!(report
            .episode_rewards
            .iter()
            .all(|r| (MIN_REWARD..=MAX_REWARD).contains(r)));
        assert!(report.started_at <= report.finished_at);
        let expected = trailing_mean(&report.episode_rewards, DEFAULT_REWARD_WINDOW);
        assert_eq!(report.final_average_reward, expected);
        for step in trainer.agent().history() {
            assert_eq!(step.td_target, step.reward);
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let run = || {
            let mut trainer = Trainer::new(agent(5), DisasterSimulator::new(6), 7);
            trainer.train(60).unwrap().episode_rewards
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn progress_is_logged_and_published() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("training.log");
        let bus = Arc::new(MemoryEventBus::new(64));
        let telemetry = PolicyTelemetry::builder("trainer")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let mut trainer = Trainer::new(agent(1), DisasterSimulator::new(2), 3)
            .with_telemetry(Some(telemetry))
            .with_reporting(10, 5)
            .with_episode_events(true);
        trainer.train(30).unwrap();

        let records: Vec<LogRecord> = read_records(&log_path).unwrap();
        let progress: Vec<_> = records
            .iter()
            .filter(|r| r.message == EventKind::TrainingProgress.label())
            .collect();
        assert_eq!(progress.len(), 3);
        assert_eq!(records.last().unwrap().message, EventKind::TrainingCompleted.label());
        assert_eq!(progress[2].metadata["episode"], 30);
        assert_eq!(bus.of_kind(EventKind::TrainingProgress).len(), 3);
        assert_eq!(bus.of_kind(EventKind::EpisodeCompleted).len(), 30);
        assert_eq!(bus.of_kind(EventKind::TrainingCompleted).len(), 1);
    }

    #[test]
    fn demonstration_leaves_weights_alone() {
        let state = DisasterState::new(Severity::Critical, 8, 2.0, 15, DisasterType::Fire);
        let outcome = Outcome {
            response_time_hours: 1.0,
            people_helped: 2_000,
            resources_used: 15,
        };
        let mut trainer = Trainer::new(agent(9), FixedScenario::new(state, outcome), 4);
        let before = trainer.agent().value_function().clone();
        let demos = trainer.demonstrate(5);
        assert_eq!(demos.len(), 5);
        assert_eq!(trainer.agent().value_function(), &before);
        assert_eq!(trainer.agent().training_episodes(), 0);
        for demo in demos {
            // critical severity focuses 9 units on the chosen category
            assert_eq!(demo.action.allocation(demo.category), 9);
        }
    }
}
