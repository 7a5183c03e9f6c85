use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use relief_policy::{
    helper::{random_seed, seeded_rng},
    LinearValueFunction, PolicyAgent, PolicyTelemetry, ReliefConfig,
};
use serde_json::json;
use shared_event_bus::EventKind;
use shared_logging::LogLevel;

use crate::{
    simulator::DisasterSimulator,
    trainer::{Episode, Trainer, TrainingReport},
};

/// Simulator-backed trainer assembled from a [`ReliefConfig`].
#[derive(Debug)]
pub struct TrainingEngine {
    config: ReliefConfig,
    seed: u64,
    trainer: Trainer<DisasterSimulator>,
    telemetry: Option<PolicyTelemetry>,
}

impl TrainingEngine {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> TrainingEngineBuilder {
        TrainingEngineBuilder::default()
    }

    /// Seed every random stream was derived from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &ReliefConfig {
        &self.config
    }

    /// Agent under training.
    #[must_use]
    pub const fn agent(&self) -> &PolicyAgent {
        self.trainer.agent()
    }

    /// Runs the configured number of episodes and saves the policy when a path is set.
    pub fn train(&mut self) -> Result<TrainingReport> {
        let report = self.trainer.train(self.config.training.episodes)?;
        if let Some(path) = self.config.training.policy_path.clone() {
            self.save_policy(&path)?;
        }
        Ok(report)
    }

    /// Greedy demonstration on the configured number of scenarios.
    pub fn demonstrate(&mut self) -> Vec<Episode> {
        self.trainer.demonstrate(self.config.training.demonstrations)
    }

    /// Writes the current policy to `path`.
    pub fn save_policy(&self, path: &Path) -> Result<()> {
        self.agent()
            .save_policy(path)
            .with_context(|| format!("saving policy to {}", path.display()))?;
        self.notify(
            LogLevel::Info,
            EventKind::PolicySaved,
            json!({
                "path": path.display().to_string(),
                "training_episodes": self.agent().training_episodes(),
            }),
        )
    }

    /// Replaces the agent's weights with those stored at `path`.
    pub fn load_policy(&mut self, path: &Path) -> Result<()> {
        self.trainer
            .agent_mut()
            .load_policy(path)
            .with_context(|| format!("loading policy from {}", path.display()))?;
        self.notify(
            LogLevel::Info,
            EventKind::PolicyLoaded,
            json!({ "path": path.display().to_string() }),
        )
    }

    fn notify(&self, level: LogLevel, kind: EventKind, payload: serde_json::Value) -> Result<()> {
        if let Some(telemetry) = &self.telemetry {
            telemetry.log(level, kind.label(), &payload)?;
            telemetry.event(kind, payload)?;
        }
        Ok(())
    }
}

/// Builder for [`TrainingEngine`].
#[derive(Debug, Default)]
pub struct TrainingEngineBuilder {
    config: Option<ReliefConfig>,
    seed: Option<u64>,
    episodes: Option<usize>,
    policy_path: Option<PathBuf>,
    telemetry: Option<PolicyTelemetry>,
    episode_events: bool,
}

impl TrainingEngineBuilder {
    /// Uses `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: ReliefConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the configured seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Overrides the configured episode count.
    #[must_use]
    pub const fn episodes(mut self, episodes: usize) -> Self {
        self.episodes = Some(episodes);
        self
    }

    /// Overrides the configured policy path.
    #[must_use]
    pub fn policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_path = Some(path.into());
        self
    }

    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: PolicyTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Publishes an event after every training episode.
    #[must_use]
    pub const fn episode_events(mut self, enabled: bool) -> Self {
        self.episode_events = enabled;
        self
    }

    /// Validates the configuration and seeds the agent, simulator, and exploration streams.
    pub fn build(self) -> Result<TrainingEngine> {
        let mut config = self.config.unwrap_or_default();
        if let Some(episodes) = self.episodes {
            config.training.episodes = episodes;
        }
        if self.policy_path.is_some() {
            config.training.policy_path = self.policy_path;
        }
        config.validate().context("validating training config")?;

        let seed = self.seed.or(config.training.seed).unwrap_or_else(random_seed);
        config.training.seed = Some(seed);

        let value = LinearValueFunction::random(&mut seeded_rng(seed), config.agent.init_scale);
        let agent = PolicyAgent::try_new(config.agent.hyperparameters(), value)?;
        let simulator = DisasterSimulator::new(seed.wrapping_add(1));
        let trainer = Trainer::new(agent, simulator, seed.wrapping_add(2))
            .with_telemetry(self.telemetry.clone())
            .with_reporting(config.training.log_every, config.training.reward_window)
            .with_episode_events(self.episode_events);

        Ok(TrainingEngine {
            config,
            seed,
            trainer,
            telemetry: self.telemetry,
        })
    }
}
