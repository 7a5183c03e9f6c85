use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    agent::Hyperparameters,
    priority::{PriorityOptimizer, PriorityWeightTable},
    state::{StateFeatures, STATE_DIM},
    value::DEFAULT_INIT_SCALE,
};

/// Errors raised while loading a [`ReliefConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("reading config {path}: {source}")]
    Io {
        /// File attempted.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not valid TOML for this schema.
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is outside its allowed range.
    #[error("config value `{field}` {reason}")]
    OutOfRange {
        /// Dotted field name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn out_of_range(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// Whole configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReliefConfig {
    /// `[agent]`
    #[serde(default)]
    pub agent: AgentSection,
    /// `[training]`
    #[serde(default)]
    pub training: TrainingSection,
    /// `[priority]`
    #[serde(default)]
    pub priority: PrioritySection,
}

/// Learning agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    /// TD step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Discount factor in `[0, 1]`.
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f64,
    /// Exploration probability in `[0, 1]`.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Standard deviation of the initial weights.
    #[serde(default = "default_init_scale")]
    pub init_scale: f64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            discount_factor: default_discount_factor(),
            epsilon: default_epsilon(),
            init_scale: default_init_scale(),
        }
    }
}

impl AgentSection {
    /// Agent hyperparameters.
    #[must_use]
    pub const fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            epsilon: self.epsilon,
        }
    }
}

/// Training loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSection {
    /// Episodes per run.
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    /// Progress is reported every `log_every` episodes.
    #[serde(default = "default_log_every")]
    pub log_every: usize,
    /// Episodes averaged in progress reports.
    #[serde(default = "default_reward_window")]
    pub reward_window: usize,
    /// Fixed seed; a random one is drawn when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Where to save the trained policy, relative to the config file.
    #[serde(default)]
    pub policy_path: Option<PathBuf>,
    /// Scenarios shown after training.
    #[serde(default = "default_demonstrations")]
    pub demonstrations: usize,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            log_every: default_log_every(),
            reward_window: default_reward_window(),
            seed: None,
            policy_path: None,
            demonstrations: default_demonstrations(),
        }
    }
}

/// Priority optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritySection {
    /// Feedback step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Resources assumed when a ranking request names none.
    #[serde(default = "default_resources")]
    pub default_resources: u32,
    /// `[priority.weights]`
    #[serde(default)]
    pub weights: PriorityWeightsSection,
}

impl Default for PrioritySection {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            default_resources: default_resources(),
            weights: PriorityWeightsSection::default(),
        }
    }
}

impl PrioritySection {
    /// Weight table after length checks.
    pub fn table(&self) -> Result<PriorityWeightTable, ConfigError> {
        let w = &self.weights;
        Ok(PriorityWeightTable {
            rescue: row("priority.weights.rescue", &w.rescue)?,
            medical: row("priority.weights.medical", &w.medical)?,
            logistics: row("priority.weights.logistics", &w.logistics)?,
            communication: row("priority.weights.communication", &w.communication)?,
        })
    }

    /// Optimizer configured from this section.
    pub fn optimizer(&self) -> Result<PriorityOptimizer, ConfigError> {
        Ok(PriorityOptimizer::new(
            self.table()?,
            self.learning_rate,
            self.default_resources,
        ))
    }
}

/// Raw weight rows; lengths are checked by [`PrioritySection::table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeightsSection {
    /// Rescue row.
    #[serde(default = "default_rescue_row")]
    pub rescue: Vec<f64>,
    /// Medical row.
    #[serde(default = "default_medical_row")]
    pub medical: Vec<f64>,
    /// Logistics row.
    #[serde(default = "default_logistics_row")]
    pub logistics: Vec<f64>,
    /// Communication row.
    #[serde(default = "default_communication_row")]
    pub communication: Vec<f64>,
}

impl Default for PriorityWeightsSection {
    fn default() -> Self {
        Self {
            rescue: default_rescue_row(),
            medical: default_medical_row(),
            logistics: default_logistics_row(),
            communication: default_communication_row(),
        }
    }
}

fn row(field: &str, values: &[f64]) -> Result<StateFeatures, ConfigError> {
    let row: StateFeatures = values.try_into().map_err(|_| {
        out_of_range(
            field,
            format!("must have {STATE_DIM} entries, found {}", values.len()),
        )
    })?;
    if row.iter().any(|w| !w.is_finite()) {
        return Err(out_of_range(field, "must be finite"));
    }
    Ok(row)
}

impl ReliefConfig {
    /// Reads, parses, and validates a TOML file. A relative `training.policy_path` is
    /// resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        let source_dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if let Some(policy_path) = config.training.policy_path.as_mut() {
            if policy_path.is_relative() {
                *policy_path = source_dir.join(&*policy_path);
            }
        }
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks on every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agent.hyperparameters().validate()?;
        non_negative("agent.init_scale", self.agent.init_scale)?;
        non_negative("priority.learning_rate", self.priority.learning_rate)?;
        if self.training.log_every == 0 {
            return Err(out_of_range("training.log_every", "must be at least 1"));
        }
        if self.training.reward_window == 0 {
            return Err(out_of_range("training.reward_window", "must be at least 1"));
        }
        self.priority.table().map(|_| ())
    }
}

pub(crate) fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(out_of_range(field, format!("must be finite and >= 0, got {value}")))
    }
}

pub(crate) fn unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(field, format!("must lie in [0, 1], got {value}")))
    }
}

const fn default_learning_rate() -> f64 {
    0.01
}

const fn default_discount_factor() -> f64 {
    0.95
}

const fn default_epsilon() -> f64 {
    0.2
}

const fn default_init_scale() -> f64 {
    DEFAULT_INIT_SCALE
}

const fn default_episodes() -> usize {
    1_000
}

const fn default_log_every() -> usize {
    100
}

const fn default_reward_window() -> usize {
    100
}

const fn default_demonstrations() -> usize {
    5
}

const fn default_resources() -> u32 {
    7
}

fn default_rescue_row() -> Vec<f64> {
    PriorityWeightTable::default().rescue.to_vec()
}

fn default_medical_row() -> Vec<f64> {
    PriorityWeightTable::default().medical.to_vec()
}

fn default_logistics_row() -> Vec<f64> {
    PriorityWeightTable::default().logistics.to_vec()
}

fn default_communication_row() -> Vec<f64> {
    PriorityWeightTable::default().communication.to_vec()
}
