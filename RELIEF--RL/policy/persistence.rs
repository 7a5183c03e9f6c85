use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    action::ActionCategory,
    agent::{Hyperparameters, PolicyAgent},
    value::{LinearValueFunction, WeightError, WeightVector},
};

/// Errors raised while reading a persisted policy.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    /// File could not be read.
    #[error("reading policy {path}: {source}")]
    Io {
        /// File attempted.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not a JSON policy document.
    #[error("decoding policy: {0}")]
    Json(#[from] serde_json::Error),
    /// The document has no `weights` object.
    #[error("policy has no weights")]
    MissingWeights,
    /// A category has no weight vector.
    #[error("policy has no weights for category `{0}`")]
    MissingCategory(ActionCategory),
    /// A weight vector has the wrong length.
    #[error("weights for `{category}`: {source}")]
    Dimension {
        /// Offending category.
        category: ActionCategory,
        /// Length mismatch.
        source: WeightError,
    },
}

/// On-disk policy.
///
/// Only `weights` is consumed when loading; the remaining fields are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Category label to weights in feature order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<IndexMap<String, Vec<f64>>>,
    /// Hyperparameters in effect when the policy was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperparameters: Option<Hyperparameters>,
    /// Number of updates applied before saving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_episodes: Option<usize>,
    /// Save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PolicyDocument {
    /// Captures an agent's weights and metadata.
    #[must_use]
    pub fn from_agent(agent: &PolicyAgent) -> Self {
        let weights = agent
            .value_function()
            .iter()
            .map(|(category, weights)| (category.label().to_owned(), weights.to_vec()))
            .collect();
        Self {
            weights: Some(weights),
            hyperparameters: Some(*agent.hyperparameters()),
            training_episodes: Some(agent.training_episodes()),
            timestamp: Some(Utc::now()),
        }
    }

    /// Writes pretty-printed JSON, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(weights) = &self.weights {
            if weights.values().flatten().any(|w| !w.is_finite()) {
                bail!("refusing to save non-finite weights to {}", path.display());
            }
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating policy dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("encoding policy")?;
        fs::write(path, json).with_context(|| format!("writing policy {}", path.display()))
    }

    /// Reads a document without validating its weights.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, PolicyLoadError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| PolicyLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Rebuilds the value function. Every category must be present with exactly eight
    /// weights; labels that name no category are ignored.
    pub fn value_function(&self) -> Result<LinearValueFunction, PolicyLoadError> {
        let weights = self.weights.as_ref().ok_or(PolicyLoadError::MissingWeights)?;
        let vector = |category: ActionCategory| -> Result<WeightVector, PolicyLoadError> {
            let raw = weights
                .iter()
                .find(|(label, _)| ActionCategory::parse(label) == Some(category))
                .map(|(_, raw)| raw)
                .ok_or(PolicyLoadError::MissingCategory(category))?;
            WeightVector::from_slice(raw)
                .map_err(|source| PolicyLoadError::Dimension { category, source })
        };
        Ok(LinearValueFunction::from_weights(
            vector(ActionCategory::Rescue)?,
            vector(ActionCategory::Medical)?,
            vector(ActionCategory::Logistics)?,
        ))
    }
}

impl PolicyAgent {
    /// Saves weights, hyperparameters, episode count, and a timestamp as JSON.
    pub fn save_policy(&self, path: impl AsRef<Path>) -> Result<()> {
        PolicyDocument::from_agent(self).write(path)
    }

    /// Replaces the weights with those stored at `path`. On error the agent is unchanged.
    pub fn load_policy(&mut self, path: impl AsRef<Path>) -> Result<(), PolicyLoadError> {
        let value = PolicyDocument::read(path)?.value_function()?;
        self.replace_value_function(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{DisasterState, DisasterType, Severity},
        value::FEATURE_DIM,
    };
    use rand::{rngs::SmallRng, SeedableRng};
    use tempfile::tempdir;

    fn trained_agent() -> PolicyAgent {
        let mut rng = SmallRng::seed_from_u64(21);
        let mut agent = PolicyAgent::with_random_weights(Hyperparameters::default(), &mut rng);
        let state = DisasterState::new(Severity::Critical, 7, 2.5, 14, DisasterType::Hurricane);
        for reward in [12.0, 55.5, -8.25] {
            let selection = agent.select_action(&state, true, &mut rng);
            agent.update(&state, &selection.action, selection.category, reward, None, &mut rng);
        }
        agent
    }

    #[test]
    fn round_trip_preserves_weights() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policies/learned_policy.json");
        let agent = trained_agent();
        agent.save_policy(&path).unwrap();

        let mut fresh =
            PolicyAgent::with_random_weights(Hyperparameters::default(), &mut SmallRng::seed_from_u64(99));
        fresh.load_policy(&path).unwrap();
        assert_eq!(fresh.value_function(), agent.value_function());
        assert_eq!(fresh.training_episodes(), 0);
    }

    #[test]
    fn round_trip_is_bit_exact_across_seeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.json");
        let mut target =
            PolicyAgent::with_random_weights(Hyperparameters::default(), &mut SmallRng::seed_from_u64(0));
        for seed in 0..200 {
            let agent =
                PolicyAgent::with_random_weights(Hyperparameters::default(), &mut SmallRng::seed_from_u64(seed));
            agent.save_policy(&path).unwrap();
            target.load_policy(&path).unwrap();
            for category in ActionCategory::ALL {
                let saved: Vec<u64> = agent
                    .value_function()
                    .weights(category)
                    .to_vec()
                    .iter()
                    .map(|w| w.to_bits())
                    .collect();
                let loaded: Vec<u64> = target
                    .value_function()
                    .weights(category)
                    .to_vec()
                    .iter()
                    .map(|w| w.to_bits())
                    .collect();
                assert_eq!(saved, loaded, "seed {seed}, {category}");
            }
        }
    }

    #[test]
    fn saved_document_carries_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.json");
        trained_agent().save_policy(&path).unwrap();
        let doc = PolicyDocument::read(&path).unwrap();
        assert_eq!(doc.training_episodes, Some(3));
        assert_eq!(doc.hyperparameters, Some(Hyperparameters::default()));
        assert!(doc.timestamp.is_some());
        let keys: Vec<_> = doc.weights.unwrap().keys().cloned().collect();
        assert_eq!(keys, ["rescue", "medical", "logistics"]);
    }

    #[test]
    fn weights_alone_are_enough_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights_only.json");
        let row = vec![0.5; FEATURE_DIM];
        let body = serde_json::json!({
            "weights": { "rescue": row, "medical": row, "logistics": row, "shelter": [1.0] }
        });
        fs::write(&path, body.to_string()).unwrap();
        let mut agent = trained_agent();
        agent.load_policy(&path).unwrap();
        assert_eq!(agent.value_function().weights(ActionCategory::Medical).to_vec(), row);
    }

    #[test]
    fn missing_weights_key_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{ "training_episodes": 10 }"#).unwrap();
        let mut agent = trained_agent();
        let before = agent.value_function().clone();
        let err = agent.load_policy(&path).unwrap_err();
        assert!(matches!(err, PolicyLoadError::MissingWeights));
        assert_eq!(agent.value_function(), &before);
    }

    #[test]
    fn wrong_length_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.json");
        let row = vec![0.1; FEATURE_DIM];
        let body = serde_json::json!({
            "weights": { "rescue": row, "medical": [0.1, 0.2], "logistics": row }
        });
        fs::write(&path, body.to_string()).unwrap();
        let err = trained_agent().load_policy(&path).unwrap_err();
        assert!(matches!(
            err,
            PolicyLoadError::Dimension {
                category: ActionCategory::Medical,
                ..
            }
        ));
    }

    #[test]
    fn missing_category_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        let row = vec![0.1; FEATURE_DIM];
        let body = serde_json::json!({ "weights": { "rescue": row, "medical": row } });
        fs::write(&path, body.to_string()).unwrap();
        let err = trained_agent().load_policy(&path).unwrap_err();
        assert!(matches!(
            err,
            PolicyLoadError::MissingCategory(ActionCategory::Logistics)
        ));
    }

    #[test]
    fn unreadable_and_malformed_files_fail() {
        let dir = tempdir().unwrap();
        let err = PolicyDocument::read(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PolicyLoadError::Io { .. }));
        let path = dir.path().join("garbage.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            PolicyDocument::read(&path).unwrap_err(),
            PolicyLoadError::Json(_)
        ));
    }
}
