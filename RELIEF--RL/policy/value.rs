use ndarray::{Array1, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    action::{ActionCategory, DisasterAction, ACTION_DIM},
    state::{DisasterState, STATE_DIM},
};

/// Length of a state-action feature vector and of every weight vector.
pub const FEATURE_DIM: usize = STATE_DIM + ACTION_DIM;

/// Concatenated state and action features.
pub type Features = [f64; FEATURE_DIM];

/// Default standard deviation of the initial random weights.
pub const DEFAULT_INIT_SCALE: f64 = 0.1;

/// Concatenates the encoded state and action.
#[must_use]
pub fn features(state: &DisasterState, action: &DisasterAction) -> Features {
    let mut out = [0.0; FEATURE_DIM];
    out[..STATE_DIM].copy_from_slice(&state.to_vector());
    out[STATE_DIM..].copy_from_slice(&action.to_vector());
    out
}

/// Raised when a weight vector has the wrong dimensionality.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("weight vector must have {expected} components, found {found}")]
pub struct WeightError {
    /// Required length.
    pub expected: usize,
    /// Supplied length.
    pub found: usize,
}

/// Fixed-length weight vector for one action category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector {
    values: Array1<f64>,
}

impl WeightVector {
    /// All-zero weights.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            values: Array1::zeros(FEATURE_DIM),
        }
    }

    /// Gaussian weights with standard deviation `scale`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> Self {
        let values = (0..FEATURE_DIM)
            .map(|_| rng.sample::<f64, _>(StandardNormal) * scale)
            .collect::<Vec<_>>();
        Self {
            values: Array1::from_vec(values),
        }
    }

    /// Builds weights from a slice of exactly [`FEATURE_DIM`] values.
    pub fn from_slice(values: &[f64]) -> Result<Self, WeightError> {
        if values.len() != FEATURE_DIM {
            return Err(WeightError {
                expected: FEATURE_DIM,
                found: values.len(),
            });
        }
        Ok(Self {
            values: Array1::from_vec(values.to_vec()),
        })
    }

    /// Dot product with a feature vector.
    #[must_use]
    pub fn dot(&self, features: &Features) -> f64 {
        self.values.dot(&ArrayView1::from(&features[..]))
    }

    /// `self += alpha * features`.
    pub fn scaled_add(&mut self, alpha: f64, features: &Features) {
        self.values.scaled_add(alpha, &ArrayView1::from(&features[..]));
    }

    /// Components in feature order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    /// Number of components; always [`FEATURE_DIM`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<Vec<f64>> for WeightVector {
    type Error = WeightError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&values)
    }
}

impl From<WeightVector> for Vec<f64> {
    fn from(weights: WeightVector) -> Self {
        weights.to_vec()
    }
}

/// Linear Q-function with one weight vector per [`ActionCategory`].
///
/// `Q(s, a, c) = w_c · [φ(s), φ(a)]`. The weights are only changed through
/// [`LinearValueFunction::apply_td_step`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinearValueFunction {
    weights: [WeightVector; ActionCategory::COUNT],
}

impl LinearValueFunction {
    /// Random initialisation, drawing rescue, medical, then logistics weights from `rng`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> Self {
        Self {
            weights: [
                WeightVector::random(rng, scale),
                WeightVector::random(rng, scale),
                WeightVector::random(rng, scale),
            ],
        }
    }

    /// All-zero weights.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            weights: [WeightVector::zeros(), WeightVector::zeros(), WeightVector::zeros()],
        }
    }

    /// Builds a value function from explicit per-category weights.
    #[must_use]
    pub fn from_weights(rescue: WeightVector, medical: WeightVector, logistics: WeightVector) -> Self {
        Self {
            weights: [rescue, medical, logistics],
        }
    }

    /// Weights for a category.
    #[must_use]
    pub fn weights(&self, category: ActionCategory) -> &WeightVector {
        &self.weights[category.index()]
    }

    /// Replaces the weights for a category.
    pub fn set_weights(&mut self, category: ActionCategory, weights: WeightVector) {
        self.weights[category.index()] = weights;
    }

    /// Q-value of taking `action` as `category` in `state`.
    #[must_use]
    pub fn q_value(&self, state: &DisasterState, action: &DisasterAction, category: ActionCategory) -> f64 {
        self.weights(category).dot(&features(state, action))
    }

    /// Q-value for a category given by label; unknown labels score with the rescue weights.
    #[must_use]
    pub fn q_value_for_label(&self, state: &DisasterState, action: &DisasterAction, label: &str) -> f64 {
        self.q_value(state, action, ActionCategory::parse_lenient(label))
    }

    /// Semi-gradient step: `w_c += step * φ(s, a)`, with `step = learning_rate * td_error`.
    pub fn apply_td_step(&mut self, category: ActionCategory, step: f64, features: &Features) {
        self.weights[category.index()].scaled_add(step, features);
    }

    /// Iterates categories with their weights.
    pub fn iter(&self) -> impl Iterator<Item = (ActionCategory, &WeightVector)> {
        ActionCategory::ALL.into_iter().zip(self.weights.iter())
    }
}
