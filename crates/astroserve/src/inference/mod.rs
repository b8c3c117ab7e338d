//! Uniform prediction contract over all backend families.
//!
//! [`infer`] turns a loaded model and a validated batch into a
//! [`PredictionResult`]: one label and one positive-class probability per row.

use serde::{Deserialize, Serialize};

use crate::data::FeatureBatch;
use crate::error::InferenceError;
use crate::model::{BoostedModel, PositiveClassScorer, ProbaModel};
use crate::registry::BackendFamily;

/// Probability above which a row is labeled positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// A deserialized model, tagged by backend family.
#[derive(Debug, Clone)]
pub enum LoadedModel {
    TreeEnsemble(ProbaModel),
    GradientBoosted(BoostedModel),
}

impl LoadedModel {
    pub fn family(&self) -> BackendFamily {
        match self {
            LoadedModel::TreeEnsemble(_) => BackendFamily::TreeEnsemble,
            LoadedModel::GradientBoosted(_) => BackendFamily::GradientBoosted,
        }
    }

    /// Number of input features the model was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            LoadedModel::TreeEnsemble(model) => model.n_features(),
            LoadedModel::GradientBoosted(model) => model.n_features(),
        }
    }

    fn scorer(&self) -> &dyn PositiveClassScorer {
        match self {
            LoadedModel::TreeEnsemble(model) => model,
            LoadedModel::GradientBoosted(model) => model,
        }
    }
}

/// Labels and probabilities for one model, index-aligned with the batch rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<u8>,
    pub probabilities: Vec<f64>,
}

impl PredictionResult {
    /// Label every probability with the shared threshold.
    pub fn from_probabilities(probabilities: Vec<f64>) -> Self {
        Self {
            predictions: probabilities.iter().map(|&p| label_for(p)).collect(),
            probabilities,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

/// `1` iff `p > 0.5`.
#[inline]
pub fn label_for(p: f64) -> u8 {
    u8::from(p > DECISION_THRESHOLD)
}

/// Score `batch` with `model`.
pub fn infer(model: &LoadedModel, batch: &FeatureBatch) -> Result<PredictionResult, InferenceError> {
    let probabilities = model.scorer().positive_proba(batch)?;
    debug_assert_eq!(probabilities.len(), batch.n_rows());
    if let Some(row) = probabilities.iter().position(|p| !p.is_finite()) {
        return Err(InferenceError::NonFiniteProbability { row });
    }
    Ok(PredictionResult::from_probabilities(probabilities))
}
