//! Backend model types and the scoring capability they share.
//!
//! - [`ProbaModel`]: generic classifiers with a `predict_proba` style output
//! - [`BoostedModel`]: boosted ensembles fed through a [`BoostMatrix`]

mod boosted;
mod proba;

pub use boosted::BoostedModel;
pub use proba::{ProbaEstimator, ProbaModel};

use crate::data::{BoostMatrix, FeatureBatch};
use crate::error::InferenceError;

/// Anything that can score a batch with positive-class probabilities.
///
/// Implementations adapt their native prediction call; the output has one
/// entry per batch row.
pub trait PositiveClassScorer {
    /// Positive-class probability per row.
    fn positive_proba(&self, batch: &FeatureBatch) -> Result<Vec<f64>, InferenceError>;
}

impl PositiveClassScorer for ProbaModel {
    fn positive_proba(&self, batch: &FeatureBatch) -> Result<Vec<f64>, InferenceError> {
        if self.n_classes() != 2 {
            return Err(InferenceError::NotBinary {
                n_classes: self.n_classes(),
            });
        }
        let proba = self.predict_proba(batch)?;
        Ok(proba.column(1).to_vec())
    }
}

impl PositiveClassScorer for BoostedModel {
    fn positive_proba(&self, batch: &FeatureBatch) -> Result<Vec<f64>, InferenceError> {
        self.predict(&BoostMatrix::from_batch(batch))
    }
}
