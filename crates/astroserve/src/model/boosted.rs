//! Gradient-boosted binary classifiers (`gradient_boosted` backend family).

use std::path::Path;

use crate::compat::xgboost::{Booster, XgbModel};
use crate::data::BoostMatrix;
use crate::error::{InferenceError, LoadError};
use crate::utils::sigmoid;

use super::proba::check_feature_names;

/// A boosted ensemble that predicts the positive-class probability directly.
///
/// Consumes a [`BoostMatrix`] rather than the raw batch.
#[derive(Debug, Clone)]
pub struct BoostedModel {
    booster: Booster,
    n_features: usize,
    feature_names: Option<Vec<String>>,
}

impl BoostedModel {
    /// Wrap a converted booster.
    ///
    /// An empty name list means the model was trained without feature names.
    pub fn new(booster: Booster, n_features: usize, feature_names: Vec<String>) -> Self {
        Self {
            booster,
            n_features,
            feature_names: (!feature_names.is_empty()).then_some(feature_names),
        }
    }

    /// Read an XGBoost JSON model file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_xgboost(&XgbModel::from_file(path)?)
    }

    /// Convert a parsed XGBoost model. Only logistic objectives produce
    /// probabilities, so everything else is rejected.
    pub fn from_xgboost(model: &XgbModel) -> Result<Self, LoadError> {
        let objective = &model.learner.objective;
        if !objective.is_logistic() {
            return Err(LoadError::Unsupported(format!(
                "objective '{}' does not produce probabilities",
                objective.name()
            )));
        }
        let names = &model.learner.feature_names;
        if !names.is_empty() && names.len() != model.n_features() {
            return Err(LoadError::Invalid(format!(
                "{} feature names for {} features",
                names.len(),
                model.n_features()
            )));
        }
        let booster = model.to_booster()?;
        Ok(Self::new(booster, model.n_features(), names.clone()))
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    #[inline]
    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    /// Positive-class probability per row.
    pub fn predict(&self, matrix: &BoostMatrix) -> Result<Vec<f64>, InferenceError> {
        if matrix.n_features() != self.n_features {
            return Err(InferenceError::FeatureCountMismatch {
                expected: self.n_features,
                actual: matrix.n_features(),
            });
        }
        if let Some(names) = &self.feature_names {
            check_feature_names(names, matrix.feature_names())?;
        }

        let margins: Vec<f64> = match &self.booster {
            Booster::Tree(forest) | Booster::Dart(forest) => (0..matrix.n_rows())
                .map(|row| f64::from(forest.predict_row(&matrix.sample(row))[0]))
                .collect(),
            Booster::Linear(linear) => linear
                .predict_group_feature_major(matrix.view(), 0)
                .to_vec(),
        };
        Ok(margins.into_iter().map(sigmoid).collect())
    }
}
