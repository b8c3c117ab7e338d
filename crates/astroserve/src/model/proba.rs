//! Generic probabilistic classifiers (`tree_ensemble` backend family).
//!
//! These models expose a scikit-learn style `predict_proba` that returns one
//! column per class. Two estimators are supported: a random forest whose leaves
//! hold class distributions, and a binary logistic regression.

use ndarray::{Array2, Axis};

use crate::data::FeatureBatch;
use crate::error::InferenceError;
use crate::repr::{ClassLeaf, LinearModel, Tree};
use crate::utils::sigmoid;

/// The estimator behind a [`ProbaModel`].
#[derive(Debug, Clone)]
pub enum ProbaEstimator {
    /// Averaged class distributions over all trees.
    RandomForest(Vec<Tree<ClassLeaf>>),
    /// Binary logistic regression, output `[1 - p, p]`.
    Logistic(LinearModel),
}

/// A classifier with a two-dimensional probability output.
#[derive(Debug, Clone)]
pub struct ProbaModel {
    n_features: usize,
    classes: Vec<i64>,
    feature_names: Option<Vec<String>>,
    estimator: ProbaEstimator,
}

impl ProbaModel {
    /// Assemble a model from already-validated parts.
    ///
    /// Artifact readers go through [`crate::persist`], which validates structure
    /// before calling this.
    pub fn new(
        n_features: usize,
        classes: Vec<i64>,
        feature_names: Option<Vec<String>>,
        estimator: ProbaEstimator,
    ) -> Self {
        Self {
            n_features,
            classes,
            feature_names,
            estimator,
        }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    #[inline]
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    #[inline]
    pub fn estimator(&self) -> &ProbaEstimator {
        &self.estimator
    }

    /// Class probabilities, shape `[n_rows, n_classes]`.
    ///
    /// Fails when the batch columns do not match what the model was fitted on.
    pub fn predict_proba(&self, batch: &FeatureBatch) -> Result<Array2<f64>, InferenceError> {
        self.check_columns(batch)?;
        let n_rows = batch.n_rows();

        let proba = match &self.estimator {
            ProbaEstimator::RandomForest(trees) => {
                let n_classes = self.n_classes();
                let mut out = Array2::<f64>::zeros((n_rows, n_classes));
                for (row, mut acc) in out.axis_iter_mut(Axis(0)).enumerate() {
                    let sample = batch.row_f32(row);
                    for tree in trees {
                        let leaf = tree.predict(sample.as_slice());
                        for (slot, p) in acc.iter_mut().zip(leaf.0.iter()) {
                            *slot += p;
                        }
                    }
                }
                if !trees.is_empty() {
                    out /= trees.len() as f64;
                }
                out
            }
            ProbaEstimator::Logistic(linear) => {
                let margins = linear.predict_margins(batch.values());
                let mut out = Array2::<f64>::zeros((n_rows, 2));
                for (row, margin) in margins.column(0).iter().enumerate() {
                    let p = sigmoid(*margin);
                    out[[row, 0]] = 1.0 - p;
                    out[[row, 1]] = p;
                }
                out
            }
        };
        Ok(proba)
    }

    fn check_columns(&self, batch: &FeatureBatch) -> Result<(), InferenceError> {
        if batch.n_features() != self.n_features {
            return Err(InferenceError::FeatureCountMismatch {
                expected: self.n_features,
                actual: batch.n_features(),
            });
        }
        if let Some(names) = &self.feature_names {
            check_feature_names(names, batch.feature_names())?;
        }
        Ok(())
    }
}

/// Model and batch must agree on every column name, in order.
pub(crate) fn check_feature_names(
    expected: &[String],
    found: &[String],
) -> Result<(), InferenceError> {
    if expected.len() != found.len() {
        return Err(InferenceError::FeatureCountMismatch {
            expected: expected.len(),
            actual: found.len(),
        });
    }
    match expected.iter().zip(found).position(|(e, f)| e != f) {
        Some(index) => Err(InferenceError::FeatureNameMismatch {
            index,
            expected: expected[index].clone(),
            found: found[index].clone(),
        }),
        None => Ok(()),
    }
}
