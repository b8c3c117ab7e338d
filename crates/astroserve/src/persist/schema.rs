//! Schema types for probabilistic classifier artifacts.
//!
//! These types provide a stable serialization format independent of runtime
//! types. They are shared by the JSON and binary encodings, so enums are
//! externally tagged and no field is conditionally skipped.

use serde::{Deserialize, Serialize};

/// Top-level artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbaModelSchema {
    pub meta: ProbaMetaSchema,
    pub model: ProbaKindSchema,
}

/// Metadata common to all estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbaMetaSchema {
    /// Number of input features.
    pub num_features: usize,
    /// Class labels, in output column order.
    pub classes: Vec<i64>,
    /// Column names seen during fit (optional).
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

/// Estimator payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbaKindSchema {
    RandomForest {
        trees: Vec<ClassTreeSchema>,
    },
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

/// Classification tree (SoA layout, scikit-learn conventions).
///
/// A node is a leaf when both children are `-1`. Samples go left when
/// `value <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTreeSchema {
    /// Split feature per node (ignored for leaves).
    pub split_indices: Vec<u32>,
    /// Split threshold per node (ignored for leaves).
    pub thresholds: Vec<f64>,
    pub children_left: Vec<i32>,
    pub children_right: Vec<i32>,
    /// Class weights per node; only leaf entries are read.
    pub leaf_values: Vec<Vec<f64>>,
}

impl ClassTreeSchema {
    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.children_left.len()
    }
}
