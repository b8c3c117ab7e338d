//! XGBoost JSON model types.
//!
//! Parses the XGBoost >= 1.6 JSON format. These are "foreign types" used only for
//! parsing; [`super::convert`] turns them into native [`crate::repr`] types.
//! Fields the gateway never reads (loss changes, hessians, parents) are ignored.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

use crate::error::LoadError;

// =============================================================================
// Custom deserializers for XGBoost-specific formats
// =============================================================================

/// `base_score` appears as a number, a string, a one-element array, or a
/// stringified array such as `"[5E-1]"` depending on the writer version.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        cur = match cur {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SerdeError::custom("invalid number"));
            }
            Value::String(s) => {
                if let Ok(f) = s.parse::<f32>() {
                    return Ok(f);
                }
                let t = s.trim();
                if let Some(inner) = t.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                    if let Ok(f) = inner.trim().parse::<f32>() {
                        return Ok(f);
                    }
                }
                match serde_json::from_str::<Vec<Value>>(t) {
                    Ok(arr) => arr
                        .into_iter()
                        .next()
                        .ok_or_else(|| SerdeError::custom("empty array"))?,
                    Err(_) => {
                        return Err(SerdeError::custom(format!(
                            "cannot parse base_score from string: {s}"
                        )));
                    }
                }
            }
            Value::Array(arr) => arr
                .into_iter()
                .next()
                .ok_or_else(|| SerdeError::custom("empty array"))?,
            _ => {
                return Err(SerdeError::custom(
                    "base_score must be number, string, or array",
                ));
            }
        };
    }
}

fn deserialize_bool_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => n
            .as_f64()
            .map(|f| f != 0.0)
            .ok_or_else(|| SerdeError::custom("invalid number for bool")),
        Value::String(s) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") || t == "1" => Ok(true),
            t if t.eq_ignore_ascii_case("false") || t == "0" => Ok(false),
            _ => Err(SerdeError::custom(format!(
                "cannot parse bool from string: {s}"
            ))),
        },
        _ => Err(SerdeError::custom("unsupported type for bool")),
    }
}

fn default_num_target() -> i64 {
    1
}

fn default_boost_from_average() -> bool {
    true
}

// =============================================================================
// Tree / model level definitions
// =============================================================================

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_nodes: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub size_leaf_vector: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub num_feature: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub tree_param: TreeParam,
    #[serde(default)]
    pub id: i32,
    pub base_weights: Vec<f32>,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    #[serde(default)]
    pub split_type: Vec<i32>,
    pub default_left: Vec<i32>,
    #[serde(default)]
    pub categories_nodes: Vec<i32>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeModelParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_trees: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub num_parallel_tree: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<Tree>,
    pub tree_info: Vec<i32>,
    pub gbtree_model_param: GBTreeModelParam,
}

impl ModelTrees {
    /// Number of trees in this model.
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

// =============================================================================
// Gradient booster variants (gbtree | gblinear | dart)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbLinearModel {
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeDefinition {
    pub name: String,
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Gblinear {
        model: GbLinearModel,
    },
    Dart {
        gbtree: GBTreeDefinition,
        weight_drop: Vec<f32>,
    },
}

// =============================================================================
// Objective / learner-level definitions
// =============================================================================

/// Training objective. Only the name matters for serving: it decides how
/// `base_score` maps to margin space and whether the output is a probability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Objective {
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "reg:logistic")]
    RegLogistic,
    #[serde(rename = "binary:logitraw")]
    BinaryLogitRaw,
    #[serde(rename = "binary:hinge")]
    BinaryHinge,
    #[serde(rename = "reg:squarederror")]
    RegSquaredError,
    #[serde(rename = "multi:softprob")]
    MultiSoftprob,
    #[serde(rename = "multi:softmax")]
    MultiSoftmax,
    #[serde(other)]
    Other,
}

impl Objective {
    /// Get the objective name as it appears in XGBoost JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::RegLogistic => "reg:logistic",
            Objective::BinaryLogitRaw => "binary:logitraw",
            Objective::BinaryHinge => "binary:hinge",
            Objective::RegSquaredError => "reg:squarederror",
            Objective::MultiSoftprob => "multi:softprob",
            Objective::MultiSoftmax => "multi:softmax",
            Objective::Other => "other",
        }
    }

    /// Whether the model output is a positive-class probability after a sigmoid.
    pub fn is_logistic(&self) -> bool {
        matches!(self, Objective::BinaryLogistic | Objective::RegLogistic)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    pub base_score: f32,
    #[serde(rename = "num_class")]
    #[serde_as(as = "DisplayFromStr")]
    pub n_class: i64,
    #[serde(rename = "num_feature")]
    #[serde_as(as = "DisplayFromStr")]
    pub n_features: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_num_target")]
    pub num_target: i64,
    #[serde(deserialize_with = "deserialize_bool_any")]
    #[serde(default = "default_boost_from_average")]
    pub boost_from_average: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: Objective,
    pub learner_model_param: LearnerModelParam,
}

// =============================================================================
// Top-level XGBoost model
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbModel {
    pub version: [u32; 3],
    pub learner: Learner,
}

impl XgbModel {
    /// Load a model from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Parse a model from a serde_json Value.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(base_score: Value) -> LearnerModelParam {
        serde_json::from_value(json!({
            "base_score": base_score,
            "num_class": "0",
            "num_feature": "3"
        }))
        .unwrap()
    }

    #[test]
    fn base_score_parses_number_string_array_and_bracketed() {
        assert_eq!(param(json!(1.5)).base_score, 1.5);
        assert_eq!(param(json!("1.5")).base_score, 1.5);
        assert_eq!(param(json!([1.5])).base_score, 1.5);
        assert_eq!(param(json!("[1.5E0]")).base_score, 1.5);
        assert_eq!(param(json!("[\"2.5E-1\"]")).base_score, 0.25);
    }

    #[test]
    fn base_score_rejects_garbage() {
        let v = json!({"base_score": "abc", "num_class": "0", "num_feature": "3"});
        assert!(serde_json::from_value::<LearnerModelParam>(v).is_err());
        let v = json!({"base_score": [], "num_class": "0", "num_feature": "3"});
        assert!(serde_json::from_value::<LearnerModelParam>(v).is_err());
    }

    #[test]
    fn boost_from_average_accepts_various_types() {
        for (raw, expected) in [
            (json!(true), true),
            (json!(1), true),
            (json!("1"), true),
            (json!("False"), false),
            (json!("0"), false),
        ] {
            let v = json!({"base_score": 0.5, "num_class": "0", "num_feature": "0", "boost_from_average": raw});
            let p: LearnerModelParam = serde_json::from_value(v).unwrap();
            assert_eq!(p.boost_from_average, expected);
        }
    }

    #[test]
    fn objective_falls_back_to_other() {
        let known: Objective = serde_json::from_value(json!({
            "name": "binary:logistic",
            "reg_loss_param": {"scale_pos_weight": "1"}
        }))
        .unwrap();
        assert_eq!(known, Objective::BinaryLogistic);
        assert!(known.is_logistic());

        let unknown: Objective =
            serde_json::from_value(json!({"name": "survival:cox"})).unwrap();
        assert_eq!(unknown, Objective::Other);
        assert!(!unknown.is_logistic());
    }
}
