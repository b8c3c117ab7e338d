//! Conversion from XGBoost JSON types to native types.

use ndarray::Array2;

use crate::repr::{
    Decision, Forest, ForestValidationError, LinearModel, ScalarLeaf, Tree, TreeBuilder,
};

use super::json::{GradientBooster, Tree as XgbTree, XgbModel};

/// A booster model converted from XGBoost.
#[derive(Debug, Clone)]
pub enum Booster {
    /// Standard gradient boosted tree ensemble.
    Tree(Forest),
    /// DART ensemble; the forest carries per-tree weights.
    Dart(Forest),
    /// Linear (gblinear) booster model.
    Linear(LinearModel),
}

impl Booster {
    /// Booster name as XGBoost spells it.
    pub fn kind(&self) -> &'static str {
        match self {
            Booster::Tree(_) => "gbtree",
            Booster::Dart(_) => "dart",
            Booster::Linear(_) => "gblinear",
        }
    }
}

/// Error type for XGBoost model conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),
    #[error("tree {tree} has {len} entries in '{field}', expected {num_nodes}")]
    ArrayLength {
        tree: usize,
        field: &'static str,
        len: usize,
        num_nodes: usize,
    },
    #[error(
        "invalid node index in tree {tree}: node {node} references child {child} but tree has {num_nodes} nodes"
    )]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i32,
        num_nodes: usize,
    },
    #[error("tree {tree} node {node} splits on negative feature index {feature}")]
    InvalidFeatureIndex {
        tree: usize,
        node: usize,
        feature: i32,
    },
    #[error(
        "gblinear weights length {actual} doesn't match (num_features + 1) * num_groups = {expected}"
    )]
    InvalidLinearWeights { actual: usize, expected: usize },
    #[error("invalid forest: {0}")]
    InvalidForest(#[from] ForestValidationError),
    #[error("{0}")]
    Unsupported(String),
}

/// Convert base_score from probability space to margin space based on objective.
///
/// XGBoost stores base_score in probability space in JSON, but the predictor
/// works in margin space.
pub(crate) fn prob_to_margin(base_score: f32, objective: &str) -> f32 {
    match objective {
        // logit(p) = ln(p / (1 - p))
        "binary:logistic" | "reg:logistic" => {
            let p = base_score.clamp(1e-7, 1.0 - 1e-7);
            (p / (1.0 - p)).ln()
        }
        _ => base_score,
    }
}

impl XgbModel {
    /// Number of features declared by the learner.
    pub fn n_features(&self) -> usize {
        self.learner.learner_model_param.n_features.max(0) as usize
    }

    /// Convert to a native [`Booster`].
    ///
    /// Only single-output models with numeric splits are supported.
    pub fn to_booster(&self) -> Result<Booster, ConversionError> {
        let param = &self.learner.learner_model_param;
        if param.n_class > 1 || param.num_target > 1 {
            return Err(ConversionError::Unsupported(format!(
                "multi-output model (num_class={}, num_target={})",
                param.n_class, param.num_target
            )));
        }

        match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => {
                Ok(Booster::Tree(self.convert_forest(&model.trees, &model.tree_info)?))
            }
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => {
                let forest = self
                    .convert_forest(&gbtree.model.trees, &gbtree.model.tree_info)?
                    .with_tree_weights(weight_drop.clone().into_boxed_slice());
                forest.validate(self.n_features())?;
                Ok(Booster::Dart(forest))
            }
            GradientBooster::Gblinear { model } => {
                Ok(Booster::Linear(self.convert_linear_model(&model.weights)?))
            }
        }
    }

    /// Returns true if this model uses the DART booster.
    pub fn is_dart(&self) -> bool {
        matches!(&self.learner.gradient_booster, GradientBooster::Dart { .. })
    }

    /// Returns true if this model uses the gblinear booster.
    pub fn is_linear(&self) -> bool {
        matches!(
            &self.learner.gradient_booster,
            GradientBooster::Gblinear { .. }
        )
    }

    fn margin_base_score(&self) -> f32 {
        prob_to_margin(
            self.learner.learner_model_param.base_score,
            self.learner.objective.name(),
        )
    }

    /// XGBoost stores gblinear weights row-major as `[n_features + 1, 1]` with the
    /// bias last. The margin base score is folded into the bias.
    fn convert_linear_model(&self, weights: &[f32]) -> Result<LinearModel, ConversionError> {
        let n_features = self.n_features();
        let expected = n_features + 1;
        if weights.len() != expected {
            return Err(ConversionError::InvalidLinearWeights {
                actual: weights.len(),
                expected,
            });
        }

        let mut arr = Array2::from_shape_fn((expected, 1), |(row, _)| f64::from(weights[row]));
        arr[[n_features, 0]] += f64::from(self.margin_base_score());
        Ok(LinearModel::from_array(arr))
    }

    fn convert_forest(&self, trees: &[XgbTree], tree_info: &[i32]) -> Result<Forest, ConversionError> {
        let mut forest = Forest::new(1).with_base_score(vec![self.margin_base_score()]);
        for (tree_idx, xgb_tree) in trees.iter().enumerate() {
            let group = tree_info.get(tree_idx).copied().unwrap_or(0).max(0) as u32;
            forest.push_tree(convert_tree(xgb_tree, tree_idx)?, group);
        }
        forest.validate(self.n_features())?;
        Ok(forest)
    }
}

/// Convert a single XGBoost tree to a native [`Tree`].
///
/// XGBoost marks leaves with `left_children == -1`. A leaf's value lives in
/// `split_conditions`; `base_weights` only holds the node statistic and diverges
/// after pruning or refresh. Splits send a sample left when `value < split_condition`.
fn convert_tree(xgb_tree: &XgbTree, tree_idx: usize) -> Result<Tree<ScalarLeaf>, ConversionError> {
    let num_nodes = xgb_tree.tree_param.num_nodes.max(0) as usize;
    if num_nodes == 0 {
        return Err(ConversionError::EmptyTree(tree_idx));
    }
    if xgb_tree.split_type.iter().any(|&t| t != 0) || !xgb_tree.categories_nodes.is_empty() {
        return Err(ConversionError::Unsupported(format!(
            "tree {tree_idx} uses categorical splits"
        )));
    }

    let fields: [(&'static str, usize); 6] = [
        ("base_weights", xgb_tree.base_weights.len()),
        ("left_children", xgb_tree.left_children.len()),
        ("right_children", xgb_tree.right_children.len()),
        ("split_indices", xgb_tree.split_indices.len()),
        ("split_conditions", xgb_tree.split_conditions.len()),
        ("default_left", xgb_tree.default_left.len()),
    ];
    if let Some(&(field, len)) = fields.iter().find(|(_, len)| *len != num_nodes) {
        return Err(ConversionError::ArrayLength {
            tree: tree_idx,
            field,
            len,
            num_nodes,
        });
    }

    let mut tree = TreeBuilder::<ScalarLeaf>::with_n_nodes(num_nodes, Decision::Less);
    let child = |node: usize, child: i32| -> Result<u32, ConversionError> {
        if child < 0 || child as usize >= num_nodes {
            return Err(ConversionError::InvalidNodeIndex {
                tree: tree_idx,
                node,
                child,
                num_nodes,
            });
        }
        Ok(child as u32)
    };

    for node in 0..num_nodes {
        let left = xgb_tree.left_children[node];
        if left == -1 {
            tree.make_leaf(node as u32, ScalarLeaf(xgb_tree.split_conditions[node]));
            continue;
        }
        let left = child(node, left)?;
        let right = child(node, xgb_tree.right_children[node])?;
        let feature = xgb_tree.split_indices[node];
        if feature < 0 {
            return Err(ConversionError::InvalidFeatureIndex {
                tree: tree_idx,
                node,
                feature,
            });
        }
        tree.set_split(
            node as u32,
            feature as u32,
            f64::from(xgb_tree.split_conditions[node]),
            xgb_tree.default_left[node] != 0,
            left,
            right,
        );
    }

    Ok(tree.freeze())
}
