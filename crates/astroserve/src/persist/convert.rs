//! Conversion between runtime types and schema types.
//!
//! Reading goes through `TryFrom` and validates structure; writing is a
//! lossless `From`.

use super::schema::{ClassTreeSchema, ProbaKindSchema, ProbaMetaSchema, ProbaModelSchema};
use crate::error::LoadError;
use crate::model::{ProbaEstimator, ProbaModel};
use crate::repr::{ClassLeaf, Decision, LinearModel, Tree, TreeBuilder};

// =============================================================================
// Schema -> runtime
// =============================================================================

impl TryFrom<ProbaModelSchema> for ProbaModel {
    type Error = LoadError;

    fn try_from(schema: ProbaModelSchema) -> Result<Self, Self::Error> {
        let ProbaMetaSchema {
            num_features,
            classes,
            feature_names,
        } = schema.meta;

        if num_features == 0 {
            return Err(LoadError::Invalid("model has no features".into()));
        }
        if classes.is_empty() {
            return Err(LoadError::Invalid("model has no classes".into()));
        }
        if let Some(names) = &feature_names {
            if names.len() != num_features {
                return Err(LoadError::Invalid(format!(
                    "{} feature names for {num_features} features",
                    names.len()
                )));
            }
        }

        let estimator = match schema.model {
            ProbaKindSchema::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(LoadError::Invalid("random forest has no trees".into()));
                }
                let trees = trees
                    .iter()
                    .enumerate()
                    .map(|(idx, tree)| {
                        convert_tree(tree, num_features, classes.len())
                            .map_err(|e| LoadError::Invalid(format!("tree {idx}: {e}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ProbaEstimator::RandomForest(trees)
            }
            ProbaKindSchema::Logistic {
                coefficients,
                intercept,
            } => {
                if classes.len() != 2 {
                    return Err(LoadError::Unsupported(format!(
                        "logistic model with {} classes",
                        classes.len()
                    )));
                }
                if coefficients.len() != num_features {
                    return Err(LoadError::Invalid(format!(
                        "{} coefficients for {num_features} features",
                        coefficients.len()
                    )));
                }
                ProbaEstimator::Logistic(LinearModel::binary(&coefficients, intercept))
            }
        };

        Ok(ProbaModel::new(num_features, classes, feature_names, estimator))
    }
}

fn convert_tree(
    schema: &ClassTreeSchema,
    n_features: usize,
    n_classes: usize,
) -> Result<Tree<ClassLeaf>, String> {
    let n_nodes = schema.num_nodes();
    if n_nodes == 0 {
        return Err("tree has no nodes".into());
    }
    let lengths = [
        ("split_indices", schema.split_indices.len()),
        ("thresholds", schema.thresholds.len()),
        ("children_right", schema.children_right.len()),
        ("leaf_values", schema.leaf_values.len()),
    ];
    if let Some((field, len)) = lengths.iter().find(|(_, len)| *len != n_nodes) {
        return Err(format!("{field} has {len} entries, expected {n_nodes}"));
    }

    let child = |node: usize, child: i32| -> Result<u32, String> {
        u32::try_from(child)
            .ok()
            .filter(|&c| (c as usize) < n_nodes)
            .ok_or_else(|| format!("node {node} child {child} is out of bounds ({n_nodes} nodes)"))
    };

    let mut builder = TreeBuilder::with_n_nodes(n_nodes, Decision::LessEqual);
    for node in 0..n_nodes {
        let (left, right) = (schema.children_left[node], schema.children_right[node]);
        if left == -1 && right == -1 {
            let weights = &schema.leaf_values[node];
            if weights.len() != n_classes {
                return Err(format!(
                    "leaf {node} has {} class weights, model has {n_classes} classes",
                    weights.len()
                ));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(format!("leaf {node} has invalid class weights"));
            }
            builder.make_leaf(node as u32, ClassLeaf::from_weights(weights));
        } else {
            builder.set_split(
                node as u32,
                schema.split_indices[node],
                schema.thresholds[node],
                false,
                child(node, left)?,
                child(node, right)?,
            );
        }
    }

    let tree = builder.freeze();
    tree.validate(n_features).map_err(|e| e.to_string())?;
    Ok(tree)
}

// =============================================================================
// Runtime -> schema
// =============================================================================

impl From<&ProbaModel> for ProbaModelSchema {
    fn from(model: &ProbaModel) -> Self {
        let model_schema = match model.estimator() {
            ProbaEstimator::RandomForest(trees) => ProbaKindSchema::RandomForest {
                trees: trees.iter().map(ClassTreeSchema::from).collect(),
            },
            ProbaEstimator::Logistic(linear) => ProbaKindSchema::Logistic {
                coefficients: linear.weight_matrix().column(0).to_vec(),
                intercept: linear.bias(0),
            },
        };
        Self {
            meta: ProbaMetaSchema {
                num_features: model.n_features(),
                classes: model.classes().to_vec(),
                feature_names: model.feature_names().map(<[String]>::to_vec),
            },
            model: model_schema,
        }
    }
}

impl From<&Tree<ClassLeaf>> for ClassTreeSchema {
    fn from(tree: &Tree<ClassLeaf>) -> Self {
        let n_nodes = tree.n_nodes();
        let mut schema = ClassTreeSchema {
            split_indices: Vec::with_capacity(n_nodes),
            thresholds: Vec::with_capacity(n_nodes),
            children_left: Vec::with_capacity(n_nodes),
            children_right: Vec::with_capacity(n_nodes),
            leaf_values: Vec::with_capacity(n_nodes),
        };
        for node in 0..n_nodes as u32 {
            if tree.is_leaf(node) {
                schema.split_indices.push(0);
                schema.thresholds.push(0.0);
                schema.children_left.push(-1);
                schema.children_right.push(-1);
                schema.leaf_values.push(tree.leaf_value(node).0.to_vec());
            } else {
                schema.split_indices.push(tree.split_index(node));
                schema.thresholds.push(tree.split_threshold(node));
                schema.children_left.push(tree.left_child(node) as i32);
                schema.children_right.push(tree.right_child(node) as i32);
                schema.leaf_values.push(Vec::new());
            }
        }
        schema
    }
}
