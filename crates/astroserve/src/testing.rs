//! Fixture builders shared by unit and integration tests.
//!
//! Builds small models with known outputs, XGBoost JSON documents, and a loader
//! that counts how often it is invoked.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::{json, Value};

use crate::cache::ModelLoader;
use crate::error::LoadError;
use crate::inference::LoadedModel;
use crate::model::{ProbaEstimator, ProbaModel};
use crate::persist::{self, ArtifactEncoding, EncodeError};
use crate::registry::{ModelDescriptor, ModelId, ModelRegistry};
use crate::repr::{ClassLeaf, Decision, LinearModel, TreeBuilder};

// =============================================================================
// Native models
// =============================================================================

/// Random forest of one single-leaf tree: every row scores `p` for class 1.
pub fn constant_forest(n_features: usize, p: f64) -> ProbaModel {
    forest_with_leaf(n_features, vec![0, 1], &[1.0 - p, p])
}

/// Single-leaf forest over three classes.
pub fn multiclass_forest(n_features: usize) -> ProbaModel {
    forest_with_leaf(n_features, vec![0, 1, 2], &[0.2, 0.3, 0.5])
}

fn forest_with_leaf(n_features: usize, classes: Vec<i64>, weights: &[f64]) -> ProbaModel {
    let mut builder = TreeBuilder::with_n_nodes(1, Decision::LessEqual);
    builder.make_leaf(0, ClassLeaf(weights.into()));
    ProbaModel::new(
        n_features,
        classes,
        None,
        ProbaEstimator::RandomForest(vec![builder.freeze()]),
    )
}

/// Binary logistic regression.
pub fn logistic_model(coefficients: &[f64], intercept: f64) -> ProbaModel {
    ProbaModel::new(
        coefficients.len(),
        vec![0, 1],
        None,
        ProbaEstimator::Logistic(LinearModel::binary(coefficients, intercept)),
    )
}

/// Attach fitted feature names to a model.
pub fn with_feature_names(model: ProbaModel, names: &[&str]) -> ProbaModel {
    ProbaModel::new(
        model.n_features(),
        model.classes().to_vec(),
        Some(names.iter().map(|n| n.to_string()).collect()),
        model.estimator().clone(),
    )
}

// =============================================================================
// XGBoost JSON documents
// =============================================================================

fn xgb_document(n_features: usize, base_score: f64, booster: Value) -> Value {
    json!({
        "version": [2, 0, 3],
        "learner": {
            "attributes": {},
            "feature_names": [],
            "feature_types": [],
            "gradient_booster": booster,
            "learner_model_param": {
                "base_score": format!("{base_score:E}"),
                "boost_from_average": "1",
                "num_class": "0",
                "num_feature": n_features.to_string(),
                "num_target": "1"
            },
            "objective": {
                "name": "binary:logistic",
                "reg_loss_param": {"scale_pos_weight": "1"}
            }
        }
    })
}

fn xgb_tree(id: usize, nodes: Value, n_features: usize) -> Value {
    let n_nodes = nodes["left_children"].as_array().map_or(0, Vec::len);
    let mut tree = nodes;
    tree["id"] = json!(id);
    tree["tree_param"] = json!({
        "num_deleted": "0",
        "num_feature": n_features.to_string(),
        "num_nodes": n_nodes.to_string(),
        "size_leaf_vector": "1"
    });
    tree["categories"] = json!([]);
    tree["categories_nodes"] = json!([]);
    tree["categories_segments"] = json!([]);
    tree["categories_sizes"] = json!([]);
    tree
}

fn gbtree(trees: Vec<Value>) -> Value {
    let n_trees = trees.len();
    json!({
        "name": "gbtree",
        "model": {
            "gbtree_model_param": {
                "num_parallel_tree": "1",
                "num_trees": n_trees.to_string()
            },
            "iteration_indptr": (0..=n_trees).collect::<Vec<_>>(),
            "tree_info": vec![0; n_trees],
            "trees": trees
        }
    })
}

fn leaf_only_tree(id: usize, n_features: usize, value: f32) -> Value {
    xgb_tree(
        id,
        json!({
            "base_weights": [value],
            "default_left": [0],
            "left_children": [-1],
            "right_children": [-1],
            "parents": [2147483647],
            "split_conditions": [value],
            "split_indices": [0],
            "split_type": [0],
            "loss_changes": [0.0],
            "sum_hessian": [1.0]
        }),
        n_features,
    )
}

/// `binary:logistic` gbtree whose only tree is a zero leaf: every row scores
/// `base_score`.
pub fn xgb_constant_json(n_features: usize, base_score: f64) -> Value {
    let trees = vec![leaf_only_tree(0, n_features, 0.0)];
    xgb_document(n_features, base_score, gbtree(trees))
}

/// `binary:logistic` gbtree with a single stump on `feature`, base score 0.5.
///
/// `x < threshold` (and missing values) go to the `left` leaf.
pub fn xgb_stump_json(
    n_features: usize,
    feature: u32,
    threshold: f32,
    left: f32,
    right: f32,
) -> Value {
    let tree = xgb_tree(
        0,
        json!({
            "base_weights": [0.0, left, right],
            "default_left": [1, 0, 0],
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "parents": [2147483647, 0, 0],
            "split_conditions": [threshold, left, right],
            "split_indices": [feature, 0, 0],
            "split_type": [0, 0, 0],
            "loss_changes": [1.0, 0.0, 0.0],
            "sum_hessian": [2.0, 1.0, 1.0]
        }),
        n_features,
    );
    xgb_document(n_features, 0.5, gbtree(vec![tree]))
}

/// DART booster with one constant tree (leaf 1.0) dropped to `weight`.
pub fn xgb_dart_json(n_features: usize, weight: f32) -> Value {
    let booster = json!({
        "name": "dart",
        "gbtree": gbtree(vec![leaf_only_tree(0, n_features, 1.0)]),
        "weight_drop": [weight]
    });
    xgb_document(n_features, 0.5, booster)
}

/// gblinear booster with the given coefficients and bias.
pub fn xgb_linear_json(coefficients: &[f32], bias: f32, base_score: f64) -> Value {
    let mut weights = coefficients.to_vec();
    weights.push(bias);
    let booster = json!({
        "name": "gblinear",
        "model": {"weights": weights}
    });
    xgb_document(coefficients.len(), base_score, booster)
}

// =============================================================================
// Loaders and artifact directories
// =============================================================================

/// Loader that hands out a fixed model and counts invocations.
#[derive(Debug)]
pub struct CountingLoader {
    model: LoadedModel,
    calls: AtomicUsize,
    panic_next: AtomicBool,
}

impl CountingLoader {
    /// Always returns `model` as a tree ensemble.
    pub fn constant(model: ProbaModel) -> Self {
        Self::new(LoadedModel::TreeEnsemble(model))
    }

    pub fn new(model: LoadedModel) -> Self {
        Self {
            model,
            calls: AtomicUsize::new(0),
            panic_next: AtomicBool::new(false),
        }
    }

    /// Like [`CountingLoader::constant`] but the first call panics.
    pub fn panic_once(model: ProbaModel) -> Self {
        let loader = Self::constant(model);
        loader.panic_next.store(true, Ordering::SeqCst);
        loader
    }

    /// Number of `load` calls so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, _descriptor: &ModelDescriptor) -> Result<LoadedModel, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("loader failure injected by test");
        }
        // Widen the race window for concurrent first resolves.
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(self.model.clone())
    }
}

/// Artifact paths written by [`write_model_dir`].
#[derive(Debug, Clone)]
pub struct ModelDir {
    pub rf: PathBuf,
    pub xgb: PathBuf,
    pub lr: PathBuf,
}

impl ModelDir {
    /// Registry pointing at the written artifacts, in `rf`, `xgb`, `lr` order.
    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::exoplanet_defaults(self.rf.parent().unwrap_or(Path::new(".")))
    }
}

/// Write the three default artifacts into `dir`:
/// `rf` scoring `rf_p`, `xgb` scoring `xgb_p`, and an all-zero logistic `lr`
/// (scores 0.5).
pub fn write_model_dir(
    dir: &Path,
    n_features: usize,
    rf_p: f64,
    xgb_p: f64,
) -> Result<ModelDir, EncodeError> {
    let registry = ModelRegistry::exoplanet_defaults(dir);
    let path_of = |id: &str| {
        registry
            .get(&ModelId::new(id))
            .map_or_else(|| dir.join(id), |d| d.path.clone())
    };
    let dir = ModelDir {
        rf: path_of("rf"),
        xgb: path_of("xgb"),
        lr: path_of("lr"),
    };

    persist::write_proba_model(
        &constant_forest(n_features, rf_p),
        &dir.rf,
        ArtifactEncoding::Binary,
    )?;
    std::fs::write(&dir.xgb, serde_json::to_vec(&xgb_constant_json(n_features, xgb_p))?)?;
    persist::write_proba_model(
        &logistic_model(&vec![0.0; n_features], 0.0),
        &dir.lr,
        ArtifactEncoding::Json,
    )?;
    Ok(dir)
}
