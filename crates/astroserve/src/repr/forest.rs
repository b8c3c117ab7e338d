//! Canonical forest representation (collection of boosted trees).

use super::tree::{SampleAccessor, ScalarLeaf, Tree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("base score has {len} entries, forest has {n_groups} groups")]
    BaseScoreLenMismatch { n_groups: u32, len: usize },
    #[error("tree {tree_idx} is assigned to group {group}, forest has {n_groups} groups")]
    TreeGroupOutOfRange {
        tree_idx: usize,
        group: u32,
        n_groups: u32,
    },
    #[error("{n_weights} tree weights for {n_trees} trees")]
    TreeWeightsLenMismatch { n_trees: usize, n_weights: usize },
    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Forest of boosted trees with scalar leaves.
///
/// Stores trees with their group assignments, a per-group base score (in margin
/// space) and optional per-tree weights (DART).
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Tree<ScalarLeaf>>,
    tree_groups: Vec<u32>,
    n_groups: u32,
    base_score: Vec<f32>,
    tree_weights: Option<Box<[f32]>>,
}

impl Forest {
    /// Create a new forest with the given number of groups.
    pub fn new(n_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_groups,
            base_score: vec![0.0; n_groups as usize],
            tree_weights: None,
        }
    }

    /// Set the base score for all groups.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        self.base_score = base_score;
        self
    }

    /// Scale each tree's contribution by a weight (DART).
    pub fn with_tree_weights(mut self, weights: Box<[f32]>) -> Self {
        self.tree_weights = Some(weights);
        self
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: Tree<ScalarLeaf>, group: u32) {
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    #[inline]
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    #[inline]
    pub fn tree_weights(&self) -> Option<&[f32]> {
        self.tree_weights.as_deref()
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&Tree<ScalarLeaf>, u32)> {
        self.trees
            .iter()
            .zip(self.tree_groups.iter())
            .map(|(t, &g)| (t, g))
    }

    /// Validate structural invariants (trees, group assignments, base score, weights).
    pub fn validate(&self, n_features: usize) -> Result<(), ForestValidationError> {
        if self.base_score.len() != self.n_groups as usize {
            return Err(ForestValidationError::BaseScoreLenMismatch {
                n_groups: self.n_groups,
                len: self.base_score.len(),
            });
        }
        if let Some(weights) = &self.tree_weights {
            if weights.len() != self.trees.len() {
                return Err(ForestValidationError::TreeWeightsLenMismatch {
                    n_trees: self.trees.len(),
                    n_weights: weights.len(),
                });
            }
        }
        for (tree_idx, &group) in self.tree_groups.iter().enumerate() {
            if group >= self.n_groups {
                return Err(ForestValidationError::TreeGroupOutOfRange {
                    tree_idx,
                    group,
                    n_groups: self.n_groups,
                });
            }
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }

    /// Raw margins for a single sample, one per group.
    pub fn predict_row<S: SampleAccessor + ?Sized>(&self, sample: &S) -> Vec<f32> {
        let mut output = self.base_score.clone();
        for (idx, (tree, group)) in self.trees_with_groups().enumerate() {
            let weight = self.tree_weights.as_ref().map_or(1.0, |w| w[idx]);
            output[group as usize] += weight * tree.predict(sample).0;
        }
        output
    }
}
