//! Canonical tree representation (SoA) shared by all tree backends.
//!
//! This module provides:
//! - [`Tree`]: Immutable SoA tree storage for efficient traversal
//! - [`TreeBuilder`]: Node-by-node construction used by artifact converters
//! - [`TreeValidationError`]: Structural validation errors

use super::NodeId;

// ============================================================================
// Leaf values
// ============================================================================

/// Marker for values stored at tree leaves.
pub trait LeafValue: Clone + std::fmt::Debug + Default + Send + Sync {}

/// Scalar leaf used by boosted trees (an additive margin contribution).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScalarLeaf(pub f32);

impl LeafValue for ScalarLeaf {}

/// Class-distribution leaf used by random forests.
///
/// Values are normalized so they sum to one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassLeaf(pub Box<[f64]>);

impl ClassLeaf {
    /// Build from raw class weights (counts or fractions), normalizing to one.
    ///
    /// All-zero weights are kept as-is.
    pub fn from_weights(weights: &[f64]) -> Self {
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            Self(weights.iter().map(|w| w / total).collect())
        } else {
            Self(weights.into())
        }
    }

    /// Number of classes.
    #[inline]
    pub fn n_classes(&self) -> usize {
        self.0.len()
    }
}

impl LeafValue for ClassLeaf {}

// ============================================================================
// Split rule
// ============================================================================

/// Comparison used at numeric splits. The sample goes left when it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    /// `value < threshold` (XGBoost convention).
    #[default]
    Less,
    /// `value <= threshold` (scikit-learn convention).
    LessEqual,
}

impl Decision {
    #[inline]
    fn goes_left(self, value: f64, threshold: f64) -> bool {
        match self {
            Decision::Less => value < threshold,
            Decision::LessEqual => value <= threshold,
        }
    }
}

// ============================================================================
// Sample access
// ============================================================================

/// Feature lookup for a single sample.
///
/// Tree backends compare in single precision, so values are exposed as `f32`.
pub trait SampleAccessor {
    fn feature(&self, idx: usize) -> f32;
}

impl SampleAccessor for [f32] {
    #[inline]
    fn feature(&self, idx: usize) -> f32 {
        self[idx]
    }
}

impl SampleAccessor for ndarray::ArrayView1<'_, f32> {
    #[inline]
    fn feature(&self, idx: usize) -> f32 {
        self[idx]
    }
}

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("node {node} {side} child {child} is out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },
    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("node {node} splits on feature {feature}, model has {n_features} features")]
    FeatureOutOfRange {
        node: NodeId,
        feature: u32,
        n_features: usize,
    },
}

// ============================================================================
// Tree
// ============================================================================

/// Immutable decision tree in structure-of-arrays layout.
///
/// Node 0 is the root. Internal nodes carry a feature index, threshold and
/// children; leaves carry a value of type `L`.
#[derive(Debug, Clone)]
pub struct Tree<L: LeafValue> {
    split_indices: Box<[u32]>,
    thresholds: Box<[f64]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[L]>,
    decision: Decision,
}

impl<L: LeafValue> Tree<L> {
    /// Number of nodes in the tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f64 {
        self.thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> &L {
        &self.leaf_values[node as usize]
    }

    #[inline]
    #[cfg(test)]
    pub(crate) fn decision(&self) -> Decision {
        self.decision
    }

    /// Traverse the tree to find the leaf node for a sample.
    ///
    /// NaN values follow the node's default direction.
    #[inline]
    pub fn traverse_to_leaf<S: SampleAccessor + ?Sized>(&self, sample: &S) -> NodeId {
        let mut node: NodeId = 0;
        while !self.is_leaf(node) {
            let fvalue = sample.feature(self.split_index(node) as usize);
            let left = if fvalue.is_nan() {
                self.default_left(node)
            } else {
                self.decision
                    .goes_left(f64::from(fvalue), self.split_threshold(node))
            };
            node = if left {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }
        node
    }

    /// Leaf value reached by a sample.
    #[inline]
    pub fn predict<S: SampleAccessor + ?Sized>(&self, sample: &S) -> &L {
        self.leaf_value(self.traverse_to_leaf(sample))
    }

    /// Validate structure: in-bounds children, no loops, every node reachable
    /// exactly once, split features below `n_features`.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];
        while let Some(node) = stack.pop() {
            if visited[node as usize] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[node as usize] = true;
            if self.is_leaf(node) {
                continue;
            }

            let feature = self.split_index(node);
            if feature as usize >= n_features {
                return Err(TreeValidationError::FeatureOutOfRange {
                    node,
                    feature,
                    n_features,
                });
            }

            for (side, child) in [("left", self.left_child(node)), ("right", self.right_child(node))] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                stack.push(child);
            }
        }

        match visited.iter().position(|&v| !v) {
            Some(node) => Err(TreeValidationError::UnreachableNode {
                node: node as NodeId,
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// TreeBuilder
// ============================================================================

/// Mutable tree used while converting artifacts into [`Tree`].
///
/// All nodes start as leaves with a default value.
#[derive(Debug, Clone)]
pub struct TreeBuilder<L: LeafValue> {
    split_indices: Vec<u32>,
    thresholds: Vec<f64>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<L>,
    decision: Decision,
}

impl<L: LeafValue> TreeBuilder<L> {
    /// Create a builder with `n_nodes` leaf nodes.
    pub fn with_n_nodes(n_nodes: usize, decision: Decision) -> Self {
        Self {
            split_indices: vec![0; n_nodes],
            thresholds: vec![0.0; n_nodes],
            left_children: vec![0; n_nodes],
            right_children: vec![0; n_nodes],
            default_left: vec![false; n_nodes],
            is_leaf: vec![true; n_nodes],
            leaf_values: vec![L::default(); n_nodes],
            decision,
        }
    }

    /// Turn `node` into a numeric split.
    pub fn set_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f64,
        default_left: bool,
        left: NodeId,
        right: NodeId,
    ) -> &mut Self {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.thresholds[idx] = threshold;
        self.default_left[idx] = default_left;
        self.left_children[idx] = left;
        self.right_children[idx] = right;
        self.is_leaf[idx] = false;
        self
    }

    /// Turn `node` into a leaf holding `value`.
    pub fn make_leaf(&mut self, node: NodeId, value: L) -> &mut Self {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.leaf_values[idx] = value;
        self
    }

    /// Freeze into an immutable [`Tree`].
    pub fn freeze(self) -> Tree<L> {
        Tree {
            split_indices: self.split_indices.into_boxed_slice(),
            thresholds: self.thresholds.into_boxed_slice(),
            left_children: self.left_children.into_boxed_slice(),
            right_children: self.right_children.into_boxed_slice(),
            default_left: self.default_left.into_boxed_slice(),
            is_leaf: self.is_leaf.into_boxed_slice(),
            leaf_values: self.leaf_values.into_boxed_slice(),
            decision: self.decision,
        }
    }
}
