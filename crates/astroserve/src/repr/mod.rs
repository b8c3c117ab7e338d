//! Canonical in-memory model representations.
//!
//! Artifact readers ([`crate::compat`], [`crate::persist`]) convert into these
//! types; the backends in [`crate::model`] run inference on them.

/// Canonical node identifier: an index into a tree's SoA arrays.
pub type NodeId = u32;

pub mod forest;
pub mod linear;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use linear::LinearModel;
pub use tree::{
    ClassLeaf, Decision, LeafValue, SampleAccessor, ScalarLeaf, Tree, TreeBuilder,
    TreeValidationError,
};
