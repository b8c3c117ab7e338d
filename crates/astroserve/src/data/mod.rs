//! Request data: validated batches and backend-specific input containers.

mod batch;
mod matrix;

pub use batch::FeatureBatch;
pub use matrix::BoostMatrix;
