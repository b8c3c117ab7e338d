//! astroserve: prediction gateway for tabular binary classifiers.
//!
//! Serves a fixed set of pre-trained exoplanet classifiers (`rf`, `xgb`, `lr`)
//! behind one dispatch interface. Artifacts are loaded lazily and cached for the
//! process lifetime; a batch is validated once and scored by every requested
//! model, with per-model failures reported next to the successful results.
//!
//! # Key Types
//!
//! - [`Dispatcher`] - validates requests and fans out to models
//! - [`ModelCache`] / [`ModelRegistry`] - where models live and their loaded state
//! - [`FeatureSchema`] / [`FeatureBatch`] - the column contract and validated input
//! - [`GatewayConfig`] - TOML configuration
//!
//! # Backends
//!
//! Tree-ensemble artifacts (random forests, logistic regression) use the native
//! format in [`persist`]. Gradient-boosted artifacts are XGBoost JSON models,
//! loaded through [`compat::xgboost`].

pub mod api;
pub mod cache;
pub mod compat;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod inference;
pub mod model;
pub mod persist;
pub mod registry;
pub mod repr;
pub mod schema;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use api::{PredictRequest, PredictionResponse};
pub use cache::{ArtifactLoader, ModelCache, ModelLoader};
pub use config::{ConfigError, GatewayConfig};
pub use data::FeatureBatch;
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::{BatchError, InferenceError, LoadError, ModelError, ServeError};
pub use inference::{infer, LoadedModel, PredictionResult, DECISION_THRESHOLD};
pub use registry::{BackendFamily, ModelDescriptor, ModelId, ModelRegistry};
pub use schema::FeatureSchema;
pub use utils::Parallelism;
