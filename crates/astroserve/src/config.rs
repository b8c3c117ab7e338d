//! Gateway configuration.
//!
//! ```toml
//! models_dir = "app/models"
//! threads = 0
//!
//! [[models]]
//! id = "rf"
//! path = "random_forest_model.astr"
//! backend = "tree_ensemble"
//! ```
//!
//! Every field is optional. Without `[[models]]` the three exoplanet models are
//! registered; without `features` the exoplanet schema is used.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::ModelCache;
use crate::dispatch::Dispatcher;
use crate::registry::{BackendFamily, ModelDescriptor, ModelRegistry};
use crate::schema::FeatureSchema;
use crate::utils::Parallelism;

/// Environment variable overriding [`GatewayConfig::models_dir`].
pub const MODELS_DIR_ENV: &str = "ASTROSERVE_MODELS_DIR";

/// Default artifact directory, relative to the working directory.
pub const DEFAULT_MODELS_DIR: &str = "app/models";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One `[[models]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub id: String,
    /// Relative paths are resolved against `models_dir`.
    pub path: PathBuf,
    pub backend: BackendFamily,
}

impl ModelEntry {
    fn new(id: &str, path: &str, backend: BackendFamily) -> Self {
        Self {
            id: id.to_string(),
            path: PathBuf::from(path),
            backend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub models_dir: PathBuf,
    /// Fan-out threads; 0 picks automatically, 1 disables parallel scoring.
    pub threads: usize,
    /// Overrides the exoplanet feature schema.
    pub features: Option<Vec<String>>,
    pub models: Vec<ModelEntry>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            threads: 0,
            features: None,
            models: vec![
                ModelEntry::new("rf", "random_forest_model.astr", BackendFamily::TreeEnsemble),
                ModelEntry::new("xgb", "xgb_model.json", BackendFamily::GradientBoosted),
                ModelEntry::new("lr", "logistic_model.astr", BackendFamily::TreeEnsemble),
            ],
        }
    }
}

impl GatewayConfig {
    /// Read a TOML file, then apply the environment override.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_models_dir_override(std::env::var_os(MODELS_DIR_ENV));
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Defaults plus the environment override.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_models_dir_override(std::env::var_os(MODELS_DIR_ENV));
        config
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace `models_dir` when `value` is set and non-empty.
    pub fn apply_models_dir_override(&mut self, value: Option<OsString>) {
        if let Some(dir) = value.filter(|v| !v.is_empty()) {
            self.models_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema()?;
        self.registry()?;
        Ok(())
    }

    pub fn schema(&self) -> Result<FeatureSchema, ConfigError> {
        match &self.features {
            Some(names) => FeatureSchema::new(names.iter().cloned())
                .map_err(|err| ConfigError::Invalid(err.to_string())),
            None => Ok(FeatureSchema::exoplanet()),
        }
    }

    /// Registry with artifact paths resolved against `models_dir`.
    pub fn registry(&self) -> Result<ModelRegistry, ConfigError> {
        let descriptors = self.models.iter().map(|entry| {
            ModelDescriptor::new(
                entry.id.as_str(),
                self.models_dir.join(&entry.path),
                entry.backend,
            )
        });
        ModelRegistry::new(descriptors).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn parallelism(&self) -> Parallelism {
        Parallelism::from_threads(self.threads)
    }

    /// Wire schema, registry and an empty artifact cache together.
    pub fn build_dispatcher(&self) -> Result<Dispatcher, ConfigError> {
        let schema = Arc::new(self.schema()?);
        let registry = Arc::new(self.registry()?);
        tracing::info!(
            models = registry.len(),
            features = schema.len(),
            models_dir = %self.models_dir.display(),
            "gateway configured"
        );
        let cache = Arc::new(ModelCache::from_artifacts(registry));
        Ok(Dispatcher::new(schema, cache).with_parallelism(self.parallelism()))
    }
}
