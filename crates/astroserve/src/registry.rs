//! Model identifiers and the static registry of known models.
//!
//! The registry is the source of truth for which identifiers exist. It never
//! touches model contents, only artifact locations and their metadata.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Case-insensitive model identifier, stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Canonicalize an identifier by lower-casing it. Surrounding whitespace is
    /// kept, so `" rf"` never names `rf`.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_lowercase())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Native inference API shape of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFamily {
    /// Generic classifier with a `[n_rows, n_classes]` probability output.
    TreeEnsemble,
    /// Boosted model fed through its own input container, one probability per row.
    GradientBoosted,
}

impl BackendFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendFamily::TreeEnsemble => "tree_ensemble",
            BackendFamily::GradientBoosted => "gradient_boosted",
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a model lives and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub id: ModelId,
    pub path: PathBuf,
    pub family: BackendFamily,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<ModelId>, path: impl Into<PathBuf>, family: BackendFamily) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            family,
        }
    }

    /// Existence and size of the artifact on disk.
    pub fn artifact_status(&self) -> ArtifactStatus {
        ArtifactStatus::of(&self.path)
    }
}

/// Snapshot of an artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactStatus {
    pub exists: bool,
    /// `0` when the artifact is absent.
    pub size_bytes: u64,
}

impl ArtifactStatus {
    pub fn of(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Self {
                exists: true,
                size_bytes: meta.len(),
            },
            _ => Self {
                exists: false,
                size_bytes: 0,
            },
        }
    }
}

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("model identifier must not be empty")]
    EmptyId,
    #[error("model '{0}' is registered more than once")]
    Duplicate(ModelId),
}

/// Ordered, immutable set of model descriptors.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    index: HashMap<ModelId, usize>,
}

impl ModelRegistry {
    /// Build from descriptors, keeping their order.
    pub fn new(descriptors: impl IntoIterator<Item = ModelDescriptor>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for descriptor in descriptors {
            if descriptor.id.as_str().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if registry.index.contains_key(&descriptor.id) {
                return Err(RegistryError::Duplicate(descriptor.id));
            }
            registry
                .index
                .insert(descriptor.id.clone(), registry.models.len());
            registry.models.push(descriptor);
        }
        Ok(registry)
    }

    /// The three models of the exoplanet service under `models_dir`.
    pub fn exoplanet_defaults(models_dir: impl AsRef<Path>) -> Self {
        let dir = models_dir.as_ref();
        let models = vec![
            ModelDescriptor::new("rf", dir.join("random_forest_model.astr"), BackendFamily::TreeEnsemble),
            ModelDescriptor::new("xgb", dir.join("xgb_model.json"), BackendFamily::GradientBoosted),
            ModelDescriptor::new("lr", dir.join("logistic_model.astr"), BackendFamily::TreeEnsemble),
        ];
        let index = models
            .iter()
            .enumerate()
            .map(|(idx, d)| (d.id.clone(), idx))
            .collect();
        Self { models, index }
    }

    pub fn get(&self, id: &ModelId) -> Option<&ModelDescriptor> {
        self.index.get(id).map(|&idx| &self.models[idx])
    }

    pub fn contains(&self, id: &ModelId) -> bool {
        self.index.contains_key(id)
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    /// Identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &ModelId> {
        self.models.iter().map(|d| &d.id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Canonicalize requested identifiers.
    ///
    /// Returns the distinct identifiers in first-occurrence order, or every
    /// unregistered identifier (distinct, in request order).
    pub fn resolve_ids<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<ModelId>, Vec<ModelId>> {
        let mut known = Vec::with_capacity(requested.len());
        let mut unknown: Vec<ModelId> = Vec::new();
        for raw in requested {
            let id = ModelId::new(raw);
            if !self.contains(&id) {
                if !unknown.contains(&id) {
                    unknown.push(id);
                }
            } else if !known.contains(&id) {
                known.push(id);
            }
        }
        if unknown.is_empty() {
            Ok(known)
        } else {
            Err(unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn registry() -> ModelRegistry {
        ModelRegistry::exoplanet_defaults("/models")
    }

    #[rstest]
    #[case("rf")]
    #[case("RF")]
    #[case("Rf")]
    fn identifiers_are_case_insensitive(#[case] raw: &str) {
        let descriptor = registry().get(&ModelId::new(raw)).cloned().unwrap();
        assert_eq!(descriptor.id.as_str(), "rf");
        assert_eq!(descriptor.family, BackendFamily::TreeEnsemble);
        assert_eq!(descriptor.path, PathBuf::from("/models/random_forest_model.astr"));
    }

    #[rstest]
    #[case(" rf ")]
    #[case("rf\t")]
    #[case("  XGB")]
    fn padded_identifiers_are_unknown(#[case] raw: &str) {
        let reg = registry();
        assert!(reg.get(&ModelId::new(raw)).is_none());
        assert_eq!(reg.resolve_ids(&[raw]).unwrap_err(), vec![ModelId::new(raw)]);
    }

    #[test]
    fn keeps_registration_order() {
        let reg = registry();
        let ids: Vec<_> = reg.ids().map(ModelId::as_str).collect();
        assert_eq!(ids, ["rf", "xgb", "lr"]);
    }

    #[test]
    fn resolve_dedupes_and_reports_every_unknown() {
        let reg = registry();
        assert_eq!(
            reg.resolve_ids(&["XGB", "rf", "xgb"]).unwrap(),
            vec![ModelId::new("xgb"), ModelId::new("rf")]
        );
        assert_eq!(
            reg.resolve_ids(&["rf", "bogus", "NOPE", "Bogus"]).unwrap_err(),
            vec![ModelId::new("bogus"), ModelId::new("nope")]
        );
    }

    #[test]
    fn rejects_duplicates_after_lowercasing() {
        let err = ModelRegistry::new([
            ModelDescriptor::new("rf", "a", BackendFamily::TreeEnsemble),
            ModelDescriptor::new("RF", "b", BackendFamily::TreeEnsemble),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate(ModelId::new("rf")));

        let err = ModelRegistry::new([ModelDescriptor::new("", "a", BackendFamily::TreeEnsemble)]).unwrap_err();
        assert_eq!(err, RegistryError::EmptyId);
    }

    #[test]
    fn artifact_status_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{}").unwrap();

        assert_eq!(
            ArtifactStatus::of(&path),
            ArtifactStatus {
                exists: true,
                size_bytes: 2
            }
        );
        assert!(!ArtifactStatus::of(&dir.path().join("absent")).exists);
        // Directories are not artifacts.
        assert!(!ArtifactStatus::of(dir.path()).exists);
    }

    #[test]
    fn families_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&BackendFamily::GradientBoosted).unwrap(),
            "\"gradient_boosted\""
        );
        let family: BackendFamily = serde_json::from_str("\"tree_ensemble\"").unwrap();
        assert_eq!(family, BackendFamily::TreeEnsemble);
    }
}
