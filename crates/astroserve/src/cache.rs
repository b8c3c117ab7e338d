//! Process-lifetime cache of deserialized models.
//!
//! Every registered identifier owns one slot, created up front. Resolving an
//! uncached identifier locks only its slot while loading, so concurrent first
//! resolves of one model deserialize it exactly once, and different models load
//! in parallel. A failed (or panicking) load leaves the slot empty.
//!
//! Entries are never evicted or refreshed: an artifact replaced on disk is not
//! picked up until the process restarts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::error::{LoadError, ModelError};
use crate::inference::LoadedModel;
use crate::model::BoostedModel;
use crate::persist;
use crate::registry::{BackendFamily, ModelDescriptor, ModelId, ModelRegistry};

/// Turns an artifact into a [`LoadedModel`].
pub trait ModelLoader: Send + Sync {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<LoadedModel, LoadError>;
}

/// Reads artifacts from disk according to their backend family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactLoader;

impl ModelLoader for ArtifactLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<LoadedModel, LoadError> {
        match descriptor.family {
            BackendFamily::TreeEnsemble => {
                persist::read_proba_model(&descriptor.path).map(LoadedModel::TreeEnsemble)
            }
            BackendFamily::GradientBoosted => {
                BoostedModel::from_file(&descriptor.path).map(LoadedModel::GradientBoosted)
            }
        }
    }
}

type Slot = Mutex<Option<Arc<LoadedModel>>>;

/// Lazily populated model cache.
pub struct ModelCache<L = ArtifactLoader> {
    registry: Arc<ModelRegistry>,
    loader: L,
    slots: HashMap<ModelId, Slot>,
    loads: AtomicU64,
}

impl ModelCache<ArtifactLoader> {
    /// Cache reading artifacts from disk.
    pub fn from_artifacts(registry: Arc<ModelRegistry>) -> Self {
        Self::new(registry, ArtifactLoader)
    }
}

impl<L: ModelLoader> ModelCache<L> {
    pub fn new(registry: Arc<ModelRegistry>, loader: L) -> Self {
        let slots = registry
            .ids()
            .map(|id| (id.clone(), Mutex::new(None)))
            .collect();
        Self {
            registry,
            loader,
            slots,
            loads: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Return the cached model for `id`, loading it on first use.
    pub fn resolve(&self, id: &ModelId) -> Result<Arc<LoadedModel>, ModelError> {
        let (Some(descriptor), Some(slot)) = (self.registry.get(id), self.slots.get(id)) else {
            return Err(ModelError::UnknownModel(id.to_string()));
        };

        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = entry.as_ref() {
            return Ok(Arc::clone(model));
        }

        if !descriptor.artifact_status().exists {
            return Err(ModelError::ArtifactMissing {
                model: id.to_string(),
                path: descriptor.path.clone(),
            });
        }

        let started = Instant::now();
        let model = self
            .loader
            .load(descriptor)
            .map(Arc::new)
            .map_err(|source| {
                tracing::warn!(
                    model = %id,
                    path = %descriptor.path.display(),
                    error = %source,
                    "failed to load model"
                );
                ModelError::ArtifactLoad {
                    model: id.to_string(),
                    path: descriptor.path.clone(),
                    source,
                }
            })?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            model = %id,
            path = %descriptor.path.display(),
            backend = %descriptor.family,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );

        *entry = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Whether `id` has a cached entry.
    pub fn is_loaded(&self, id: &ModelId) -> bool {
        self.slots.get(id).is_some_and(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    /// Number of cached entries.
    pub fn loaded_count(&self) -> usize {
        self.registry.ids().filter(|id| self.is_loaded(id)).count()
    }

    /// Number of successful deserializations since creation.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl<L> std::fmt::Debug for ModelCache<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("registry", &self.registry)
            .field("loads", &self.loads.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
