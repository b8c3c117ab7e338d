//! Request validation and fan-out to models.
//!
//! A [`Dispatcher`] validates identifiers first, then the batch shape, then its
//! cell types; any of these failing rejects the whole request before a model is
//! touched. Validated requests run every distinct model independently, so one
//! failing model never hides the results of the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::api::{
    FeatureList, HealthReport, HealthStatus, ModelFailure, ModelHealth, ModelInfo,
    PredictRequest, PredictionResponse, ServiceInfo,
};
use crate::cache::{ArtifactLoader, ModelCache, ModelLoader};
use crate::data::FeatureBatch;
use crate::error::{ModelError, ServeError};
use crate::inference::{infer, PredictionResult};
use crate::registry::{ModelDescriptor, ModelId, ModelRegistry};
use crate::schema::FeatureSchema;
use crate::utils::Parallelism;

/// Outcome of a validated prediction request.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Models that scored the batch.
    pub results: BTreeMap<ModelId, PredictionResult>,
    /// Models that could not, with the reason.
    pub failures: BTreeMap<ModelId, ModelError>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_response(self) -> PredictionResponse {
        let errors = self
            .failures
            .into_iter()
            .map(|(id, err)| {
                let failure = ModelFailure {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                };
                (id, failure)
            })
            .collect();
        PredictionResponse {
            models: self.results,
            errors,
        }
    }
}

/// Entry point for predictions and model metadata.
#[derive(Debug)]
pub struct Dispatcher<L = ArtifactLoader> {
    schema: Arc<FeatureSchema>,
    cache: Arc<ModelCache<L>>,
    parallelism: Parallelism,
}

impl<L: ModelLoader> Dispatcher<L> {
    pub fn new(schema: Arc<FeatureSchema>, cache: Arc<ModelCache<L>>) -> Self {
        Self {
            schema,
            cache,
            parallelism: Parallelism::default(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn cache(&self) -> &Arc<ModelCache<L>> {
        &self.cache
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.cache.registry()
    }

    /// Score a raw JSON batch (`[[f, ...], ...]`) with the requested models.
    pub fn predict<S: AsRef<str>>(
        &self,
        data: &Value,
        models: &[S],
    ) -> Result<DispatchReport, ServeError> {
        let ids = self.resolve_ids(models)?;
        let batch = FeatureBatch::parse(data, &self.schema).map_err(|err| {
            tracing::warn!(error = %err, "rejected malformed batch");
            ServeError::from(err)
        })?;
        Ok(self.run(&batch, &ids))
    }

    /// Score typed rows with the requested models.
    pub fn predict_rows<R, S>(
        &self,
        rows: &[R],
        models: &[S],
    ) -> Result<DispatchReport, ServeError>
    where
        R: AsRef<[f64]>,
        S: AsRef<str>,
    {
        let ids = self.resolve_ids(models)?;
        let batch = FeatureBatch::from_rows(rows, &self.schema)?;
        Ok(self.run(&batch, &ids))
    }

    /// Handle a request body. Without `models`, every registered model runs.
    pub fn handle(&self, request: &PredictRequest) -> Result<PredictionResponse, ServeError> {
        let report = match &request.models {
            Some(models) => self.predict(&request.data, models.as_slice())?,
            None => {
                let all: Vec<&str> = self.registry().ids().map(ModelId::as_str).collect();
                self.predict(&request.data, all.as_slice())?
            }
        };
        Ok(report.into_response())
    }

    fn resolve_ids<S: AsRef<str>>(&self, models: &[S]) -> Result<Vec<ModelId>, ServeError> {
        self.registry().resolve_ids(models).map_err(|unknown| {
            let unknown: Vec<String> = unknown.into_iter().map(|id| id.to_string()).collect();
            tracing::warn!(models = ?unknown, "rejected unknown models");
            ServeError::UnknownModel(unknown)
        })
    }

    fn run(&self, batch: &FeatureBatch, ids: &[ModelId]) -> DispatchReport {
        let outcomes = self.parallelism.maybe_par_map(ids.to_vec(), |id| {
            let outcome = self.score(&id, batch);
            (id, outcome)
        });

        let mut report = DispatchReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    report.results.insert(id, result);
                }
                Err(err) => {
                    tracing::warn!(model = %id, kind = err.kind(), error = %err, "model failed");
                    report.failures.insert(id, err);
                }
            }
        }
        report
    }

    fn score(&self, id: &ModelId, batch: &FeatureBatch) -> Result<PredictionResult, ModelError> {
        let model = self.cache.resolve(id)?;
        let result = infer(&model, batch).map_err(|source| ModelError::InferenceFailure {
            model: id.to_string(),
            source,
        })?;
        tracing::debug!(
            model = %id,
            backend = %model.family(),
            rows = batch.n_rows(),
            "scored batch"
        );
        Ok(result)
    }

    /// Metadata for one model, without loading it.
    pub fn describe(&self, id: &str) -> Result<ModelInfo, ServeError> {
        let id = ModelId::new(id);
        self.registry()
            .get(&id)
            .map(|descriptor| self.model_info(descriptor))
            .ok_or_else(|| ServeError::UnknownModel(vec![id.to_string()]))
    }

    /// Metadata for every registered model, in registration order.
    pub fn describe_all(&self) -> Vec<ModelInfo> {
        self.registry()
            .iter()
            .map(|descriptor| self.model_info(descriptor))
            .collect()
    }

    fn model_info(&self, descriptor: &ModelDescriptor) -> ModelInfo {
        let status = descriptor.artifact_status();
        ModelInfo {
            model: descriptor.id.to_string(),
            features_count: self.schema.len(),
            model_path: descriptor.path.display().to_string(),
            timestamp: timestamp(),
            file_size_bytes: status.size_bytes,
            model_exists: status.exists,
        }
    }

    pub fn features(&self) -> FeatureList {
        FeatureList {
            feature_names: self.schema.names().to_vec(),
            feature_count: self.schema.len(),
        }
    }

    /// Artifact presence per model; independent of what is cached.
    pub fn health(&self) -> HealthReport {
        let models = self
            .registry()
            .iter()
            .map(|descriptor| {
                let status = descriptor.artifact_status();
                let health = ModelHealth {
                    status: if status.exists {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Missing
                    },
                    file_size_bytes: status.size_bytes,
                };
                (descriptor.id.clone(), health)
            })
            .collect();
        HealthReport {
            status: HealthStatus::Healthy,
            models,
        }
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo::current()
    }
}

/// Local time, ISO-8601 with microseconds and no offset.
fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BackendFamily, ModelDescriptor};
    use crate::testing::{constant_forest, CountingLoader};
    use serde_json::json;

    fn dispatcher(dir: &std::path::Path) -> Dispatcher<CountingLoader> {
        std::fs::write(dir.join("rf.astr"), b"stub").unwrap();
        let registry = ModelRegistry::new([
            ModelDescriptor::new("rf", dir.join("rf.astr"), BackendFamily::TreeEnsemble),
            ModelDescriptor::new("lr", dir.join("lr.astr"), BackendFamily::TreeEnsemble),
        ])
        .unwrap();
        let schema = Arc::new(FeatureSchema::new(["a", "b", "c"]).unwrap());
        let loader = CountingLoader::constant(constant_forest(3, 0.7));
        let cache = ModelCache::new(Arc::new(registry), loader);
        Dispatcher::new(schema, Arc::new(cache)).with_parallelism(Parallelism::Sequential)
    }

    #[test]
    fn unknown_ids_win_over_malformed_batch() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let err = d.predict(&json!([[1.0]]), &["rf", "bogus"]).unwrap_err();
        assert_eq!(err, ServeError::UnknownModel(vec!["bogus".into()]));
        assert_eq!(d.cache().loader().calls(), 0);
    }

    #[test]
    fn partial_failure_keeps_other_results() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let report = d.predict(&json!([[1.0, 2.0, 3.0]]), &["LR", "rf", "RF"]).unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[&ModelId::new("rf")].probabilities, vec![0.7]);
        assert!(matches!(
            report.failures[&ModelId::new("lr")],
            ModelError::ArtifactMissing { .. }
        ));
        assert!(!report.is_complete());

        let response = report.into_response();
        assert_eq!(response.errors[&ModelId::new("lr")].kind, "artifact_missing");
    }

    #[test]
    fn describe_reports_artifact_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let info = d.describe("RF").unwrap();
        assert_eq!(info.model, "rf");
        assert_eq!(info.features_count, 3);
        assert!(info.model_exists);
        assert_eq!(info.file_size_bytes, 4);
        assert_eq!(d.cache().loader().calls(), 0);

        let missing = d.describe("lr").unwrap();
        assert!(!missing.model_exists);
        assert_eq!(missing.file_size_bytes, 0);

        assert_eq!(
            d.describe("nope").unwrap_err(),
            ServeError::UnknownModel(vec!["nope".into()])
        );
        let all: Vec<_> = d.describe_all().into_iter().map(|i| i.model).collect();
        assert_eq!(all, ["rf", "lr"]);
    }

    #[test]
    fn timestamp_has_microseconds() {
        let ts = timestamp();
        let parsed = chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%dT%H:%M:%S%.6f");
        assert!(parsed.is_ok(), "{ts}");
        assert_eq!(ts.rsplit('.').next().map(str::len), Some(6));
    }

    #[test]
    fn health_ignores_cache_state() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let health = d.health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.models[&ModelId::new("rf")].status, HealthStatus::Healthy);
        assert_eq!(health.models[&ModelId::new("lr")].status, HealthStatus::Missing);
        assert_eq!(d.cache().load_count(), 0);
    }
}
