//! Request and response payloads for the HTTP-facing caller.
//!
//! Field names follow the service's JSON contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inference::PredictionResult;
use crate::registry::ModelId;

/// Service name reported by [`ServiceInfo`].
pub const SERVICE_NAME: &str = "AstroCluster Exoplanet ML API";

/// Public endpoints of the service.
pub const ENDPOINTS: [&str; 5] = [
    "/health",
    "/features",
    "/model_info",
    "/model/{model_type}/info",
    "/predict",
];

/// `POST /predict` body.
///
/// `data` is kept as raw JSON so the gateway can report row and column of any
/// malformed cell. `models` defaults to every registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
}

/// `POST /predict` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub models: BTreeMap<ModelId, PredictionResult>,
    /// Per-model failures, keyed by identifier; empty when every model scored.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<ModelId, ModelFailure>,
}

/// A model that could not score the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFailure {
    /// Short machine-readable code (`artifact_missing`, `inference_failure`, ...).
    pub kind: String,
    pub message: String,
}

/// Metadata for one model, computed without loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model: String,
    pub features_count: usize,
    pub model_path: String,
    /// Local time, ISO-8601 with microseconds.
    pub timestamp: String,
    pub file_size_bytes: u64,
    pub model_exists: bool,
}

/// `GET /features` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureList {
    pub feature_names: Vec<String>,
    pub feature_count: usize,
}

/// Artifact state of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHealth {
    pub status: HealthStatus,
    pub file_size_bytes: u64,
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub models: BTreeMap<ModelId, ModelHealth>,
}

/// `GET /` banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

impl ServiceInfo {
    pub fn current() -> Self {
        Self {
            message: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_models_are_optional() {
        let req: PredictRequest = serde_json::from_value(json!({"data": [[1, 2, 3]]})).unwrap();
        assert!(req.models.is_none());

        let req: PredictRequest =
            serde_json::from_value(json!({"data": [[1, 2, 3]], "models": ["RF"]})).unwrap();
        assert_eq!(req.models, Some(vec!["RF".to_string()]));
    }

    #[test]
    fn response_matches_contract() {
        let mut models = BTreeMap::new();
        models.insert(
            ModelId::new("rf"),
            PredictionResult {
                predictions: vec![1],
                probabilities: vec![0.7],
            },
        );
        let response = PredictionResponse {
            models,
            errors: BTreeMap::new(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"models": {"rf": {"predictions": [1], "probabilities": [0.7]}}})
        );
    }

    #[test]
    fn health_status_is_lowercase() {
        let health = ModelHealth {
            status: HealthStatus::Missing,
            file_size_bytes: 0,
        };
        assert_eq!(
            serde_json::to_value(health).unwrap(),
            json!({"status": "missing", "file_size_bytes": 0})
        );
    }
}
