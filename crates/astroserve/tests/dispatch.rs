//! End-to-end dispatch over real artifacts written to a temporary directory.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use serde_json::{json, Value};

use astroserve::api::{HealthStatus, PredictRequest};
use astroserve::persist::{self, ArtifactEncoding};
use astroserve::testing::{constant_forest, with_feature_names, write_model_dir, ModelDir};
use astroserve::{
    BatchError, Dispatcher, FeatureSchema, InferenceError, ModelCache, ModelError, ModelId,
    Parallelism, ServeError,
};

fn setup(dir: &std::path::Path) -> (ModelDir, Dispatcher) {
    let models = write_model_dir(dir, 3, 0.7, 0.4).unwrap();
    let schema = Arc::new(FeatureSchema::new(["a", "b", "c"]).unwrap());
    let cache = Arc::new(ModelCache::from_artifacts(Arc::new(models.registry())));
    (models, Dispatcher::new(schema, cache))
}

fn row() -> Value {
    json!([[1.0, 2.0, 3.0]])
}

#[test]
fn scores_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());

    let report = d.predict(&row(), &["rf", "xgb", "lr"]).unwrap();
    assert!(report.is_complete());

    let rf = &report.results[&ModelId::new("rf")];
    assert_eq!(rf.predictions, vec![1]);
    assert_eq!(rf.probabilities, vec![0.7]);

    let xgb = &report.results[&ModelId::new("xgb")];
    assert_eq!(xgb.predictions, vec![0]);
    assert_abs_diff_eq!(xgb.probabilities[0], 0.4, epsilon = 1e-6);

    // All-zero logistic regression sits exactly on the threshold and is labelled 0.
    let lr = &report.results[&ModelId::new("lr")];
    assert_eq!(lr.predictions, vec![0]);
    assert_eq!(lr.probabilities, vec![0.5]);
}

#[test]
fn multi_row_batches_keep_row_order() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());

    let data = json!([[1, 2, 3], [0.5, -1, 7], [0, 0, 0]]);
    let report = d.predict(&data, &["rf"]).unwrap();
    let rf = &report.results[&ModelId::new("rf")];
    assert_eq!(rf.len(), 3);
    assert_eq!(rf.predictions, vec![1, 1, 1]);
}

#[test]
fn identifiers_are_case_insensitive_and_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());

    let report = d.predict(&row(), &["RF", "rf", "Rf"]).unwrap();
    let keys: Vec<_> = report.results.keys().map(ModelId::as_str).collect();
    assert_eq!(keys, ["rf"]);
    assert_eq!(d.cache().load_count(), 1);
}

#[test]
fn unknown_model_rejects_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());

    let err = d.predict(&row(), &["rf", "bogus"]).unwrap_err();
    assert_eq!(err, ServeError::UnknownModel(vec!["bogus".into()]));
    assert_eq!(d.cache().load_count(), 0);
}

#[test]
fn padded_identifiers_are_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());

    let err = d.predict(&row(), &[" rf\t"]).unwrap_err();
    assert_eq!(err, ServeError::UnknownModel(vec![" rf\t".into()]));
    assert_eq!(
        d.describe("  xgb ").unwrap_err(),
        ServeError::UnknownModel(vec!["  xgb ".into()])
    );
    assert_eq!(d.cache().load_count(), 0);
}

#[test]
fn malformed_batch_rejects_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());

    for data in [json!([[1.0, 2.0]]), json!([[1.0, 2.0, 3.0, 4.0]])] {
        let err = d.predict(&data, &["rf", "xgb"]).unwrap_err();
        assert!(matches!(
            err,
            ServeError::MalformedBatch(BatchError::RowLength { expected: 3, .. })
        ));
    }
    let err = d.predict(&json!([[1, "x", 3]]), &["rf"]).unwrap_err();
    assert!(matches!(
        err,
        ServeError::MalformedBatch(BatchError::NonNumeric { row: 0, column: 1, .. })
    ));
    assert_eq!(d.cache().load_count(), 0);
}

#[test]
fn missing_artifact_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let (models, d) = setup(dir.path());
    std::fs::remove_file(&models.xgb).unwrap();

    let report = d.predict(&row(), &["rf", "xgb"]).unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.results.contains_key(&ModelId::new("rf")));
    assert!(matches!(
        &report.failures[&ModelId::new("xgb")],
        ModelError::ArtifactMissing { model, .. } if model == "xgb"
    ));

    let health = d.health();
    assert_eq!(health.models[&ModelId::new("xgb")].status, HealthStatus::Missing);
    assert_eq!(health.models[&ModelId::new("rf")].status, HealthStatus::Healthy);
}

#[test]
fn corrupt_artifact_is_reported_per_model() {
    let dir = tempfile::tempdir().unwrap();
    let (models, d) = setup(dir.path());
    std::fs::write(&models.rf, b"definitely not a model").unwrap();

    let report = d.predict(&row(), &["rf", "lr"]).unwrap();
    assert_eq!(report.failures[&ModelId::new("rf")].kind(), "artifact_load");
    assert!(report.results.contains_key(&ModelId::new("lr")));
    assert!(!d.cache().is_loaded(&ModelId::new("rf")));
}

#[test]
fn foreign_feature_names_fail_inference() {
    let dir = tempfile::tempdir().unwrap();
    let (models, d) = setup(dir.path());
    let model = with_feature_names(constant_forest(3, 0.7), &["x", "y", "z"]);
    persist::write_proba_model(&model, &models.rf, ArtifactEncoding::Binary).unwrap();

    let report = d.predict(&row(), &["rf"]).unwrap();
    match &report.failures[&ModelId::new("rf")] {
        ModelError::InferenceFailure { source, .. } => assert_eq!(
            source,
            &InferenceError::FeatureNameMismatch {
                index: 0,
                expected: "x".into(),
                found: "a".into(),
            }
        ),
        other => panic!("unexpected failure: {other}"),
    }
}

#[test]
fn handle_defaults_to_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let (_, d) = setup(dir.path());
    let d = d.with_parallelism(Parallelism::Sequential);

    let request: PredictRequest = serde_json::from_value(json!({"data": [[1, 2, 3]]})).unwrap();
    let response = d.handle(&request).unwrap();
    let keys: Vec<_> = response.models.keys().map(ModelId::as_str).collect();
    assert_eq!(keys, ["lr", "rf", "xgb"]);
    assert!(response.errors.is_empty());

    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["models"]["rf"], json!({"predictions": [1], "probabilities": [0.7]}));
    assert!(body.get("errors").is_none());
}

#[test]
fn describe_does_not_load() {
    let dir = tempfile::tempdir().unwrap();
    let (models, d) = setup(dir.path());

    let info = d.describe("XGB").unwrap();
    assert_eq!(info.model, "xgb");
    assert_eq!(info.features_count, 3);
    assert_eq!(info.model_path, models.xgb.display().to_string());
    assert!(info.model_exists);
    assert_eq!(
        info.file_size_bytes,
        std::fs::metadata(&models.xgb).unwrap().len()
    );
    assert_eq!(d.cache().load_count(), 0);

    let features = d.features();
    assert_eq!(features.feature_names, ["a", "b", "c"]);
    assert_eq!(features.feature_count, 3);
}
