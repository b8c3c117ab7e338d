//! Concurrent first resolves load each model exactly once.

use std::sync::{Arc, Barrier};

use serde_json::json;

use astroserve::testing::{constant_forest, write_model_dir, CountingLoader};
use astroserve::{
    BackendFamily, Dispatcher, FeatureSchema, LoadedModel, ModelCache, ModelDescriptor, ModelId,
    ModelRegistry,
};

const THREADS: usize = 8;

#[test]
fn racing_resolves_share_one_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rf.astr");
    std::fs::write(&path, b"stub").unwrap();
    let descriptor = ModelDescriptor::new("rf", path, BackendFamily::TreeEnsemble);
    let registry = ModelRegistry::new([descriptor]).unwrap();
    let loader = CountingLoader::constant(constant_forest(3, 0.7));
    let cache = ModelCache::new(Arc::new(registry), loader);
    let barrier = Barrier::new(THREADS);

    let resolved: Vec<Arc<LoadedModel>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let cache = &cache;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    let raw = if i % 2 == 0 { "rf" } else { "RF" };
                    cache.resolve(&ModelId::new(raw)).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(cache.loader().calls(), 1);
    assert_eq!(cache.load_count(), 1);
    assert!(resolved.iter().all(|m| Arc::ptr_eq(m, &resolved[0])));
}

#[test]
fn concurrent_requests_load_each_artifact_once() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_model_dir(dir.path(), 3, 0.7, 0.4).unwrap();
    let schema = Arc::new(FeatureSchema::new(["a", "b", "c"]).unwrap());
    let cache = Arc::new(ModelCache::from_artifacts(Arc::new(models.registry())));
    let dispatcher = Dispatcher::new(schema, Arc::clone(&cache));
    let barrier = Barrier::new(THREADS);
    let data = json!([[1.0, 2.0, 3.0]]);

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                let report = dispatcher.predict(&data, &["rf", "xgb", "lr"]).unwrap();
                assert!(report.is_complete());
                assert_eq!(report.results[&ModelId::new("rf")].probabilities, vec![0.7]);
            });
        }
    });

    assert_eq!(cache.load_count(), 3);
    assert_eq!(cache.loaded_count(), 3);
}
