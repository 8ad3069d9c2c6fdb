use std::sync::Arc;
use std::time::Duration;

use jsdbg_breakpoints::{DiscoveredMapping, PredictionCache};
use jsdbg_sourcemap::metadata_for_file;

use super::support::{predictor_with, workspace, CountingLoader, CountingRepository};

#[tokio::test]
async fn second_session_reuses_cached_discoveries() {
    let dir = workspace();
    let cache_dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("src/index.ts");

    let first_loader = Arc::new(CountingLoader::default());
    let first = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        first_loader.clone(),
        Some(PredictionCache::new(cache_dir.path()).unwrap()),
    );
    first.prepare_to_predict().await;
    assert_eq!(first_loader.loads(), 1);

    let second_loader = Arc::new(CountingLoader::default());
    let second = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        second_loader.clone(),
        Some(PredictionCache::new(cache_dir.path()).unwrap()),
    );
    second.prepare_to_predict().await;

    assert_eq!(second_loader.loads(), 0);
    assert_eq!(
        second.compiled_paths_for(&source).await,
        vec![dir.path().join("out/index.js")]
    );
}

#[tokio::test]
async fn entries_are_tied_to_the_compiled_file_mtime() {
    let dir = workspace();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = PredictionCache::new(cache_dir.path()).unwrap();
    let predictor = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        Arc::new(CountingLoader::default()),
        Some(cache.clone()),
    );
    predictor.prepare_to_predict().await;

    let compiled = dir.path().join("out/index.js");
    let metadata = metadata_for_file(&compiled).unwrap().unwrap();
    let key = compiled.to_string_lossy().into_owned();

    let cached: Vec<DiscoveredMapping> = cache.lookup(&key, metadata.mtime).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].resolved_path, dir.path().join("src/index.ts"));
    assert_eq!(cached[0].metadata, metadata);

    assert!(cache.lookup(&key, metadata.mtime + 1).is_none());
}
