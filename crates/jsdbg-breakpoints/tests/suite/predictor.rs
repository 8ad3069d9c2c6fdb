use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use jsdbg_breakpoints::{SetBreakpointsRequest, SourceBreakpoint};

use super::support::{predictor_with, workspace, CountingLoader, CountingRepository};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_scan() {
    let dir = workspace();
    let repo = Arc::new(CountingRepository::new(Duration::from_millis(50)));
    let predictor = predictor_with(
        dir.path(),
        repo.clone(),
        Arc::new(CountingLoader::default()),
        None,
    );

    join_all((0..8).map(|_| predictor.prepare_to_predict())).await;
    predictor.prepare_to_predict().await;

    assert_eq!(repo.calls(), 1);
    assert_eq!(predictor.scan_count(), 1);
    assert_eq!(predictor.indexed_source_count().await, 1);
}

#[tokio::test]
async fn predicting_triggers_the_scan_lazily() {
    let dir = workspace();
    let repo = Arc::new(CountingRepository::new(Duration::ZERO));
    let predictor = predictor_with(
        dir.path(),
        repo.clone(),
        Arc::new(CountingLoader::default()),
        None,
    );
    assert_eq!(predictor.scan_count(), 0);

    let request = SetBreakpointsRequest::new(
        dir.path().join("src/index.ts"),
        vec![SourceBreakpoint { line: 5, column: None }],
    );
    predictor.predict_breakpoints(&request).await;
    predictor.predict_breakpoints(&request).await;

    assert_eq!(repo.calls(), 1);
    assert_eq!(predictor.scan_count(), 1);
}

#[tokio::test]
async fn index_maps_sources_to_compiled_files() {
    let dir = workspace();
    let predictor = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        Arc::new(CountingLoader::default()),
        None,
    );

    assert_eq!(
        predictor
            .compiled_paths_for(&dir.path().join("src/index.ts"))
            .await,
        vec![dir.path().join("out/index.js")]
    );
    // Compiled files without a map are never indexed.
    assert!(predictor
        .compiled_paths_for(&dir.path().join("out/vendor.js"))
        .await
        .is_empty());
}

#[tokio::test]
async fn empty_out_files_skip_the_scan() {
    let dir = workspace();
    let repo = Arc::new(CountingRepository::new(Duration::ZERO));
    let predictor = jsdbg_breakpoints::BreakpointsPredictor::new(
        jsdbg_breakpoints::PredictorOptions::new(dir.path(), Vec::new()),
        repo.clone(),
        Arc::new(CountingLoader::default()),
        None,
        None,
    );

    predictor.prepare_to_predict().await;
    assert_eq!(repo.calls(), 0);
    assert_eq!(predictor.indexed_source_count().await, 0);
}
