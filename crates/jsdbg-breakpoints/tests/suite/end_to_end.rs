use std::sync::Arc;
use std::time::Duration;

use jsdbg_breakpoints::{
    BreakpointsPredictor, PredictorOptions, SetBreakpointsRequest, SourceBreakpoint,
    WorkspaceLocation,
};
use jsdbg_sourcemap::OverridePathResolver;
use jsdbg_config::LaunchConfig;
use pretty_assertions::assert_eq;

use super::support::{predictor_with, workspace, write, CountingLoader, CountingRepository};

#[tokio::test]
async fn predicts_compiled_location_for_a_source_breakpoint() {
    let dir = workspace();
    let predictor = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        Arc::new(CountingLoader::default()),
        None,
    );
    let source = dir.path().join("src/index.ts");

    predictor
        .predict_breakpoints(&SetBreakpointsRequest::new(
            &source,
            vec![SourceBreakpoint { line: 5, column: Some(1) }],
        ))
        .await;

    assert_eq!(
        predictor.predicted_resolved_locations(&WorkspaceLocation::new(&source, 5, 1)),
        vec![WorkspaceLocation::new(dir.path().join("out/index.js"), 5, 1)]
    );
    // Lookups are exact.
    assert!(predictor
        .predicted_resolved_locations(&WorkspaceLocation::new(&source, 5, 2))
        .is_empty());
}

#[tokio::test]
async fn snaps_forward_to_the_next_mapped_position() {
    let dir = workspace();
    let predictor = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        Arc::new(CountingLoader::default()),
        None,
    );
    let source = dir.path().join("src/index.ts");

    // Column 3 (0-based 2) has no mapping of its own; the next one is 0-based
    // column 8, emitted at generated column 10.
    predictor
        .predict_breakpoints(&SetBreakpointsRequest::new(
            &source,
            vec![SourceBreakpoint { line: 5, column: Some(3) }],
        ))
        .await;

    assert_eq!(
        predictor.predicted_resolved_locations(&WorkspaceLocation::new(&source, 5, 3)),
        vec![WorkspaceLocation::new(dir.path().join("out/index.js"), 5, 11)]
    );
}

#[tokio::test]
async fn unknown_sources_predict_nothing() {
    let dir = workspace();
    let predictor = predictor_with(
        dir.path(),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        Arc::new(CountingLoader::default()),
        None,
    );
    let source = dir.path().join("src/missing.ts");

    predictor
        .predict_breakpoints(&SetBreakpointsRequest::new(
            &source,
            vec![SourceBreakpoint { line: 1, column: None }],
        ))
        .await;

    assert!(predictor
        .predicted_resolved_locations(&WorkspaceLocation::new(&source, 1, 1))
        .is_empty());
}

#[tokio::test]
async fn from_config_wires_the_file_system_collaborators() {
    let dir = workspace();
    let mut config = LaunchConfig::new(dir.path());
    config.out_files = vec!["${workspaceFolder}/out/**/*.js".to_string()];
    let predictor = BreakpointsPredictor::from_config(&config).unwrap();
    let source = dir.path().join("src/index.ts");

    predictor
        .predict_breakpoints(&SetBreakpointsRequest::new(
            &source,
            vec![SourceBreakpoint { line: 5, column: None }],
        ))
        .await;

    assert_eq!(
        predictor.predicted_resolved_locations(&WorkspaceLocation::new(&source, 5, 1)),
        vec![WorkspaceLocation::new(dir.path().join("out/index.js"), 5, 1)]
    );
}

#[tokio::test]
async fn webpack_sources_with_dot_segments_predict_through_overrides() {
    let dir = workspace();
    write(
        &dir.path().join("out/index.js.map"),
        r#"{"version":3,"file":"index.js","sources":["webpack:///./src/index.ts"],"names":[],"mappings":";;;;AAIA,UAAQ"}"#,
    );
    let resolver = OverridePathResolver::new(
        [("webpack:///*".to_string(), "${workspaceFolder}/*".to_string())],
        dir.path(),
    );
    let predictor = BreakpointsPredictor::new(
        PredictorOptions::new(dir.path(), vec!["out/**/*.js".to_string()]),
        Arc::new(CountingRepository::new(Duration::ZERO)),
        Arc::new(CountingLoader::default()),
        Some(Arc::new(resolver)),
        None,
    );
    let source = dir.path().join("src/index.ts");

    assert_eq!(
        predictor.compiled_paths_for(&source).await,
        vec![dir.path().join("out/index.js")]
    );
    predictor
        .predict_breakpoints(&SetBreakpointsRequest::new(
            &source,
            vec![SourceBreakpoint { line: 5, column: Some(1) }],
        ))
        .await;
    assert_eq!(
        predictor.predicted_resolved_locations(&WorkspaceLocation::new(&source, 5, 1)),
        vec![WorkspaceLocation::new(dir.path().join("out/index.js"), 5, 1)]
    );
}
