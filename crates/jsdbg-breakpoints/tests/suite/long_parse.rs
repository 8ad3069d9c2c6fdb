use std::sync::Arc;
use std::time::Duration;

use jsdbg_breakpoints::{BreakpointsPredictor, PredictorOptions};
use tokio::sync::broadcast::error::TryRecvError;

use super::support::{workspace, CountingLoader, CountingRepository};

fn predictor(root: &std::path::Path, scan_delay: Duration, threshold: Duration) -> BreakpointsPredictor {
    let mut options = PredictorOptions::new(root, vec!["out/**/*.js".to_string()]);
    options.long_parse_threshold = threshold;
    BreakpointsPredictor::new(
        options,
        Arc::new(CountingRepository::new(scan_delay)),
        Arc::new(CountingLoader::default()),
        None,
        None,
    )
}

#[tokio::test]
async fn slow_scans_report_a_long_parse() {
    let dir = workspace();
    let predictor = predictor(dir.path(), Duration::from_millis(300), Duration::from_millis(20));
    let mut long_parse = predictor.on_long_parse();

    predictor.prepare_to_predict().await;

    let event = tokio::time::timeout(Duration::from_secs(5), long_parse.recv())
        .await
        .expect("long parse event")
        .unwrap();
    assert_eq!(event.repository, "CountingRepository");
    assert_eq!(event.patterns, vec!["out/**/*.js".to_string()]);
    assert_eq!(event.threshold, Duration::from_millis(20));
}

#[tokio::test]
async fn fast_scans_stay_quiet() {
    let dir = workspace();
    let predictor = predictor(dir.path(), Duration::ZERO, Duration::from_millis(100));
    let mut long_parse = predictor.on_long_parse();

    predictor.prepare_to_predict().await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(matches!(long_parse.try_recv(), Err(TryRecvError::Empty)));
}
