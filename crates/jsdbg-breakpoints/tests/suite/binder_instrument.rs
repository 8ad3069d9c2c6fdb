use std::sync::Arc;
use std::time::Duration;

use jsdbg_breakpoints::{BinderState, BreakOnLoadStrategy, PauseDisposition, PauseKind, TargetBinder};
use jsdbg_cdp::mock::MockDebugger;
use jsdbg_cdp::{CdpEvent, DebuggerApi, InstrumentationKind, ScriptId};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::support::{paused, paused_in, script_parsed, RecordingBreakpoints};

fn first_statement_pause(script_id: &str) -> CdpEvent {
    CdpEvent::Paused(paused(
        "EventListener",
        Some(json!({"eventName": "instrumentation:scriptFirstStatement"})),
        &[],
        script_id,
    ))
}

#[tokio::test]
async fn hook_is_installed_once() {
    let mock = Arc::new(MockDebugger::new());
    let binder = TargetBinder::new(
        BreakOnLoadStrategy::Instrument,
        mock.clone(),
        Arc::new(RecordingBreakpoints::default()),
    );
    assert_eq!(binder.state(), BinderState::Idle);

    binder.on_breakpoints_requested("/work/src/a.ts").await;
    binder.on_breakpoints_requested("/work/src/b.ts").await;

    assert_eq!(
        mock.instrumentation_breakpoints(),
        vec![InstrumentationKind::ScriptFirstStatement]
    );
    assert_eq!(binder.state(), BinderState::AwaitingScriptLoad);
}

#[tokio::test]
async fn first_statement_pauses_resolve_and_resume() {
    let mock = Arc::new(MockDebugger::new());
    let breakpoints = Arc::new(RecordingBreakpoints::default());
    let binder = TargetBinder::new(BreakOnLoadStrategy::Instrument, mock.clone(), breakpoints.clone());
    binder.on_breakpoints_requested("/work/src/index.ts").await;

    binder
        .handle_event(script_parsed("1", "file:///work/out/index.js"))
        .await;
    assert_eq!(breakpoints.resolved(), vec![ScriptId::new("1")]);

    let disposition = binder.handle_event(first_statement_pause("1")).await;
    assert_eq!(disposition, Some(PauseDisposition::AutoResume));
    // Already resolved at scriptParsed; not repeated at the pause.
    assert_eq!(breakpoints.resolved(), vec![ScriptId::new("1")]);
    assert_eq!(mock.resume_count(), 1);
    assert_eq!(binder.state(), BinderState::AwaitingScriptLoad);
}

#[tokio::test]
async fn ambiguous_instrumentation_pause_resumes() {
    let mock = Arc::new(MockDebugger::new());
    let binder = TargetBinder::new(
        BreakOnLoadStrategy::Instrument,
        mock.clone(),
        Arc::new(RecordingBreakpoints::default()),
    );
    binder.on_breakpoints_requested("/work/src/index.ts").await;
    binder
        .handle_event(script_parsed("9", "file:///work/out/index.js"))
        .await;

    let event = paused(
        "ambiguous",
        Some(json!({"reasons": [
            {"reason": "instrumentation"},
            {"reason": "EventListener", "auxData": {"eventName": "instrumentation:scriptFirstStatement"}}
        ]})),
        &[],
        "9",
    );
    let disposition = binder.handle_event(CdpEvent::Paused(event)).await;
    assert_eq!(disposition, Some(PauseDisposition::AutoResume));
    assert_eq!(mock.resume_count(), 1);
}

#[tokio::test]
async fn guard_pause_in_unreported_script_binds_from_the_call_frame() {
    let mock = Arc::new(MockDebugger::new());
    let breakpoints = Arc::new(RecordingBreakpoints::default());
    let binder = TargetBinder::new(BreakOnLoadStrategy::Instrument, mock.clone(), breakpoints.clone());
    binder.on_breakpoints_requested("/work/src/index.ts").await;

    // The scriptParsed for "4" was dropped.
    let event = paused_in(
        "instrumentation",
        None,
        &[],
        "4",
        "file:///work/out/index.js",
    );
    let disposition = binder.handle_event(CdpEvent::Paused(event)).await;

    assert_eq!(disposition, Some(PauseDisposition::AutoResume));
    assert_eq!(breakpoints.resolved(), vec![ScriptId::new("4")]);
    assert_eq!(
        binder.script(&ScriptId::new("4")).map(|script| script.url),
        Some("file:///work/out/index.js".to_string())
    );
    assert_eq!(mock.resume_count(), 1);
}

#[tokio::test]
async fn guard_pause_in_unidentifiable_script_surfaces() {
    let mock = Arc::new(MockDebugger::new());
    let breakpoints = Arc::new(RecordingBreakpoints::default());
    let binder = TargetBinder::new(BreakOnLoadStrategy::Instrument, mock.clone(), breakpoints.clone());
    binder.on_breakpoints_requested("/work/src/index.ts").await;

    let event = paused("instrumentation", None, &[], "5");
    let disposition = binder.handle_event(CdpEvent::Paused(event.clone())).await;

    assert_eq!(disposition, Some(PauseDisposition::Surface(event)));
    assert!(breakpoints.resolved().is_empty());
    assert_eq!(mock.resume_count(), 0);
    assert_eq!(binder.state(), BinderState::Paused(PauseKind::UserBreakpoint));
}

#[tokio::test]
async fn other_pauses_reach_the_client() {
    let mock = Arc::new(MockDebugger::new());
    let binder = TargetBinder::new(
        BreakOnLoadStrategy::Instrument,
        mock.clone(),
        Arc::new(RecordingBreakpoints::default()),
    );
    binder.on_breakpoints_requested("/work/src/index.ts").await;

    let event = paused("other", None, &[], "1");
    let disposition = binder.handle_event(CdpEvent::Paused(event.clone())).await;
    assert_eq!(disposition, Some(PauseDisposition::Surface(event)));
    assert_eq!(mock.resume_count(), 0);
    assert_eq!(binder.state(), BinderState::Paused(PauseKind::UserBreakpoint));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_loop_resumes_guards_and_publishes_user_pauses() {
    let mock = Arc::new(MockDebugger::new());
    let breakpoints = Arc::new(RecordingBreakpoints::default());
    let binder = Arc::new(TargetBinder::new(
        BreakOnLoadStrategy::Instrument,
        mock.clone(),
        breakpoints.clone(),
    ));
    binder.on_breakpoints_requested("/work/src/index.ts").await;

    let events = mock.subscribe_events();
    let mut surfaced = binder.surfaced_pauses();
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let binder = binder.clone();
        let cancel = cancel.clone();
        async move { binder.run(events, cancel).await }
    });

    mock.push_event(script_parsed("1", "file:///work/out/index.js"));
    mock.push_event(first_statement_pause("1"));
    let user_pause = paused("other", None, &[], "1");
    mock.push_event(CdpEvent::Paused(user_pause.clone()));

    let published = tokio::time::timeout(Duration::from_secs(5), surfaced.recv())
        .await
        .expect("surfaced pause")
        .unwrap();
    assert_eq!(published, user_pause);
    assert_eq!(mock.resume_count(), 1);
    assert_eq!(breakpoints.resolved(), vec![ScriptId::new("1")]);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("binder stops on cancel")
        .unwrap();
}
