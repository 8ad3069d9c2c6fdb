use std::sync::Arc;

use jsdbg_breakpoints::{BinderState, BreakOnLoadStrategy, PauseDisposition, TargetBinder};
use jsdbg_cdp::mock::MockDebugger;
use jsdbg_cdp::{BreakpointId, CdpEvent, ScriptId};

use super::support::{paused, script_parsed, RecordingBreakpoints};

#[tokio::test]
async fn off_installs_nothing_and_surfaces_every_pause() {
    let mock = Arc::new(MockDebugger::new());
    let breakpoints = Arc::new(RecordingBreakpoints::default());
    let binder = TargetBinder::new(BreakOnLoadStrategy::Off, mock.clone(), breakpoints.clone());

    binder.on_breakpoints_requested("/work/src/index.ts").await;
    assert!(mock.calls().is_empty());
    assert_eq!(binder.state(), BinderState::Idle);

    binder
        .handle_event(script_parsed("1", "file:///work/out/index.js"))
        .await;
    assert_eq!(breakpoints.resolved(), vec![ScriptId::new("1")]);

    let event = paused("other", None, &[BreakpointId::new("user-1")], "1");
    let disposition = binder.handle_event(CdpEvent::Paused(event.clone())).await;
    assert_eq!(disposition, Some(PauseDisposition::Surface(event)));
    assert_eq!(mock.resume_count(), 0);
    assert_eq!(binder.state(), BinderState::Paused(jsdbg_breakpoints::PauseKind::UserBreakpoint));

    binder.handle_event(CdpEvent::Resumed).await;
    assert_eq!(binder.state(), BinderState::Idle);
}
