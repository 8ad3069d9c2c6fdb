use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    BreakpointId, CdpError, CdpEvent, DebuggerApi, InstrumentationKind, Result, SetBreakpointByUrl,
};

/// How the mock answers `setBreakpointByUrl`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SetBreakpointMode {
    #[default]
    Succeed,
    /// Reply without a breakpoint id.
    NoId,
    /// Reply with a protocol error.
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    SetInstrumentationBreakpoint(InstrumentationKind),
    SetBreakpointByUrl(SetBreakpointByUrl),
    RemoveBreakpoint(BreakpointId),
    Resume,
}

#[derive(Default)]
struct MockState {
    next_breakpoint: u64,
    calls: Vec<MockCall>,
    installed: BTreeMap<BreakpointId, SetBreakpointByUrl>,
    set_breakpoint_mode: SetBreakpointMode,
}

/// Deterministic, in-memory debugger connection.
pub struct MockDebugger {
    state: Mutex<MockState>,
    events: broadcast::Sender<CdpEvent>,
}

impl Default for MockDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDebugger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(MockState::default()),
            events,
        }
    }

    pub fn set_breakpoint_mode(&self, mode: SetBreakpointMode) {
        self.state.lock().set_breakpoint_mode = mode;
    }

    /// Deliver `event` to every current subscriber. Returns the number of receivers.
    pub fn push_event(&self, event: CdpEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Breakpoints currently present engine-side.
    pub fn installed_breakpoints(&self) -> BTreeMap<BreakpointId, SetBreakpointByUrl> {
        self.state.lock().installed.clone()
    }

    pub fn instrumentation_breakpoints(&self) -> Vec<InstrumentationKind> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::SetInstrumentationBreakpoint(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn removed_breakpoints(&self) -> Vec<BreakpointId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::RemoveBreakpoint(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn resume_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::Resume))
            .count()
    }
}

#[async_trait]
impl DebuggerApi for MockDebugger {
    async fn set_instrumentation_breakpoint(&self, kind: InstrumentationKind) -> Result<()> {
        self.state
            .lock()
            .calls
            .push(MockCall::SetInstrumentationBreakpoint(kind));
        Ok(())
    }

    async fn set_breakpoint_by_url(&self, params: SetBreakpointByUrl) -> Result<Option<BreakpointId>> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::SetBreakpointByUrl(params.clone()));
        match state.set_breakpoint_mode {
            SetBreakpointMode::Fail => Err(CdpError::CommandFailed {
                code: -32000,
                message: "mock setBreakpointByUrl failure".to_string(),
            }),
            SetBreakpointMode::NoId => Ok(None),
            SetBreakpointMode::Succeed => {
                state.next_breakpoint += 1;
                let id = BreakpointId::new(format!(
                    "{}:{}:{}:{}",
                    state.next_breakpoint, params.line_number, params.column_number, params.url_regex
                ));
                state.installed.insert(id.clone(), params);
                Ok(Some(id))
            }
        }
    }

    async fn remove_breakpoint(&self, id: &BreakpointId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::RemoveBreakpoint(id.clone()));
        match state.installed.remove(id) {
            Some(_) => Ok(()),
            None => Err(CdpError::CommandFailed {
                code: -32000,
                message: format!("no breakpoint with id {id}"),
            }),
        }
    }

    async fn resume(&self) -> Result<()> {
        self.state.lock().calls.push(MockCall::Resume);
        let _ = self.events.send(CdpEvent::Resumed);
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }
}
