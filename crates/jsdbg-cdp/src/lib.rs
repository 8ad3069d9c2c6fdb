//! Remote debugging connection façade for jsdbg.
//!
//! `jsdbg-breakpoints` consumes this crate to talk to a JavaScript engine over
//! its remote debugging protocol. Only the handful of `Debugger.*` commands and
//! notifications the breakpoint core needs are modelled here; session plumbing
//! (transport, request ids, target discovery) lives with the embedder, which
//! implements [`DebuggerApi`] on top of its own connection.

#[cfg(any(test, feature = "test-support"))]
pub mod mock;
mod types;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

pub use types::{
    BreakpointId, CallFrame, CdpEvent, InstrumentationKind, Location, PauseReasonEntry,
    PausedEvent, ScriptId, ScriptParsedEvent, SetBreakpointByUrl, PAUSE_REASON_AMBIGUOUS,
    PAUSE_REASON_EVENT_LISTENER, PAUSE_REASON_INSTRUMENTATION, SCRIPT_FIRST_STATEMENT_EVENT,
};

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("command failed with error code {code}: {message}")]
    CommandFailed { code: i64, message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CdpError>;

/// The engine-side commands the breakpoint core issues, plus its notification stream.
///
/// Implementations must deliver notifications for one target in the order the
/// engine emitted them.
#[async_trait]
pub trait DebuggerApi: Send + Sync {
    /// Install a native hook that pauses before every newly parsed script runs.
    async fn set_instrumentation_breakpoint(&self, kind: InstrumentationKind) -> Result<()>;

    /// `Debugger.setBreakpointByUrl`. `Ok(None)` means the engine accepted the
    /// request but did not hand back an id (for example because an identical
    /// breakpoint already exists).
    async fn set_breakpoint_by_url(&self, params: SetBreakpointByUrl) -> Result<Option<BreakpointId>>;

    async fn remove_breakpoint(&self, id: &BreakpointId) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    fn subscribe_events(&self) -> broadcast::Receiver<CdpEvent>;
}
