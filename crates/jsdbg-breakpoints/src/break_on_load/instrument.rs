use std::sync::Arc;

use async_trait::async_trait;
use jsdbg_cdp::{
    DebuggerApi, InstrumentationKind, PausedEvent, PAUSE_REASON_AMBIGUOUS,
    PAUSE_REASON_EVENT_LISTENER, PAUSE_REASON_INSTRUMENTATION, SCRIPT_FIRST_STATEMENT_EVENT,
};
use jsdbg_config::BreakOnLoadStrategy;
use tokio::sync::Mutex;

use super::{BreakOnLoadHelper, PauseDisposition, PauseKind, PausedScript};

/// Whether the engine stopped because of the "before first statement" hook.
///
/// Accepts the `instrumentation` reason, an `EventListener` pause for
/// `instrumentation:scriptFirstStatement`, and an `ambiguous` pause whose
/// every (non-empty) sub-reason is one of those.
pub fn is_instrumentation_pause(paused: &PausedEvent) -> bool {
    match paused.reason.as_str() {
        PAUSE_REASON_INSTRUMENTATION => true,
        PAUSE_REASON_EVENT_LISTENER => paused.event_name() == Some(SCRIPT_FIRST_STATEMENT_EVENT),
        PAUSE_REASON_AMBIGUOUS => paused.ambiguous_reasons().is_some_and(|reasons| {
            !reasons.is_empty()
                && reasons.iter().all(|entry| match entry.reason.as_str() {
                    PAUSE_REASON_INSTRUMENTATION => true,
                    PAUSE_REASON_EVENT_LISTENER => entry
                        .aux_data
                        .as_ref()
                        .and_then(|aux| aux.get("eventName"))
                        .and_then(|name| name.as_str())
                        == Some(SCRIPT_FIRST_STATEMENT_EVENT),
                    _ => false,
                })
        }),
        _ => false,
    }
}

/// Uses the engine's native hook to stop before every script's first statement.
pub struct InstrumentHelper {
    cdp: Arc<dyn DebuggerApi>,
    kind: InstrumentationKind,
    installed: Mutex<bool>,
}

impl InstrumentHelper {
    pub fn new(cdp: Arc<dyn DebuggerApi>) -> Self {
        Self::with_kind(cdp, InstrumentationKind::ScriptFirstStatement)
    }

    pub fn with_kind(cdp: Arc<dyn DebuggerApi>, kind: InstrumentationKind) -> Self {
        Self {
            cdp,
            kind,
            installed: Mutex::new(false),
        }
    }

    async fn ensure_installed(&self) {
        let mut installed = self.installed.lock().await;
        if *installed {
            return;
        }
        match self.cdp.set_instrumentation_breakpoint(self.kind).await {
            Ok(()) => {
                tracing::debug!(
                    target = "jsdbg.break_on_load",
                    kind = self.kind.as_str(),
                    "instrumentation breakpoint installed"
                );
                *installed = true;
            }
            Err(err) => {
                tracing::warn!(
                    target = "jsdbg.break_on_load",
                    kind = self.kind.as_str(),
                    error = %err,
                    "failed to set instrumentation breakpoint"
                );
            }
        }
    }
}

#[async_trait]
impl BreakOnLoadHelper for InstrumentHelper {
    fn strategy(&self) -> BreakOnLoadStrategy {
        BreakOnLoadStrategy::Instrument
    }

    fn guard_kind(&self) -> Option<PauseKind> {
        Some(PauseKind::Instrumentation)
    }

    async fn run_setup(&self) {
        self.ensure_installed().await;
    }

    async fn on_breakpoints_requested(&self, _source_url: &str) {
        self.ensure_installed().await;
    }

    async fn is_armed(&self) -> bool {
        *self.installed.lock().await
    }

    async fn is_guard_pause(&self, paused: &PausedEvent) -> bool {
        is_instrumentation_pause(paused)
    }

    async fn classify_pause(&self, paused: &PausedEvent, _script: &PausedScript) -> PauseDisposition {
        if is_instrumentation_pause(paused) {
            tracing::trace!(target = "jsdbg.break_on_load", reason = %paused.reason, "instrumentation pause");
            PauseDisposition::AutoResume
        } else {
            PauseDisposition::Surface(paused.clone())
        }
    }
}
