use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsdbg_cdp::{CdpEvent, DebuggerApi, Location, PausedEvent, ScriptId, ScriptParsedEvent};
use jsdbg_config::BreakOnLoadStrategy;
use jsdbg_sourcemap::url::canonicalize_url;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::break_on_load::{
    helper_for, BreakOnLoadHelper, PauseDisposition, PauseKind, PausedScript,
};

/// A script the engine reported through `scriptParsed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedScript {
    pub script_id: ScriptId,
    pub url: String,
    pub source_map_url: Option<String>,
}

impl From<ScriptParsedEvent> for LoadedScript {
    fn from(event: ScriptParsedEvent) -> Self {
        Self {
            script_id: event.script_id,
            url: event.url,
            source_map_url: event.source_map_url,
        }
    }
}

/// The breakpoint manager the binder works for.
#[async_trait]
pub trait ScriptBreakpoints: Send + Sync {
    /// Absolute paths (or URLs) of the source files `script` was compiled from,
    /// as used in breakpoint requests.
    async fn source_paths(&self, script: &LoadedScript) -> Vec<String>;

    /// Bind every pending breakpoint that falls in `script`, returning where
    /// the script's breakpoints are now bound.
    async fn resolve_pending(&self, script: &LoadedScript) -> Vec<Location>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinderState {
    Idle,
    /// A guard is armed; the next script load will pause.
    AwaitingScriptLoad,
    Paused(PauseKind),
}

/// Load-time breakpoint binding for one attached target.
///
/// Engine notifications must be fed in the order they arrive, either through
/// [`Self::handle_event`] or by [`Self::run`].
pub struct TargetBinder {
    cdp: Arc<dyn DebuggerApi>,
    helper: Box<dyn BreakOnLoadHelper>,
    breakpoints: Arc<dyn ScriptBreakpoints>,
    setup: OnceCell<()>,
    scripts: Mutex<HashMap<ScriptId, LoadedScript>>,
    /// Bound locations per script whose pending breakpoints were resolved.
    resolved: Mutex<HashMap<ScriptId, Vec<Location>>>,
    state: Mutex<BinderState>,
    surfaced: broadcast::Sender<PausedEvent>,
}

impl TargetBinder {
    pub fn new(
        strategy: BreakOnLoadStrategy,
        cdp: Arc<dyn DebuggerApi>,
        breakpoints: Arc<dyn ScriptBreakpoints>,
    ) -> Self {
        let helper = helper_for(strategy, cdp.clone());
        Self::with_helper(helper, cdp, breakpoints)
    }

    pub fn with_helper(
        helper: Box<dyn BreakOnLoadHelper>,
        cdp: Arc<dyn DebuggerApi>,
        breakpoints: Arc<dyn ScriptBreakpoints>,
    ) -> Self {
        let (surfaced, _) = broadcast::channel(32);
        Self {
            cdp,
            helper,
            breakpoints,
            setup: OnceCell::new(),
            scripts: Mutex::new(HashMap::new()),
            resolved: Mutex::new(HashMap::new()),
            state: Mutex::new(BinderState::Idle),
            surfaced,
        }
    }

    pub fn strategy(&self) -> BreakOnLoadStrategy {
        self.helper.strategy()
    }

    pub fn state(&self) -> BinderState {
        *self.state.lock()
    }

    pub fn script(&self, id: &ScriptId) -> Option<LoadedScript> {
        self.scripts.lock().get(id).cloned()
    }

    /// Pauses [`Self::run`] decided the client must see.
    pub fn surfaced_pauses(&self) -> broadcast::Receiver<PausedEvent> {
        self.surfaced.subscribe()
    }

    async fn ensure_setup(&self) {
        self.setup
            .get_or_init(|| async {
                tracing::debug!(
                    target = "jsdbg.binder",
                    strategy = %self.helper.strategy(),
                    "running break-on-load setup"
                );
                self.helper.run_setup().await;
            })
            .await;
    }

    async fn armed_state(&self) -> BinderState {
        if self.helper.is_armed().await {
            BinderState::AwaitingScriptLoad
        } else {
            BinderState::Idle
        }
    }

    /// The client asked for breakpoints in `source_url`; arm the guard for it.
    pub async fn on_breakpoints_requested(&self, source_url: &str) {
        self.ensure_setup().await;
        self.helper.on_breakpoints_requested(source_url).await;
        let armed = self.armed_state().await;
        let mut state = self.state.lock();
        if *state == BinderState::Idle {
            *state = armed;
        }
    }

    /// Process one engine notification. Returns the decision for pauses.
    pub async fn handle_event(&self, event: CdpEvent) -> Option<PauseDisposition> {
        match event {
            CdpEvent::ScriptParsed(parsed) => {
                self.on_script_parsed(parsed.into()).await;
                None
            }
            CdpEvent::Paused(paused) => Some(self.on_paused(paused).await),
            CdpEvent::Resumed => {
                let next = self.armed_state().await;
                *self.state.lock() = next;
                None
            }
        }
    }

    async fn on_script_parsed(&self, script: LoadedScript) {
        self.scripts
            .lock()
            .insert(script.script_id.clone(), script.clone());

        let candidates = self.candidate_urls(&script).await;
        if self
            .helper
            .should_skip_eager_resolve(&script.url, &candidates)
            .await
        {
            tracing::trace!(
                target = "jsdbg.binder",
                script = %script.script_id,
                url = %script.url,
                "deferring breakpoint resolution to the entry pause"
            );
            return;
        }
        self.resolve_script(&script).await;
    }

    /// Canonical script URL followed by the canonical source paths it covers.
    async fn candidate_urls(&self, script: &LoadedScript) -> Vec<String> {
        let mut urls = vec![canonicalize_url(&script.url)];
        for path in self.breakpoints.source_paths(script).await {
            let path = canonicalize_url(&path);
            if !urls.contains(&path) {
                urls.push(path);
            }
        }
        urls
    }

    /// Resolve pending breakpoints for `script` at most once.
    async fn resolve_script(&self, script: &LoadedScript) -> Vec<Location> {
        let cached = self.resolved.lock().get(&script.script_id).cloned();
        if let Some(bound) = cached {
            return bound;
        }
        let bound = self.breakpoints.resolve_pending(script).await;
        self.resolved
            .lock()
            .insert(script.script_id.clone(), bound.clone());
        bound
    }

    /// Rebuild a script whose `scriptParsed` never reached the binder from the
    /// top call frame. `None` when the frame carries no URL.
    fn script_from_top_frame(&self, paused: &PausedEvent) -> Option<LoadedScript> {
        let frame = paused.call_frames.first()?;
        if frame.url.is_empty() {
            return None;
        }
        let script = LoadedScript {
            script_id: frame.location.script_id.clone(),
            url: frame.url.clone(),
            source_map_url: None,
        };
        tracing::debug!(
            target = "jsdbg.binder",
            script = %script.script_id,
            url = %script.url,
            "guard pause in a script never reported as parsed"
        );
        self.scripts
            .lock()
            .insert(script.script_id.clone(), script.clone());
        Some(script)
    }

    async fn on_paused(&self, paused: PausedEvent) -> PauseDisposition {
        let mut script = paused
            .top_location()
            .and_then(|location| self.script(&location.script_id));

        let guard_pause = self.helper.is_guard_pause(&paused).await;
        let kind = match (guard_pause, self.helper.guard_kind()) {
            (true, Some(kind)) => kind,
            _ => PauseKind::UserBreakpoint,
        };
        *self.state.lock() = BinderState::Paused(kind);

        let mut context = PausedScript::default();
        if guard_pause {
            if script.is_none() {
                script = self.script_from_top_frame(&paused);
            }
            let Some(script) = &script else {
                // Nothing to bind against; resuming would skip its breakpoints.
                tracing::warn!(
                    target = "jsdbg.binder",
                    reason = %paused.reason,
                    "guard pause in an unknown script, surfacing it"
                );
                *self.state.lock() = BinderState::Paused(PauseKind::UserBreakpoint);
                return PauseDisposition::Surface(paused);
            };
            context.bound_locations = self.resolve_script(script).await;
            context.matched_urls = self.candidate_urls(script).await;
        }

        let disposition = self.helper.classify_pause(&paused, &context).await;
        match &disposition {
            PauseDisposition::AutoResume => {
                tracing::trace!(
                    target = "jsdbg.binder",
                    reason = %paused.reason,
                    script = script.as_ref().map(|s| s.url.as_str()).unwrap_or_default(),
                    "auto-resuming guard pause"
                );
                if let Err(err) = self.cdp.resume().await {
                    tracing::warn!(target = "jsdbg.binder", error = %err, "failed to resume after guard pause");
                }
                let next = self.armed_state().await;
                *self.state.lock() = next;
            }
            PauseDisposition::Surface(_) => {
                *self.state.lock() = BinderState::Paused(PauseKind::UserBreakpoint);
            }
        }
        disposition
    }

    /// Drain `events` until `cancel` fires or the connection goes away.
    /// Surfaced pauses are published on [`Self::surfaced_pauses`].
    pub async fn run(&self, mut events: broadcast::Receiver<CdpEvent>, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => received,
            };
            match received {
                Ok(event) => {
                    if let Some(PauseDisposition::Surface(paused)) = self.handle_event(event).await {
                        let _ = self.surfaced.send(paused);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(target = "jsdbg.binder", skipped, "binder fell behind engine events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!(target = "jsdbg.binder", strategy = %self.helper.strategy(), "binder detached");
    }
}
