use std::sync::Arc;

use async_trait::async_trait;
use jsdbg_cdp::{DebuggerApi, Location, PausedEvent};
use jsdbg_config::BreakOnLoadStrategy;

use super::registry::EntryBreakpointRegistry;
use super::{BreakOnLoadHelper, PauseDisposition, PauseKind, PausedScript};

/// Whether a pause caused only by entry breakpoints can be resumed.
///
/// It can unless one of the script's bound user breakpoints sits exactly at
/// the paused location; then the user expects to stop there.
pub fn should_continue_on_entry_pause(paused_location: Option<&Location>, bound: &[Location]) -> bool {
    match paused_location {
        Some(location) => !bound.iter().any(|b| b.same_position(location)),
        None => false,
    }
}

/// Emulates the instrumentation hook with a line 0, column 0 breakpoint per
/// requested file name pattern.
pub struct RegexHelper {
    registry: EntryBreakpointRegistry,
}

impl RegexHelper {
    pub fn new(cdp: Arc<dyn DebuggerApi>) -> Self {
        Self {
            registry: EntryBreakpointRegistry::new(cdp),
        }
    }

    pub fn registry(&self) -> &EntryBreakpointRegistry {
        &self.registry
    }
}

#[async_trait]
impl BreakOnLoadHelper for RegexHelper {
    fn strategy(&self) -> BreakOnLoadStrategy {
        BreakOnLoadStrategy::Regex
    }

    fn guard_kind(&self) -> Option<PauseKind> {
        Some(PauseKind::EntryBreakpoint)
    }

    async fn run_setup(&self) {}

    async fn on_breakpoints_requested(&self, source_url: &str) {
        self.registry.add(source_url).await;
    }

    async fn is_armed(&self) -> bool {
        !self.registry.is_empty().await
    }

    async fn should_skip_eager_resolve(&self, script_url: &str, candidates: &[String]) -> bool {
        let mut any_pending = false;
        for candidate in candidates {
            if self.registry.has_pending(candidate).await {
                any_pending = true;
                break;
            }
        }
        // A pending source compiled into a differently named bundle gets no entry pause.
        any_pending && self.registry.will_pause_for(script_url).await
    }

    async fn is_guard_pause(&self, paused: &PausedEvent) -> bool {
        for id in &paused.hit_breakpoints {
            if self.registry.contains_breakpoint(id).await {
                return true;
            }
        }
        false
    }

    async fn classify_pause(&self, paused: &PausedEvent, script: &PausedScript) -> PauseDisposition {
        let mut entry_hits = Vec::new();
        let mut user_hits = Vec::new();
        for id in &paused.hit_breakpoints {
            if self.registry.contains_breakpoint(id).await {
                entry_hits.push(id.clone());
            } else {
                user_hits.push(id.clone());
            }
        }

        for id in &entry_hits {
            for url in &script.matched_urls {
                self.registry.resolve_hit(id, url).await;
            }
        }

        if entry_hits.is_empty() {
            return PauseDisposition::Surface(paused.clone());
        }

        if user_hits.is_empty()
            && should_continue_on_entry_pause(paused.top_location(), &script.bound_locations)
        {
            tracing::trace!(target = "jsdbg.break_on_load", hits = entry_hits.len(), "entry breakpoint pause");
            return PauseDisposition::AutoResume;
        }

        tracing::trace!(
            target = "jsdbg.break_on_load",
            entry_hits = entry_hits.len(),
            user_hits = user_hits.len(),
            "entry breakpoint coincides with a user breakpoint"
        );
        let mut surfaced = paused.clone();
        surfaced.hit_breakpoints = user_hits;
        PauseDisposition::Surface(surfaced)
    }
}
