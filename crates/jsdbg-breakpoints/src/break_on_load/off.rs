use async_trait::async_trait;
use jsdbg_cdp::PausedEvent;
use jsdbg_config::BreakOnLoadStrategy;

use super::{BreakOnLoadHelper, PauseDisposition, PauseKind, PausedScript};

/// Installs nothing, so every pause was caused by the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct OffHelper;

#[async_trait]
impl BreakOnLoadHelper for OffHelper {
    fn strategy(&self) -> BreakOnLoadStrategy {
        BreakOnLoadStrategy::Off
    }

    fn guard_kind(&self) -> Option<PauseKind> {
        None
    }

    async fn run_setup(&self) {}

    async fn on_breakpoints_requested(&self, _source_url: &str) {}

    async fn is_armed(&self) -> bool {
        false
    }

    async fn is_guard_pause(&self, _paused: &PausedEvent) -> bool {
        false
    }

    async fn classify_pause(&self, paused: &PausedEvent, _script: &PausedScript) -> PauseDisposition {
        PauseDisposition::Surface(paused.clone())
    }
}
