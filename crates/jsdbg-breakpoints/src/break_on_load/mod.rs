//! Strategies that stop a freshly loaded script before its first statement so
//! pending breakpoints can be bound in time.

mod instrument;
mod off;
mod pattern;
mod regex;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use jsdbg_cdp::{DebuggerApi, Location, PausedEvent};
use jsdbg_config::BreakOnLoadStrategy;

pub use self::instrument::{is_instrumentation_pause, InstrumentHelper};
pub use self::off::OffHelper;
pub use self::pattern::entry_breakpoint_pattern;
pub use self::regex::{should_continue_on_entry_pause, RegexHelper};
pub use self::registry::{EntryBreakpointRecord, EntryBreakpointRegistry};

/// Why the target is stopped, as far as load-time binding is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseKind {
    Instrumentation,
    EntryBreakpoint,
    UserBreakpoint,
}

/// What to do with a pause.
#[derive(Clone, Debug, PartialEq)]
pub enum PauseDisposition {
    /// A guard pause with nothing left for the user; resume the target.
    AutoResume,
    /// Report to the client, possibly with synthetic breakpoint ids removed.
    Surface(PausedEvent),
}

impl PauseDisposition {
    pub fn should_auto_resume(&self) -> bool {
        matches!(self, PauseDisposition::AutoResume)
    }
}

/// What the binder learned about the paused script before classification.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PausedScript {
    /// Canonical script URL and the canonical source paths it covers.
    pub matched_urls: Vec<String>,
    /// Where the script's user breakpoints are bound.
    pub bound_locations: Vec<Location>,
}

#[async_trait]
pub trait BreakOnLoadHelper: Send + Sync {
    fn strategy(&self) -> BreakOnLoadStrategy;

    /// Which guard produced pauses this helper auto-resumes.
    fn guard_kind(&self) -> Option<PauseKind>;

    /// One-time per-target setup.
    async fn run_setup(&self);

    /// Breakpoints were requested in `source_url`, whose script may not have loaded yet.
    async fn on_breakpoints_requested(&self, source_url: &str);

    /// Whether any guard is currently installed.
    async fn is_armed(&self) -> bool;

    /// `true` when the script at `script_url` is certain to stop at a guard
    /// pause that resolves the pending breakpoints in `candidates`, so
    /// resolving them on `scriptParsed` would do it twice.
    async fn should_skip_eager_resolve(&self, _script_url: &str, _candidates: &[String]) -> bool {
        false
    }

    /// Whether `paused` may have been caused by this helper's guard, in which
    /// case the binder resolves the script's pending breakpoints before
    /// calling [`Self::classify_pause`].
    async fn is_guard_pause(&self, paused: &PausedEvent) -> bool;

    async fn classify_pause(&self, paused: &PausedEvent, script: &PausedScript) -> PauseDisposition;
}

/// The helper for `strategy`, bound to one target's connection.
pub fn helper_for(
    strategy: BreakOnLoadStrategy,
    cdp: Arc<dyn DebuggerApi>,
) -> Box<dyn BreakOnLoadHelper> {
    match strategy {
        BreakOnLoadStrategy::Off => Box::new(OffHelper),
        BreakOnLoadStrategy::Instrument => Box::new(InstrumentHelper::new(cdp)),
        BreakOnLoadStrategy::Regex => Box::new(RegexHelper::new(cdp)),
    }
}
