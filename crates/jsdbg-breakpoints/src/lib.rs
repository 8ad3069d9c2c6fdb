//! Breakpoint resolution for JavaScript debugging sessions.
//!
//! Two cooperating pieces:
//!
//! - [`BreakpointsPredictor`] scans a project's compiled output once, indexes
//!   which compiled files each source file ends up in, and translates source
//!   breakpoints to compiled locations before any script has loaded.
//! - [`TargetBinder`] watches one target's `scriptParsed` and `paused`
//!   notifications and, depending on the [`BreakOnLoadStrategy`], stops new
//!   scripts before their first statement so pending breakpoints are bound in
//!   time, then resumes them.
//!
//! Failures inside either are logged and contained: a mapping that cannot be
//! predicted only means the breakpoint binds when its script loads.

pub mod break_on_load;
mod binder;
mod error;
mod predictor;

pub use binder::{BinderState, LoadedScript, ScriptBreakpoints, TargetBinder};
pub use break_on_load::{
    entry_breakpoint_pattern, helper_for, is_instrumentation_pause,
    should_continue_on_entry_pause, BreakOnLoadHelper, EntryBreakpointRecord,
    EntryBreakpointRegistry, InstrumentHelper, OffHelper, PauseDisposition, PauseKind,
    PausedScript, RegexHelper,
};
pub use error::{BreakpointError, Result};
pub use jsdbg_config::BreakOnLoadStrategy;
pub use predictor::{
    source_index_key, BreakpointsPredictor, DiscoveredMapping, LongParse, PredictedLocation,
    PredictionCache, PredictorOptions, SetBreakpointsRequest, Source, SourceBreakpoint,
    SourceToCompiledIndex, WorkspaceLocation,
};
