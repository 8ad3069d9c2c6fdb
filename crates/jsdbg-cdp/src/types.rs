use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `Debugger.paused` reason reported for `Debugger.setInstrumentationBreakpoint` hooks.
pub const PAUSE_REASON_INSTRUMENTATION: &str = "instrumentation";
/// `Debugger.paused` reason reported for DOM event-listener breakpoints.
pub const PAUSE_REASON_EVENT_LISTENER: &str = "EventListener";
/// `Debugger.paused` reason used when several reasons apply at once.
pub const PAUSE_REASON_AMBIGUOUS: &str = "ambiguous";
/// Event name carried by the "first statement of a script" instrumentation pause.
pub const SCRIPT_FIRST_STATEMENT_EVENT: &str = "instrumentation:scriptFirstStatement";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Engine-assigned breakpoint id. Only meaningful on the connection that created it.
    BreakpointId
);
string_id!(
    /// Engine-assigned script id.
    ScriptId
);

/// A position inside a parsed script. Lines and columns are 0-based, as on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: ScriptId,
    pub line_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

impl Location {
    pub fn new(script_id: impl Into<ScriptId>, line_number: u32, column_number: u32) -> Self {
        Self {
            script_id: script_id.into(),
            line_number,
            column_number: Some(column_number),
        }
    }

    /// Whether two locations denote the same position, treating a missing column as 0.
    pub fn same_position(&self, other: &Location) -> bool {
        self.script_id == other.script_id
            && self.line_number == other.line_number
            && self.column_number.unwrap_or(0) == other.column_number.unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub call_frame_id: String,
    #[serde(default)]
    pub function_name: String,
    pub location: Location,
    #[serde(default)]
    pub url: String,
}

/// One entry of `data.reasons` on an `ambiguous` pause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseReasonEntry {
    pub reason: String,
    #[serde(default)]
    pub aux_data: Option<Value>,
}

/// `Debugger.paused` notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hit_breakpoints: Vec<BreakpointId>,
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
}

impl PausedEvent {
    /// Location of the innermost frame, if the engine reported any frames.
    pub fn top_location(&self) -> Option<&Location> {
        self.call_frames.first().map(|frame| &frame.location)
    }

    /// `data.eventName`, present on event-listener pauses.
    pub fn event_name(&self) -> Option<&str> {
        self.data.as_ref()?.get("eventName")?.as_str()
    }

    /// `data.reasons`, present on `ambiguous` pauses.
    ///
    /// Returns `None` when the field is missing or malformed.
    pub fn ambiguous_reasons(&self) -> Option<Vec<PauseReasonEntry>> {
        let reasons = self.data.as_ref()?.get("reasons")?;
        serde_json::from_value(reasons.clone()).ok()
    }
}

/// `Debugger.scriptParsed` notification (the subset the breakpoint core needs).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    pub script_id: ScriptId,
    pub url: String,
    #[serde(default, rename = "sourceMapURL", skip_serializing_if = "Option::is_none")]
    pub source_map_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CdpEvent {
    ScriptParsed(ScriptParsedEvent),
    Paused(PausedEvent),
    Resumed,
}

impl CdpEvent {
    /// Decode a protocol notification by method name.
    ///
    /// Notifications the breakpoint core does not care about decode to `Ok(None)`.
    pub fn from_notification(method: &str, params: Value) -> crate::Result<Option<Self>> {
        let event = match method {
            "Debugger.scriptParsed" => Self::ScriptParsed(serde_json::from_value(params)?),
            "Debugger.paused" => Self::Paused(serde_json::from_value(params)?),
            "Debugger.resumed" => Self::Resumed,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Native "pause before a script runs" hooks the engine may offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentationKind {
    /// `Debugger.setInstrumentationBreakpoint({ instrumentation: "beforeScriptExecution" })`.
    BeforeScriptExecution,
    /// `DOMDebugger.setInstrumentationBreakpoint({ eventName: "scriptFirstStatement" })`.
    ScriptFirstStatement,
}

impl InstrumentationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentationKind::BeforeScriptExecution => "beforeScriptExecution",
            InstrumentationKind::ScriptFirstStatement => "scriptFirstStatement",
        }
    }
}

/// `Debugger.setBreakpointByUrl` parameters restricted to the regex form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrl {
    pub url_regex: String,
    pub line_number: u32,
    pub column_number: u32,
}

impl SetBreakpointByUrl {
    /// A breakpoint on the very first position of every script matching `url_regex`.
    pub fn at_entry(url_regex: impl Into<String>) -> Self {
        Self {
            url_regex: url_regex.into(),
            line_number: 0,
            column_number: 0,
        }
    }
}
