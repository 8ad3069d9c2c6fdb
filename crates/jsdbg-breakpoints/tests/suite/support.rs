use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsdbg_breakpoints::{
    BreakpointsPredictor, LoadedScript, PredictionCache, PredictorOptions, ScriptBreakpoints,
};
use jsdbg_cdp::{BreakpointId, CallFrame, CdpEvent, Location, PausedEvent, ScriptId, ScriptParsedEvent};
use jsdbg_sourcemap::{
    FsSourceMapRepository, SourceMap, SourceMapFactory, SourceMapLoader, SourceMapMetadata,
    SourceMapRepository,
};
use parking_lot::Mutex;
use serde_json::Value;

/// Generated line 5: column 0 maps to `index.ts` 5:0, column 10 to 5:8.
pub const INDEX_MAP: &str = r#"{"version":3,"file":"index.js","sourceRoot":"","sources":["../src/index.ts"],"names":[],"mappings":";;;;AAIA,UAAQ"}"#;

pub fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// `src/index.ts` compiled to `out/index.js` with an external map, plus an
/// unrelated file without one.
pub fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("src/index.ts"),
        "// header\n\n\n\nconst x = 1; let y = 2;\n",
    );
    write(
        &root.join("out/index.js"),
        "\"use strict\";\n// header\n\n\nconst x = 1; let y = 2;\n//# sourceMappingURL=index.js.map\n",
    );
    write(&root.join("out/index.js.map"), INDEX_MAP);
    write(&root.join("out/vendor.js"), "console.log('no map');\n");
    dir
}

/// Wraps the file-system repository, counting scans and optionally slowing them.
pub struct CountingRepository {
    inner: FsSourceMapRepository,
    pub calls: AtomicUsize,
    delay: Duration,
}

impl CountingRepository {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: FsSourceMapRepository::new(),
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceMapRepository for CountingRepository {
    fn name(&self) -> &'static str {
        "CountingRepository"
    }

    async fn stream_all_children(
        &self,
        base: &Path,
        patterns: &[String],
    ) -> jsdbg_sourcemap::Result<Vec<SourceMapMetadata>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.stream_all_children(base, patterns).await
    }
}

/// Wraps the default loader, counting loads.
#[derive(Default)]
pub struct CountingLoader {
    inner: SourceMapFactory,
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceMapLoader for CountingLoader {
    async fn load(&self, metadata: &SourceMapMetadata) -> Option<Arc<dyn SourceMap>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(metadata).await
    }
}

pub fn predictor_with(
    root: &Path,
    repo: Arc<CountingRepository>,
    loader: Arc<CountingLoader>,
    cache: Option<PredictionCache>,
) -> BreakpointsPredictor {
    BreakpointsPredictor::new(
        PredictorOptions::new(root, vec!["out/**/*.js".to_string()]),
        repo,
        loader,
        None,
        cache,
    )
}

/// Stand-in for the session's breakpoint manager.
#[derive(Default)]
pub struct RecordingBreakpoints {
    sources: Mutex<HashMap<String, Vec<String>>>,
    bound: Mutex<HashMap<String, Vec<Location>>>,
    resolved: Mutex<Vec<ScriptId>>,
}

impl RecordingBreakpoints {
    pub fn with_sources(self, script_url: &str, sources: &[&str]) -> Self {
        self.sources.lock().insert(
            script_url.to_string(),
            sources.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_bound(self, script_url: &str, bound: Vec<Location>) -> Self {
        self.bound.lock().insert(script_url.to_string(), bound);
        self
    }

    pub fn resolved(&self) -> Vec<ScriptId> {
        self.resolved.lock().clone()
    }
}

#[async_trait]
impl ScriptBreakpoints for RecordingBreakpoints {
    async fn source_paths(&self, script: &LoadedScript) -> Vec<String> {
        self.sources
            .lock()
            .get(&script.url)
            .cloned()
            .unwrap_or_default()
    }

    async fn resolve_pending(&self, script: &LoadedScript) -> Vec<Location> {
        self.resolved.lock().push(script.script_id.clone());
        self.bound
            .lock()
            .get(&script.url)
            .cloned()
            .unwrap_or_default()
    }
}

pub fn script_parsed(script_id: &str, url: &str) -> CdpEvent {
    CdpEvent::ScriptParsed(ScriptParsedEvent {
        script_id: ScriptId::new(script_id),
        url: url.to_string(),
        source_map_url: None,
    })
}

pub fn paused(reason: &str, data: Option<Value>, hits: &[BreakpointId], script_id: &str) -> PausedEvent {
    PausedEvent {
        reason: reason.to_string(),
        data,
        hit_breakpoints: hits.to_vec(),
        call_frames: vec![CallFrame {
            call_frame_id: "frame-0".to_string(),
            function_name: String::new(),
            location: Location::new(script_id, 0, 0),
            url: String::new(),
        }],
    }
}

/// A pause whose top frame also names its script's URL.
pub fn paused_in(
    reason: &str,
    data: Option<Value>,
    hits: &[BreakpointId],
    script_id: &str,
    url: &str,
) -> PausedEvent {
    let mut event = paused(reason, data, hits, script_id);
    event.call_frames[0].url = url.to_string();
    event
}

pub fn canonical(path: &str) -> String {
    jsdbg_sourcemap::url::canonicalize_url(path)
}
