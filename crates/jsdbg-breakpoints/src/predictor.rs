use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use jsdbg_cache::CorrelatedCache;
use jsdbg_config::LaunchConfig;
use jsdbg_sourcemap::url::{
    file_url_to_absolute_path, fix_drive_letter_and_slashes, lower_case_insensitive_path,
    normalize_path_lexically,
};
use jsdbg_sourcemap::{
    relative_out_file_patterns, Bias, FsSourceMapRepository, OutFilesMatcher,
    OverridePathResolver, SourceMapFactory, SourceMapLoader, SourceMapMetadata,
    SourceMapRepository, SourcePathResolver,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A position in a workspace file. Lines and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceLocation {
    pub absolute_path: PathBuf,
    pub line_number: u32,
    pub column_number: u32,
}

impl WorkspaceLocation {
    pub fn new(absolute_path: impl Into<PathBuf>, line_number: u32, column_number: u32) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            line_number,
            column_number,
        }
    }
}

/// One source file referenced by one compiled file's source map.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredMapping {
    /// The source URL exactly as listed by the map.
    pub source_url: String,
    /// Where that source lives in the workspace.
    pub resolved_path: PathBuf,
    /// Enough to reload the map for translation.
    pub metadata: SourceMapMetadata,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedLocation {
    pub source: WorkspaceLocation,
    pub compiled: WorkspaceLocation,
}

/// The source half of a debug adapter `setBreakpoints` request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBreakpoint {
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBreakpointsRequest {
    pub source: Source,
    #[serde(default)]
    pub breakpoints: Vec<SourceBreakpoint>,
}

impl SetBreakpointsRequest {
    pub fn new(path: impl Into<PathBuf>, breakpoints: Vec<SourceBreakpoint>) -> Self {
        Self {
            source: Source {
                path: Some(path.into()),
            },
            breakpoints,
        }
    }
}

/// Emitted when a scan outlives the configured threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LongParse {
    pub repository: &'static str,
    pub patterns: Vec<String>,
    pub threshold: Duration,
}

pub type PredictionCache = CorrelatedCache<Vec<DiscoveredMapping>>;

#[derive(Clone, Debug)]
pub struct PredictorOptions {
    pub root_path: PathBuf,
    /// Globs relative to `root_path`.
    pub out_files: Vec<String>,
    pub long_parse_threshold: Duration,
    pub concurrency: usize,
}

impl PredictorOptions {
    pub fn new(root_path: impl Into<PathBuf>, out_files: Vec<String>) -> Self {
        let root_path = root_path.into();
        let out_files = relative_out_file_patterns(&root_path, &out_files);
        Self {
            root_path,
            out_files,
            long_parse_threshold: Duration::from_secs(10),
            concurrency: 16,
        }
    }

    pub fn from_config(config: &LaunchConfig) -> Self {
        Self {
            long_parse_threshold: config.prediction.long_parse_threshold(),
            concurrency: config.prediction.concurrency.max(1),
            ..Self::new(&config.root_path, config.resolved_out_files())
        }
    }
}

/// Index key for a source path: dot segments folded, `/`-separated, drive
/// letter lowered, and case-folded where the platform's file system ignores case.
pub fn source_index_key(path: &Path) -> String {
    let path = normalize_path_lexically(path);
    lower_case_insensitive_path(&fix_drive_letter_and_slashes(&path.to_string_lossy()))
}

/// Source path to every compiled file whose map references it.
#[derive(Debug, Default)]
pub struct SourceToCompiledIndex {
    by_source: HashMap<String, Vec<DiscoveredMapping>>,
}

impl SourceToCompiledIndex {
    fn insert(&mut self, discovery: DiscoveredMapping) {
        let entry = self
            .by_source
            .entry(source_index_key(&discovery.resolved_path))
            .or_default();
        if !entry.contains(&discovery) {
            entry.push(discovery);
        }
    }

    pub fn get(&self, source: &Path) -> &[DiscoveredMapping] {
        self.by_source
            .get(&source_index_key(source))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of distinct source files.
    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredMapping> {
        self.by_source.values().flatten()
    }
}

/// Ahead-of-time source map discovery and source-to-compiled translation.
///
/// The workspace is scanned at most once per predictor; every caller, including
/// those arriving while the scan is running, waits on the same result.
pub struct BreakpointsPredictor {
    options: PredictorOptions,
    repo: Arc<dyn SourceMapRepository>,
    loader: Arc<dyn SourceMapLoader>,
    resolver: Option<Arc<dyn SourcePathResolver>>,
    cache: Option<PredictionCache>,
    index: OnceCell<SourceToCompiledIndex>,
    predicted: Mutex<Vec<PredictedLocation>>,
    long_parse: broadcast::Sender<LongParse>,
    scans_started: AtomicUsize,
}

impl BreakpointsPredictor {
    pub fn new(
        options: PredictorOptions,
        repo: Arc<dyn SourceMapRepository>,
        loader: Arc<dyn SourceMapLoader>,
        resolver: Option<Arc<dyn SourcePathResolver>>,
        cache: Option<PredictionCache>,
    ) -> Self {
        let (long_parse, _) = broadcast::channel(4);
        Self {
            options,
            repo,
            loader,
            resolver,
            cache,
            index: OnceCell::new(),
            predicted: Mutex::new(Vec::new()),
            long_parse,
            scans_started: AtomicUsize::new(0),
        }
    }

    /// Wire up the default file-system collaborators for a launch configuration.
    ///
    /// Fails on an invalid configuration or when the cache directory cannot be
    /// created.
    pub fn from_config(config: &LaunchConfig) -> Result<Self> {
        config.validate()?;
        let options = PredictorOptions::from_config(config);
        OutFilesMatcher::new(&options.out_files)?;

        let resolver: Option<Arc<dyn SourcePathResolver>> =
            if config.source_map_path_overrides.is_empty() {
                None
            } else {
                Some(Arc::new(OverridePathResolver::new(
                    config.resolved_path_overrides(),
                    &config.root_path,
                )))
            };
        let cache = match &config.prediction.cache_dir {
            Some(dir) => Some(PredictionCache::new(dir)?),
            None => None,
        };

        Ok(Self::new(
            options,
            Arc::new(FsSourceMapRepository::new()),
            Arc::new(SourceMapFactory::new()),
            resolver,
            cache,
        ))
    }

    pub fn options(&self) -> &PredictorOptions {
        &self.options
    }

    /// Fires at most once per scan, when it runs longer than the threshold.
    pub fn on_long_parse(&self) -> broadcast::Receiver<LongParse> {
        self.long_parse.subscribe()
    }

    /// How many workspace scans have started. Never more than one.
    pub fn scan_count(&self) -> usize {
        self.scans_started.load(Ordering::SeqCst)
    }

    /// Start the workspace scan if needed and wait for it to finish.
    pub async fn prepare_to_predict(&self) {
        self.index().await;
    }

    async fn index(&self) -> &SourceToCompiledIndex {
        self.index
            .get_or_init(|| self.create_initial_mapping())
            .await
    }

    /// Compiled files whose maps reference `source`, after the scan completes.
    pub async fn compiled_paths_for(&self, source: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .index()
            .await
            .get(source)
            .iter()
            .map(|mapping| mapping.metadata.compiled_path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Number of distinct source files discovered by the scan.
    pub async fn indexed_source_count(&self) -> usize {
        self.index().await.len()
    }

    async fn create_initial_mapping(&self) -> SourceToCompiledIndex {
        self.scans_started.fetch_add(1, Ordering::SeqCst);
        let mut index = SourceToCompiledIndex::default();
        if self.options.out_files.is_empty() {
            return index;
        }

        let watchdog = CancellationToken::new();
        let _cancel_watchdog = watchdog.clone().drop_guard();
        self.spawn_long_parse_watchdog(watchdog);

        let children = match self
            .repo
            .stream_all_children(&self.options.root_path, &self.options.out_files)
            .await
        {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(
                    target = "jsdbg.predictor",
                    root = %self.options.root_path.display(),
                    repository = self.repo.name(),
                    error = %err,
                    "failed to enumerate compiled files"
                );
                return index;
            }
        };

        let compiled_files = children.len();
        let mut discoveries = stream::iter(children)
            .map(|metadata| self.discover(metadata))
            .buffer_unordered(self.options.concurrency.max(1));
        while let Some(found) = discoveries.next().await {
            for discovery in found {
                index.insert(discovery);
            }
        }

        tracing::debug!(
            target = "jsdbg.predictor",
            compiled_files,
            sources = index.len(),
            "breakpoint prediction index built"
        );
        index
    }

    fn spawn_long_parse_watchdog(&self, done: CancellationToken) {
        let threshold = self.options.long_parse_threshold;
        let sender = self.long_parse.clone();
        let event = LongParse {
            repository: self.repo.name(),
            patterns: self.options.out_files.clone(),
            threshold,
        };
        tokio::spawn(async move {
            tokio::select! {
                _ = done.cancelled() => {}
                _ = tokio::time::sleep(threshold) => {
                    tracing::warn!(
                        target = "jsdbg.predictor",
                        repository = event.repository,
                        threshold_ms = threshold.as_millis() as u64,
                        patterns = ?event.patterns,
                        "long breakpoint predictor runtime"
                    );
                    let _ = sender.send(event);
                }
            }
        });
    }

    /// Sources referenced by one compiled file, from the cache when its mtime
    /// still matches, otherwise by loading its map.
    async fn discover(&self, metadata: SourceMapMetadata) -> Vec<DiscoveredMapping> {
        let key = metadata.compiled_path.to_string_lossy().into_owned();

        if let Some(cache) = &self.cache {
            let cache = cache.clone();
            let lookup_key = key.clone();
            let mtime = metadata.mtime;
            match tokio::task::spawn_blocking(move || cache.lookup(&lookup_key, mtime)).await {
                Ok(Some(cached)) => return cached,
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(target = "jsdbg.predictor", key = %key, error = %err, "cache lookup task failed");
                }
            }
        }

        let Some(map) = self.loader.load(&metadata).await else {
            return Vec::new();
        };

        let mut discovered = Vec::new();
        for url in map.sources() {
            let resolved = match &self.resolver {
                Some(resolver) => resolver.url_to_absolute_path(url, map.as_ref()).await,
                None => file_url_to_absolute_path(url),
            };
            let Some(resolved_path) = resolved else {
                tracing::debug!(
                    target = "jsdbg.predictor",
                    compiled = %metadata.compiled_path.display(),
                    url = %url,
                    "could not resolve source url"
                );
                continue;
            };
            discovered.push(DiscoveredMapping {
                source_url: url.clone(),
                resolved_path,
                metadata: metadata.clone(),
            });
        }

        if let Some(cache) = &self.cache {
            let cache = cache.clone();
            let mtime = metadata.mtime;
            let value = discovered.clone();
            let stored =
                tokio::task::spawn_blocking(move || cache.store(&key, mtime, &value)).await;
            match stored {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::debug!(target = "jsdbg.predictor", error = %err, "failed to store prediction cache entry");
                }
                Err(err) => {
                    tracing::debug!(target = "jsdbg.predictor", error = %err, "cache store task failed");
                }
            }
        }

        discovered
    }

    /// Translate each requested breakpoint to every compiled file that maps the
    /// source, recording the results for [`Self::predicted_resolved_locations`].
    ///
    /// Sources with no known compiled counterpart are ignored.
    pub async fn predict_breakpoints(&self, request: &SetBreakpointsRequest) {
        let Some(absolute_path) = request.source.path.as_deref() else {
            return;
        };
        let index = self.index().await;

        for mapping in index.get(absolute_path) {
            let Some(map) = self.loader.load(&mapping.metadata).await else {
                continue;
            };

            for breakpoint in &request.breakpoints {
                let column = breakpoint.column.unwrap_or(1);
                let Some(generated) = map.generated_position_for(
                    &mapping.source_url,
                    breakpoint.line,
                    column.saturating_sub(1),
                    Bias::LeastUpperBound,
                ) else {
                    continue;
                };

                let predicted = PredictedLocation {
                    source: WorkspaceLocation::new(absolute_path, breakpoint.line, column),
                    compiled: WorkspaceLocation::new(
                        &mapping.metadata.compiled_path,
                        generated.line.max(1),
                        generated.column + 1,
                    ),
                };
                tracing::trace!(
                    target = "jsdbg.predictor",
                    source = %absolute_path.display(),
                    line = breakpoint.line,
                    column,
                    compiled = %predicted.compiled.absolute_path.display(),
                    compiled_line = predicted.compiled.line_number,
                    compiled_column = predicted.compiled.column_number,
                    "predicted breakpoint location"
                );
                self.predicted.lock().push(predicted);
            }
        }
    }

    /// Every compiled location previously predicted for exactly `location`.
    pub fn predicted_resolved_locations(&self, location: &WorkspaceLocation) -> Vec<WorkspaceLocation> {
        self.predicted
            .lock()
            .iter()
            .filter(|predicted| predicted.source == *location)
            .map(|predicted| predicted.compiled.clone())
            .collect()
    }
}
