//! Launch configuration for a jsdbg session.
//!
//! ```toml
//! rootPath = "/work/app"
//! outFiles = ["out/**/*.js", "!**/node_modules/**"]
//! breakOnLoadStrategy = "regex"
//!
//! [sourceMapPathOverrides]
//! "webpack:///./*" = "${workspaceFolder}/*"
//!
//! [prediction]
//! cacheDir = "/tmp/jsdbg-cache"
//! longParseWarningMs = 10000
//! concurrency = 16
//!
//! [logging]
//! level = "debug"
//! ```

mod logging;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{init_tracing, LoggingConfig};

/// Placeholder expanded to the workspace root inside path override values.
pub const WORKSPACE_FOLDER_VARIABLE: &str = "${workspaceFolder}";

/// How user breakpoints in not-yet-loaded scripts get bound before the script runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakOnLoadStrategy {
    /// Rely on the engine's own URL breakpoints; nothing extra is installed.
    #[default]
    Off,
    /// Pause at the first statement of every script.
    Instrument,
    /// Install a filename-pattern entry breakpoint per requested source file.
    Regex,
}

impl BreakOnLoadStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakOnLoadStrategy::Off => "off",
            BreakOnLoadStrategy::Instrument => "instrument",
            BreakOnLoadStrategy::Regex => "regex",
        }
    }
}

impl std::fmt::Display for BreakOnLoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BreakOnLoadStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(BreakOnLoadStrategy::Off),
            "instrument" => Ok(BreakOnLoadStrategy::Instrument),
            "regex" => Ok(BreakOnLoadStrategy::Regex),
            other => Err(ConfigError::Invalid(format!(
                "unknown break-on-load strategy {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PredictionConfig {
    /// Directory for the persistent discovery cache. No cache when absent.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// A prediction scan running longer than this is reported as slow.
    #[serde(default = "PredictionConfig::default_long_parse_warning_ms")]
    pub long_parse_warning_ms: u64,

    /// Number of compiled files inspected concurrently during a scan.
    #[serde(default = "PredictionConfig::default_concurrency")]
    pub concurrency: usize,
}

impl PredictionConfig {
    fn default_long_parse_warning_ms() -> u64 {
        10_000
    }

    fn default_concurrency() -> usize {
        16
    }

    pub fn long_parse_threshold(&self) -> Duration {
        Duration::from_millis(self.long_parse_warning_ms)
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            long_parse_warning_ms: Self::default_long_parse_warning_ms(),
            concurrency: Self::default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LaunchConfig {
    /// Root of the compiled output scan.
    pub root_path: PathBuf,

    /// Glob patterns selecting compiled files; `!`-prefixed entries exclude.
    #[serde(default = "LaunchConfig::default_out_files")]
    pub out_files: Vec<String>,

    #[serde(default)]
    pub break_on_load_strategy: BreakOnLoadStrategy,

    /// Source URL prefix rewrites, e.g. `"webpack:///./*" = "${workspaceFolder}/*"`.
    #[serde(default)]
    pub source_map_path_overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub prediction: PredictionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LaunchConfig {
    fn default_out_files() -> Vec<String> {
        vec!["**/*.js".to_string(), "!**/node_modules/**".to_string()]
    }

    /// A configuration rooted at `root_path` with every other setting defaulted.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            out_files: Self::default_out_files(),
            break_on_load_strategy: BreakOnLoadStrategy::default(),
            source_map_path_overrides: BTreeMap::new(),
            prediction: PredictionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load from a `.toml` or `.json` file and validate.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::load_from_str_toml(&text),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::load_from_str_json(&text),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }

    pub fn load_from_str_toml(text: &str) -> Result<Self, ConfigError> {
        let config: LaunchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_str_json(text: &str) -> Result<Self, ConfigError> {
        let config: LaunchConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("`rootPath` must not be empty".to_string()));
        }
        if self.prediction.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "`prediction.concurrency` must be at least 1".to_string(),
            ));
        }
        for pattern in &self.out_files {
            let glob = pattern.strip_prefix('!').unwrap_or(pattern);
            globset::Glob::new(glob).map_err(|err| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                message: err.kind().to_string(),
            })?;
        }
        Ok(())
    }

    /// `outFiles` with `${workspaceFolder}` expanded to `rootPath`.
    pub fn resolved_out_files(&self) -> Vec<String> {
        let root = self.root_path.to_string_lossy().replace('\\', "/");
        let root = root.trim_end_matches('/');
        self.out_files
            .iter()
            .map(|pattern| pattern.replace(WORKSPACE_FOLDER_VARIABLE, root))
            .collect()
    }

    /// Path overrides with `${workspaceFolder}` expanded to `rootPath`.
    pub fn resolved_path_overrides(&self) -> Vec<(String, String)> {
        let root = self.root_path.to_string_lossy().replace('\\', "/");
        let root = root.trim_end_matches('/');
        self.source_map_path_overrides
            .iter()
            .map(|(from, to)| (from.clone(), to.replace(WORKSPACE_FOLDER_VARIABLE, root)))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("failed to parse json config: {0}")]
    Json(String),
    #[error("unsupported config format for {path} (expected .toml or .json)")]
    UnsupportedFormat { path: String },
    #[error("invalid outFiles pattern {pattern:?}: {message}")]
    InvalidGlob { pattern: String, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` embeds a source snippet; keep just the message.
        ConfigError::Toml(err.message().to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err.to_string())
    }
}
