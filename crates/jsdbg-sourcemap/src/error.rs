use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceMapError>;

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid source map json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported source map version {0}")]
    UnsupportedVersion(u32),

    #[error("indexed source maps (`sections`) are not supported")]
    IndexedMap,

    #[error("invalid mappings at segment {segment}: {message}")]
    InvalidMappings { segment: usize, message: &'static str },

    #[error("invalid data url")]
    InvalidDataUrl,

    #[error("cannot load source map from {0}")]
    UnsupportedUrl(String),

    #[error("invalid outFiles glob {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("background task failed: {0}")]
    Join(String),
}
