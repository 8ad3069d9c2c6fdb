use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SourceMapError};
use crate::map::{DecodedSourceMap, SourceMap};
use crate::url::file_url_to_absolute_path;

/// A compiled file that declares a source map, as found by a repository scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMapMetadata {
    /// Absolute path of the compiled file.
    pub compiled_path: PathBuf,
    /// Absolute URL (`file:` or `data:`) of the map.
    pub source_map_url: String,
    /// Modification time of the compiled file, in milliseconds since the epoch.
    pub mtime: u64,
}

#[async_trait]
pub trait SourceMapLoader: Send + Sync {
    /// Load and parse the map for `metadata`. Failures are logged and yield `None`.
    async fn load(&self, metadata: &SourceMapMetadata) -> Option<Arc<dyn SourceMap>>;
}

/// Default loader: reads `file:` and inline `data:` maps and memoizes the
/// outcome per compiled file and modification time.
#[derive(Default)]
pub struct SourceMapFactory {
    memo: Mutex<HashMap<(PathBuf, u64), Option<Arc<DecodedSourceMap>>>>,
}

impl SourceMapFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the map synchronously, bypassing the memo.
    pub fn load_uncached(metadata: &SourceMapMetadata) -> Result<DecodedSourceMap> {
        let url = metadata.source_map_url.as_str();
        if url.starts_with("data:") {
            let json = decode_data_url(url)?;
            let base = Url::from_file_path(&metadata.compiled_path).ok();
            return DecodedSourceMap::parse(&json, base.as_ref());
        }

        let path = file_url_to_absolute_path(url)
            .ok_or_else(|| SourceMapError::UnsupportedUrl(url.to_string()))?;
        let json = std::fs::read_to_string(&path)?;
        let base = Url::parse(url).ok();
        DecodedSourceMap::parse(&json, base.as_ref())
    }
}

#[async_trait]
impl SourceMapLoader for SourceMapFactory {
    async fn load(&self, metadata: &SourceMapMetadata) -> Option<Arc<dyn SourceMap>> {
        let key = (metadata.compiled_path.clone(), metadata.mtime);
        let memoized = self.memo.lock().get(&key).cloned();
        if let Some(memoized) = memoized {
            return memoized.map(|map| map as Arc<dyn SourceMap>);
        }

        let owned = metadata.clone();
        let loaded = match tokio::task::spawn_blocking(move || Self::load_uncached(&owned)).await {
            Ok(result) => result,
            Err(err) => Err(SourceMapError::Join(err.to_string())),
        };
        let loaded = match loaded {
            Ok(map) => Some(Arc::new(map)),
            Err(err) => {
                tracing::debug!(
                    target = "jsdbg.sourcemap",
                    compiled = %metadata.compiled_path.display(),
                    url = %metadata.source_map_url,
                    error = %err,
                    "failed to load source map"
                );
                None
            }
        };

        self.memo.lock().insert(key, loaded.clone());
        loaded.map(|map| map as Arc<dyn SourceMap>)
    }
}

fn decode_data_url(url: &str) -> Result<String> {
    let rest = url.strip_prefix("data:").ok_or(SourceMapError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(SourceMapError::InvalidDataUrl)?;
    let bytes = if header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|_| SourceMapError::InvalidDataUrl)?
    } else {
        percent_decode(payload)
    };
    String::from_utf8(bytes).map_err(|_| SourceMapError::InvalidDataUrl)
}

fn percent_decode(input: &str) -> Vec<u8> {
    fn hex(byte: u8) -> Option<u8> {
        (byte as char).to_digit(16).map(|d| d as u8)
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}
