use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::{Result, SourceMapError};
use crate::url::is_absolute_url;
use crate::vlq::{decode_mappings, RawMapping};

/// Which neighbour to pick when a position has no exact mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bias {
    /// The closest mapped position at or before the requested one.
    GreatestLowerBound,
    /// The closest mapped position at or after the requested one.
    LeastUpperBound,
}

/// A generated position: 1-based line, 0-based column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratedPosition {
    pub line: u32,
    pub column: u32,
}

/// An original position: source URL, 1-based line, 0-based column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

/// The query interface the breakpoint core needs from a parsed source map.
pub trait SourceMap: Send + Sync + fmt::Debug {
    /// Absolute URLs of every source the map references.
    fn sources(&self) -> &[String];

    /// Translate an original position (1-based line, 0-based column) in
    /// `source` to a generated one.
    fn generated_position_for(
        &self,
        source: &str,
        line: u32,
        column: u32,
        bias: Bias,
    ) -> Option<GeneratedPosition>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    mappings: String,
    #[serde(default)]
    sections: Option<serde_json::Value>,
}

/// A decoded v3 source map.
#[derive(Debug)]
pub struct DecodedSourceMap {
    sources: Vec<String>,
    source_index: HashMap<String, u32>,
    by_original: Vec<RawMapping>,
    by_generated: Vec<RawMapping>,
}

impl DecodedSourceMap {
    /// Parse a v3 source map. Sources are resolved against `sourceRoot` and then
    /// against `map_url` (the URL the map was loaded from), so `sources()`
    /// returns absolute URLs whenever enough information is available.
    pub fn parse(json: &str, map_url: Option<&Url>) -> Result<Self> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        if raw.sections.is_some() {
            return Err(SourceMapError::IndexedMap);
        }
        if raw.version != 3 {
            return Err(SourceMapError::UnsupportedVersion(raw.version));
        }

        let sources: Vec<String> = raw
            .sources
            .iter()
            .map(|source| {
                resolve_source(
                    source.as_deref().unwrap_or_default(),
                    raw.source_root.as_deref(),
                    map_url,
                )
            })
            .collect();

        let mut source_index = HashMap::with_capacity(sources.len());
        for (idx, source) in sources.iter().enumerate() {
            source_index.entry(source.clone()).or_insert(idx as u32);
        }

        let mut by_generated = decode_mappings(&raw.mappings)?;
        by_generated.retain(|m| (m.source as usize) < sources.len());
        let mut by_original = by_generated.clone();
        by_original.sort_by_key(|m| {
            (
                m.source,
                m.original_line,
                m.original_column,
                m.generated_line,
                m.generated_column,
            )
        });
        by_generated.sort_by_key(|m| (m.generated_line, m.generated_column));

        Ok(Self {
            sources,
            source_index,
            by_original,
            by_generated,
        })
    }

    /// Translate a generated position (1-based line, 0-based column) back to its
    /// original position, using the closest mapping at or before it on the same line.
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        let needle = (line.checked_sub(1)?, column);
        let idx = self
            .by_generated
            .partition_point(|m| (m.generated_line, m.generated_column) <= needle);
        let mapping = self.by_generated.get(idx.checked_sub(1)?)?;
        if mapping.generated_line != needle.0 {
            return None;
        }
        Some(OriginalPosition {
            source: self.sources.get(mapping.source as usize)?.clone(),
            line: mapping.original_line + 1,
            column: mapping.original_column,
        })
    }
}

impl SourceMap for DecodedSourceMap {
    fn sources(&self) -> &[String] {
        &self.sources
    }

    fn generated_position_for(
        &self,
        source: &str,
        line: u32,
        column: u32,
        bias: Bias,
    ) -> Option<GeneratedPosition> {
        let source = *self.source_index.get(source)?;
        let needle = (source, line.checked_sub(1)?, column);
        let key = |m: &RawMapping| (m.source, m.original_line, m.original_column);

        let mapping = match bias {
            Bias::LeastUpperBound => {
                let idx = self.by_original.partition_point(|m| key(m) < needle);
                self.by_original.get(idx)?
            }
            Bias::GreatestLowerBound => {
                let idx = self.by_original.partition_point(|m| key(m) <= needle);
                self.by_original.get(idx.checked_sub(1)?)?
            }
        };
        if mapping.source != source {
            return None;
        }
        Some(GeneratedPosition {
            line: mapping.generated_line + 1,
            column: mapping.generated_column,
        })
    }
}

fn resolve_source(source: &str, source_root: Option<&str>, map_url: Option<&Url>) -> String {
    let joined = match source_root {
        Some(root) if !root.is_empty() && !is_absolute_url(source) && !source.starts_with('/') => {
            format!("{}/{}", root.trim_end_matches('/'), source)
        }
        _ => source.to_string(),
    };

    // Already absolute (`webpack:///./src/a.ts`, `file:///…`): keep verbatim so
    // path overrides see exactly what the bundler wrote.
    if is_absolute_url(&joined) {
        return joined;
    }
    if let Some(url) = windows_path_to_url(&joined) {
        return url;
    }
    match map_url.and_then(|base| base.join(&joined).ok()) {
        Some(url) => url.into(),
        None => joined,
    }
}

fn windows_path_to_url(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let is_drive_path = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/');
    if !is_drive_path {
        return None;
    }
    Some(format!("file:///{}", path.replace('\\', "/")))
}
