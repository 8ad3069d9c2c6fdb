use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use url::Url;
use walkdir::WalkDir;

use crate::error::{Result, SourceMapError};
use crate::loader::SourceMapMetadata;
use crate::url::is_absolute_url;

/// Enumerates compiled files under a root that declare a source map.
#[async_trait]
pub trait SourceMapRepository: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Every file under `base` matching `patterns` (relative globs, `!`-prefixed
    /// entries exclude) that carries a `sourceMappingURL` comment.
    async fn stream_all_children(
        &self,
        base: &Path,
        patterns: &[String],
    ) -> Result<Vec<SourceMapMetadata>>;
}

/// Compiled `outFiles` globs, split into inclusions and exclusions.
#[derive(Debug, Clone)]
pub struct OutFilesMatcher {
    include: GlobSet,
    exclude: GlobSet,
    /// Exclusions of the form `<dir-glob>/**`, used to skip whole directories.
    exclude_dirs: GlobSet,
}

impl OutFilesMatcher {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut exclude_dirs = GlobSetBuilder::new();
        for pattern in patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => {
                    exclude.add(compile_glob(negated)?);
                    if let Some(dir) = negated.strip_suffix("/**") {
                        exclude_dirs.add(compile_glob(dir)?);
                    }
                }
                None => {
                    include.add(compile_glob(pattern)?);
                }
            }
        }
        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|source| SourceMapError::Glob {
                pattern: patterns.join(", "),
                source,
            })
        };
        Ok(Self {
            include: build(include)?,
            exclude: build(exclude)?,
            exclude_dirs: build(exclude_dirs)?,
        })
    }

    /// Whether a `/`-separated path relative to the scan root is an out file.
    pub fn is_match(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    fn skips_dir(&self, relative: &str) -> bool {
        !relative.is_empty() && self.exclude_dirs.is_match(relative)
    }
}

fn compile_glob(pattern: &str) -> Result<Glob> {
    let normalized = pattern.replace('\\', "/");
    GlobBuilder::new(normalized.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .map_err(|source| SourceMapError::Glob {
            pattern: pattern.to_string(),
            source,
        })
}

/// Rebase absolute `outFiles` patterns onto `root`, leaving relative ones alone.
pub fn relative_out_file_patterns(root: &Path, patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|pattern| {
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(body) => (true, body),
                None => (false, pattern.as_str()),
            };
            let body = match Path::new(body).strip_prefix(root) {
                Ok(rel) if Path::new(body).is_absolute() => {
                    rel.to_string_lossy().replace('\\', "/")
                }
                _ => body.to_string(),
            };
            if negated {
                format!("!{body}")
            } else {
                body
            }
        })
        .collect()
}

/// File-system repository: walks the root and reads each matching file's
/// trailing `//# sourceMappingURL=` comment.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceMapRepository;

impl FsSourceMapRepository {
    pub fn new() -> Self {
        Self
    }

    fn scan(base: &Path, matcher: &OutFilesMatcher) -> Vec<SourceMapMetadata> {
        let walker = WalkDir::new(base).follow_links(false).into_iter();
        let entries = walker.filter_entry(|entry| {
            !entry.file_type().is_dir() || !matcher.skips_dir(&relative_path(base, entry.path()))
        });

        let mut found = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(target = "jsdbg.sourcemap", error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_path(base, entry.path());
            if !matcher.is_match(&relative) {
                continue;
            }
            match metadata_for_file(entry.path()) {
                Ok(Some(metadata)) => found.push(metadata),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(
                        target = "jsdbg.sourcemap",
                        path = %entry.path().display(),
                        error = %err,
                        "failed to inspect compiled file"
                    );
                }
            }
        }
        found
    }
}

#[async_trait]
impl SourceMapRepository for FsSourceMapRepository {
    fn name(&self) -> &'static str {
        "FsSourceMapRepository"
    }

    async fn stream_all_children(
        &self,
        base: &Path,
        patterns: &[String],
    ) -> Result<Vec<SourceMapMetadata>> {
        let matcher = OutFilesMatcher::new(patterns)?;
        let base = base.to_path_buf();
        tokio::task::spawn_blocking(move || Self::scan(&base, &matcher))
            .await
            .map_err(|err| SourceMapError::Join(err.to_string()))
    }
}

fn relative_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Build metadata for a compiled file if it declares a source map.
pub fn metadata_for_file(path: &Path) -> std::io::Result<Option<SourceMapMetadata>> {
    let file = std::fs::File::open(path)?;
    let mtime = file
        .metadata()?
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut declared = None;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // Stray non-UTF-8 bytes elsewhere in the file must not hide the comment.
        let line = String::from_utf8_lossy(&buf);
        if let Some(url) = parse_source_mapping_url(&line) {
            declared = Some(url.to_string());
        }
    }

    let Some(declared) = declared else {
        return Ok(None);
    };
    let Some(source_map_url) = resolve_map_url(path, &declared) else {
        return Ok(None);
    };
    Ok(Some(SourceMapMetadata {
        compiled_path: path.to_path_buf(),
        source_map_url,
        mtime,
    }))
}

/// Extract the URL from a `//# sourceMappingURL=` (or legacy `//@`) comment line.
pub fn parse_source_mapping_url(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("//# sourceMappingURL=")
        .or_else(|| trimmed.strip_prefix("//@ sourceMappingURL="))?;
    let url = rest.split_whitespace().next()?;
    (!url.is_empty()).then_some(url)
}

fn resolve_map_url(compiled: &Path, declared: &str) -> Option<String> {
    if is_absolute_url(declared) {
        return Some(declared.to_string());
    }
    let base = Url::from_file_path(compiled).ok()?;
    base.join(declared).ok().map(String::from)
}

/// Absolute path for a `file:` map URL, used by tools that print scan results.
pub fn map_path(metadata: &SourceMapMetadata) -> Option<PathBuf> {
    crate::url::file_url_to_absolute_path(&metadata.source_map_url)
}
