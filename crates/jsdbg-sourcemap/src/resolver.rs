use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::map::SourceMap;
use crate::url::{file_url_to_absolute_path, normalize_path_lexically};

/// Turns a source URL listed by a map into an absolute workspace path.
#[async_trait]
pub trait SourcePathResolver: Send + Sync {
    async fn url_to_absolute_path(&self, url: &str, map: &dyn SourceMap) -> Option<PathBuf>;
}

/// Only `file:` URLs resolve; everything else has no workspace path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileUrlResolver;

#[async_trait]
impl SourcePathResolver for FileUrlResolver {
    async fn url_to_absolute_path(&self, url: &str, _map: &dyn SourceMap) -> Option<PathBuf> {
        file_url_to_absolute_path(url)
    }
}

/// Applies `sourceMapPathOverrides`-style rewrites before falling back to
/// plain `file:` decoding.
///
/// Keys and values may contain a single `*`, which carries the matched suffix
/// over. `${workspaceFolder}` in a value expands to the workspace root. The
/// longest matching key wins.
#[derive(Debug, Clone)]
pub struct OverridePathResolver {
    overrides: Vec<(String, String)>,
}

impl OverridePathResolver {
    pub fn new<I>(overrides: I, workspace_root: &Path) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let root = workspace_root.to_string_lossy().replace('\\', "/");
        let root = root.trim_end_matches('/');
        let mut overrides: Vec<(String, String)> = overrides
            .into_iter()
            .map(|(from, to)| (from, to.replace("${workspaceFolder}", root)))
            .collect();
        overrides.sort_by(|a, b| prefix_len(&b.0).cmp(&prefix_len(&a.0)).then(a.0.cmp(&b.0)));
        Self { overrides }
    }

    /// Apply the first matching override to `url`. `.` and `..` segments in
    /// the result are folded.
    pub fn rewrite(&self, url: &str) -> Option<PathBuf> {
        for (from, to) in &self.overrides {
            let Some(captured) = match_pattern(from, url) else {
                continue;
            };
            let rewritten = match to.split_once('*') {
                Some((head, tail)) => format!("{head}{captured}{tail}"),
                None => to.clone(),
            };
            tracing::trace!(target = "jsdbg.sourcemap", url, rewritten = %rewritten, "applied path override");
            return Some(normalize_path_lexically(Path::new(&rewritten)));
        }
        None
    }
}

fn prefix_len(pattern: &str) -> usize {
    pattern.split_once('*').map_or(pattern.len(), |(head, _)| head.len())
}

fn match_pattern<'a>(pattern: &str, url: &'a str) -> Option<&'a str> {
    match pattern.split_once('*') {
        Some((head, tail)) => {
            let rest = url.strip_prefix(head)?;
            rest.strip_suffix(tail)
        }
        None => (pattern == url).then_some(""),
    }
}

#[async_trait]
impl SourcePathResolver for OverridePathResolver {
    async fn url_to_absolute_path(&self, url: &str, _map: &dyn SourceMap) -> Option<PathBuf> {
        self.rewrite(url).or_else(|| file_url_to_absolute_path(url))
    }
}
