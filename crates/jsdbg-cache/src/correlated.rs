use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use crate::util::{
    atomic_write, bincode_deserialize, bincode_options, bincode_serialize, now_millis,
    read_file_limited, remove_file_best_effort,
};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const CORRELATED_CACHE_SCHEMA_VERSION: u32 = 1;

const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Temp files younger than this may belong to a writer that has not renamed yet.
const TEMP_FILE_GRACE_MILLIS: u64 = 60 * 60 * 1000;

/// Persistent cache whose entries are only valid for one modification time of
/// the file they describe.
///
/// Each key (typically a compiled file's absolute path) is stored in its own
/// file named after the key's fingerprint. An entry written for `(key, t1)` is
/// a miss for `(key, t2)`; the next `store` overwrites it. Writes are atomic and
/// the last writer for a key wins.
pub struct CorrelatedCache<V> {
    root: PathBuf,
    policy: CorrelatedCachePolicy,
    last_gc_millis: Arc<AtomicU64>,
    _value: PhantomData<fn() -> V>,
}

#[derive(Clone, Copy, Debug)]
pub struct CorrelatedCachePolicy {
    /// Entries older than this (by `saved_at_millis`) are dropped by GC.
    pub ttl_millis: u64,
    /// Total on-disk budget; GC evicts oldest entries first.
    pub max_bytes: u64,
    /// Minimum time between opportunistic GC runs triggered by `store`.
    pub gc_interval_millis: u64,
}

impl Default for CorrelatedCachePolicy {
    fn default() -> Self {
        Self {
            ttl_millis: 30 * 24 * 60 * 60 * 1000,
            max_bytes: 128 * 1024 * 1024,
            gc_interval_millis: 5 * 60 * 1000,
        }
    }
}

impl<V> Clone for CorrelatedCache<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            policy: self.policy,
            last_gc_millis: self.last_gc_millis.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for CorrelatedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelatedCache")
            .field("root", &self.root)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<V> CorrelatedCache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::new_with_policy(root, CorrelatedCachePolicy::default())
    }

    pub fn new_with_policy(
        root: impl AsRef<Path>,
        policy: CorrelatedCachePolicy,
    ) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(CacheError::NotADirectory { path: root });
        }
        let cache = Self {
            root,
            policy,
            last_gc_millis: Arc::new(AtomicU64::new(0)),
            _value: PhantomData,
        };
        if let Err(err) = cache.gc() {
            tracing::debug!(target = "jsdbg.cache", error = %err, "initial cache gc failed");
        }
        cache.last_gc_millis.store(now_millis(), Ordering::Relaxed);
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the value stored for `key` if it was stored for exactly `mtime`.
    pub fn lookup(&self, key: &str, mtime: u64) -> Option<V> {
        let key_fingerprint = Fingerprint::from_bytes(key.as_bytes());
        let path = self.entry_path(&key_fingerprint);
        let bytes = read_file_limited(&path)?;

        let persisted: PersistedEntryOwned<V> = match bincode_deserialize(&bytes) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(
                    target = "jsdbg.cache",
                    path = %path.display(),
                    error = %err,
                    "dropping undecodable cache entry"
                );
                remove_file_best_effort(&path, "lookup.corrupt");
                return None;
            }
        };

        if persisted.schema_version != CORRELATED_CACHE_SCHEMA_VERSION
            || persisted.crate_version != CRATE_VERSION
        {
            remove_file_best_effort(&path, "lookup.stale_version");
            return None;
        }

        if persisted.key_fingerprint != key_fingerprint {
            remove_file_best_effort(&path, "lookup.fingerprint_mismatch");
            return None;
        }

        // A fingerprint collision is a miss, but the file belongs to the other key.
        if persisted.key != key {
            return None;
        }

        if persisted.mtime != mtime {
            return None;
        }

        if now_millis().saturating_sub(persisted.saved_at_millis) > self.policy.ttl_millis {
            remove_file_best_effort(&path, "lookup.expired");
            return None;
        }

        Some(persisted.value)
    }

    pub fn store(&self, key: &str, mtime: u64, value: &V) -> Result<(), CacheError> {
        let key_fingerprint = Fingerprint::from_bytes(key.as_bytes());
        let path = self.entry_path(&key_fingerprint);
        let persisted = PersistedEntry {
            schema_version: CORRELATED_CACHE_SCHEMA_VERSION,
            crate_version: CRATE_VERSION,
            saved_at_millis: now_millis(),
            key,
            key_fingerprint,
            mtime,
            value,
        };

        let bytes = bincode_serialize(&persisted)?;
        atomic_write(&path, &bytes)?;
        self.maybe_gc();
        Ok(())
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(format!("{}.bin", fingerprint.as_str()))
    }

    fn maybe_gc(&self) {
        let now = now_millis();
        let last = self.last_gc_millis.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.policy.gc_interval_millis {
            return;
        }
        if self
            .last_gc_millis
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        if let Err(err) = self.gc() {
            tracing::debug!(target = "jsdbg.cache", error = %err, "cache gc failed");
        }
    }

    /// Drop expired, stale-version and unreadable entries, then evict the oldest
    /// entries until the directory fits `max_bytes`.
    pub fn gc(&self) -> Result<(), CacheError> {
        let now = now_millis();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut candidates = Vec::new();
        let mut total_bytes: u64 = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = std::fs::symlink_metadata(&path) else {
                continue;
            };
            if !meta.file_type().is_file() {
                continue;
            }

            if path.extension().and_then(|s| s.to_str()) != Some("bin") {
                if is_live_temp_file(&path, &meta, now) {
                    continue;
                }
                remove_file_best_effort(&path, "gc.unexpected_file");
                continue;
            }

            let Some(header) = read_entry_header(&path) else {
                remove_file_best_effort(&path, "gc.unreadable");
                continue;
            };

            let stale = header.schema_version != CORRELATED_CACHE_SCHEMA_VERSION
                || header.crate_version != CRATE_VERSION
                || path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| stem != header.key_fingerprint.as_str())
                || now.saturating_sub(header.saved_at_millis) > self.policy.ttl_millis;
            if stale {
                remove_file_best_effort(&path, "gc.stale");
                continue;
            }

            total_bytes = total_bytes.saturating_add(meta.len());
            candidates.push((header.saved_at_millis, meta.len(), path));
        }

        if total_bytes <= self.policy.max_bytes {
            return Ok(());
        }

        candidates.sort_by_key(|(saved_at, _, _)| *saved_at);
        for (_, len, path) in candidates {
            if total_bytes <= self.policy.max_bytes {
                break;
            }
            if remove_file_best_effort(&path, "gc.over_budget") {
                total_bytes = total_bytes.saturating_sub(len);
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct PersistedEntry<'a, V> {
    schema_version: u32,
    crate_version: &'a str,
    saved_at_millis: u64,
    key: &'a str,
    key_fingerprint: Fingerprint,
    mtime: u64,
    value: &'a V,
}

#[derive(Deserialize)]
struct PersistedEntryOwned<V> {
    schema_version: u32,
    crate_version: String,
    saved_at_millis: u64,
    key: String,
    key_fingerprint: Fingerprint,
    mtime: u64,
    value: V,
}

/// The leading fields of a persisted entry; the payload is left unread.
#[derive(Deserialize)]
struct PersistedEntryHeader {
    schema_version: u32,
    crate_version: String,
    saved_at_millis: u64,
    #[allow(dead_code)]
    key: String,
    key_fingerprint: Fingerprint,
}

fn is_live_temp_file(path: &Path, meta: &std::fs::Metadata, now: u64) -> bool {
    let is_temp = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(".bin.tmp."));
    if !is_temp {
        return false;
    }
    let modified = meta
        .modified()
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    now.saturating_sub(modified) < TEMP_FILE_GRACE_MILLIS
}

fn read_entry_header(path: &Path) -> Option<PersistedEntryHeader> {
    let bytes = read_file_limited(path)?;
    let mut cursor = Cursor::new(bytes);
    bincode_options().deserialize_from(&mut cursor).ok()
}
