use crate::error::CacheError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound for any cache payload read back from disk.
///
/// A corrupted length prefix must degrade to a cache miss, not a huge allocation.
pub const PAYLOAD_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Milliseconds since the epoch for a file's modification time, the unit cache
/// entries are correlated on.
pub fn mtime_millis(path: &Path) -> io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}

pub(crate) fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(PAYLOAD_LIMIT_BYTES as u64)
}

pub(crate) fn bincode_serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(bincode_options().serialize(value)?)
}

pub(crate) fn bincode_deserialize<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, CacheError> {
    Ok(bincode_options().deserialize(bytes)?)
}

pub(crate) fn read_file_limited(path: &Path) -> Option<Vec<u8>> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target = "jsdbg.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to stat cache file"
                );
            }
            return None;
        }
    };
    if meta.file_type().is_symlink() || !meta.is_file() || meta.len() > PAYLOAD_LIMIT_BYTES as u64
    {
        remove_file_best_effort(path, "read_file_limited.invalid");
        return None;
    }

    match fs::read(path) {
        Ok(bytes) if bytes.len() <= PAYLOAD_LIMIT_BYTES => Some(bytes),
        Ok(_) => {
            remove_file_best_effort(path, "read_file_limited.oversize");
            None
        }
        Err(err) => {
            tracing::debug!(
                target = "jsdbg.cache",
                path = %path.display(),
                error = %err,
                "failed to read cache file"
            );
            None
        }
    }
}

pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target = "jsdbg.cache",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove cache file"
            );
            false
        }
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` through a sibling temp file and a rename, so readers
/// only ever observe a complete entry. Concurrent writers race on the rename and
/// the last one wins.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(io::Error::other("path has no parent").into()),
    };
    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = open_unique_tmp_file(path, parent)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);
    if let Err(err) = written {
        remove_file_best_effort(&tmp_path, "atomic_write.write_failed");
        return Err(err.into());
    }

    if let Err(err) = rename_over(&tmp_path, path) {
        remove_file_best_effort(&tmp_path, "atomic_write.rename_failed");
        return Err(err.into());
    }
    Ok(())
}

fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    const MAX_RENAME_ATTEMPTS: usize = 64;
    let mut attempts = 0usize;
    loop {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            // `rename` does not replace an existing file on Windows.
            Err(err) if cfg!(windows) && to.exists() && attempts < MAX_RENAME_ATTEMPTS => {
                attempts += 1;
                match fs::remove_file(to) {
                    Ok(()) => {}
                    Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
                    Err(_) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
