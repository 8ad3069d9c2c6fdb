//! On-disk cache for work derived from compiled files.
//!
//! The breakpoint predictor re-reads every source map under a project's output
//! globs on each session. Most of those files are unchanged between runs, so the
//! result of parsing one (the list of sources it references) is persisted here,
//! keyed by the compiled file's path and correlated with its modification time.
//!
//! ## On-disk layout
//!
//! `<cache_dir>/<sha256(key)>.bin`, each a bincode-encoded entry carrying the
//! schema version, the writing crate's version, the key, the correlated mtime,
//! and the payload. Entries from other versions are deleted on sight.

mod correlated;
mod error;
mod fingerprint;
mod util;

pub use correlated::{CorrelatedCache, CorrelatedCachePolicy, CORRELATED_CACHE_SCHEMA_VERSION};
pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use util::{atomic_write, mtime_millis, now_millis, PAYLOAD_LIMIT_BYTES};
