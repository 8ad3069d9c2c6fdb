use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use jsdbg_cdp::{BreakpointId, DebuggerApi, SetBreakpointByUrl};
use jsdbg_sourcemap::url::canonicalize_url;
use regex::Regex;
use tokio::sync::Mutex;

use super::pattern::entry_breakpoint_pattern;
use crate::error::{BreakpointError, Result};

/// One installed entry breakpoint and the requested files still waiting on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryBreakpointRecord {
    pub url_regex: String,
    pub breakpoint_id: BreakpointId,
    pub pending: BTreeSet<String>,
}

/// Records live in an arena; the three lookup directions are derived indices
/// into it and are only ever updated together.
#[derive(Debug, Default)]
struct RegistryState {
    records: Vec<Option<EntryBreakpointRecord>>,
    free: Vec<usize>,
    by_file: HashMap<String, usize>,
    by_breakpoint: HashMap<BreakpointId, usize>,
    by_regex: HashMap<String, usize>,
    /// Compiled `url_regex` per live slot.
    matchers: HashMap<usize, Regex>,
}

impl RegistryState {
    fn insert(&mut self, record: EntryBreakpointRecord, matcher: Regex) -> usize {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.records[slot] = Some(record);
                slot
            }
            None => {
                self.records.push(Some(record));
                self.records.len() - 1
            }
        };
        if let Some(record) = &self.records[slot] {
            self.by_breakpoint.insert(record.breakpoint_id.clone(), slot);
            self.by_regex.insert(record.url_regex.clone(), slot);
            for file in &record.pending {
                self.by_file.insert(file.clone(), slot);
            }
        }
        self.matchers.insert(slot, matcher);
        slot
    }

    fn record_mut(&mut self, slot: usize) -> Option<&mut EntryBreakpointRecord> {
        self.records.get_mut(slot)?.as_mut()
    }

    fn add_pending(&mut self, slot: usize, file: String) {
        if let Some(record) = self.record_mut(slot) {
            record.pending.insert(file.clone());
            self.by_file.insert(file, slot);
        }
    }

    /// Drop `file` from the record at `slot`. Returns the record if that emptied it,
    /// in which case it is also gone from every index.
    fn remove_pending(&mut self, slot: usize, file: &str) -> Option<EntryBreakpointRecord> {
        let record = self.record_mut(slot)?;
        if !record.pending.remove(file) {
            return None;
        }
        let emptied = record.pending.is_empty();
        self.by_file.remove(file);
        if !emptied {
            return None;
        }

        let record = self.records.get_mut(slot)?.take()?;
        self.by_breakpoint.remove(&record.breakpoint_id);
        self.by_regex.remove(&record.url_regex);
        self.matchers.remove(&slot);
        self.free.push(slot);
        Some(record)
    }
}

/// Entry breakpoints installed for the regex break-on-load strategy, one per
/// distinct filename pattern.
///
/// The engine-side breakpoint exists exactly while its record has pending
/// files. Owned by a single target.
pub struct EntryBreakpointRegistry {
    cdp: Arc<dyn DebuggerApi>,
    state: Mutex<RegistryState>,
}

impl EntryBreakpointRegistry {
    pub fn new(cdp: Arc<dyn DebuggerApi>) -> Self {
        Self {
            cdp,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Guard `source_url` with an entry breakpoint, reusing the one for its
    /// pattern if present. Idempotent per file.
    ///
    /// Installation failures are logged and leave the registry unchanged.
    pub async fn add(&self, source_url: &str) -> Option<BreakpointId> {
        let file = canonicalize_url(source_url);
        // Held across the engine call so two requests for one pattern install once.
        let mut state = self.state.lock().await;

        if let Some(&slot) = state.by_file.get(&file) {
            return state.records[slot]
                .as_ref()
                .map(|record| record.breakpoint_id.clone());
        }

        let url_regex = entry_breakpoint_pattern(&file);
        if let Some(&slot) = state.by_regex.get(&url_regex) {
            state.add_pending(slot, file);
            return state.records[slot]
                .as_ref()
                .map(|record| record.breakpoint_id.clone());
        }

        let matcher = match Regex::new(&url_regex) {
            Ok(matcher) => matcher,
            Err(err) => {
                tracing::warn!(
                    target = "jsdbg.break_on_load",
                    file = %file,
                    url_regex = %url_regex,
                    error = %err,
                    "entry breakpoint pattern does not compile"
                );
                return None;
            }
        };

        let breakpoint_id = match self.install(&url_regex).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(
                    target = "jsdbg.break_on_load",
                    file = %file,
                    url_regex = %url_regex,
                    error = %err,
                    "failed to set entry breakpoint"
                );
                return None;
            }
        };

        tracing::debug!(
            target = "jsdbg.break_on_load",
            file = %file,
            url_regex = %url_regex,
            breakpoint = %breakpoint_id,
            "entry breakpoint installed"
        );
        state.insert(
            EntryBreakpointRecord {
                url_regex,
                breakpoint_id: breakpoint_id.clone(),
                pending: BTreeSet::from([file]),
            },
            matcher,
        );
        Some(breakpoint_id)
    }

    async fn install(&self, url_regex: &str) -> Result<BreakpointId> {
        self.cdp
            .set_breakpoint_by_url(SetBreakpointByUrl::at_entry(url_regex))
            .await?
            .ok_or_else(|| BreakpointError::MissingBreakpointId {
                url_regex: url_regex.to_string(),
            })
    }

    /// Record that the entry breakpoint `id` fired for `matched_url`.
    ///
    /// Returns `true` if `matched_url` was pending on it. When that leaves no
    /// pending files, the record is dropped and the engine breakpoint removed.
    /// Unknown ids and files are ignored.
    pub async fn resolve_hit(&self, id: &BreakpointId, matched_url: &str) -> bool {
        let file = canonicalize_url(matched_url);
        let emptied = {
            let mut state = self.state.lock().await;
            let Some(&slot) = state.by_breakpoint.get(id) else {
                return false;
            };
            let was_pending = state.records[slot]
                .as_ref()
                .is_some_and(|record| record.pending.contains(&file));
            if !was_pending {
                return false;
            }
            state.remove_pending(slot, &file)
        };

        match emptied {
            Some(record) => {
                tracing::debug!(
                    target = "jsdbg.break_on_load",
                    breakpoint = %record.breakpoint_id,
                    file = %file,
                    "last pending file seen, removing entry breakpoint"
                );
                if let Err(err) = self.cdp.remove_breakpoint(&record.breakpoint_id).await {
                    tracing::warn!(
                        target = "jsdbg.break_on_load",
                        breakpoint = %record.breakpoint_id,
                        error = %err,
                        "failed to remove entry breakpoint"
                    );
                }
            }
            None => {
                tracing::trace!(
                    target = "jsdbg.break_on_load",
                    breakpoint = %id,
                    file = %file,
                    "entry breakpoint still guards other files"
                );
            }
        }
        true
    }

    /// Whether `id` is one of this registry's entry breakpoints.
    pub async fn contains_breakpoint(&self, id: &BreakpointId) -> bool {
        self.state.lock().await.by_breakpoint.contains_key(id)
    }

    /// Whether `source_path` still waits on an entry breakpoint.
    pub async fn has_pending(&self, source_path: &str) -> bool {
        self.state
            .lock()
            .await
            .by_file
            .contains_key(&canonicalize_url(source_path))
    }

    /// Whether loading the script at `script_url` will hit one of the installed
    /// entry breakpoints. Checked against the raw URL the engine matches and
    /// its canonical form.
    pub async fn will_pause_for(&self, script_url: &str) -> bool {
        let canonical = canonicalize_url(script_url);
        let state = self.state.lock().await;
        state
            .matchers
            .values()
            .any(|matcher| matcher.is_match(script_url) || matcher.is_match(&canonical))
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.by_breakpoint.is_empty()
    }

    /// Live records, ordered by pattern.
    pub async fn records(&self) -> Vec<EntryBreakpointRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state.records.iter().flatten().cloned().collect();
        records.sort_by(|a, b| a.url_regex.cmp(&b.url_regex));
        records
    }

    /// Sizes of the file, breakpoint and regex indices.
    pub async fn index_sizes(&self) -> (usize, usize, usize) {
        let state = self.state.lock().await;
        (
            state.by_file.len(),
            state.by_breakpoint.len(),
            state.by_regex.len(),
        )
    }
}
