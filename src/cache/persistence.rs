//! Snapshot export/import and the JSON file store behind it.
//!
//! Wire format:
//!
//! ```json
//! {
//!   "entries": [["<key>", {"prompt": "...", "response": "...", "provider": "openai",
//!                          "model": "gpt-4o", "createdAt": 0, "accessCount": 1,
//!                          "lastAccessedAt": 0}]],
//!   "stats": {"hits": 0, "misses": 0}
//! }
//! ```
//!
//! Loading distinguishes a missing (or empty) file from a malformed one
//! instead of collapsing both into "start empty".

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::entry::CacheEntry;
use super::key::derive_key;
use crate::error::{CacheError, Result};

/// Aggregate counters carried by a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub hits: u64,
    pub misses: u64,
}

/// Serializable copy of a cache's entries and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// `(key, entry)` pairs, least recently used first.
    pub entries: Vec<(String, CacheEntry)>,
    #[serde(default)]
    pub stats: SnapshotStats,
}

/// Options for [`ResponseCache::import`](super::ResponseCache::import).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Overwrite this cache's hit/miss counters with the snapshot's.
    pub restore_counters: bool,
}

/// What an import did with each snapshot entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Entries from the snapshot still resident once the import finished.
    pub imported: usize,
    /// Entries installed and then pushed out by later entries of the same
    /// snapshot because it held more than `maxSize` live entries.
    pub evicted: usize,
    /// Well-formed entries already past their TTL.
    pub expired: usize,
    /// Entries that failed to parse or validate.
    pub malformed: usize,
}

/// Entries and counters recovered from a raw snapshot document.
#[derive(Debug, Default)]
pub(crate) struct ParsedSnapshot {
    pub entries: Vec<CacheEntry>,
    pub malformed: usize,
    pub stats: Option<SnapshotStats>,
}

/// Parse `doc` entry by entry, skipping anything malformed.
///
/// An entry is malformed when it is not a `[key, entry]` pair, misses a
/// required field, has `accessCount == 0`, or its key does not match the key
/// derived from its own scope and prompt.
pub(crate) fn parse_snapshot(doc: &Value) -> ParsedSnapshot {
    let Some(items) = doc.get("entries").and_then(Value::as_array) else {
        debug!("Snapshot has no entries array");
        return ParsedSnapshot {
            malformed: 1,
            ..ParsedSnapshot::default()
        };
    };

    let mut parsed = ParsedSnapshot {
        entries: Vec::with_capacity(items.len()),
        stats: doc
            .get("stats")
            .and_then(|s| serde_json::from_value::<SnapshotStats>(s.clone()).ok()),
        ..ParsedSnapshot::default()
    };

    for item in items {
        match parse_entry(item) {
            Ok(entry) => parsed.entries.push(entry),
            Err(reason) => {
                debug!(reason = %reason, "Skipping malformed snapshot entry");
                parsed.malformed += 1;
            }
        }
    }
    parsed
}

impl ParsedSnapshot {
    /// Validate an in-memory snapshot with the same rules as a parsed document.
    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut parsed = ParsedSnapshot {
            entries: Vec::with_capacity(snapshot.entries.len()),
            stats: Some(snapshot.stats),
            ..ParsedSnapshot::default()
        };
        for (key, entry) in snapshot.entries {
            match validate_entry(key, entry) {
                Ok(entry) => parsed.entries.push(entry),
                Err(reason) => {
                    debug!(reason = %reason, "Skipping invalid snapshot entry");
                    parsed.malformed += 1;
                }
            }
        }
        parsed
    }
}

fn parse_entry(item: &Value) -> std::result::Result<CacheEntry, String> {
    let (key, entry): (String, CacheEntry) =
        serde_json::from_value(item.clone()).map_err(|e| e.to_string())?;
    validate_entry(key, entry)
}

fn validate_entry(key: String, mut entry: CacheEntry) -> std::result::Result<CacheEntry, String> {
    if entry.access_count == 0 {
        return Err("accessCount must be >= 1".into());
    }
    let scope = entry.scope();
    if derive_key(&scope, &entry.prompt) != key {
        return Err("key does not match scope and prompt".into());
    }
    entry.provider = scope.provider().clone();
    entry.model = scope.model().to_string();
    entry.key = key;
    Ok(entry)
}

/// Result of reading the snapshot file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// No file yet, or an empty one.
    Missing,
    /// The file exists but could not be read.
    Unreadable(String),
    /// The file is not a JSON object.
    Malformed(String),
    Loaded(Value),
}

/// JSON file holding a single [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.gencache/cache/responses.json`.
    pub fn default_location() -> Self {
        Self::new(crate::config::CacheConfig::dir().join("cache").join("responses.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> LoadOutcome {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
            Err(e) => return LoadOutcome::Unreadable(e.to_string()),
        };
        if data.trim().is_empty() {
            return LoadOutcome::Missing;
        }
        match serde_json::from_str::<Value>(&data) {
            Ok(value @ Value::Object(_)) => LoadOutcome::Loaded(value),
            Ok(_) => LoadOutcome::Malformed("snapshot root is not an object".into()),
            Err(e) => LoadOutcome::Malformed(e.to_string()),
        }
    }

    /// Write `snapshot` atomically (temp file in the same directory, then rename).
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, snapshot)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| {
            CacheError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}
