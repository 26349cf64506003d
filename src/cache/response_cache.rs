//! LLM response cache with exact and similarity lookup, adaptive TTL and LRU eviction.
//!
//! One [`ResponseCache`] is built by the host and shared (by reference or
//! `Arc`) with the generation pipeline. Every structural change, including
//! the recency touch done by [`get`](ResponseCache::get), happens under a
//! single mutex. Embedding calls and file I/O run with the lock released.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::embedder::{embed_one, Embedder};
use super::entry::{CacheEntry, Usage};
use super::key::{derive_key, short_key, Scope};
use super::persistence::{
    parse_snapshot, ImportOptions, ImportReport, LoadOutcome, ParsedSnapshot, Snapshot,
    SnapshotStats, SnapshotStore,
};
use super::similarity::{MatchQuery, MatchingStrategy, SimilarityMatcher};
use super::stats::{CacheStats, StatsTracker};
use super::store::EntryStore;
use super::ttl::TtlPolicy;
use crate::config::CacheConfig;
use crate::error::Result;

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    /// Near-duplicate prompt in the same scope.
    Similarity { score: f32 },
}

/// A response served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// Key of the entry that served the hit (the stored prompt's key on a similarity hit).
    pub key: String,
    pub response: String,
    pub usage: Option<Usage>,
    pub match_kind: MatchKind,
}

impl CachedResponse {
    fn from_entry(entry: &CacheEntry, match_kind: MatchKind) -> Self {
        Self {
            key: entry.key.clone(),
            response: entry.response.clone(),
            usage: entry.usage,
            match_kind,
        }
    }
}

struct CacheState {
    store: EntryStore,
    ttl: TtlPolicy,
    matcher: SimilarityMatcher,
    stats: StatsTracker,
}

impl CacheState {
    fn from_config(config: &CacheConfig) -> Self {
        Self {
            store: EntryStore::new(config.max_size),
            ttl: TtlPolicy::new(config.base_ttl(), config.adaptive_ttl),
            matcher: SimilarityMatcher::new(config.matching_strategy, config.similarity_threshold),
            stats: StatsTracker::default(),
        }
    }

    /// Exact-key lookup. An expired entry is removed and reported as absent.
    fn exact_hit(&mut self, key: &str, now: u64) -> Option<CachedResponse> {
        let expired = self.store.get(key).map(|e| self.ttl.is_expired(e, now))?;
        if expired {
            debug!(key = %short_key(key), "Cache entry expired, removing");
            self.store.remove(key);
            self.stats.record_expiration();
            return None;
        }
        let entry = self.store.touch(key, now)?;
        let hit = CachedResponse::from_entry(entry, MatchKind::Exact);
        self.stats.record_exact_hit();
        debug!(key = %short_key(key), "Exact cache hit");
        Some(hit)
    }

    /// Similarity fallback; records the miss when nothing clears the threshold.
    fn similar_hit_or_miss(
        &mut self,
        query: &MatchQuery,
        scope: &Scope,
        now: u64,
    ) -> Option<CachedResponse> {
        let found = self
            .matcher
            .find_best_match(&self.store, query, scope, &self.ttl, now);
        if let Some(found) = found {
            if let Some(entry) = self.store.touch(&found.key, now) {
                let hit = CachedResponse::from_entry(
                    entry,
                    MatchKind::Similarity { score: found.score },
                );
                self.stats.record_similarity_hit();
                debug!(key = %short_key(&found.key), score = found.score, "Similarity cache hit");
                return Some(hit);
            }
        }
        self.stats.record_miss();
        debug!(scope = %scope, "Cache miss");
        None
    }

    fn install(&mut self, entry: CacheEntry) {
        if self.store.put(entry).is_some() {
            self.stats.record_evictions(1);
        }
    }
}

/// LLM response cache.
pub struct ResponseCache {
    state: Mutex<CacheState>,
    clock: Arc<dyn Clock>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl ResponseCache {
    /// Build a cache from a validated config, using the system clock and no embedder.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(CacheState::from_config(&config)),
            clock: Arc::new(SystemClock),
            embedder: None,
        })
    }

    /// Replace the clock (tests and simulations).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an embedding provider for the vector strategy.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Look up a cached response for `prompt` in `scope`.
    ///
    /// Tries the exact key first, then (unless the strategy is `exact`) the
    /// best near-duplicate in the same scope. A similarity hit does not
    /// create an entry for the querying prompt.
    pub async fn get(&self, prompt: &str, scope: &Scope) -> Option<CachedResponse> {
        let key = derive_key(scope, prompt);
        let embedder = {
            let mut state = self.lock_state();
            let now = self.clock.now_millis();
            if let Some(hit) = state.exact_hit(&key, now) {
                return Some(hit);
            }
            match self.query_embedder(state.matcher.strategy()) {
                Some(embedder) => embedder,
                None => {
                    let query = MatchQuery::new(prompt, None);
                    return state.similar_hit_or_miss(&query, scope, now);
                }
            }
        };

        let embedding = embed_one(embedder.as_ref(), prompt).await;
        let query = MatchQuery::new(prompt, embedding);

        let mut state = self.lock_state();
        let now = self.clock.now_millis();
        // The key may have been written while the lock was released.
        if let Some(hit) = state.exact_hit(&key, now) {
            return Some(hit);
        }
        state.similar_hit_or_miss(&query, scope, now)
    }

    /// Store `response` for `prompt` in `scope`.
    ///
    /// Overwrites any entry with the same key and resets its access count to 1.
    /// With the vector strategy the prompt is embedded first; if that fails
    /// the entry is stored without an embedding.
    pub async fn set(&self, prompt: &str, response: &str, scope: &Scope, usage: Option<Usage>) {
        let key = derive_key(scope, prompt);
        let strategy = self.lock_state().matcher.strategy();
        let embedding = match self.query_embedder(strategy) {
            Some(embedder) => embed_one(embedder.as_ref(), prompt).await,
            None => None,
        };

        let mut state = self.lock_state();
        let now = self.clock.now_millis();
        debug!(key = %short_key(&key), scope = %scope, "Caching response");
        state.install(CacheEntry::new(
            key,
            scope,
            prompt.to_string(),
            response.to_string(),
            usage,
            embedding,
            now,
        ));
    }

    /// `true` if a live entry exists for `prompt` in `scope`. Does not count
    /// as an access and does not touch statistics.
    pub fn contains(&self, prompt: &str, scope: &Scope) -> bool {
        let key = derive_key(scope, prompt);
        let state = self.lock_state();
        let now = self.clock.now_millis();
        state
            .store
            .get(&key)
            .is_some_and(|e| !state.ttl.is_expired(e, now))
    }

    /// Drop the entry for `prompt` in `scope`. Returns whether one existed.
    pub fn remove(&self, prompt: &str, scope: &Scope) -> bool {
        let key = derive_key(scope, prompt);
        self.lock_state().store.remove(&key).is_some()
    }

    /// Remove every expired entry now instead of waiting for lookups to find them.
    pub fn prune_expired(&self) -> usize {
        let mut state = self.lock_state();
        let now = self.clock.now_millis();
        let expired: Vec<String> = state
            .store
            .iter_recent()
            .filter(|e| state.ttl.is_expired(e, now))
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            state.store.remove(key);
            state.stats.record_expiration();
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Pruned expired cache entries");
        }
        expired.len()
    }

    /// Remove all entries. Statistics are kept.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        let count = state.store.len();
        state.store.clear();
        info!(count, "Cleared response cache");
    }

    pub fn len(&self) -> usize {
        self.lock_state().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        state
            .stats
            .snapshot(state.store.len(), state.store.max_size())
    }

    /// Zero all counters without touching entries.
    pub fn reset_stats(&self) {
        self.lock_state().stats.reset();
    }

    /// Current effective configuration.
    pub fn config(&self) -> CacheConfig {
        let state = self.lock_state();
        CacheConfig {
            max_size: state.store.max_size(),
            base_ttl_ms: state.ttl.base_ttl().as_millis() as u64,
            similarity_threshold: state.matcher.threshold(),
            matching_strategy: state.matcher.strategy(),
            adaptive_ttl: state.ttl.is_adaptive(),
        }
    }

    /// Apply a new configuration to the running cache.
    ///
    /// Shrinking `max_size` evicts least recently used entries until the new
    /// bound holds. Entries and counters are otherwise kept.
    pub fn reconfigure(&self, config: CacheConfig) -> Result<()> {
        config.validate()?;
        let mut state = self.lock_state();
        state.ttl = TtlPolicy::new(config.base_ttl(), config.adaptive_ttl);
        state.matcher = SimilarityMatcher::new(config.matching_strategy, config.similarity_threshold);
        let evicted = state.store.set_max_size(config.max_size).len();
        state.stats.record_evictions(evicted);
        info!(
            max_size = config.max_size,
            base_ttl_ms = config.base_ttl_ms,
            strategy = ?config.matching_strategy,
            evicted,
            "Response cache reconfigured"
        );
        Ok(())
    }

    /// Copy entries (least recently used first) and hit/miss counters.
    ///
    /// Expired entries are included as-is; [`import`](Self::import) filters them.
    pub fn export(&self) -> Snapshot {
        let state = self.lock_state();
        Snapshot {
            entries: state
                .store
                .iter_oldest_first()
                .map(|e| (e.key.clone(), e.clone()))
                .collect(),
            stats: SnapshotStats {
                hits: state.stats.hits(),
                misses: state.stats.misses(),
            },
        }
    }

    /// Insert the live, well-formed entries of a raw snapshot document.
    ///
    /// Malformed entries are skipped one by one; entries already expired
    /// under the current policy and clock are dropped. Counters are left
    /// alone unless `options.restore_counters` is set.
    pub fn import(&self, doc: &Value, options: ImportOptions) -> ImportReport {
        self.import_parsed(parse_snapshot(doc), options)
    }

    /// [`import`](Self::import) for an in-memory snapshot.
    pub fn import_snapshot(&self, snapshot: Snapshot, options: ImportOptions) -> ImportReport {
        self.import_parsed(ParsedSnapshot::from_snapshot(snapshot), options)
    }

    fn import_parsed(&self, parsed: ParsedSnapshot, options: ImportOptions) -> ImportReport {
        let mut report = ImportReport {
            malformed: parsed.malformed,
            ..ImportReport::default()
        };
        let mut state = self.lock_state();
        let now = self.clock.now_millis();
        let mut installed = HashSet::with_capacity(parsed.entries.len());
        for entry in parsed.entries {
            if state.ttl.is_expired(&entry, now) {
                report.expired += 1;
                continue;
            }
            installed.insert(entry.key.clone());
            state.install(entry);
        }
        report.imported = installed
            .iter()
            .filter(|key| state.store.contains(key.as_str()))
            .count();
        report.evicted = installed.len() - report.imported;
        if options.restore_counters {
            if let Some(stats) = parsed.stats {
                state.stats.restore(stats.hits, stats.misses);
            }
        }
        info!(
            imported = report.imported,
            evicted = report.evicted,
            expired = report.expired,
            malformed = report.malformed,
            "Imported response cache snapshot"
        );
        report
    }

    /// Load `store` into this cache.
    ///
    /// A missing file is normal; an unreadable or malformed one is logged and
    /// leaves the cache as it was.
    pub fn restore_from(&self, store: &SnapshotStore) -> ImportReport {
        match store.load() {
            LoadOutcome::Missing => {
                debug!(path = %store.path().display(), "No response cache snapshot yet");
                ImportReport::default()
            }
            LoadOutcome::Unreadable(e) => {
                warn!("Failed to read response cache, starting empty: {}", e);
                ImportReport::default()
            }
            LoadOutcome::Malformed(e) => {
                warn!("Response cache file is corrupt, starting empty: {}", e);
                ImportReport::default()
            }
            LoadOutcome::Loaded(doc) => self.import(&doc, ImportOptions::default()),
        }
    }

    /// Write a snapshot to `store` without holding the cache lock.
    ///
    /// Best-effort: failures are logged and reported as `false`, never as errors.
    pub async fn persist_to(&self, store: &SnapshotStore) -> bool {
        let snapshot = self.export();
        let store = store.clone();
        let path = store.path().to_path_buf();
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {
                debug!(path = %path.display(), "Saved response cache snapshot");
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to save response cache: {}", e);
                false
            }
            Err(e) => {
                warn!("Response cache save task failed: {}", e);
                false
            }
        }
    }

    fn query_embedder(&self, strategy: MatchingStrategy) -> Option<Arc<dyn Embedder>> {
        match strategy {
            MatchingStrategy::Vector => self.embedder.clone(),
            _ => None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        };
        let mut out = f.debug_struct("ResponseCache");
        match &state {
            Some(state) => out
                .field("entries", &state.store.len())
                .field("max_size", &state.store.max_size())
                .field("strategy", &state.matcher.strategy()),
            None => out.field("state", &format_args!("<locked>")),
        };
        out.field("embedder", &self.embedder.is_some()).finish()
    }
}
