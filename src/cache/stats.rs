//! Hit/miss accounting.

use serde::{Deserialize, Serialize};

/// Running counters for one cache instance.
///
/// The only hit mutators are [`record_exact_hit`](Self::record_exact_hit) and
/// [`record_similarity_hit`](Self::record_similarity_hit); each bumps exactly
/// one sub-counter together with `hits`, so `exact_hits + similarity_hits ==
/// hits` always holds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsTracker {
    hits: u64,
    misses: u64,
    exact_hits: u64,
    similarity_hits: u64,
    evictions: u64,
    expirations: u64,
}

impl StatsTracker {
    pub fn record_exact_hit(&mut self) {
        self.hits += 1;
        self.exact_hits += 1;
    }

    pub fn record_similarity_hit(&mut self) {
        self.hits += 1;
        self.similarity_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    /// Overwrite the aggregate counters from a persisted snapshot.
    ///
    /// Historical snapshots only carry `hits`/`misses`, so restored hits are
    /// attributed to the exact path to keep the sub-counters summing up.
    pub fn restore(&mut self, hits: u64, misses: u64) {
        *self = Self {
            hits,
            misses,
            exact_hits: hits,
            ..Self::default()
        };
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self, entries: usize, max_size: usize) -> CacheStats {
        CacheStats {
            entries,
            max_size,
            hits: self.hits,
            misses: self.misses,
            exact_hits: self.exact_hits,
            similarity_hits: self.similarity_hits,
            evictions: self.evictions,
            expirations: self.expirations,
            hit_rate: self.hit_rate(),
        }
    }
}

/// Point-in-time statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries currently stored.
    pub entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub exact_hits: u64,
    pub similarity_hits: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Entries dropped because their TTL ran out.
    pub expirations: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_zero_without_lookups() {
        let stats = StatsTracker::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_counters_stay_consistent() {
        let mut stats = StatsTracker::default();
        stats.record_exact_hit();
        stats.record_exact_hit();
        stats.record_similarity_hit();
        stats.record_miss();
        let snap = stats.snapshot(3, 10);
        assert_eq!(snap.hits, 3);
        assert_eq!(snap.exact_hits + snap.similarity_hits, snap.hits);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate - 0.75).abs() < 1e-9);
        assert_eq!(snap.entries, 3);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut stats = StatsTracker::default();
        stats.record_similarity_hit();
        stats.record_miss();
        stats.record_evictions(2);
        stats.record_expiration();
        stats.reset();
        assert_eq!(stats, StatsTracker::default());
    }

    #[test]
    fn test_restore_keeps_sum_invariant() {
        let mut stats = StatsTracker::default();
        stats.record_similarity_hit();
        stats.restore(7, 3);
        let snap = stats.snapshot(0, 1);
        assert_eq!(snap.hits, 7);
        assert_eq!(snap.misses, 3);
        assert_eq!(snap.exact_hits + snap.similarity_hits, 7);
        assert!((snap.hit_rate - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(StatsTracker::default().snapshot(0, 5)).unwrap();
        assert_eq!(json["maxSize"], 5);
        assert_eq!(json["similarityHits"], 0);
        assert_eq!(json["hitRate"], 0.0);
    }
}
