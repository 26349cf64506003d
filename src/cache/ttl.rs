//! Access-frequency-adaptive expiration.
//!
//! Frequently read entries live longer:
//!
//! | access count | multiplier |
//! |---|---|
//! | >= 10 | 2.0 |
//! | 5..=9 | 1.5 |
//! | 2..=4 | 1.0 |
//! | 0..=1 | 0.5 |
//!
//! Expiry is evaluated lazily whenever an entry is looked at; nothing sweeps
//! in the background.

use std::time::Duration;

use super::entry::CacheEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    base_ttl: Duration,
    adaptive: bool,
}

impl TtlPolicy {
    pub fn new(base_ttl: Duration, adaptive: bool) -> Self {
        Self { base_ttl, adaptive }
    }

    pub fn base_ttl(&self) -> Duration {
        self.base_ttl
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Effective lifetime for an entry read `access_count` times.
    pub fn effective_ttl(&self, access_count: u32) -> Duration {
        if self.adaptive {
            adaptive_ttl(access_count, self.base_ttl)
        } else {
            self.base_ttl
        }
    }

    /// `true` once the entry's age exceeds its effective TTL.
    ///
    /// A creation time in the future (clock skew after import) counts as age 0.
    pub fn is_expired(&self, entry: &CacheEntry, now_millis: u64) -> bool {
        let age = now_millis.saturating_sub(entry.created_at);
        u128::from(age) > self.effective_ttl(entry.access_count).as_millis()
    }
}

/// Tiered multiplier on `base_ttl`.
pub fn adaptive_ttl(access_count: u32, base_ttl: Duration) -> Duration {
    match access_count {
        10.. => base_ttl.saturating_mul(2),
        5..=9 => base_ttl.saturating_mul(3) / 2,
        2..=4 => base_ttl,
        _ => base_ttl / 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::Scope;

    fn entry_with(access_count: u32) -> CacheEntry {
        let mut e = CacheEntry::new(
            "k".into(),
            &Scope::new("openai", "m"),
            "p".into(),
            "r".into(),
            None,
            None,
            0,
        );
        e.access_count = access_count;
        e
    }

    #[test]
    fn test_tiers() {
        let base = Duration::from_millis(1000);
        assert_eq!(adaptive_ttl(0, base), Duration::from_millis(500));
        assert_eq!(adaptive_ttl(1, base), Duration::from_millis(500));
        assert_eq!(adaptive_ttl(2, base), Duration::from_millis(1000));
        assert_eq!(adaptive_ttl(4, base), Duration::from_millis(1000));
        assert_eq!(adaptive_ttl(5, base), Duration::from_millis(1500));
        assert_eq!(adaptive_ttl(9, base), Duration::from_millis(1500));
        assert_eq!(adaptive_ttl(10, base), Duration::from_millis(2000));
        assert_eq!(adaptive_ttl(u32::MAX, base), Duration::from_millis(2000));
    }

    #[test]
    fn test_hot_entry_lives_double() {
        let policy = TtlPolicy::new(Duration::from_millis(1000), true);
        let hot = entry_with(11);
        assert!(!policy.is_expired(&hot, 1900));
        assert!(!policy.is_expired(&hot, 2000));
        assert!(policy.is_expired(&hot, 2100));
    }

    #[test]
    fn test_cold_entry_lives_half() {
        let policy = TtlPolicy::new(Duration::from_millis(1000), true);
        let cold = entry_with(1);
        assert!(!policy.is_expired(&cold, 400));
        assert!(policy.is_expired(&cold, 600));
    }

    #[test]
    fn test_non_adaptive_uses_base() {
        let policy = TtlPolicy::new(Duration::from_millis(1000), false);
        assert!(!policy.is_expired(&entry_with(1), 900));
        assert!(policy.is_expired(&entry_with(50), 1100));
    }

    #[test]
    fn test_future_created_at_is_fresh() {
        let policy = TtlPolicy::new(Duration::from_millis(10), true);
        let mut e = entry_with(1);
        e.created_at = 5_000;
        assert!(!policy.is_expired(&e, 1_000));
    }
}
