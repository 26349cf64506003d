//! LLM response caching with similarity fallback, adaptive TTL, LRU eviction,
//! and JSON snapshot persistence.

pub mod clock;
pub mod embedder;
pub mod entry;
pub mod key;
pub mod persistence;
pub mod recency;
pub mod response_cache;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use embedder::Embedder;
pub use entry::{CacheEntry, Usage};
pub use key::{derive_key, Provider, Scope};
pub use persistence::{
    ImportOptions, ImportReport, LoadOutcome, Snapshot, SnapshotStats, SnapshotStore,
};
pub use response_cache::{CachedResponse, MatchKind, ResponseCache};
pub use similarity::MatchingStrategy;
pub use stats::CacheStats;
pub use ttl::TtlPolicy;
