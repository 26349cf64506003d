//! gencache: the response cache in front of LLM test-generation calls.
//!
//! A [`ResponseCache`] answers "has this (provider, model, prompt) been
//! generated before?" with an exact-key lookup, falling back to a
//! near-duplicate search within the same scope. Entries are bounded by an
//! LRU policy and expire on an access-frequency-adaptive TTL.
//!
//! # Example
//!
//! ```rust
//! use gencache::{CacheConfig, ResponseCache, Scope};
//!
//! # tokio_test::block_on(async {
//! let cache = ResponseCache::new(CacheConfig::default()).unwrap();
//! let scope = Scope::new("openai", "gpt-4o");
//!
//! if cache.get("write tests for add()", &scope).await.is_none() {
//!     let generated = "#[test] fn adds() { assert_eq!(add(1, 2), 3); }";
//!     cache.set("write tests for add()", generated, &scope, None).await;
//! }
//! assert!(cache.get("write tests for add()", &scope).await.is_some());
//! # });
//! ```

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{
    CacheStats, CachedResponse, Embedder, ImportOptions, ImportReport, MatchKind,
    MatchingStrategy, Provider, ResponseCache, Scope, Snapshot, SnapshotStore, Usage,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
