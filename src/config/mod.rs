//! Cache configuration.
//!
//! Loaded from `~/.gencache/config.json` (camelCase keys, every field
//! optional) with `GENCACHE_*` environment variables layered on top.
//! A config is always validated before a cache can be built from it.

pub mod watcher;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::MatchingStrategy;
use crate::error::{CacheError, Result};

pub const ENV_MAX_SIZE: &str = "GENCACHE_MAX_SIZE";
pub const ENV_BASE_TTL_MS: &str = "GENCACHE_BASE_TTL_MS";
pub const ENV_SIMILARITY_THRESHOLD: &str = "GENCACHE_SIMILARITY_THRESHOLD";
pub const ENV_MATCHING_STRATEGY: &str = "GENCACHE_MATCHING_STRATEGY";
pub const ENV_ADAPTIVE_TTL: &str = "GENCACHE_ADAPTIVE_TTL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Maximum number of live entries. Must be > 0.
    pub max_size: usize,
    /// Base time-to-live in milliseconds. Must be > 0.
    pub base_ttl_ms: u64,
    /// Minimum similarity for a near-duplicate hit, in `[0, 1]`.
    pub similarity_threshold: f32,
    pub matching_strategy: MatchingStrategy,
    /// Scale TTL with access frequency.
    pub adaptive_ttl: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            base_ttl_ms: 3_600_000,
            similarity_threshold: 0.85,
            matching_strategy: MatchingStrategy::Token,
            adaptive_ttl: true,
        }
    }
}

impl CacheConfig {
    /// Base directory, `~/.gencache`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gencache")
    }

    /// Default config file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    pub fn base_ttl(&self) -> Duration {
        Duration::from_millis(self.base_ttl_ms)
    }

    /// Load from the default path, falling back to defaults when the file is absent.
    pub fn load() -> Result<Self> {
        Self::load_or_default(&Self::path())
    }

    /// [`load_from_path`](Self::load_from_path), or defaults plus environment
    /// overrides when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from_path(path);
        }
        debug!(path = %path.display(), "No cache config file, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path`, apply environment overrides and validate.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut config: Self = if data.trim().is_empty() {
            Self::default()
        } else {
            serde_json::from_str(&data)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GENCACHE_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment, in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MAX_SIZE) {
            self.max_size = parse_var(ENV_MAX_SIZE, &v)?;
        }
        if let Some(v) = lookup(ENV_BASE_TTL_MS) {
            self.base_ttl_ms = parse_var(ENV_BASE_TTL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_SIMILARITY_THRESHOLD) {
            self.similarity_threshold = parse_var(ENV_SIMILARITY_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_MATCHING_STRATEGY) {
            self.matching_strategy = v
                .parse()
                .map_err(|e| CacheError::Config(format!("{}: {}", ENV_MATCHING_STRATEGY, e)))?;
        }
        if let Some(v) = lookup(ENV_ADAPTIVE_TTL) {
            self.adaptive_ttl = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(CacheError::Config(format!(
                        "{}: expected a boolean, got '{}'",
                        ENV_ADAPTIVE_TTL, other
                    )))
                }
            };
        }
        Ok(())
    }

    /// Reject configurations the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::Config("maxSize must be greater than 0".into()));
        }
        if self.base_ttl_ms == 0 {
            return Err(CacheError::Config("baseTtlMs must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CacheError::Config(format!(
                "similarityThreshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| CacheError::Config(format!("{}: invalid value '{}': {}", name, raw, e)))
}
