//! Error types for the response cache.

use thiserror::Error;

/// Errors surfaced by the cache and its collaborators.
///
/// Only `Config` is fatal to callers. Persistence and embedding failures are
/// logged and recovered inside the cache; they are returned only from the
/// gateway and embedder APIs themselves.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid configuration (e.g. `max_size == 0`, threshold outside `[0, 1]`).
    #[error("Config error: {0}")]
    Config(String),

    /// Snapshot could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The embedding provider failed to produce vectors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = CacheError::Config("max_size must be > 0".into());
        assert_eq!(err.to_string(), "Config error: max_size must be > 0");
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CacheError = parse.unwrap_err().into();
        assert!(matches!(err, CacheError::Json(_)));
    }
}
