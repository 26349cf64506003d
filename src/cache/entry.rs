//! Cached entry records.

use serde::{Deserialize, Serialize};

use super::key::{Provider, Scope};

/// Token usage reported by the provider for a cached response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single cached LLM response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Derived key, unique within the store.
    #[serde(skip)]
    pub key: String,
    pub prompt: String,
    pub response: String,
    pub provider: Provider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Prompt embedding, absent when the vector strategy is off or embedding failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Cache-clock milliseconds at insertion.
    pub created_at: u64,
    /// Cache-clock milliseconds of the last read or write.
    pub last_accessed_at: u64,
    /// Reads plus the initial write; always `>= 1` for a live entry.
    pub access_count: u32,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        scope: &Scope,
        prompt: String,
        response: String,
        usage: Option<Usage>,
        embedding: Option<Vec<f32>>,
        now: u64,
    ) -> Self {
        Self {
            key,
            prompt,
            response,
            provider: scope.provider().clone(),
            model: scope.model().to_string(),
            usage,
            embedding,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.provider.clone(), &self.model)
    }

    pub fn in_scope(&self, scope: &Scope) -> bool {
        &self.provider == scope.provider() && self.model == scope.model()
    }

    /// Record a read.
    pub(crate) fn touch(&mut self, now: u64) {
        self.last_accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }
}
