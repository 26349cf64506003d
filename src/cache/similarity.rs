//! Near-duplicate lookup for prompts that miss the exact key.
//!
//! Two scoring strategies are available: token-set Jaccard over the prompt
//! text, and cosine over prompt embeddings. In vector mode any candidate
//! (or query) without an embedding is scored with Jaccard instead.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::entry::CacheEntry;
use super::key::{short_key, Scope};
use super::store::EntryStore;
use super::ttl::TtlPolicy;

/// How a lookup that misses the exact key may still hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    /// Exact key only.
    Exact,
    /// Jaccard similarity over prompt tokens (default).
    #[default]
    Token,
    /// Cosine similarity over prompt embeddings.
    Vector,
}

impl std::str::FromStr for MatchingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "token" => Ok(Self::Token),
            "vector" => Ok(Self::Vector),
            other => Err(format!(
                "unknown matching strategy '{other}' (expected exact, token or vector)"
            )),
        }
    }
}

/// Why two vectors could not be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ComparisonError {
    #[error("vector length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("zero-magnitude vector")]
    ZeroMagnitude,
}

/// Lower-case, strip punctuation, split on whitespace, drop tokens of 2 chars or fewer.
pub fn tokenize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// `|a ∩ b| / |a ∪ b|`, or 0.0 when both sets are empty.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f32 / union as f32
}

/// Cosine similarity between two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, ComparisonError> {
    if a.len() != b.len() {
        return Err(ComparisonError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return Err(ComparisonError::ZeroMagnitude);
    }
    Ok(dot / (mag_a * mag_b))
}

/// Pre-processed lookup prompt.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    tokens: HashSet<String>,
    embedding: Option<Vec<f32>>,
}

impl MatchQuery {
    pub fn new(prompt: &str, embedding: Option<Vec<f32>>) -> Self {
        Self {
            tokens: tokenize(prompt),
            embedding,
        }
    }
}

/// Best candidate found by [`SimilarityMatcher::find_best_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub key: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatcher {
    strategy: MatchingStrategy,
    threshold: f32,
}

impl SimilarityMatcher {
    pub fn new(strategy: MatchingStrategy, threshold: f32) -> Self {
        Self {
            strategy,
            threshold,
        }
    }

    pub fn strategy(&self) -> MatchingStrategy {
        self.strategy
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.strategy != MatchingStrategy::Exact
    }

    /// Highest-scoring live entry in `scope` with `score >= threshold`.
    ///
    /// Candidates are visited most recently used first and only a strictly
    /// greater score replaces the current best, so ties go to the most
    /// recently accessed entry.
    pub fn find_best_match(
        &self,
        store: &EntryStore,
        query: &MatchQuery,
        scope: &Scope,
        ttl: &TtlPolicy,
        now_millis: u64,
    ) -> Option<SimilarMatch> {
        if !self.is_enabled() {
            return None;
        }
        let mut best: Option<SimilarMatch> = None;
        for entry in store.iter_recent() {
            if !entry.in_scope(scope) || ttl.is_expired(entry, now_millis) {
                continue;
            }
            let Some(score) = self.score(query, entry) else {
                continue;
            };
            if score < self.threshold {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SimilarMatch {
                    key: entry.key.clone(),
                    score,
                });
            }
        }
        best
    }

    /// `None` when the candidate cannot be compared and must be skipped.
    fn score(&self, query: &MatchQuery, entry: &CacheEntry) -> Option<f32> {
        match (self.strategy, &query.embedding, &entry.embedding) {
            (MatchingStrategy::Exact, _, _) => None,
            (MatchingStrategy::Vector, Some(q), Some(e)) => match cosine_similarity(q, e) {
                Ok(score) => Some(score),
                Err(err) => {
                    debug!(key = %short_key(&entry.key), error = %err, "Skipping similarity candidate");
                    None
                }
            },
            _ => Some(jaccard_similarity(&query.tokens, &tokenize(&entry.prompt))),
        }
    }
}
