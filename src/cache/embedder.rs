//! Embedding capability injected by the host.

use async_trait::async_trait;

use crate::error::Result;

/// Produces one vector per input text, in order.
///
/// Only consulted when the cache runs the vector matching strategy. Any
/// error (or a short result) degrades the affected lookup or write to token
/// matching instead of failing it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text, returning `None` on failure or an empty result.
pub(crate) async fn embed_one(embedder: &dyn Embedder, text: &str) -> Option<Vec<f32>> {
    match embedder.embed(&[text.to_string()]).await {
        Ok(vectors) => match vectors.into_iter().next() {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                tracing::warn!("Embedder returned no vector; continuing without embedding");
                None
            }
        },
        Err(e) => {
            tracing::warn!("Embedding failed: {}; continuing without embedding", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[tokio::test]
    async fn test_embed_one_returns_first_vector() {
        let mut mock = MockEmbedder::new();
        mock.expect_embed()
            .times(1)
            .returning(|texts| Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect()));
        assert_eq!(embed_one(&mock, "hello").await, Some(vec![0.5, 0.5]));
    }

    #[tokio::test]
    async fn test_embed_one_swallows_errors() {
        let mut mock = MockEmbedder::new();
        mock.expect_embed()
            .returning(|_| Err(CacheError::Embedding("provider down".into())));
        assert_eq!(embed_one(&mock, "hello").await, None);
    }

    #[tokio::test]
    async fn test_embed_one_rejects_empty_result() {
        let mut mock = MockEmbedder::new();
        mock.expect_embed().returning(|_| Ok(vec![]));
        assert_eq!(embed_one(&mock, "hello").await, None);

        let mut mock = MockEmbedder::new();
        mock.expect_embed().returning(|_| Ok(vec![vec![]]));
        assert_eq!(embed_one(&mock, "hello").await, None);
    }
}
