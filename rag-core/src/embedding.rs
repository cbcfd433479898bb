//! Embedding model trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A model that turns a batch of texts into vector embeddings.
///
/// Implementations wrap a specific backend (an HTTP embedding API, a local
/// model, a test double) behind one async interface. [`embed_all`] is the
/// primitive: it returns exactly one vector per input, in input order, or
/// fails the whole call. [`embed`] wraps a single-element batch.
///
/// [`embed_all`]: EmbeddingModel::embed_all
/// [`embed`]: EmbeddingModel::embed
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::EmbeddingModel;
///
/// let vectors = model.embed_all(&["first", "second"]).await?;
/// assert_eq!(vectors.len(), 2);
/// ```
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed every text in `texts`, preserving order.
    ///
    /// Callers never pass an empty slice.
    async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_all(&[text]).await?.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingError {
                provider: self.name().to_string(),
                message: "model returned no vector for a single-text batch".into(),
            }
        })
    }

    /// A short label for the backend, used in logs and errors.
    fn name(&self) -> &str {
        "embedding-model"
    }
}

/// Embed `texts` and check that the model honored the one-vector-per-input
/// contract, so positional pairing with documents is safe.
pub(crate) async fn embed_exact(
    model: &dyn EmbeddingModel,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
    let vectors = model.embed_all(texts).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::EmbeddingError {
            provider: model.name().to_string(),
            message: format!("expected {} vectors, model returned {}", texts.len(), vectors.len()),
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl EmbeddingModel for Echo {
        async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct Short;

    #[async_trait]
    impl EmbeddingModel for Short {
        async fn embed_all(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn embed_wraps_a_single_element_batch() {
        assert_eq!(Echo.embed("abcd").await.unwrap(), vec![4.0]);
    }

    #[tokio::test]
    async fn embed_exact_rejects_count_mismatch() {
        let err = embed_exact(&Short, &["a", "b"]).await.unwrap_err();
        match err {
            RagError::EmbeddingError { provider, message } => {
                assert_eq!(provider, "short");
                assert!(message.contains("expected 2 vectors"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
