//! Vector store trait for persisting embedded documents and searching them.

use async_trait::async_trait;

use crate::document::RagDocument;
use crate::error::Result;
use crate::search::SearchRequest;

/// A storage backend for embedded documents with filtered similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::{InMemoryVectorStore, SearchRequest, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.add(&documents, &vectors).await?;
/// let hits = store.similarity_search(&SearchRequest::new("query"), &query_vector).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist `documents[i]` with embedding `vectors[i]`.
    ///
    /// Either every pair is persisted or none is. Adding a document whose
    /// ID is already stored replaces it.
    async fn add(&self, documents: &[RagDocument], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return documents ranked by descending similarity to `query_vector`.
    ///
    /// Implementations apply the request's filters, threshold and `top_k`
    /// before returning, and set each document's score.
    async fn similarity_search(
        &self,
        request: &SearchRequest,
        query_vector: &[f32],
    ) -> Result<Vec<RagDocument>>;

    /// Delete documents by ID. Unknown IDs are ignored.
    async fn delete(&self, ids: &[&str]) -> Result<()>;
}
