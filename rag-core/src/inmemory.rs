//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small corpora.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::RagDocument;
use crate::error::{RagError, Result};
use crate::search::SearchRequest;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

#[derive(Debug, Clone)]
struct Entry {
    document: RagDocument,
    embedding: Vec<f32>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Documents are keyed by ID, so re-adding a changed chunk under the same
/// ID replaces the previous version. The first `add` fixes the vector
/// dimensionality; later vectors of a different size are rejected.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Fetch a stored document by ID.
    pub async fn get(&self, id: &str) -> Option<RagDocument> {
        self.entries.read().await.get(id).map(|e| e.document.clone())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn store_err(message: String) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, documents: &[RagDocument], vectors: &[Vec<f32>]) -> Result<()> {
        if documents.len() != vectors.len() {
            return Err(store_err(format!(
                "{} documents paired with {} vectors",
                documents.len(),
                vectors.len()
            )));
        }

        let mut entries = self.entries.write().await;

        // Validate the whole batch before touching the map.
        let expected = entries
            .values()
            .next()
            .map(|e| e.embedding.len())
            .or_else(|| vectors.first().map(Vec::len));
        if let Some(dim) = expected {
            if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
                return Err(store_err(format!(
                    "vector for document '{}' has {} dimensions, expected {dim}",
                    documents[bad].id(),
                    vectors[bad].len()
                )));
            }
        }

        for (document, embedding) in documents.iter().zip(vectors) {
            entries.insert(
                document.id().to_string(),
                Entry { document: document.clone(), embedding: embedding.clone() },
            );
        }
        debug!(
            backend = BACKEND,
            added = documents.len(),
            total = entries.len(),
            "added documents"
        );
        Ok(())
    }

    async fn similarity_search(
        &self,
        request: &SearchRequest,
        query_vector: &[f32],
    ) -> Result<Vec<RagDocument>> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, &Entry)> = entries
            .values()
            .filter(|entry| request.matches(&entry.document))
            .map(|entry| (cosine_similarity(&entry.embedding, query_vector), entry))
            .filter(|(score, _)| request.passes_threshold(*score))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| entry.document.clone().with_score(score))
            .collect())
    }

    async fn delete(&self, ids: &[&str]) -> Result<()> {
        let mut entries = self.entries.write().await;
        for id in ids {
            entries.remove(*id);
        }
        Ok(())
    }
}
