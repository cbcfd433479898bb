//! Source, transform and sink interfaces of the ETL pipeline.
//!
//! - [`DocumentReader`] produces the current full view of a source.
//! - [`DocumentTransformer`] maps one batch to another (chunking, enrichment).
//! - [`DocumentWriter`] consumes a batch; the ingestion service writes to a
//!   [`VectorStore`] directly, writers serve custom pipelines.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::RagDocument;
use crate::embedding::{EmbeddingModel, embed_exact};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// A pull-based document source.
///
/// Every call returns the reader's complete current view; there is no
/// streaming or resume contract.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    async fn read(&self) -> Result<Vec<RagDocument>>;
}

/// A batch transformation over documents.
///
/// Transformers may add, drop, split or merge documents. They run in
/// declaration order and each one sees only the previous one's output.
pub trait DocumentTransformer: Send + Sync {
    fn transform(&self, documents: Vec<RagDocument>) -> Result<Vec<RagDocument>>;
}

/// A sink for a batch of documents.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn write(&self, documents: Vec<RagDocument>) -> Result<()>;
}

/// Run `documents` through `transformers` in order.
pub(crate) fn apply_transformers(
    transformers: &[Arc<dyn DocumentTransformer>],
    documents: Vec<RagDocument>,
) -> Result<Vec<RagDocument>> {
    transformers.iter().try_fold(documents, |docs, transformer| transformer.transform(docs))
}

/// A [`DocumentWriter`] that embeds a batch and adds it to a [`VectorStore`].
///
/// Unlike [`RagIngestionService`](crate::RagIngestionService) it keeps no
/// fingerprints: every batch is embedded and written unconditionally.
pub struct VectorStoreWriter {
    embedding_model: Arc<dyn EmbeddingModel>,
    vector_store: Arc<dyn VectorStore>,
}

impl VectorStoreWriter {
    pub fn new(
        embedding_model: Arc<dyn EmbeddingModel>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { embedding_model, vector_store }
    }
}

#[async_trait]
impl DocumentWriter for VectorStoreWriter {
    async fn write(&self, documents: Vec<RagDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = documents.iter().map(RagDocument::text).collect();
        let vectors = embed_exact(self.embedding_model.as_ref(), &texts).await.map_err(|e| {
            error!(error = %e, "embedding failed in vector store writer");
            e
        })?;

        self.vector_store.add(&documents, &vectors).await.map_err(|e| {
            error!(error = %e, "vector store add failed in writer");
            RagError::WriterError(format!("vector store add failed: {e}"))
        })?;

        debug!(count = documents.len(), "wrote documents to vector store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl DocumentTransformer for Upper {
        fn transform(&self, documents: Vec<RagDocument>) -> Result<Vec<RagDocument>> {
            Ok(documents
                .into_iter()
                .map(|d| RagDocument::with_id(d.id(), d.text().to_uppercase()))
                .collect())
        }
    }

    struct Duplicate;

    impl DocumentTransformer for Duplicate {
        fn transform(&self, documents: Vec<RagDocument>) -> Result<Vec<RagDocument>> {
            Ok(documents
                .into_iter()
                .flat_map(|d| {
                    let copy = RagDocument::with_id(format!("{}-copy", d.id()), d.text());
                    [d, copy]
                })
                .collect())
        }
    }

    struct Fail;

    impl DocumentTransformer for Fail {
        fn transform(&self, _documents: Vec<RagDocument>) -> Result<Vec<RagDocument>> {
            Err(RagError::TransformerError { transformer: "fail".into(), message: "boom".into() })
        }
    }

    #[test]
    fn transformers_run_in_declaration_order() {
        let chain: Vec<Arc<dyn DocumentTransformer>> = vec![Arc::new(Upper), Arc::new(Duplicate)];
        let out = apply_transformers(&chain, vec![RagDocument::with_id("a", "hi")]).unwrap();
        let ids: Vec<_> = out.iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "a-copy"]);
        assert!(out.iter().all(|d| d.text() == "HI"));
    }

    #[test]
    fn a_failing_transformer_stops_the_chain() {
        let chain: Vec<Arc<dyn DocumentTransformer>> = vec![Arc::new(Fail), Arc::new(Upper)];
        let err = apply_transformers(&chain, vec![RagDocument::new("x")]).unwrap_err();
        assert!(matches!(err, RagError::TransformerError { .. }));
    }

    /// Embeds each text as `[len, 1.0]`.
    struct LengthModel;

    #[async_trait]
    impl EmbeddingModel for LengthModel {
        async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn vector_store_writer_embeds_and_adds() {
        let store = Arc::new(crate::inmemory::InMemoryVectorStore::new());
        let writer = VectorStoreWriter::new(Arc::new(LengthModel), store.clone());

        writer.write(Vec::new()).await.unwrap();
        assert!(store.is_empty().await);

        writer
            .write(vec![RagDocument::with_id("a", "one"), RagDocument::with_id("b", "three")])
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("b").await.unwrap().text(), "three");
    }

    #[tokio::test]
    async fn vector_store_writer_wraps_store_failures() {
        let store = Arc::new(crate::inmemory::InMemoryVectorStore::new());
        store.add(&[RagDocument::with_id("seed", "x")], &[vec![1.0, 0.0, 0.0]]).await.unwrap();

        let writer = VectorStoreWriter::new(Arc::new(LengthModel), store.clone());
        let err = writer.write(vec![RagDocument::with_id("a", "one")]).await.unwrap_err();
        assert!(matches!(err, RagError::WriterError(_)));
        assert_eq!(store.len().await, 1);
    }
}
