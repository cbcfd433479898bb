//! Idempotent, incremental-safe ingestion.
//!
//! [`RagIngestionService`] runs reader → transformers → embedding model →
//! vector store. A full run re-processes everything; an incremental run
//! sends only chunks whose fingerprint changed since they were last stored.
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_core::{RagIngestionService, RecursiveSplitter, InMemoryVectorStore};
//!
//! let service = RagIngestionService::builder()
//!     .reader(Arc::new(my_reader))
//!     .transformer(Arc::new(RecursiveSplitter::new(800, 100)?))
//!     .embedding_model(Arc::new(my_model))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! service.ingest_all().await?;
//! let changed = service.ingest_incremental().await?;
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::RagOptions;
use crate::document::RagDocument;
use crate::embedding::{EmbeddingModel, embed_exact};
use crate::error::{RagError, Result};
use crate::etl::{DocumentReader, DocumentTransformer, apply_transformers};
use crate::fingerprint::{
    FingerprintStore, InMemoryFingerprintStore, MissingKeyPolicy, chunk_keys, fingerprint,
};
use crate::vectorstore::VectorStore;

const FULL: &str = "full";
const INCREMENTAL: &str = "incremental";

/// Orchestrates full and incremental ingestion runs.
///
/// Runs are serialized: a second call waits until the one in flight has
/// finished. Fingerprints are committed only after the vector store has
/// accepted the batch, so a failed run leaves the fingerprint store as it
/// was and the next incremental run retries the same chunks.
///
/// Chunk keys are unique within a run: see [`chunk_keys`].
pub struct RagIngestionService {
    reader: Arc<dyn DocumentReader>,
    transformers: Vec<Arc<dyn DocumentTransformer>>,
    embedding_model: Arc<dyn EmbeddingModel>,
    vector_store: Arc<dyn VectorStore>,
    fingerprints: Arc<dyn FingerprintStore>,
    missing_key_policy: MissingKeyPolicy,
    provider: String,
    run_lock: Mutex<()>,
}

impl RagIngestionService {
    /// Create a new [`RagIngestionServiceBuilder`].
    pub fn builder() -> RagIngestionServiceBuilder {
        RagIngestionServiceBuilder::default()
    }

    /// Return a reference to the fingerprint store.
    pub fn fingerprint_store(&self) -> &Arc<dyn FingerprintStore> {
        &self.fingerprints
    }

    /// Embedding backend label attached to ingestion events.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Number of chunk keys with a recorded fingerprint.
    pub async fn tracked_chunks(&self) -> Result<usize> {
        self.fingerprints.len().await
    }

    /// Run the whole pipeline unconditionally and store every resulting chunk.
    ///
    /// Returns the number of documents ingested. An empty pipeline output is
    /// a no-op returning `0`; the embedding model is not called.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] wrapping the failure of the reader, a
    /// transformer, chunk keying, fingerprinting, the embedding model or the
    /// vector store. Under [`MissingKeyPolicy::Reject`] that includes
    /// [`RagError::MissingChunkKey`] and [`RagError::DuplicateChunkKey`].
    pub async fn ingest_all(&self) -> Result<usize> {
        let _run = self.run_lock.lock().await;
        self.run_full().await.map_err(|e| self.wrap(FULL, e))
    }

    /// Run the pipeline and store only chunks whose fingerprint changed.
    ///
    /// Returns the number of changed documents; `0` means nothing was sent
    /// to the embedding model or the vector store.
    ///
    /// # Errors
    ///
    /// Same as [`ingest_all`](Self::ingest_all).
    pub async fn ingest_incremental(&self) -> Result<usize> {
        let _run = self.run_lock.lock().await;
        self.run_incremental().await.map_err(|e| self.wrap(INCREMENTAL, e))
    }

    async fn run_full(&self) -> Result<usize> {
        let documents = self.load().await?;
        if documents.is_empty() {
            info!(
                provider = %self.provider,
                mode = FULL,
                "pipeline produced no documents, nothing to ingest"
            );
            return Ok(0);
        }

        let keys = chunk_keys(&documents, self.missing_key_policy)?;
        let entries = keys
            .into_iter()
            .zip(&documents)
            .map(|(key, doc)| Ok((key, fingerprint(doc)?)))
            .collect::<Result<Vec<_>>>()?;

        self.embed_and_store(&documents).await?;
        self.fingerprints.put_all(entries).await?;

        info!(
            provider = %self.provider,
            mode = FULL,
            document_count = documents.len(),
            "ingestion completed"
        );
        Ok(documents.len())
    }

    async fn run_incremental(&self) -> Result<usize> {
        let documents = self.load().await?;
        let total = documents.len();
        let keys = chunk_keys(&documents, self.missing_key_policy)?;

        let mut changed = Vec::new();
        let mut entries = Vec::new();
        for (key, doc) in keys.into_iter().zip(documents) {
            let digest = fingerprint(&doc)?;
            if self.fingerprints.get(&key).await?.as_deref() == Some(digest.as_str()) {
                continue;
            }
            debug!(chunk.key = %key, document.id = %doc.id(), "chunk changed");
            entries.push((key, digest));
            changed.push(doc);
        }

        if changed.is_empty() {
            info!(
                provider = %self.provider,
                mode = INCREMENTAL,
                document_count = total,
                "no changed chunks"
            );
            return Ok(0);
        }

        self.embed_and_store(&changed).await?;
        self.fingerprints.put_all(entries).await?;

        info!(
            provider = %self.provider,
            mode = INCREMENTAL,
            document_count = total,
            changed_count = changed.len(),
            "ingestion completed"
        );
        Ok(changed.len())
    }

    /// Read from the source and run the transformer chain.
    async fn load(&self) -> Result<Vec<RagDocument>> {
        let documents = self.reader.read().await?;
        debug!(document_count = documents.len(), "reader returned documents");
        apply_transformers(&self.transformers, documents)
    }

    /// Embed `documents` in one batch and add them to the store in one call.
    async fn embed_and_store(&self, documents: &[RagDocument]) -> Result<()> {
        let texts: Vec<&str> = documents.iter().map(RagDocument::text).collect();
        let vectors = embed_exact(self.embedding_model.as_ref(), &texts).await?;
        self.vector_store.add(documents, &vectors).await
    }

    fn wrap(&self, mode: &'static str, source: RagError) -> RagError {
        error!(provider = %self.provider, mode, error = %source, "ingestion failed");
        RagError::Ingestion { mode, source: Box::new(source) }
    }
}

/// Builder for constructing a [`RagIngestionService`].
///
/// `reader`, `embedding_model` and `vector_store` are required. Without a
/// fingerprint store, an [`InMemoryFingerprintStore`] is used.
#[derive(Default)]
pub struct RagIngestionServiceBuilder {
    reader: Option<Arc<dyn DocumentReader>>,
    transformers: Vec<Arc<dyn DocumentTransformer>>,
    embedding_model: Option<Arc<dyn EmbeddingModel>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    fingerprints: Option<Arc<dyn FingerprintStore>>,
    missing_key_policy: MissingKeyPolicy,
    provider: Option<String>,
}

impl RagIngestionServiceBuilder {
    /// Set the document source.
    pub fn reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Append a transformer; transformers run in the order they are added.
    pub fn transformer(mut self, transformer: Arc<dyn DocumentTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn embedding_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.embedding_model = Some(model);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Use a custom (for example durable) fingerprint store.
    pub fn fingerprint_store(mut self, store: Arc<dyn FingerprintStore>) -> Self {
        self.fingerprints = Some(store);
        self
    }

    pub fn missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key_policy = policy;
        self
    }

    /// Label events with `provider` instead of the embedding model's name.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Take the ingestion-related settings from `options`.
    pub fn options(mut self, options: &RagOptions) -> Self {
        if let Some(provider) = &options.provider {
            self = self.provider(provider.clone());
        }
        self.missing_key_policy(options.missing_key_policy)
    }

    /// Build the [`RagIngestionService`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<RagIngestionService> {
        let reader =
            self.reader.ok_or_else(|| RagError::ConfigError("reader is required".to_string()))?;
        let embedding_model = self
            .embedding_model
            .ok_or_else(|| RagError::ConfigError("embedding_model is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let provider = self.provider.unwrap_or_else(|| embedding_model.name().to_string());

        Ok(RagIngestionService {
            reader,
            transformers: self.transformers,
            embedding_model,
            vector_store,
            fingerprints: self
                .fingerprints
                .unwrap_or_else(|| Arc::new(InMemoryFingerprintStore::new())),
            missing_key_policy: self.missing_key_policy,
            provider,
            run_lock: Mutex::new(()),
        })
    }
}
