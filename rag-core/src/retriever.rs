//! Query-time retrieval: embed the query, search the store, return ranked documents.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::RagOptions;
use crate::document::RagDocument;
use crate::embedding::EmbeddingModel;
use crate::error::{RagError, Result};
use crate::search::{
    DEFAULT_TOP_K, Filters, SIMILARITY_THRESHOLD_ACCEPT_ALL, SearchRequest, merge_filters,
    validate_threshold, validate_top_k,
};
use crate::vectorstore::VectorStore;

/// Turns a query into ranked documents.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Retrieve documents relevant to `query` (empty when `None`), narrowed
    /// by `runtime_filters` on top of the retriever's defaults.
    async fn retrieve(
        &self,
        query: Option<&str>,
        runtime_filters: Option<&Filters>,
    ) -> Result<Vec<RagDocument>>;
}

/// A [`DocumentRetriever`] backed by an [`EmbeddingModel`] and a [`VectorStore`].
///
/// Ranking, threshold and `top_k` truncation are the store's job; the
/// retriever returns the store's answer untouched.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = VectorStoreDocumentRetriever::builder()
///     .embedding_model(model)
///     .vector_store(store)
///     .top_k(3)
///     .similarity_threshold(0.6)
///     .default_filter("lang", "en")
///     .build()?;
///
/// let docs = retriever.retrieve(Some("how do I install?"), None).await?;
/// ```
pub struct VectorStoreDocumentRetriever {
    embedding_model: Arc<dyn EmbeddingModel>,
    vector_store: Arc<dyn VectorStore>,
    top_k: usize,
    similarity_threshold: f32,
    default_filters: Filters,
    provider: String,
}

impl VectorStoreDocumentRetriever {
    /// Create a new [`VectorStoreDocumentRetrieverBuilder`].
    pub fn builder() -> VectorStoreDocumentRetrieverBuilder {
        VectorStoreDocumentRetrieverBuilder::default()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    pub fn default_filters(&self) -> &Filters {
        &self.default_filters
    }

    /// Embedding backend label attached to retrieval events.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Build the request that [`retrieve`](DocumentRetriever::retrieve) sends to the store.
    pub fn search_request(
        &self,
        query: &str,
        runtime_filters: Option<&Filters>,
    ) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            filters: merge_filters(&self.default_filters, runtime_filters),
        }
    }

    async fn search(
        &self,
        query: &str,
        runtime_filters: Option<&Filters>,
    ) -> Result<Vec<RagDocument>> {
        let query_vector = self.embedding_model.embed(query).await?;
        let request = self.search_request(query, runtime_filters);
        debug!(
            provider = %self.provider,
            top_k = request.top_k,
            similarity_threshold = request.similarity_threshold,
            filter_count = request.filters.len(),
            "searching vector store"
        );
        self.vector_store.similarity_search(&request, &query_vector).await
    }
}

#[async_trait]
impl DocumentRetriever for VectorStoreDocumentRetriever {
    async fn retrieve(
        &self,
        query: Option<&str>,
        runtime_filters: Option<&Filters>,
    ) -> Result<Vec<RagDocument>> {
        let query = query.unwrap_or_default();
        let documents = self.search(query, runtime_filters).await.map_err(|e| {
            error!(provider = %self.provider, error = %e, "retrieval failed");
            RagError::Retrieval { source: Box::new(e) }
        })?;
        debug!(provider = %self.provider, result_count = documents.len(), "retrieval completed");
        Ok(documents)
    }
}

/// Builder for constructing a [`VectorStoreDocumentRetriever`].
///
/// `embedding_model` and `vector_store` are required; `top_k` defaults to
/// [`DEFAULT_TOP_K`] and the threshold to accept-all.
#[derive(Default)]
pub struct VectorStoreDocumentRetrieverBuilder {
    embedding_model: Option<Arc<dyn EmbeddingModel>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    top_k: Option<usize>,
    similarity_threshold: Option<f32>,
    default_filters: Filters,
    provider: Option<String>,
}

impl VectorStoreDocumentRetrieverBuilder {
    pub fn embedding_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.embedding_model = Some(model);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn default_filter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.default_filters.insert(key.into(), value.into());
        self
    }

    pub fn default_filters(mut self, filters: Filters) -> Self {
        self.default_filters = filters;
        self
    }

    /// Label events with `provider` instead of the embedding model's name.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Take `top_k`, threshold, default filters and provider from `options`.
    pub fn options(mut self, options: &RagOptions) -> Self {
        if let Some(provider) = &options.provider {
            self = self.provider(provider.clone());
        }
        self.top_k(options.top_k)
            .similarity_threshold(options.similarity_threshold)
            .default_filters(options.default_filters.clone())
    }

    /// Build the retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the model or store is missing,
    /// `top_k == 0`, or the threshold lies outside `[0, 1]`.
    pub fn build(self) -> Result<VectorStoreDocumentRetriever> {
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let embedding_model = self
            .embedding_model
            .ok_or_else(|| RagError::ConfigError("embedding_model is required".to_string()))?;

        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        let similarity_threshold =
            self.similarity_threshold.unwrap_or(SIMILARITY_THRESHOLD_ACCEPT_ALL);
        validate_top_k(top_k)?;
        validate_threshold(similarity_threshold)?;

        let provider = self.provider.unwrap_or_else(|| embedding_model.name().to_string());

        Ok(VectorStoreDocumentRetriever {
            embedding_model,
            vector_store,
            top_k,
            similarity_threshold,
            default_filters: self.default_filters,
            provider,
        })
    }
}
