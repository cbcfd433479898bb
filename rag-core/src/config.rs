//! Configuration for ingestion and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::fingerprint::MissingKeyPolicy;
use crate::search::{
    DEFAULT_TOP_K, Filters, SIMILARITY_THRESHOLD_ACCEPT_ALL, validate_threshold, validate_top_k,
};

/// Configuration parameters shared by ingestion and retrieval.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagOptions {
    /// Label of the embedding backend the host wires in, attached to the
    /// `provider` field of ingestion and retrieval events. When unset, the
    /// embedding model's own [`name`](crate::EmbeddingModel::name) is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results; `0.0` accepts everything.
    pub similarity_threshold: f32,
    /// Filters applied to every retrieval unless overridden per call.
    pub default_filters: Filters,
    /// Maximum chunk size in characters for the built-in splitters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// How chunks without `source`/`chunk_index` are keyed.
    pub missing_key_policy: MissingKeyPolicy,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            provider: None,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: SIMILARITY_THRESHOLD_ACCEPT_ALL,
            default_filters: Filters::new(),
            chunk_size: 800,
            chunk_overlap: 100,
            missing_key_policy: MissingKeyPolicy::default(),
        }
    }
}

impl RagOptions {
    /// Create a new builder for constructing [`RagOptions`].
    pub fn builder() -> RagOptionsBuilder {
        RagOptionsBuilder::default()
    }

    /// Check that the options are internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `similarity_threshold` lies outside `[0, 1]`
    /// - `chunk_overlap >= chunk_size`
    pub fn validate(&self) -> Result<()> {
        validate_top_k(self.top_k)?;
        validate_threshold(self.similarity_threshold)?;
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagOptions`].
#[derive(Debug, Clone, Default)]
pub struct RagOptionsBuilder {
    options: RagOptions,
}

impl RagOptionsBuilder {
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.options.provider = Some(provider.into());
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.options.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.options.similarity_threshold = threshold;
        self
    }

    /// Add a default retrieval filter.
    pub fn default_filter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.options.default_filters.insert(key.into(), value.into());
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.options.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.options.chunk_overlap = overlap;
        self
    }

    pub fn missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.options.missing_key_policy = policy;
        self
    }

    /// Build the [`RagOptions`], validating them.
    ///
    /// # Errors
    ///
    /// See [`RagOptions::validate`].
    pub fn build(self) -> Result<RagOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
