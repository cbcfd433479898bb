//! Retrieval-time search parameters and metadata filter semantics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::RagDocument;
use crate::error::{RagError, Result};

/// Default number of results returned by a similarity search.
pub const DEFAULT_TOP_K: usize = 4;

/// Threshold sentinel meaning "do not drop any candidate by score".
pub const SIMILARITY_THRESHOLD_ACCEPT_ALL: f32 = 0.0;

/// Metadata filters: every key must be present with an exactly equal value.
pub type Filters = BTreeMap<String, Value>;

/// Merge runtime filters over defaults. Runtime values win on shared keys.
pub fn merge_filters(defaults: &Filters, runtime: Option<&Filters>) -> Filters {
    let mut merged = defaults.clone();
    if let Some(runtime) = runtime {
        merged.extend(runtime.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// A similarity search request handed to a [`VectorStore`](crate::VectorStore).
///
/// The store must rank by descending similarity, drop candidates scoring
/// below `similarity_threshold`, keep only documents matching every entry
/// of `filters`, and truncate to `top_k`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    /// The natural-language query the vector was computed from.
    pub query: String,
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum score in `[0, 1]`; [`SIMILARITY_THRESHOLD_ACCEPT_ALL`] disables the cut.
    pub similarity_threshold: f32,
    /// Exact-match metadata filters, AND-ed across keys.
    #[serde(default)]
    pub filters: Filters,
}

impl SearchRequest {
    /// Create a request for `query` with default `top_k` and an accept-all threshold.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            similarity_threshold: SIMILARITY_THRESHOLD_ACCEPT_ALL,
            filters: Filters::new(),
        }
    }

    /// Create a new builder for constructing a validated [`SearchRequest`].
    pub fn builder(query: impl Into<String>) -> SearchRequestBuilder {
        SearchRequestBuilder { request: Self::new(query) }
    }

    /// Whether the threshold is the accept-all sentinel.
    pub fn accepts_all(&self) -> bool {
        self.similarity_threshold <= SIMILARITY_THRESHOLD_ACCEPT_ALL
    }

    /// Whether a candidate with `score` survives the threshold cut.
    pub fn passes_threshold(&self, score: f32) -> bool {
        self.accepts_all() || score >= self.similarity_threshold
    }

    /// Whether `document` matches every filter entry exactly.
    pub fn matches(&self, document: &RagDocument) -> bool {
        self.filters
            .iter()
            .all(|(key, expected)| document.metadata().get(key) == Some(expected))
    }
}

/// Builder for [`SearchRequest`].
#[derive(Debug, Clone)]
pub struct SearchRequestBuilder {
    request: SearchRequest,
}

impl SearchRequestBuilder {
    pub fn top_k(mut self, k: usize) -> Self {
        self.request.top_k = k;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.request.similarity_threshold = threshold;
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.filters.insert(key.into(), value.into());
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.request.filters = filters;
        self
    }

    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `top_k == 0` or the threshold
    /// lies outside `[0, 1]`.
    pub fn build(self) -> Result<SearchRequest> {
        validate_top_k(self.request.top_k)?;
        validate_threshold(self.request.similarity_threshold)?;
        Ok(self.request)
    }
}

pub(crate) fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(RagError::ConfigError(format!(
            "similarity_threshold ({threshold}) must be within [0, 1]"
        )));
    }
    Ok(())
}
