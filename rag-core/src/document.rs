//! The unit of content flowing through ingestion and retrieval.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key naming where a document came from.
pub const SOURCE_KEY: &str = "source";

/// Metadata key holding a chunk's position inside its source document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Document metadata.
///
/// Keys are kept sorted so that the rendering used for fingerprinting is
/// canonical regardless of the order in which transformers inserted them.
pub type Metadata = BTreeMap<String, Value>;

/// A document or chunk with text, metadata and an optional retrieval score.
///
/// The `id` is fixed at construction. Metadata may be edited while the
/// document is still owned by a reader or transformer; once it is handed
/// to ingestion it moves into the pipeline and is no longer reachable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagDocument {
    id: String,
    text: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
}

impl RagDocument {
    /// Create a document with a freshly generated UUID.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), text)
    }

    /// Create a document with a caller-supplied ID.
    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new(), score: None }
    }

    /// Add a metadata entry, replacing any previous value under `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the whole metadata map.
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach a similarity score. Only vector stores answering a search do this.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable access for transformers enriching a document in flight.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// The similarity score, `None` until the document comes back from a search.
    pub fn score(&self) -> Option<f32> {
        self.score
    }

    /// Look up the `source` metadata entry.
    pub fn source(&self) -> Option<&Value> {
        self.metadata.get(SOURCE_KEY)
    }

    /// Look up the `chunk_index` metadata entry.
    pub fn chunk_index(&self) -> Option<&Value> {
        self.metadata.get(CHUNK_INDEX_KEY)
    }
}

/// Render a metadata value the way it is shown in keys: strings bare,
/// everything else as compact JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique() {
        let a = RagDocument::new("same text");
        let b = RagDocument::new("same text");
        assert_ne!(a.id(), b.id());
        assert!(a.score().is_none());
    }

    #[test]
    fn metadata_keys_are_sorted_regardless_of_insertion_order() {
        let a = RagDocument::with_id("1", "x").with_metadata("b", 2).with_metadata("a", 1);
        let b = RagDocument::with_id("1", "x").with_metadata("a", 1).with_metadata("b", 2);
        assert_eq!(a, b);
        let keys: Vec<_> = a.metadata().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn score_is_skipped_when_absent() {
        let doc = RagDocument::with_id("d", "hello").with_metadata(SOURCE_KEY, "a.md");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"id": "d", "text": "hello", "metadata": {"source": "a.md"}}));
    }

    #[test]
    fn display_value_strips_string_quotes() {
        assert_eq!(display_value(&json!("a.md")), "a.md");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(null)), "null");
    }
}
