//! Retrieval contract: the retriever builds the request and returns the store's answer as-is.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rag_core::{
    DocumentRetriever, EmbeddingModel, Filters, InMemoryVectorStore, RagDocument, RagError,
    RagOptions, Result, SearchRequest, VectorStore, VectorStoreDocumentRetriever,
};
use serde_json::json;

/// Records the texts it is asked to embed.
#[derive(Default)]
struct RecordingModel {
    seen: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl EmbeddingModel for RecordingModel {
    async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().extend(texts.iter().map(|t| t.to_string()));
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "recording".into(),
                message: "503".into(),
            });
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Holds ten candidates with fixed scores and applies the store contract itself.
#[derive(Default)]
struct FakeStore {
    requests: Mutex<Vec<SearchRequest>>,
    searches: AtomicUsize,
}

impl FakeStore {
    fn candidates() -> Vec<RagDocument> {
        (0..10)
            .map(|i| {
                RagDocument::with_id(format!("doc-{i}"), "text").with_score(1.0 - i as f32 * 0.1)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn add(&self, _documents: &[RagDocument], _vectors: &[Vec<f32>]) -> Result<()> {
        Ok(())
    }

    async fn similarity_search(
        &self,
        request: &SearchRequest,
        _query_vector: &[f32],
    ) -> Result<Vec<RagDocument>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok(Self::candidates()
            .into_iter()
            .filter(|d| request.passes_threshold(d.score().unwrap_or_default()))
            .take(request.top_k)
            .collect())
    }

    async fn delete(&self, _ids: &[&str]) -> Result<()> {
        Ok(())
    }
}

fn filters(pairs: &[(&str, serde_json::Value)]) -> Filters {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn returns_exactly_what_the_store_returned() {
    let store = Arc::new(FakeStore::default());
    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel::default()))
        .vector_store(store.clone())
        .top_k(3)
        .similarity_threshold(0.6)
        .build()
        .unwrap();

    let docs = retriever.retrieve(Some("query"), None).await.unwrap();
    let ids: Vec<_> = docs.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec!["doc-0", "doc-1", "doc-2"]);

    let request = store.requests.lock().unwrap()[0].clone();
    assert_eq!(request.query, "query");
    assert_eq!(request.top_k, 3);
    assert_eq!(request.similarity_threshold, 0.6);
}

#[tokio::test]
async fn performs_no_post_filtering() {
    /// Ignores the request entirely; the retriever must not trim the answer.
    struct Unruly;

    #[async_trait]
    impl VectorStore for Unruly {
        async fn add(&self, _d: &[RagDocument], _v: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }

        async fn similarity_search(
            &self,
            _r: &SearchRequest,
            _q: &[f32],
        ) -> Result<Vec<RagDocument>> {
            Ok(FakeStore::candidates())
        }

        async fn delete(&self, _ids: &[&str]) -> Result<()> {
            Ok(())
        }
    }

    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel::default()))
        .vector_store(Arc::new(Unruly))
        .top_k(3)
        .similarity_threshold(0.6)
        .build()
        .unwrap();

    let docs = retriever.retrieve(Some("q"), None).await.unwrap();
    assert_eq!(docs, FakeStore::candidates());
}

#[tokio::test]
async fn runtime_filters_override_default_filters() {
    let store = Arc::new(FakeStore::default());
    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel::default()))
        .vector_store(store.clone())
        .default_filter("lang", "en")
        .build()
        .unwrap();

    let runtime = filters(&[("lang", json!("fr")), ("topic", json!("x"))]);
    retriever.retrieve(Some("q"), Some(&runtime)).await.unwrap();
    retriever.retrieve(Some("q"), None).await.unwrap();

    let requests = store.requests.lock().unwrap();
    assert_eq!(requests[0].filters, filters(&[("lang", json!("fr")), ("topic", json!("x"))]));
    assert_eq!(requests[1].filters, filters(&[("lang", json!("en"))]));
    assert_eq!(retriever.default_filters(), &filters(&[("lang", json!("en"))]));
}

#[tokio::test]
async fn absent_query_embeds_the_empty_string_with_defaults() {
    let model = Arc::new(RecordingModel::default());
    let store = Arc::new(FakeStore::default());
    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(model.clone())
        .vector_store(store.clone())
        .build()
        .unwrap();

    assert_eq!(retriever.provider(), "embedding-model");
    let docs = retriever.retrieve(None, None).await.unwrap();
    assert_eq!(docs.len(), 4);
    assert_eq!(model.seen.lock().unwrap().as_slice(), [String::new()]);
    assert!(store.requests.lock().unwrap()[0].accepts_all());
}

#[tokio::test]
async fn embedding_failure_returns_no_documents() {
    let store = Arc::new(FakeStore::default());
    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel { fail: true, ..Default::default() }))
        .vector_store(store.clone())
        .build()
        .unwrap();

    let err = retriever.retrieve(Some("q"), None).await.unwrap_err();
    assert!(matches!(err, RagError::Retrieval { .. }));
    assert!(matches!(err.root_cause(), RagError::EmbeddingError { .. }));
    assert_eq!(store.searches.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_store_is_a_construction_error() {
    let err = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel::default()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("vector_store")));
}

#[test]
fn options_configure_the_retriever() {
    let options = RagOptions::builder()
        .top_k(7)
        .similarity_threshold(0.25)
        .default_filter("lang", "en")
        .provider("local")
        .build()
        .unwrap();
    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel::default()))
        .vector_store(Arc::new(FakeStore::default()))
        .options(&options)
        .build()
        .unwrap();
    assert_eq!(retriever.top_k(), 7);
    assert_eq!(retriever.similarity_threshold(), 0.25);
    assert_eq!(retriever.provider(), "local");

    let request = retriever.search_request("q", None);
    assert_eq!(request.filters.get("lang"), Some(&json!("en")));
}

#[tokio::test]
async fn end_to_end_with_the_in_memory_store() {
    let store = Arc::new(InMemoryVectorStore::new());
    let docs = vec![
        RagDocument::with_id("match", "a").with_metadata("lang", "en"),
        RagDocument::with_id("other-lang", "b").with_metadata("lang", "fr"),
        RagDocument::with_id("orthogonal", "c").with_metadata("lang", "en"),
    ];
    store.add(&docs, &[vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).await.unwrap();

    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(Arc::new(RecordingModel::default()))
        .vector_store(store)
        .similarity_threshold(0.5)
        .default_filter("lang", "en")
        .build()
        .unwrap();

    let hits = retriever.retrieve(Some("q"), None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), "match");
    assert_eq!(hits[0].score(), Some(1.0));
}
