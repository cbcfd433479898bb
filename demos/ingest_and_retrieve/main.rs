//! # Ingest and Retrieve
//!
//! Walks a small markdown corpus through full ingestion, an incremental run
//! that finds nothing to do, an edit that re-embeds only the touched chunks,
//! and filtered retrieval.
//!
//! Uses `InMemoryVectorStore`, `MarkdownSplitter`, a `JsonFileFingerprintStore`
//! and a deterministic `MockEmbeddingModel`, so it runs with **zero API keys**.
//!
//! Run: `RUST_LOG=rag_core=debug cargo run -p rag-demos --example ingest_and_retrieve`

use std::path::Path;
use std::sync::Arc;

use rag_core::{
    DocumentRetriever, EmbeddingModel, FileSystemReader, Filters, InMemoryVectorStore,
    JsonFileFingerprintStore, MarkdownSplitter, RagIngestionService, RagOptions,
    VectorStoreDocumentRetriever,
};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// MockEmbeddingModel — deterministic hash-based embeddings for demos/tests
// ---------------------------------------------------------------------------

struct MockEmbeddingModel {
    dimensions: usize,
}

impl MockEmbeddingModel {
    fn vector(&self, text: &str) -> Vec<f32> {
        // Bag-of-words: each word bumps one hashed dimension, so texts sharing
        // vocabulary point in similar directions.
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if word.is_empty() {
                continue;
            }
            let hash =
                word.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }
}

#[async_trait::async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    async fn embed_all(&self, texts: &[&str]) -> rag_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn write_corpus(root: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join("en"))?;
    std::fs::create_dir_all(root.join("fr"))?;
    std::fs::write(
        root.join("en/rust.md"),
        "# Rust\nRust is a systems programming language focused on memory safety.\n\
         ## Ownership\nOwnership rules give memory safety without a garbage collector.",
    )?;
    std::fs::write(
        root.join("en/rag.md"),
        "# RAG\nRetrieval augmented generation stores embedded chunks in a vector database.",
    )?;
    std::fs::write(
        root.join("fr/rust.md"),
        "# Rust\nRust est un langage de programmation axé sur la sécurité mémoire.",
    )?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // -- 1. Prepare a corpus and options ----------------------------------
    let workdir = std::env::temp_dir().join("rag-core-demo");
    let corpus = workdir.join("corpus");
    let _ = std::fs::remove_dir_all(&workdir);
    write_corpus(&corpus)?;

    let options = RagOptions::builder()
        .provider("mock")
        .chunk_size(120)
        .chunk_overlap(20)
        .top_k(3)
        .similarity_threshold(0.2)
        .build()?;

    // -- 2. Wire the collaborators ----------------------------------------
    let model: Arc<dyn EmbeddingModel> = Arc::new(MockEmbeddingModel { dimensions: 64 });
    let store = Arc::new(InMemoryVectorStore::new());
    let fingerprints =
        Arc::new(JsonFileFingerprintStore::open(workdir.join("fingerprints.json")).await?);

    let service = RagIngestionService::builder()
        .reader(Arc::new(FileSystemReader::new(&corpus).with_extensions(["md"])))
        .transformer(Arc::new(MarkdownSplitter::new(options.chunk_size, options.chunk_overlap)?))
        .embedding_model(model.clone())
        .vector_store(store.clone())
        .fingerprint_store(fingerprints)
        .options(&options)
        .build()?;

    // -- 3. Ingest --------------------------------------------------------
    println!("full run:        {} chunk(s)", service.ingest_all().await?);
    println!("incremental run: {} chunk(s) changed", service.ingest_incremental().await?);

    std::fs::write(
        corpus.join("en/rag.md"),
        "# RAG\nRetrieval augmented generation stores embedded chunks in a vector database.\n\
         ## Freshness\nIncremental ingestion re-embeds only chunks whose fingerprint changed.",
    )?;
    println!("after edit:      {} chunk(s) changed", service.ingest_incremental().await?);
    println!("store holds {} chunk(s)", store.len().await);

    // -- 4. Retrieve ------------------------------------------------------
    let retriever = VectorStoreDocumentRetriever::builder()
        .embedding_model(model)
        .vector_store(store)
        .options(&options)
        .build()?;

    let english: Filters = [("source".to_string(), serde_json::json!("en/rust.md"))].into();
    let queries = [
        ("memory safety ownership", None),
        ("memory safety ownership", Some(&english)),
        ("which chunks are re-embedded", None),
    ];

    for (query, filters) in queries {
        println!("\nQuery: \"{query}\" filters={filters:?}");
        let docs = retriever.retrieve(Some(query), filters).await?;
        if docs.is_empty() {
            println!("  (no results)");
        }
        for (i, doc) in docs.iter().enumerate() {
            let preview: String = doc.text().chars().take(70).collect();
            println!(
                "  {}. [score={:.4}] {} | {}",
                i + 1,
                doc.score().unwrap_or_default(),
                doc.id(),
                preview.replace('\n', " "),
            );
        }
    }

    Ok(())
}
