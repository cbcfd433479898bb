//! Retrieval-Augmented Generation core: idempotent ingestion and filtered retrieval.
//!
//! This crate provides:
//! - [`RagIngestionService`]: reader → transformers → embedding → vector store,
//!   with full and fingerprint-driven incremental runs
//! - [`VectorStoreDocumentRetriever`]: query embedding → filtered similarity search
//! - Collaborator traits ([`DocumentReader`], [`DocumentTransformer`],
//!   [`DocumentWriter`], [`EmbeddingModel`], [`VectorStore`], [`FingerprintStore`])
//! - Reference implementations: [`FileSystemReader`], text splitters,
//!   [`InMemoryVectorStore`], in-memory and JSON-file fingerprint stores
//!
//! Embedding backends and production vector indexes live outside this crate
//! and plug in through the traits above.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod etl;
pub mod filesystem;
pub mod fingerprint;
pub mod inmemory;
pub mod ingestion;
pub mod retriever;
pub mod search;
pub mod vectorstore;

pub use chunking::{FixedSizeSplitter, MarkdownSplitter, RecursiveSplitter};
pub use config::{RagOptions, RagOptionsBuilder};
pub use document::{CHUNK_INDEX_KEY, Metadata, RagDocument, SOURCE_KEY};
pub use embedding::EmbeddingModel;
pub use error::{RagError, Result};
pub use etl::{DocumentReader, DocumentTransformer, DocumentWriter, VectorStoreWriter};
pub use filesystem::FileSystemReader;
pub use fingerprint::{
    FingerprintStore, InMemoryFingerprintStore, JsonFileFingerprintStore, MissingKeyPolicy,
    chunk_key, chunk_keys, fingerprint,
};
pub use inmemory::InMemoryVectorStore;
pub use ingestion::{RagIngestionService, RagIngestionServiceBuilder};
pub use retriever::{
    DocumentRetriever, VectorStoreDocumentRetriever, VectorStoreDocumentRetrieverBuilder,
};
pub use search::{
    DEFAULT_TOP_K, Filters, SIMILARITY_THRESHOLD_ACCEPT_ALL, SearchRequest, SearchRequestBuilder,
    merge_filters,
};
pub use vectorstore::VectorStore;
