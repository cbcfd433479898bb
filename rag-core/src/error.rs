//! Error types for the `rag-core` crate.

use thiserror::Error;

/// Errors that can occur in ingestion and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// A [`DocumentReader`](crate::DocumentReader) failed to produce documents.
    #[error("Reader error ({reader}): {message}")]
    ReaderError {
        /// The reader that produced the error.
        reader: String,
        /// A description of the failure.
        message: String,
    },

    /// A [`DocumentTransformer`](crate::DocumentTransformer) rejected its input batch.
    #[error("Transformer error ({transformer}): {message}")]
    TransformerError {
        /// The transformer that produced the error.
        transformer: String,
        /// A description of the failure.
        message: String,
    },

    /// A [`DocumentWriter`](crate::DocumentWriter) failed to persist a batch.
    #[error("Writer error: {0}")]
    WriterError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The fingerprint store could not be read or committed.
    #[error("Fingerprint store error: {0}")]
    FingerprintStoreError(String),

    /// A content fingerprint could not be computed.
    #[error("Fingerprint error: {0}")]
    FingerprintError(String),

    /// A chunk carries neither `source` nor `chunk_index` and the
    /// ingestion policy rejects such chunks.
    #[error("Document '{id}' has no source/chunk_index metadata to derive a chunk key")]
    MissingChunkKey {
        /// The offending document ID.
        id: String,
    },

    /// Two chunks of the same run resolved to one chunk key.
    #[error("Chunk key '{key}' is produced by more than one chunk in the same run")]
    DuplicateChunkKey {
        /// The contested key.
        key: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An ingestion run failed; the fingerprint store was left untouched.
    #[error("{mode} ingestion failed: {source}")]
    Ingestion {
        /// `"full"` or `"incremental"`.
        mode: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<RagError>,
    },

    /// A retrieval call failed; no partial result set is returned.
    #[error("retrieval failed: {source}")]
    Retrieval {
        /// The underlying failure.
        #[source]
        source: Box<RagError>,
    },

    /// An I/O error from a file-backed collaborator.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error from a file-backed collaborator.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Return the underlying cause for the `Ingestion`/`Retrieval` wrappers,
    /// or `self` for every other variant.
    pub fn root_cause(&self) -> &RagError {
        match self {
            RagError::Ingestion { source, .. } | RagError::Retrieval { source } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
