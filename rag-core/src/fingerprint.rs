//! Chunk keys, content fingerprints and the stores that remember them.
//!
//! A chunk key addresses a chunk by `(source, chunk_index)`; its fingerprint
//! is a base64 SHA-256 digest over the text and the canonical metadata
//! rendering. Incremental ingestion compares fingerprints under the same
//! key to decide what needs re-embedding.
//!
//! [`FingerprintStore`] is the seam for persistence: the default
//! [`InMemoryFingerprintStore`] forgets everything on restart, while
//! [`JsonFileFingerprintStore`] survives it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{RagDocument, display_value};
use crate::error::{RagError, Result};

/// What to do with a chunk lacking `source` or `chunk_index` metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Key the chunk by its own document ID (`id::<id>`).
    #[default]
    UseDocumentId,
    /// Fail the ingestion run with [`RagError::MissingChunkKey`].
    Reject,
}

/// Derive the stable key a chunk's fingerprint is stored under.
///
/// # Errors
///
/// Returns [`RagError::MissingChunkKey`] when the chunk has no
/// `source`/`chunk_index` pair and `policy` is [`MissingKeyPolicy::Reject`].
pub fn chunk_key(document: &RagDocument, policy: MissingKeyPolicy) -> Result<String> {
    match (document.source(), document.chunk_index()) {
        (Some(source), Some(index)) => {
            Ok(format!("{}::{}", display_value(source), display_value(index)))
        }
        _ => match policy {
            MissingKeyPolicy::UseDocumentId => Ok(format!("id::{}", document.id())),
            MissingKeyPolicy::Reject => {
                Err(RagError::MissingChunkKey { id: document.id().to_string() })
            }
        },
    }
}

/// Derive the keys of a whole run's chunks, in order.
///
/// Keys must be unique within a run. A chunk whose `source::chunk_index`
/// key was already taken by an earlier chunk falls back to `id::<id>` under
/// [`MissingKeyPolicy::UseDocumentId`].
///
/// # Errors
///
/// Returns [`RagError::DuplicateChunkKey`] when a key repeats under
/// [`MissingKeyPolicy::Reject`], or when the fallback key repeats too.
pub fn chunk_keys(documents: &[RagDocument], policy: MissingKeyPolicy) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(documents.len());
    let mut keys = Vec::with_capacity(documents.len());
    for document in documents {
        let mut key = chunk_key(document, policy)?;
        if seen.contains(&key) && policy == MissingKeyPolicy::UseDocumentId {
            debug!(
                chunk.key = %key,
                document.id = %document.id(),
                "chunk key already taken in this run, keying by id"
            );
            key = format!("id::{}", document.id());
        }
        if !seen.insert(key.clone()) {
            return Err(RagError::DuplicateChunkKey { key });
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Compute the content fingerprint of a chunk.
///
/// Covers the text and every metadata entry, so a metadata-only edit
/// yields a different fingerprint.
pub fn fingerprint(document: &RagDocument) -> Result<String> {
    let metadata = serde_json::to_string(document.metadata())
        .map_err(|e| RagError::FingerprintError(format!("cannot render metadata: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(document.text().as_bytes());
    hasher.update(metadata.as_bytes());
    Ok(STANDARD.encode(hasher.finalize()))
}

/// A key-value store mapping chunk keys to fingerprints.
///
/// Only the ingestion service writes to it, and only after the vector
/// store confirmed a write. `put_all` commits a whole run's entries at once.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Look up the fingerprint recorded for `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Record every `(key, fingerprint)` pair, all or nothing.
    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<()>;

    /// Number of tracked keys.
    async fn len(&self) -> Result<usize>;

    /// Forget every fingerprint.
    async fn clear(&self) -> Result<()>;
}

/// A process-local [`FingerprintStore`]. Restarting loses all history.
#[derive(Debug, Default)]
pub struct InMemoryFingerprintStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FingerprintStore for InMemoryFingerprintStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<()> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// A [`FingerprintStore`] persisted as a JSON object on disk.
///
/// The file is loaded once on [`open`](JsonFileFingerprintStore::open) and
/// rewritten on every commit through a temporary sibling file followed by
/// a rename, so a crash mid-write leaves the previous version intact.
#[derive(Debug)]
pub struct JsonFileFingerprintStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl JsonFileFingerprintStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries: HashMap<String, String> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RagError::FingerprintStoreError(format!("corrupt file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), tracked = entries.len(), "opened fingerprint store");
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl FingerprintStore for JsonFileFingerprintStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put_all(&self, entries: Vec<(String, String)>) -> Result<()> {
        let mut current = self.entries.write().await;
        let mut next = current.clone();
        next.extend(entries);
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut current = self.entries.write().await;
        let empty = HashMap::new();
        self.persist(&empty).await?;
        *current = empty;
        Ok(())
    }
}
