//! A [`DocumentReader`] over the text files of a directory tree.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::{RagDocument, SOURCE_KEY};
use crate::error::{RagError, Result};
use crate::etl::DocumentReader;

/// Metadata key holding the file's modification time in unix seconds.
pub const LAST_MODIFIED_KEY: &str = "last_modified";

const DEFAULT_EXTENSIONS: [&str; 3] = ["md", "txt", "rst"];

/// Reads every matching file under a root directory as one document.
///
/// Each document's ID and `source` are the file path relative to the root
/// (with `/` separators), so repeated reads of an unchanged tree produce the
/// same keys. `last_modified` is recorded when the platform reports it,
/// which makes a touched file count as changed for incremental ingestion.
/// Files that are not valid UTF-8 are skipped with a warning.
#[derive(Debug, Clone)]
pub struct FileSystemReader {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileSystemReader {
    /// Read `.md`, `.txt` and `.rst` files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extensions: DEFAULT_EXTENSIONS.map(String::from).to_vec() }
    }

    /// Replace the accepted file extensions (without leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Collect matching file paths; the walk runs on the blocking pool.
    async fn discover(&self) -> Result<Vec<PathBuf>> {
        let root = self.root.clone();
        let extensions = self.extensions.clone();
        tokio::task::spawn_blocking(move || walk(&root, &extensions))
            .await
            .map_err(|e| reader_error(format!("directory walk task failed: {e}")))?
    }

    fn relative_source(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn reader_error(message: String) -> RagError {
    RagError::ReaderError { reader: "FileSystemReader".to_string(), message }
}

fn walk(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry =
            entry.map_err(|e| reader_error(format!("cannot walk {}: {e}", root.display())))?;
        if entry.file_type().is_file() && accepts(extensions, entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn accepts(extensions: &[String], path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[async_trait]
impl DocumentReader for FileSystemReader {
    async fn read(&self) -> Result<Vec<RagDocument>> {
        let mut documents = Vec::new();
        for path in self.discover().await? {
            let bytes = tokio::fs::read(&path).await?;
            let Ok(text) = String::from_utf8(bytes) else {
                warn!(path = %path.display(), "skipping file that is not valid UTF-8");
                continue;
            };

            let source = self.relative_source(&path);
            let mut document =
                RagDocument::with_id(source.clone(), text).with_metadata(SOURCE_KEY, source);

            let modified = tokio::fs::metadata(&path)
                .await
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            if let Some(secs) = modified {
                document = document.with_metadata(LAST_MODIFIED_KEY, secs);
            }

            documents.push(document);
        }

        debug!(root = %self.root.display(), document_count = documents.len(), "read directory");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn reads_matching_files_with_relative_sources() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::write(root.join("guides/install.md"), "# Install\nrun it").unwrap();
        fs::write(root.join("notes.txt"), "plain notes").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = FileSystemReader::new(root).read().await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["guides/install.md", "notes.txt"]);
        assert_eq!(docs[0].source(), Some(&json!("guides/install.md")));
        assert_eq!(docs[1].text(), "plain notes");
        assert!(docs[0].metadata().contains_key(LAST_MODIFIED_KEY));
    }

    #[tokio::test]
    async fn skips_invalid_utf8_and_honors_extensions() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("bad.txt"), [0xffu8, 0xfe]).unwrap();
        fs::write(root.join("page.html"), "<p>hi</p>").unwrap();

        let docs =
            FileSystemReader::new(root).with_extensions(["txt", "html"]).read().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), "page.html");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn walks_nested_trees_off_the_runtime_workers() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        for depth in ["a", "a/b", "a/b/c"] {
            fs::create_dir_all(root.join(depth)).unwrap();
            fs::write(root.join(depth).join("page.md"), depth).unwrap();
        }

        let docs = FileSystemReader::new(root).read().await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a/b/c/page.md", "a/b/page.md", "a/page.md"]);
    }

    #[tokio::test]
    async fn missing_root_is_a_reader_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = FileSystemReader::new(temp.path().join("absent")).read().await.unwrap_err();
        assert!(matches!(err, RagError::ReaderError { .. }));
    }
}
