//! Text splitters that turn documents into addressable chunks.
//!
//! Each splitter is a [`DocumentTransformer`]:
//!
//! - [`FixedSizeSplitter`] — splits by character count with configurable overlap
//! - [`RecursiveSplitter`] — splits hierarchically by paragraphs, sentences, then words
//! - [`MarkdownSplitter`] — splits by markdown headers, preserving header context
//!
//! Every chunk inherits its parent's metadata, gets a `chunk_index`, keeps
//! the parent's `source` and is identified as `{parent_id}_{chunk_index}`.
//! When the parent has no `source`, or is itself a chunk, the parent ID
//! becomes the source, so chained splitters never reuse a key. Sizes count characters, never
//! bytes, so multi-byte text is never cut mid-character.

use serde_json::Value;

use crate::document::{CHUNK_INDEX_KEY, RagDocument, SOURCE_KEY};
use crate::error::{RagError, Result};
use crate::etl::DocumentTransformer;

/// Metadata key recording the markdown header hierarchy of a chunk.
pub const HEADER_PATH_KEY: &str = "header_path";

const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

fn validate(splitter: &str, chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return Err(RagError::TransformerError {
            transformer: splitter.to_string(),
            message: format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            ),
        });
    }
    Ok(())
}

/// Build the `index`-th chunk of `parent`.
fn make_chunk(parent: &RagDocument, index: usize, text: String) -> RagDocument {
    let mut metadata = parent.metadata().clone();
    if parent.source().is_none() || parent.chunk_index().is_some() {
        metadata.insert(SOURCE_KEY.to_string(), Value::from(parent.id()));
    }
    metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(index));
    RagDocument::with_id(format!("{}_{index}", parent.id()), text).with_metadata_map(metadata)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::FixedSizeSplitter;
///
/// let splitter = FixedSizeSplitter::new(256, 50)?;
/// let chunks = splitter.transform(documents)?;
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeSplitter {
    /// Create a new `FixedSizeSplitter`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::TransformerError`] unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate("FixedSizeSplitter", chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl DocumentTransformer for FixedSizeSplitter {
    fn transform(&self, documents: Vec<RagDocument>) -> Result<Vec<RagDocument>> {
        Ok(documents
            .iter()
            .flat_map(|doc| {
                split_by_size(doc.text(), self.chunk_size, self.chunk_overlap)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, text)| make_chunk(doc, i, text))
            })
            .collect())
    }
}

/// Splits text hierarchically: paragraphs → sentences → words.
///
/// First splits by paragraph separators (`\n\n`). If a paragraph exceeds
/// `chunk_size`, splits by sentence boundaries (`. `, `! `, `? `). If a
/// sentence still exceeds `chunk_size`, splits by word boundaries, and
/// finally by characters.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// Create a new `RecursiveSplitter`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::TransformerError`] unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate("RecursiveSplitter", chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl DocumentTransformer for RecursiveSplitter {
    fn transform(&self, documents: Vec<RagDocument>) -> Result<Vec<RagDocument>> {
        Ok(documents
            .iter()
            .flat_map(|doc| {
                split_and_merge(doc.text(), self.chunk_size, self.chunk_overlap, &SEPARATORS)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, text)| make_chunk(doc, i, text))
            })
            .collect())
    }
}

/// Split text by a separator, then merge segments into chunks that respect
/// `chunk_size`. If a segment exceeds `chunk_size`, it is split further
/// using the next-level separator.
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size || separators.is_empty() {
        return split_by_size(text, chunk_size, chunk_overlap);
    }

    let separator = separators[0];
    let remaining_separators = &separators[1..];
    let segments = split_keeping_separator(text, separator);

    let mut chunks = Vec::new();
    let mut current = String::new();

    let flush = |current: String, chunks: &mut Vec<String>| {
        if char_len(&current) > chunk_size {
            chunks.extend(split_and_merge(
                &current,
                chunk_size,
                chunk_overlap,
                remaining_separators,
            ));
        } else {
            chunks.push(current);
        }
    };

    for segment in segments {
        if current.is_empty() {
            current = segment.to_string();
        } else if char_len(&current) + char_len(segment) <= chunk_size {
            current.push_str(segment);
        } else {
            flush(std::mem::replace(&mut current, segment.to_string()), &mut chunks);
        }
    }

    if !current.is_empty() {
        flush(current, &mut chunks);
    }

    chunks
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character-based splitting with overlap.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Splits text by markdown headers, keeping each section as a chunk.
///
/// Each section is prefixed with its header hierarchy. Sections exceeding
/// `chunk_size` are further split using [`RecursiveSplitter`] logic.
/// The `header_path` metadata field records the header hierarchy for each chunk.
#[derive(Debug, Clone)]
pub struct MarkdownSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl MarkdownSplitter {
    /// Create a new `MarkdownSplitter`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::TransformerError`] unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate("MarkdownSplitter", chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    fn split_document(&self, document: &RagDocument) -> Vec<RagDocument> {
        let mut chunks = Vec::new();
        let mut chunk_index = 0;

        for section in parse_markdown_sections(document.text()) {
            let section_text = if section.header_path.is_empty() {
                section.text.clone()
            } else if section.text.is_empty() {
                section.header_path.clone()
            } else {
                format!("{}\n{}", section.header_path, section.text)
            };

            if section_text.is_empty() {
                continue;
            }

            let pieces = if char_len(&section_text) > self.chunk_size {
                split_and_merge(&section_text, self.chunk_size, self.chunk_overlap, &SEPARATORS)
            } else {
                vec![section_text]
            };

            for text in pieces {
                let mut chunk = make_chunk(document, chunk_index, text);
                chunk
                    .metadata_mut()
                    .insert(HEADER_PATH_KEY.to_string(), Value::from(section.header_path.clone()));
                chunks.push(chunk);
                chunk_index += 1;
            }
        }

        chunks
    }
}

/// A markdown section with its header hierarchy and body text.
struct MarkdownSection {
    header_path: String,
    text: String,
}

/// Parse markdown text into sections split by headers.
fn parse_markdown_sections(text: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut current_body = String::new();
    let mut current_header_path = String::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            if !current_body.is_empty() || !current_header_path.is_empty() {
                sections.push(MarkdownSection {
                    header_path: current_header_path.clone(),
                    text: current_body.trim().to_string(),
                });
                current_body = String::new();
            }

            let level = trimmed.chars().take_while(|c| *c == '#').count();
            let header_text = trimmed[level..].trim().to_string();

            headers.truncate(level.saturating_sub(1));
            headers.push(header_text);
            current_header_path = headers.join(" > ");
        } else {
            if !current_body.is_empty() {
                current_body.push('\n');
            }
            current_body.push_str(line);
        }
    }

    if !current_body.is_empty() || !current_header_path.is_empty() {
        sections.push(MarkdownSection {
            header_path: current_header_path,
            text: current_body.trim().to_string(),
        });
    }

    sections
}

impl DocumentTransformer for MarkdownSplitter {
    fn transform(&self, documents: Vec<RagDocument>) -> Result<Vec<RagDocument>> {
        Ok(documents.iter().flat_map(|doc| self.split_document(doc)).collect())
    }
}
