//! Fixed-stride character chunking.
//!
//! Documents are split into chunks of `chunk_size` characters starting
//! every `chunk_size - chunk_overlap` characters, so consecutive chunks
//! share exactly `chunk_overlap` characters. Concatenating the chunks with
//! the overlap removed reconstructs the document text exactly.


use tracing::debug;

use crate::config::ChunkingConfig;
use crate::crawler::Document;

/// A bounded-length slice of a document's text, the unit of storage and
/// retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub content: String,
    pub source_url: String,
    pub title: String,
    /// Character offset of this chunk within the original document.
    pub start_offset: usize,
    /// Index of this chunk within the document.
    pub chunk_index: usize,
}

/// Split a document into overlapping chunks tagged with their source URL
/// and start offset.
#[inline]
pub fn split_document(document: &Document, config: &ChunkingConfig) -> Vec<DocumentChunk> {
    let chunks = split_text(&document.content, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (start_offset, content))| DocumentChunk {
            content,
            source_url: document.source_url.clone(),
            title: document.title.clone(),
            start_offset,
            chunk_index,
        })
        .collect::<Vec<_>>();

    debug!(
        "Split document '{}' into {} chunks",
        document.source_url,
        chunks.len()
    );

    chunks
}

/// Split text into (char_offset, chunk) pairs.
///
/// Every chunk except possibly the last is exactly `chunk_size` characters;
/// chunk N+1 starts `chunk_size - overlap` characters after chunk N.
/// Operates on character boundaries, so multi-byte text is never split
/// mid-character.
#[inline]
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, String)> {
    debug_assert!(overlap < chunk_size);

    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of each character boundary, plus the end of the string.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total_chars);
        let slice = text
            .get(boundaries[start]..boundaries[end])
            .unwrap_or_default();
        chunks.push((start, slice.to_string()));

        if end == total_chars {
            break;
        }
        start += stride;
    }

    chunks
}
