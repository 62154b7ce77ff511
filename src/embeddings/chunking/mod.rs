
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::loader::LoadedDocument;
use crate::{RagError, Result};

/// Free-form string metadata attached to documents and inherited by their chunks
pub type Metadata = BTreeMap<String, String>;

/// A piece of a source document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}_chunk_{chunk_index}`
    pub chunk_id: String,
    pub document_id: String,
    /// Dense 0-based position among the chunks emitted for the document
    pub chunk_index: u32,
    /// Trimmed window text
    pub content: String,
    /// Character offset where this chunk's window starts
    pub start_offset: usize,
    /// 1-based page for paged formats
    pub page_number: Option<u32>,
    /// Markdown heading path
    pub section: Option<String>,
    pub metadata: Metadata,
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Fixed-size sliding-window chunker over character offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into overlapping chunks carrying `metadata`
    #[inline]
    pub fn chunk(&self, text: &str, metadata: &Metadata, document_id: &str) -> Vec<Chunk> {
        self.build_chunks(text, metadata, document_id, |_| (None, None))
    }

    /// Split a loaded document, attaching page and section locators
    #[inline]
    pub fn chunk_document(
        &self,
        document: &LoadedDocument,
        metadata: &Metadata,
        document_id: &str,
    ) -> Vec<Chunk> {
        self.build_chunks(&document.text, metadata, document_id, |offset| {
            (
                document.page_at(offset),
                document.section_at(offset).map(str::to_string),
            )
        })
    }

    fn build_chunks<F>(
        &self,
        text: &str,
        metadata: &Metadata,
        document_id: &str,
        locate: F,
    ) -> Vec<Chunk>
    where
        F: Fn(usize) -> (Option<u32>, Option<String>),
    {
        let chunks: Vec<Chunk> = self
            .windows(text)
            .into_iter()
            .enumerate()
            .map(|(index, (start_offset, content))| {
                let chunk_index = u32::try_from(index).unwrap_or(u32::MAX);
                let (page_number, section) = locate(start_offset);
                Chunk {
                    chunk_id: chunk_id(document_id, chunk_index),
                    document_id: document_id.to_string(),
                    chunk_index,
                    content,
                    start_offset,
                    page_number,
                    section,
                    metadata: metadata.clone(),
                }
            })
            .collect();

        debug!(
            "Chunked document {} into {} chunks (size {}, overlap {})",
            document_id,
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }

    /// Non-blank trimmed windows with their starting character offset
    fn windows(&self, text: &str) -> Vec<(usize, String)> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let window = |start: usize, end: usize| {
            text.get(boundaries[start]..boundaries[end])
                .map(str::trim)
                .filter(|trimmed| !trimmed.is_empty())
                .map(|trimmed| (start, trimmed.to_string()))
        };

        // Text that fits in one window is never split
        if char_len <= self.chunk_size {
            return window(0, char_len).into_iter().collect();
        }

        // Steps use the unclamped window end, so the tail may be a window
        // lying inside the previous overlap
        let step = self.chunk_size - self.chunk_overlap;
        (0..char_len)
            .step_by(step)
            .filter_map(|start| window(start, (start + self.chunk_size).min(char_len)))
            .collect()
    }
}

/// Stable chunk identifier
#[inline]
pub fn chunk_id(document_id: &str, chunk_index: u32) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}
