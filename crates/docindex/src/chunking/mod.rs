//! Overlapping, boundary-aware splitting of documents into chunk candidates.
//!
//! Offsets are byte offsets into the source text, always on UTF-8 character
//! boundaries. Windows are at most `target_size` bytes (longer only when a single
//! character exceeds the target) and consecutive windows share at most `overlap`
//! bytes.

mod boundary;

use docindex_core::ChunkingConfig;
use serde_json::Value;

use boundary::{ceil_char_boundary, find_separator_cut, floor_char_boundary, next_char_boundary};

use crate::chunk::Metadata;

/// Metadata key holding the start byte offset of a chunk
pub const START_POS_KEY: &str = "start_pos";
/// Metadata key holding the end byte offset of a chunk
pub const END_POS_KEY: &str = "end_pos";
/// Metadata key holding the chunk's ordinal within its document
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Position of a chunk inside its source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Ordinal of the chunk within the document
    pub index: usize,
}

/// A piece of a document that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    /// Trimmed chunk text
    pub text: String,
    /// Document metadata plus position keys
    pub metadata: Metadata,
    /// Raw window the text was cut from
    pub span: ChunkSpan,
    /// Precomputed embedding, if the caller already has one
    pub embedding: Option<Vec<f32>>,
}

impl ChunkCandidate {
    /// Wrap a whole text as a single candidate without splitting
    pub fn whole(text: String, metadata: Metadata) -> Self {
        let span = ChunkSpan {
            start: 0,
            end: text.len(),
            index: 0,
        };
        Self {
            metadata: with_position(&metadata, span),
            text,
            span,
            embedding: None,
        }
    }

    /// Attach a precomputed embedding
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Splits text into overlapping windows that prefer natural boundaries
#[derive(Debug, Clone)]
pub struct ChunkBoundarySplitter {
    target_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Default for ChunkBoundarySplitter {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl ChunkBoundarySplitter {
    /// Splitter with the default separator priority list
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size: target_size.max(1),
            overlap,
            separators: ChunkingConfig::default().separators,
        }
    }

    /// Splitter configured from [`ChunkingConfig`]
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            target_size: config.target_size.max(1),
            overlap: config.overlap,
            separators: config
                .separators
                .iter()
                .filter(|separator| !separator.is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Split `text` into chunk candidates carrying a copy of `metadata`.
    ///
    /// Empty input yields nothing. Text shorter than half the target size is
    /// returned unchanged as one candidate. Otherwise each window is cut at the
    /// last occurrence of the highest-priority separator inside it that lies
    /// past the previous chunk's end, falling back to a hard cut. Windows whose trimmed text is empty are skipped. Splitting
    /// stops after the window that reaches the end of the text.
    #[must_use]
    pub fn split(&self, text: &str, metadata: &Metadata) -> Vec<ChunkCandidate> {
        if text.is_empty() {
            return Vec::new();
        }

        if text.len() * 2 < self.target_size {
            return vec![ChunkCandidate::whole(text.to_owned(), metadata.clone())];
        }

        let mut candidates = Vec::new();
        let mut start = 0;
        let mut previous_end = 0;

        while start < text.len() {
            let mut window_end = floor_char_boundary(text, start.saturating_add(self.target_size));
            if window_end <= start {
                window_end = next_char_boundary(text, start);
            }

            let end = if window_end < text.len() {
                find_separator_cut(text, start, window_end, previous_end, &self.separators)
                    .unwrap_or(window_end)
            } else {
                window_end
            };

            let piece = text[start..end].trim();
            if !piece.is_empty() {
                let span = ChunkSpan {
                    start,
                    end,
                    index: candidates.len(),
                };
                candidates.push(ChunkCandidate {
                    text: piece.to_owned(),
                    metadata: with_position(metadata, span),
                    span,
                    embedding: None,
                });
            }

            if end >= text.len() {
                break;
            }
            previous_end = end;

            let overlapped = ceil_char_boundary(text, end.saturating_sub(self.overlap));
            start = overlapped.max(next_char_boundary(text, start));
        }

        candidates
    }
}

/// Split with the default separators.
#[must_use]
pub fn split(
    text: &str,
    metadata: &Metadata,
    target_size: usize,
    overlap: usize,
) -> Vec<ChunkCandidate> {
    ChunkBoundarySplitter::new(target_size, overlap).split(text, metadata)
}

fn with_position(metadata: &Metadata, span: ChunkSpan) -> Metadata {
    let mut metadata = metadata.clone();
    metadata.insert(START_POS_KEY.to_owned(), Value::from(span.start));
    metadata.insert(END_POS_KEY.to_owned(), Value::from(span.end));
    metadata.insert(CHUNK_INDEX_KEY.to_owned(), Value::from(span.index));
    metadata
}
