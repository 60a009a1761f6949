//! Splitting page segments into overlapping chunks.
//!
//! Boundaries come from `text-splitter` with character sizing: it prefers
//! paragraph breaks, then sentences, then words, and only cuts mid-word
//! when nothing else fits. Overlap never crosses a page boundary.

use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

use crate::types::{DocumentChunk, PageSegment};

/// Splits segments with a fixed size and overlap, in characters.
pub struct SegmentSplitter {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
}

impl SegmentSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk settings: {}", e)))?
            .with_trim(true);

        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split every segment, in order. Chunks inherit page and file metadata
    /// from their segment and share one ingestion timestamp.
    pub fn split(&self, segments: &[PageSegment], ingested_at: DateTime<Utc>) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for segment in segments {
            let pieces = self
                .splitter
                .chunks(&segment.text)
                .filter(|piece| !piece.trim().is_empty());

            for (index, piece) in pieces.enumerate() {
                chunks.push(DocumentChunk::from_segment(
                    segment,
                    piece,
                    index as u32,
                    ingested_at,
                ));
            }
        }

        tracing::debug!(
            "Split {} segments into {} chunks (size: {})",
            segments.len(),
            chunks.len(),
            self.chunk_size
        );

        chunks
    }
}
