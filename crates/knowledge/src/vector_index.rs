//! Vector index abstraction.
//!
//! State machine: `Uninitialized -> Ready` on the first successful `add`,
//! `Ready -> Uninitialized` on `clear`. Searching an uninitialized index
//! yields no results.

use std::collections::BTreeMap;

use docqa_core::AppResult;
use serde::Serialize;

use crate::types::{DocumentChunk, RetrievalResult};

/// Lifecycle state of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Uninitialized,
    Ready,
}

/// A chunk together with its embedding, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Equality filter over chunk metadata. A chunk is eligible only if every
/// key is known and matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on `filename == name`.
    pub fn filename(name: impl Into<String>) -> Self {
        Self::new().with("filename", name)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, chunk: &DocumentChunk) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| chunk.metadata_value(key).as_deref() == Some(expected.as_str()))
    }
}

/// Storage and similarity search over embedded chunks.
///
/// Embedding happens outside the index so callers can compute vectors
/// without holding a write lock.
pub trait VectorIndex: Send + Sync {
    fn state(&self) -> IndexState;

    /// Insert chunks. All or nothing: on error nothing was added.
    /// Identical chunks added twice are stored twice.
    fn add(&mut self, entries: Vec<EmbeddedChunk>) -> AppResult<()>;

    /// Up to `k` results in descending score order, restricted to chunks
    /// matching `filter`. Empty when nothing matches.
    fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>>;

    /// Discard every vector and the backing storage. Succeeds on an empty or
    /// partially initialized index.
    fn clear(&mut self) -> AppResult<()>;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored chunks per filename.
    fn chunk_counts(&self) -> BTreeMap<String, usize>;

    /// Bytes used by the backing storage.
    fn storage_bytes(&self) -> u64 {
        0
    }
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Score, filter and rank `entries` against a query vector.
pub fn rank<'a>(
    entries: impl IntoIterator<Item = &'a EmbeddedChunk>,
    query_embedding: &[f32],
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<RetrievalResult> {
    if k == 0 {
        return Vec::new();
    }

    let mut results: Vec<RetrievalResult> = entries
        .into_iter()
        .filter(|entry| filter.map_or(true, |f| f.matches(&entry.chunk)))
        .map(|entry| RetrievalResult {
            chunk: entry.chunk.clone(),
            score: cosine_similarity(query_embedding, &entry.embedding),
        })
        .collect();

    // Stable sort keeps insertion order among equal scores.
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(k);
    results
}
