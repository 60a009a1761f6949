//! Ingestion pipeline stages that run before the index is locked.

use std::path::{Path, PathBuf};

use chrono::Utc;
use docqa_core::{AppError, AppResult};
use walkdir::WalkDir;

use crate::embeddings::{embed_in_batches, EmbeddingProvider};
use crate::extract::{extract_segments, is_supported};
use crate::splitter::SegmentSplitter;
use crate::vector_index::EmbeddedChunk;

/// A document that has been extracted, split and embedded but not yet indexed.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub filename: String,
    pub pages: usize,
    pub entries: Vec<EmbeddedChunk>,
}

/// Expand `paths` into supported document files. Directories are walked
/// recursively; explicit file paths are kept even when unsupported so the
/// extractor can report them.
pub fn discover_documents(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_supported(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            tracing::debug!("Found {} documents under {:?}", found.len(), path);
            documents.extend(found);
        } else {
            documents.push(path.clone());
        }
    }

    documents
}

/// File name a document is registered under.
pub fn document_filename(path: &Path) -> AppResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Extraction(format!("Invalid file name: {:?}", path)))
}

/// Extract, split and embed one document.
///
/// Fails with [`AppError::Extraction`] when the document has no extractable
/// text. Nothing is written anywhere.
pub async fn prepare_document(
    path: &Path,
    splitter: &SegmentSplitter,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> AppResult<PreparedDocument> {
    let filename = document_filename(path)?;

    let owned_path = path.to_path_buf();
    let segments = tokio::task::spawn_blocking(move || extract_segments(&owned_path))
        .await
        .map_err(|e| AppError::Other(format!("Extraction task failed: {}", e)))??;

    if segments.is_empty() {
        return Err(AppError::Extraction(format!(
            "No text could be extracted from '{}'",
            filename
        )));
    }

    let chunks = splitter.split(&segments, Utc::now());
    if chunks.is_empty() {
        return Err(AppError::Extraction(format!(
            "No text could be extracted from '{}'",
            filename
        )));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embed_in_batches(embedder, &texts, batch_size).await?;

    let entries = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Prepared '{}': {} pages, {} chunks",
        filename,
        segments.len(),
        entries.len()
    );

    Ok(PreparedDocument {
        filename,
        pages: segments.len(),
        entries,
    })
}
