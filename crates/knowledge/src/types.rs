//! Knowledge type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One page of extracted text, before splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSegment {
    pub text: String,
    /// Zero-based page index within the source file
    pub page: u32,
    /// Path the document was read from
    pub source_file: String,
    /// File name used as the registry key and filter value
    pub filename: String,
}

/// A chunk of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    /// Zero-based page index within the source file
    pub page: u32,
    pub source_file: String,
    pub filename: String,
    /// Position of this chunk within its page
    pub chunk_index: u32,
    /// SHA-256 of `text`, hex encoded
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl DocumentChunk {
    /// Build a chunk inheriting page and file metadata from `segment`.
    pub fn from_segment(
        segment: &PageSegment,
        text: impl Into<String>,
        chunk_index: u32,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        let text = text.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_hash: content_hash(&text),
            text,
            page: segment.page,
            source_file: segment.source_file.clone(),
            filename: segment.filename.clone(),
            chunk_index,
            ingested_at,
        }
    }

    /// Value of a filterable metadata key, if the key is known.
    pub fn metadata_value(&self, key: &str) -> Option<String> {
        match key {
            "filename" => Some(self.filename.clone()),
            "source_file" | "source" => Some(self.source_file.clone()),
            "page" => Some(self.page.to_string()),
            _ => None,
        }
    }
}

/// A chunk paired with its relevance to a query (higher is more relevant).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Registry entry for an ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFileRecord {
    pub filename: String,
    pub chunk_count: usize,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub filename: String,
    /// Chunks added by this ingestion
    pub chunk_count: usize,
    /// Non-empty pages found in the document
    pub pages: usize,
    /// Files in the registry after this ingestion
    pub total_files: usize,
}

/// Knowledge base statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeStats {
    pub files: usize,
    pub chunks: usize,
    pub index_bytes: u64,
    pub initialized: bool,
    pub conversation_turns: usize,
}

/// Hex-encoded SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
