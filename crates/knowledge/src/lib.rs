//! Document question answering over a local knowledge base.
//!
//! Documents are extracted page by page, split into overlapping chunks,
//! embedded and stored in a SQLite-backed vector index. Questions are
//! answered from the most relevant chunks, with citations, confidence
//! metadata and a bounded conversation memory. [`KnowledgeService`] owns all
//! shared state.

pub mod casual;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod rag;
pub mod registry;
pub mod service;
pub mod splitter;
pub mod telemetry;
pub mod tokens;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use config::KnowledgeConfig;
pub use extract::{is_supported, SUPPORTED_EXTENSIONS};
pub use ingest::discover_documents;
pub use rag::{Answer, AnswerMetadata, AnswerOutcome, Citation, Degradation, QueryRequest};
pub use registry::ReingestPolicy;
pub use service::KnowledgeService;
pub use telemetry::{InteractionRecord, InteractionSink, TracingSink};
pub use types::{ConversationTurn, IngestReport, KnowledgeStats, Role, UploadedFileRecord};
