//! Embedding providers.
//!
//! The index stores whatever vectors the configured provider produces; the
//! same provider must be used for ingestion and queries.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, embed_in_batches, EmbeddingProvider};
pub use providers::{OllamaProvider, TrigramProvider};
