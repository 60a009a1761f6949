//! Embedding provider settings.

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Providers `create_provider` can build.
pub const SUPPORTED_PROVIDERS: &[&str] = &["trigram", "ollama"];

/// Embedding configuration, nested under `embedding:` in the knowledge config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Texts sent per embedding call during ingestion
    pub batch_size: usize,

    /// Base URL for HTTP providers; defaults to the LLM endpoint
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: 32,
            base_url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: {}",
                self.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }
        if self.dimensions == 0 {
            return Err(AppError::Config("Embedding dimensions must be greater than 0".into()));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config("Embedding batch_size must be greater than 0".into()));
        }
        Ok(())
    }
}
