//! Embedding provider trait and factory.

use std::sync::Arc;

use docqa_core::{AppError, AppResult};

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{ollama::OllamaProvider, trigram::TrigramProvider};

/// Maps text to fixed-dimension vectors.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Embed several texts; output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed one text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Build the configured provider.
///
/// `default_base_url` is used by HTTP providers when the embedding config
/// has no `base_url` of its own. The Ollama provider verifies connectivity
/// before returning.
pub async fn create_provider(
    config: &EmbeddingConfig,
    default_base_url: &str,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(config.dimensions))),
        "ollama" => {
            let base_url = config.base_url.as_deref().unwrap_or(default_base_url);
            let provider = OllamaProvider::connect(config, base_url).await?;
            Ok(Arc::new(provider))
        }
        other => Err(AppError::Config(format!("Unknown embedding provider: '{}'", other))),
    }
}

/// Embed `texts` in slices of at most `batch_size`.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}
