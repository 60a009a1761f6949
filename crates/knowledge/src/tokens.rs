//! Token accounting for answer metadata.
//!
//! Counts are estimates used for usage reporting only. When a configured
//! tokenizer fails, counting falls back to `ceil(chars / 4)`.

use std::path::Path;

use docqa_core::AppResult;
#[cfg(feature = "hf-tokenizer")]
use docqa_core::AppError;
use unicode_segmentation::UnicodeSegmentation;

/// Characters per token assumed by the estimators.
const CHARS_PER_TOKEN: usize = 4;

enum Backend {
    /// Word-boundary estimator
    Heuristic,
    #[cfg(feature = "hf-tokenizer")]
    HuggingFace(Box<tokenizers::Tokenizer>),
}

pub struct TokenCounter {
    backend: Backend,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl TokenCounter {
    pub fn heuristic() -> Self {
        Self {
            backend: Backend::Heuristic,
        }
    }

    /// Load the tokenizer at `tokenizer_path` if one is configured and the
    /// `hf-tokenizer` feature is enabled; otherwise use the estimator.
    pub fn from_config(tokenizer_path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = tokenizer_path else {
            return Ok(Self::heuristic());
        };

        #[cfg(feature = "hf-tokenizer")]
        {
            let tokenizer = tokenizers::Tokenizer::from_file(path).map_err(|e| {
                AppError::Config(format!("Failed to load tokenizer at {:?}: {}", path, e))
            })?;
            tracing::info!("Token accounting uses tokenizer at {:?}", path);
            Ok(Self {
                backend: Backend::HuggingFace(Box::new(tokenizer)),
            })
        }

        #[cfg(not(feature = "hf-tokenizer"))]
        {
            tracing::warn!(
                "tokenizer_path {:?} ignored: built without the hf-tokenizer feature",
                path
            );
            Ok(Self::heuristic())
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Heuristic => "heuristic",
            #[cfg(feature = "hf-tokenizer")]
            Backend::HuggingFace(_) => "huggingface",
        }
    }

    /// Token count of `text`. Never fails.
    pub fn count(&self, text: &str) -> usize {
        match &self.backend {
            Backend::Heuristic => estimate_tokens(text),
            #[cfg(feature = "hf-tokenizer")]
            Backend::HuggingFace(tokenizer) => match tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    tracing::debug!("Tokenization failed, approximating: {}", e);
                    approximate_tokens(text)
                }
            },
        }
    }
}

/// Each non-whitespace word-boundary segment costs `ceil(chars / 4)`, at least one.
fn estimate_tokens(text: &str) -> usize {
    text.split_word_bounds()
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| segment.chars().count().div_ceil(CHARS_PER_TOKEN).max(1))
        .sum()
}

/// `ceil(chars / 4)`.
pub fn approximate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}
