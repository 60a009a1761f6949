//! Knowledge base configuration.
//!
//! Loaded from `.docqa/knowledge/config.yaml`; every field has a default so
//! the file is optional and may be partial.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docqa_core::{config::STATE_DIR, AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingConfig;
use crate::registry::ReingestPolicy;

/// Tunables for ingestion, retrieval and answer synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks of a page
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Exchanges kept in conversation memory (turns kept = 2x this)
    pub max_history_turns: usize,

    /// Minimum best relevance score required to answer; 0 disables gating
    pub confidence_threshold: f32,

    /// Treat messages of at most two words without digits as small talk
    pub casual_short_message_heuristic: bool,

    /// Upper bound on a single LLM call
    pub llm_timeout_secs: u64,

    /// Probe the LLM at startup and run without it if unreachable
    pub probe_llm_on_startup: bool,

    /// What to do when a filename is ingested twice
    pub reingest_policy: ReingestPolicy,

    /// Optional HuggingFace tokenizer.json used for token accounting
    pub tokenizer_path: Option<PathBuf>,

    pub embedding: EmbeddingConfig,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 5,
            max_history_turns: 10,
            confidence_threshold: 0.0,
            casual_short_message_heuristic: true,
            llm_timeout_secs: 120,
            probe_llm_on_startup: true,
            reingest_policy: ReingestPolicy::Accumulate,
            tokenizer_path: None,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl KnowledgeConfig {
    /// Load the workspace config, falling back to defaults when absent.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let config_path = config_path(workspace);

        if !config_path.exists() {
            tracing::debug!("No knowledge config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        config.validate()?;
        tracing::debug!("Loaded knowledge config from {:?}", config_path);
        Ok(config)
    }

    /// Write the config to the workspace.
    pub fn save(&self, workspace: &Path) -> AppResult<()> {
        let config_path = config_path(workspace);
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(&config_path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be greater than 0".into()));
        }
        if self.max_history_turns == 0 {
            return Err(AppError::Config("max_history_turns must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.llm_timeout_secs == 0 {
            return Err(AppError::Config("llm_timeout_secs must be greater than 0".into()));
        }
        self.embedding.validate()
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Whether low-confidence answers are refused.
    pub fn gating_enabled(&self) -> bool {
        self.confidence_threshold > 0.0
    }
}

/// `.docqa/knowledge`
pub fn knowledge_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("knowledge")
}

/// `.docqa/knowledge/config.yaml`
pub fn config_path(workspace: &Path) -> PathBuf {
    knowledge_dir(workspace).join("config.yaml")
}

/// Directory owned by the vector index; removed on reset.
pub fn index_dir(workspace: &Path) -> PathBuf {
    knowledge_dir(workspace).join("index")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeConfig::load(temp.path()).unwrap();

        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.max_history_turns, 10);
        assert!(!config.gating_enabled());
        assert_eq!(config.reingest_policy, ReingestPolicy::Accumulate);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "top_k: 3\nconfidence_threshold: 0.4\nreingest_policy: reject\n").unwrap();

        let config = KnowledgeConfig::load(temp.path()).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunk_size, 1000);
        assert!(config.gating_enabled());
        assert_eq!(config.reingest_policy, ReingestPolicy::Reject);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let config = KnowledgeConfig {
            chunk_size: 400,
            chunk_overlap: 40,
            ..Default::default()
        };
        config.save(temp.path()).unwrap();

        assert_eq!(KnowledgeConfig::load(temp.path()).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let config = KnowledgeConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let config = KnowledgeConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths() {
        let ws = Path::new("/ws");
        assert_eq!(index_dir(ws), PathBuf::from("/ws/.docqa/knowledge/index"));
        assert_eq!(config_path(ws), PathBuf::from("/ws/.docqa/knowledge/config.yaml"));
    }
}
