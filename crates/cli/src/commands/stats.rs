//! Stats command handler.

use clap::Args;
use docqa_core::{AppConfig, AppResult};
use docqa_knowledge::KnowledgeService;

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::bootstrap(config).await?;
        let stats = service.stats().await;

        if self.json {
            let output = serde_json::json!({
                "stats": stats,
                "llmAvailable": service.llm_available(),
                "model": service.model(),
                "embeddingProvider": service.config().embedding.provider,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("Knowledge base: {}", config.state_dir().display());
        println!("  Files:       {}", stats.files);
        println!("  Chunks:      {}", stats.chunks);
        println!("  Index size:  {} bytes", stats.index_bytes);
        println!(
            "  LLM:         {}",
            service.model().unwrap_or("unavailable (fallback answers)")
        );
        Ok(())
    }
}
