//! Files command handler.

use clap::Args;
use docqa_core::{AppConfig, AppResult};
use docqa_knowledge::KnowledgeService;

/// List ingested files
#[derive(Args, Debug)]
pub struct FilesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl FilesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::bootstrap(config).await?;
        let files = service.files().await;

        if self.json {
            let output = serde_json::json!({
                "files": service.file_counts().await,
                "total_files": files.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if files.is_empty() {
            println!("No files ingested");
            return Ok(());
        }

        for file in &files {
            println!("{:<40} {:>6} chunks", file.filename, file.chunk_count);
        }
        println!("\n{} files", files.len());
        Ok(())
    }
}
