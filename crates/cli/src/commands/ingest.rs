//! Ingest command handler.

use clap::Args;
use docqa_core::{AppConfig, AppError, AppResult};
use docqa_knowledge::{discover_documents, KnowledgeService};
use std::path::PathBuf;

/// Add documents to the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest (pdf, txt, md, html)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Stop at the first document that fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let documents = discover_documents(&self.paths);
        if documents.is_empty() {
            return Err(AppError::Validation(format!(
                "No supported documents found in {:?}",
                self.paths
            )));
        }

        let service = KnowledgeService::bootstrap(config).await?;

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for path in &documents {
            match service.ingest(path).await {
                Ok(report) => {
                    if !self.json {
                        println!("✓ {} ({} chunks)", report.filename, report.chunk_count);
                    }
                    reports.push(report);
                }
                Err(e) if !self.fail_fast => {
                    if !self.json {
                        println!("✗ {}: {}", path.display(), e);
                    }
                    failures.push(serde_json::json!({
                        "path": path.display().to_string(),
                        "error": e.to_string(),
                    }));
                }
                Err(e) => return Err(e),
            }
        }

        let stats = service.stats().await;
        if self.json {
            let output = serde_json::json!({
                "ingested": reports,
                "failed": failures,
                "totalFiles": stats.files,
                "totalChunks": stats.chunks,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "\nIngested {} of {} documents; knowledge base holds {} files, {} chunks",
                reports.len(),
                documents.len(),
                stats.files,
                stats.chunks
            );
        }

        if reports.is_empty() {
            return Err(AppError::Knowledge("No documents were ingested".to_string()));
        }
        Ok(())
    }
}
