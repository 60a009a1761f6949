//! Reset command handler.

use clap::Args;
use docqa_core::{AppConfig, AppResult};
use docqa_knowledge::KnowledgeService;
use std::io::Write;

/// Delete the knowledge base
#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if !self.yes && !confirm("Delete every ingested document?")? {
            println!("Aborted");
            return Ok(());
        }

        let service = KnowledgeService::bootstrap(config).await?;
        service.reset_knowledge_base().await?;
        println!("Knowledge base cleared");
        Ok(())
    }
}

fn confirm(question: &str) -> AppResult<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
