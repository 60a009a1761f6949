//! Ask command handler.

use clap::Args;
use docqa_core::{AppConfig, AppResult};
use docqa_knowledge::{KnowledgeService, QueryRequest};

use super::{outcome_json, print_outcome};

/// Ask one question about the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Only search chunks from this file
    #[arg(short, long)]
    pub file: Option<String>,

    /// Do not include earlier turns in the prompt
    #[arg(long)]
    pub no_history: bool,

    /// Always search the documents, even for small talk
    #[arg(long)]
    pub force_retrieval: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let service = KnowledgeService::bootstrap(config).await?;

        let mut request = QueryRequest::new(self.question.clone())
            .with_history(!self.no_history)
            .with_force_retrieval(self.force_retrieval);
        if let Some(ref file) = self.file {
            request = request.with_filter(file.clone());
        }

        let outcome = service.answer(&request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
        } else {
            print_outcome(&outcome);
        }
        Ok(())
    }
}
