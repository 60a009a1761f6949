//! Interactive chat session.
//!
//! Reads questions line by line from stdin. The conversation memory lives as
//! long as the session, so follow-up questions see earlier turns.

use clap::Args;
use docqa_core::{AppConfig, AppResult};
use docqa_knowledge::{KnowledgeService, QueryRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::print_outcome;

/// Interactive question answering session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Only search chunks from this file
    #[arg(short, long)]
    pub file: Option<String>,

    /// Do not include earlier turns in prompts
    #[arg(long)]
    pub no_history: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let service = KnowledgeService::bootstrap(config).await?;
        if !service.is_initialized().await {
            println!("The knowledge base is empty. Run `docqa ingest <file>` first.");
        }
        println!("Ask a question. Commands: /history, /reset, /quit");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"\n> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();

            match input {
                "" => continue,
                "/quit" | "/exit" => break,
                "/reset" | "/clear" => {
                    service.clear_conversation().await;
                    println!("Conversation cleared.");
                }
                "/history" => {
                    for turn in service.conversation().await {
                        println!("{}: {}", turn.role.label(), turn.content);
                    }
                }
                question => {
                    let mut request =
                        QueryRequest::new(question).with_history(!self.no_history);
                    if let Some(ref file) = self.file {
                        request = request.with_filter(file.clone());
                    }

                    match service.answer(&request).await {
                        Ok(outcome) => print_outcome(&outcome),
                        Err(e) => println!("Error: {}", e),
                    }
                }
            }
        }

        Ok(())
    }
}
