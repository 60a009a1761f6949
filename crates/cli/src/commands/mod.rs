//! Command handlers for the DocQA CLI.

pub mod ask;
pub mod chat;
pub mod files;
pub mod ingest;
pub mod reset;
pub mod serve;
pub mod stats;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use files::FilesCommand;
pub use ingest::IngestCommand;
pub use reset::ResetCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;

use docqa_knowledge::AnswerOutcome;

/// Print an answer, its sources and any degradation notice to stdout.
pub(crate) fn print_outcome(outcome: &AnswerOutcome) {
    let answer = outcome.answer();
    println!("{}", answer.text);

    if !answer.citations.is_empty() {
        println!("\nSources:");
        for line in answer.citation_lines() {
            println!("  {}", line);
        }
    }

    if let Some(reason) = outcome.degradation() {
        println!("\n(note: {})", reason);
    }
}

/// JSON form of an answer shared by `ask --json` and the HTTP API.
pub(crate) fn outcome_json(outcome: &AnswerOutcome) -> serde_json::Value {
    let answer = outcome.answer();
    serde_json::json!({
        "answer": answer.text,
        "citations": answer.citation_lines(),
        "metadata": answer.metadata,
        "degraded": outcome.degradation(),
    })
}
