//! Question answering types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DocumentChunk;

/// Characters of chunk text kept in a citation preview.
pub const PREVIEW_CHARS: usize = 150;

/// A question submitted to the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,

    /// Only used to label interaction records; memory is shared.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Restrict retrieval to chunks of this file
    #[serde(default)]
    pub filter_filename: Option<String>,

    /// Include recent conversation in the prompt
    #[serde(default = "default_true")]
    pub use_history: bool,

    /// Skip small-talk detection and always retrieve
    #[serde(default)]
    pub force_retrieval: bool,
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: default_session_id(),
            filter_filename: None,
            use_history: true,
            force_retrieval: false,
        }
    }

    pub fn with_filter(mut self, filename: impl Into<String>) -> Self {
        self.filter_filename = Some(filename.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_history(mut self, use_history: bool) -> Self {
        self.use_history = use_history;
        self
    }

    pub fn with_force_retrieval(mut self, force: bool) -> Self {
        self.force_retrieval = force;
        self
    }
}

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub filename: String,
    /// Zero-based page index
    pub page: u32,
    /// Relevance rounded to three decimals
    pub score: f32,
    /// Start of the chunk text, newlines collapsed to spaces
    pub preview: String,
}

impl Citation {
    pub fn from_chunk(chunk: &DocumentChunk, score: f32) -> Self {
        let preview: String = chunk
            .text
            .chars()
            .take(PREVIEW_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();

        Self {
            filename: chunk.filename.clone(),
            page: chunk.page,
            score: (score * 1000.0).round() / 1000.0,
            preview,
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Page {} (relevance: {:.2}): {}...",
            self.filename, self.page, self.score, self.preview
        )
    }
}

/// Observability data attached to every answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    /// Best relevance score among retrieved chunks (1.0 for small talk)
    pub confidence: f32,
    pub avg_relevance: f32,
    pub tokens_input: usize,
    pub tokens_output: usize,
    pub latency_ms: u64,
    pub llm_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub is_casual: bool,
    /// Answer withheld because confidence was below the threshold
    pub refused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An answer with its citations and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub metadata: AnswerMetadata,
}

impl Answer {
    /// Citations rendered as display strings.
    pub fn citation_lines(&self) -> Vec<String> {
        self.citations.iter().map(ToString::to_string).collect()
    }
}

/// Why an answer was produced in degraded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Degradation {
    /// Nothing has been ingested yet
    NoKnowledgeBase,
    /// Searching the index failed
    RetrievalFailed(String),
    /// No language model is configured or reachable
    LlmUnavailable,
    /// The language model call failed
    LlmFailed(String),
    /// The language model did not answer within the timeout (seconds)
    LlmTimeout(u64),
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::NoKnowledgeBase => write!(f, "knowledge base is empty"),
            Degradation::RetrievalFailed(e) => write!(f, "retrieval failed: {}", e),
            Degradation::LlmUnavailable => write!(f, "no language model available"),
            Degradation::LlmFailed(e) => write!(f, "LLM call failed: {}", e),
            Degradation::LlmTimeout(secs) => write!(f, "LLM call timed out after {}s", secs),
        }
    }
}

/// Result of a query that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Answered(Answer),
    Degraded { answer: Answer, reason: Degradation },
}

impl AnswerOutcome {
    pub fn answer(&self) -> &Answer {
        match self {
            AnswerOutcome::Answered(answer) => answer,
            AnswerOutcome::Degraded { answer, .. } => answer,
        }
    }

    pub fn into_answer(self) -> Answer {
        match self {
            AnswerOutcome::Answered(answer) => answer,
            AnswerOutcome::Degraded { answer, .. } => answer,
        }
    }

    pub fn degradation(&self) -> Option<&Degradation> {
        match self {
            AnswerOutcome::Answered(_) => None,
            AnswerOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation().is_some()
    }
}
