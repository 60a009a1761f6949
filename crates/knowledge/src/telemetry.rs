//! Structured interaction records.
//!
//! The knowledge service emits one record per answered query and one per
//! failed operation. Storage and aggregation belong to the sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One answered query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub latency_ms: u64,
    pub tokens_input: usize,
    pub tokens_output: usize,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub refused: bool,
    pub is_casual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receives interaction and error records.
pub trait InteractionSink: Send + Sync {
    fn record_interaction(&self, record: &InteractionRecord);

    /// `operation` names what failed (e.g. "ingest", "answer").
    fn record_error(&self, operation: &str, message: &str, session_id: Option<&str>);
}

/// Logs records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl InteractionSink for TracingSink {
    fn record_interaction(&self, record: &InteractionRecord) {
        tracing::info!(
            session_id = %record.session_id,
            latency_ms = record.latency_ms,
            tokens_input = record.tokens_input,
            tokens_output = record.tokens_output,
            confidence = record.confidence,
            model = record.model.as_deref().unwrap_or("none"),
            refused = record.refused,
            is_casual = record.is_casual,
            "interaction"
        );
    }

    fn record_error(&self, operation: &str, message: &str, session_id: Option<&str>) {
        tracing::error!(
            operation,
            session_id = session_id.unwrap_or("-"),
            "{}",
            message
        );
    }
}
