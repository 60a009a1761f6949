//! In-memory interaction metrics for the HTTP server.
//!
//! Keeps the most recent interactions and errors plus per-day totals, and
//! derives latency percentiles and rates on demand. Nothing is persisted.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use docqa_knowledge::{InteractionRecord, InteractionSink};
use serde::Serialize;

const MAX_INTERACTIONS: usize = 1000;
const MAX_ERRORS: usize = 100;
const QUESTION_CHARS: usize = 200;
const ANSWER_PREVIEW_CHARS: usize = 100;
const ERROR_MESSAGE_CHARS: usize = 500;
const RECENT_INTERACTIONS: usize = 10;
const RECENT_ERRORS: usize = 5;
const DAILY_WINDOW: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredInteraction {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub question: String,
    pub answer_preview: String,
    pub latency_ms: u64,
    pub tokens_input: usize,
    pub tokens_output: usize,
    pub tokens_total: usize,
    pub confidence: f64,
    pub model: String,
    pub was_refused: bool,
    pub is_casual: bool,
    pub filter_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredError {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub total_queries: u64,
    pub total_tokens: u64,
    pub total_latency_ms: u64,
    pub refused_count: u64,
    pub error_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_queries: usize,
    pub average_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub total_tokens: usize,
    pub avg_tokens_per_query: f64,
    pub average_confidence: f64,
    /// Percentage of queries refused for low confidence
    pub refused_rate: f64,
    pub error_count: usize,
    /// Newest first
    pub recent_interactions: Vec<StoredInteraction>,
    /// Newest first
    pub recent_errors: Vec<StoredError>,
    pub daily_stats: BTreeMap<String, DailyStats>,
}

#[derive(Default)]
struct MetricsInner {
    interactions: VecDeque<StoredInteraction>,
    errors: VecDeque<StoredError>,
    daily: BTreeMap<String, DailyStats>,
}

#[derive(Default)]
pub struct MetricsStore {
    inner: Mutex<MetricsInner>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn summary(&self) -> MetricsSummary {
        let inner = self.lock();
        let total_queries = inner.interactions.len();

        let mut latencies: Vec<u64> = inner.interactions.iter().map(|i| i.latency_ms).collect();
        latencies.sort_unstable();
        let (p50, p95) = match latencies.len() {
            0 => (0, 0),
            1 => (latencies[0], latencies[0]),
            n => (latencies[n / 2], latencies[(n as f64 * 0.95) as usize]),
        };

        let total_tokens: usize = inner.interactions.iter().map(|i| i.tokens_total).sum();
        let refused = inner.interactions.iter().filter(|i| i.was_refused).count();
        let (average_latency_ms, avg_tokens_per_query, average_confidence, refused_rate) =
            if total_queries == 0 {
                (0.0, 0.0, 0.0, 0.0)
            } else {
                let n = total_queries as f64;
                let latency_sum: u64 = latencies.iter().sum();
                let confidence_sum: f64 = inner.interactions.iter().map(|i| i.confidence).sum();
                (
                    round_to(latency_sum as f64 / n, 2),
                    round_to(total_tokens as f64 / n, 2),
                    round_to(confidence_sum / n, 3),
                    round_to(refused as f64 / n * 100.0, 1),
                )
            };

        let skip_days = inner.daily.len().saturating_sub(DAILY_WINDOW);
        MetricsSummary {
            total_queries,
            average_latency_ms,
            p50_latency_ms: p50,
            p95_latency_ms: p95,
            total_tokens,
            avg_tokens_per_query,
            average_confidence,
            refused_rate,
            error_count: inner.errors.len(),
            recent_interactions: inner
                .interactions
                .iter()
                .rev()
                .take(RECENT_INTERACTIONS)
                .cloned()
                .collect(),
            recent_errors: inner.errors.iter().rev().take(RECENT_ERRORS).cloned().collect(),
            daily_stats: inner
                .daily
                .iter()
                .skip(skip_days)
                .map(|(day, stats)| (day.clone(), stats.clone()))
                .collect(),
        }
    }

    /// Up to `limit` interactions, newest first, optionally for one session.
    pub fn history(&self, session_id: Option<&str>, limit: usize) -> Vec<StoredInteraction> {
        self.lock()
            .interactions
            .iter()
            .rev()
            .filter(|i| session_id.map_or(true, |s| i.session_id == s))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.interactions.clear();
        inner.errors.clear();
        inner.daily.clear();
    }
}

impl InteractionSink for MetricsStore {
    fn record_interaction(&self, record: &InteractionRecord) {
        let tokens_total = record.tokens_input + record.tokens_output;
        let stored = StoredInteraction {
            timestamp: record.timestamp,
            session_id: record.session_id.clone(),
            question: truncate(&record.question, QUESTION_CHARS),
            answer_preview: truncate(&record.answer, ANSWER_PREVIEW_CHARS),
            latency_ms: record.latency_ms,
            tokens_input: record.tokens_input,
            tokens_output: record.tokens_output,
            tokens_total,
            confidence: round_to(record.confidence as f64, 3),
            model: record.model.clone().unwrap_or_else(|| "unknown".to_string()),
            was_refused: record.refused,
            is_casual: record.is_casual,
            filter_used: record.filter_filename.clone(),
        };

        let mut inner = self.lock();
        let day = inner
            .daily
            .entry(day_key(&record.timestamp))
            .or_default();
        day.total_queries += 1;
        day.total_tokens += tokens_total as u64;
        day.total_latency_ms += record.latency_ms;
        if record.refused {
            day.refused_count += 1;
        }

        inner.interactions.push_back(stored);
        if inner.interactions.len() > MAX_INTERACTIONS {
            inner.interactions.pop_front();
        }
    }

    fn record_error(&self, operation: &str, message: &str, session_id: Option<&str>) {
        let timestamp = Utc::now();
        let mut inner = self.lock();

        // Errors only count towards days that already saw a query.
        if let Some(day) = inner.daily.get_mut(&day_key(&timestamp)) {
            day.error_count += 1;
        }

        inner.errors.push_back(StoredError {
            timestamp,
            kind: operation.to_string(),
            message: truncate(message, ERROR_MESSAGE_CHARS),
            session_id: session_id.map(str::to_string),
        });
        if inner.errors.len() > MAX_ERRORS {
            inner.errors.pop_front();
        }
    }
}

fn day_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session: &str, latency_ms: u64, refused: bool) -> InteractionRecord {
        InteractionRecord {
            timestamp: Utc::now(),
            session_id: session.to_string(),
            question: "What is covered?".to_string(),
            answer: "x".repeat(300),
            latency_ms,
            tokens_input: 10,
            tokens_output: 5,
            confidence: 0.4567,
            model: None,
            refused,
            is_casual: false,
            filter_filename: None,
            error: None,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = MetricsStore::new().summary();
        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.p95_latency_ms, 0);
        assert!(summary.recent_interactions.is_empty());
    }

    #[test]
    fn test_summary_aggregates() {
        let store = MetricsStore::new();
        for (i, latency) in [100, 200, 300, 400].into_iter().enumerate() {
            store.record_interaction(&record("s1", latency, i == 0));
        }

        let summary = store.summary();
        assert_eq!(summary.total_queries, 4);
        assert_eq!(summary.average_latency_ms, 250.0);
        assert_eq!(summary.p50_latency_ms, 300);
        assert_eq!(summary.p95_latency_ms, 400);
        assert_eq!(summary.total_tokens, 60);
        assert_eq!(summary.avg_tokens_per_query, 15.0);
        assert_eq!(summary.average_confidence, 0.457);
        assert_eq!(summary.refused_rate, 25.0);
        assert_eq!(summary.recent_interactions[0].latency_ms, 400);
        assert_eq!(summary.recent_interactions[0].answer_preview.len(), 100);
        assert_eq!(summary.recent_interactions[0].model, "unknown");

        let today = summary.daily_stats.values().next().unwrap();
        assert_eq!(today.total_queries, 4);
        assert_eq!(today.refused_count, 1);
    }

    #[test]
    fn test_interactions_are_capped() {
        let store = MetricsStore::new();
        for i in 0..(MAX_INTERACTIONS + 5) {
            store.record_interaction(&record("s", i as u64, false));
        }
        assert_eq!(store.summary().total_queries, MAX_INTERACTIONS);
        assert_eq!(store.history(None, 1)[0].latency_ms, (MAX_INTERACTIONS + 4) as u64);
    }

    #[test]
    fn test_errors_are_capped_and_counted() {
        let store = MetricsStore::new();
        store.record_interaction(&record("s", 10, false));
        for _ in 0..(MAX_ERRORS + 3) {
            store.record_error("llm", &"e".repeat(600), Some("s"));
        }

        let summary = store.summary();
        assert_eq!(summary.error_count, MAX_ERRORS);
        assert_eq!(summary.recent_errors.len(), RECENT_ERRORS);
        assert_eq!(summary.recent_errors[0].message.len(), ERROR_MESSAGE_CHARS);
        let today = summary.daily_stats.values().next().unwrap();
        assert_eq!(today.error_count, (MAX_ERRORS + 3) as u64);
    }

    #[test]
    fn test_history_by_session() {
        let store = MetricsStore::new();
        store.record_interaction(&record("a", 1, false));
        store.record_interaction(&record("b", 2, false));
        store.record_interaction(&record("a", 3, false));

        let history = store.history(Some("a"), 50);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].latency_ms, 3);
        assert_eq!(store.history(None, 2).len(), 2);
    }

    #[test]
    fn test_clear() {
        let store = MetricsStore::new();
        store.record_interaction(&record("a", 1, false));
        store.record_error("ingest", "bad file", None);
        store.clear();

        let summary = store.summary();
        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.error_count, 0);
        assert!(summary.daily_stats.is_empty());
    }
}
