//! Grounded answer synthesis.
//!
//! Turns retrieval results into an [`Answer`]: confidence and relevance
//! statistics, citations, grounding context, and either an LLM completion or
//! a raw-context fallback. LLM problems never fail the call; they are
//! reported as a [`Degradation`] next to the fallback answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docqa_llm::{LlmClient, LlmRequest};
use docqa_prompt::{build_prompt, PromptDefinition};

use crate::rag::types::{Answer, AnswerMetadata, Citation, Degradation};
use crate::tokens::TokenCounter;
use crate::types::RetrievalResult;

/// Sentence the model is told to use when the context lacks the answer.
pub const NOT_FOUND_SENTENCE: &str = "I cannot find this information in the document.";

/// Reply when the best relevance score is below the confidence threshold.
pub const LOW_CONFIDENCE_REFUSAL: &str = "I cannot find this information in the document. \
     The most relevant passages I found do not match your question closely enough to answer it.";

const FALLBACK_PREFIX: &str = "Based on the document, here's the relevant content:\n\n";

/// Context characters included in a fallback answer.
pub const FALLBACK_CONTEXT_CHARS: usize = 1500;

pub struct AnswerSynthesizer {
    llm: Option<Arc<dyn LlmClient>>,
    prompt: PromptDefinition,
    tokens: TokenCounter,
    llm_timeout: Duration,
    confidence_threshold: f32,
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        prompt: PromptDefinition,
        tokens: TokenCounter,
        llm_timeout: Duration,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            llm,
            prompt,
            tokens,
            llm_timeout,
            confidence_threshold,
        }
    }

    pub fn llm_available(&self) -> bool {
        self.llm.is_some()
    }

    /// Model used for answers, if an LLM is configured.
    pub fn model(&self) -> Option<&str> {
        self.llm.as_deref().map(|llm| llm.default_model())
    }

    pub fn tokens(&self) -> &TokenCounter {
        &self.tokens
    }

    /// Answer `question` from `results`. `history` is rendered conversation
    /// context, empty when history is not wanted. `latency_ms` is left for
    /// the caller to fill in.
    pub async fn synthesize(
        &self,
        question: &str,
        results: &[RetrievalResult],
        history: &str,
    ) -> (Answer, Option<Degradation>) {
        let (max_score, avg_score) = relevance_stats(results);
        let citations = build_citations(results);
        let context = build_context(results);

        let mut metadata = AnswerMetadata {
            confidence: max_score,
            avg_relevance: avg_score,
            ..Default::default()
        };

        if self.confidence_threshold > 0.0 && max_score < self.confidence_threshold {
            tracing::info!(
                "Refusing to answer: best relevance {:.3} below threshold {:.3}",
                max_score,
                self.confidence_threshold
            );
            metadata.refused = true;
            let text = LOW_CONFIDENCE_REFUSAL.to_string();
            let answer = self.finish(text, question, &context, citations, metadata);
            return (answer, None);
        }

        let Some(llm) = self.llm.as_deref() else {
            tracing::debug!("No LLM configured, answering with raw context");
            let text = fallback_answer(&context);
            let answer = self.finish(text, question, &context, citations, metadata);
            return (answer, Some(Degradation::LlmUnavailable));
        };

        match self.generate(llm, question, &context, history).await {
            Ok((text, model)) => {
                metadata.llm_used = true;
                metadata.model = Some(model);
                let answer = self.finish(text, question, &context, citations, metadata);
                (answer, None)
            }
            Err(reason) => {
                tracing::warn!("Falling back to raw context: {}", reason);
                metadata.error = Some(reason.to_string());
                let text = fallback_answer(&context);
                let answer = self.finish(text, question, &context, citations, metadata);
                (answer, Some(reason))
            }
        }
    }

    /// Render the prompt and call the LLM within the timeout.
    async fn generate(
        &self,
        llm: &dyn LlmClient,
        question: &str,
        context: &str,
        history: &str,
    ) -> Result<(String, String), Degradation> {
        let mut variables = HashMap::new();
        variables.insert("context".to_string(), context.to_string());
        variables.insert("question".to_string(), question.to_string());
        variables.insert("not_found".to_string(), NOT_FOUND_SENTENCE.to_string());
        if !history.is_empty() {
            variables.insert("history".to_string(), history.to_string());
        }

        let built = build_prompt(&self.prompt, &variables)
            .map_err(|e| Degradation::LlmFailed(e.to_string()))?;

        let mut request = LlmRequest::new(built.user, llm.default_model()).with_temperature(0.0);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            "Calling {} model '{}' with {} context chars",
            llm.provider_name(),
            request.model,
            context.len()
        );

        let response = tokio::time::timeout(self.llm_timeout, llm.complete(&request))
            .await
            .map_err(|_| Degradation::LlmTimeout(self.llm_timeout.as_secs()))?
            .map_err(|e| Degradation::LlmFailed(e.to_string()))?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(Degradation::LlmFailed("empty completion".to_string()));
        }
        Ok((text.to_string(), response.model))
    }

    fn finish(
        &self,
        text: String,
        question: &str,
        context: &str,
        citations: Vec<Citation>,
        mut metadata: AnswerMetadata,
    ) -> Answer {
        metadata.tokens_input = self.tokens.count(context) + self.tokens.count(question);
        metadata.tokens_output = self.tokens.count(&text);
        Answer {
            text,
            citations,
            metadata,
        }
    }
}

/// `(max, mean)` of the scores; `(0, 0)` for no results.
pub fn relevance_stats(results: &[RetrievalResult]) -> (f32, f32) {
    if results.is_empty() {
        return (0.0, 0.0);
    }
    let max = results.iter().map(|r| r.score).fold(f32::NEG_INFINITY, f32::max);
    let avg = results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32;
    (max, avg)
}

/// One citation per result, in retrieval order.
pub fn build_citations(results: &[RetrievalResult]) -> Vec<Citation> {
    results
        .iter()
        .map(|r| Citation::from_chunk(&r.chunk, r.score))
        .collect()
}

/// Chunk texts in retrieval order, separated by blank lines.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answer made of the first part of the context, used without an LLM.
pub fn fallback_answer(context: &str) -> String {
    let excerpt: String = context.chars().take(FALLBACK_CONTEXT_CHARS).collect();
    format!("{}{}...", FALLBACK_PREFIX, excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{result, FakeLlm};
    use docqa_prompt::{builtin_prompt, RAG_ANSWER_PROMPT_ID};

    fn synthesizer(llm: Option<Arc<dyn LlmClient>>, threshold: f32) -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            llm,
            builtin_prompt(RAG_ANSWER_PROMPT_ID).unwrap(),
            TokenCounter::heuristic(),
            Duration::from_millis(200),
            threshold,
        )
    }

    fn results() -> Vec<RetrievalResult> {
        vec![
            result("manual.pdf", 0, "The pump must be primed before first use.", 0.9),
            result("manual.pdf", 2, "Warranty covers two years of normal use.", 0.5),
        ]
    }

    #[test]
    fn test_relevance_stats() {
        assert_eq!(relevance_stats(&[]), (0.0, 0.0));
        let (max, avg) = relevance_stats(&results());
        assert!((max - 0.9).abs() < 1e-6);
        assert!((avg - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_context_joins_with_blank_lines() {
        let context = build_context(&results());
        assert_eq!(
            context,
            "The pump must be primed before first use.\n\nWarranty covers two years of normal use."
        );
    }

    #[test]
    fn test_fallback_truncates_context() {
        let context = "a".repeat(2000);
        let answer = fallback_answer(&context);
        assert!(answer.starts_with(FALLBACK_PREFIX));
        assert!(answer.ends_with("..."));
        assert_eq!(answer.len(), FALLBACK_PREFIX.len() + FALLBACK_CONTEXT_CHARS + 3);
    }

    #[tokio::test]
    async fn test_without_llm_uses_fallback() {
        let synthesizer = synthesizer(None, 0.0);
        let (answer, degradation) = synthesizer.synthesize("How do I prime it?", &results(), "").await;

        assert_eq!(degradation, Some(Degradation::LlmUnavailable));
        assert!(answer.text.starts_with(FALLBACK_PREFIX));
        assert!(!answer.metadata.llm_used);
        assert!(answer.metadata.error.is_none());
        assert_eq!(answer.citations.len(), 2);
        assert!(answer.metadata.tokens_input > 0);
    }

    #[tokio::test]
    async fn test_llm_answer_is_used() {
        let llm = Arc::new(FakeLlm::answering("Prime the pump first."));
        let synthesizer = synthesizer(Some(llm.clone()), 0.0);
        let (answer, degradation) = synthesizer
            .synthesize("How do I prime it?", &results(), "Previous conversation:\nUser: hi\n")
            .await;

        assert!(degradation.is_none());
        assert_eq!(answer.text, "Prime the pump first.");
        assert!(answer.metadata.llm_used);
        assert_eq!(answer.metadata.model.as_deref(), Some("fake-model"));
        assert!((answer.metadata.confidence - 0.9).abs() < 1e-6);

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.starts_with("Previous conversation:"));
        assert!(prompt.contains("Warranty covers two years"));
        assert!(prompt.contains("Question: How do I prime it?"));
        assert!(prompt.contains(NOT_FOUND_SENTENCE));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_with_error() {
        let synthesizer = synthesizer(Some(Arc::new(FakeLlm::failing("connection refused"))), 0.0);
        let (answer, degradation) = synthesizer.synthesize("How do I prime it?", &results(), "").await;

        assert!(matches!(degradation, Some(Degradation::LlmFailed(_))));
        assert!(answer.text.starts_with(FALLBACK_PREFIX));
        assert!(answer.metadata.error.as_deref().unwrap().contains("connection refused"));
        assert!(!answer.metadata.llm_used);
    }

    #[tokio::test]
    async fn test_llm_timeout_falls_back() {
        let slow = FakeLlm::slow(Duration::from_secs(5));
        let synthesizer = synthesizer(Some(Arc::new(slow)), 0.0);
        let (answer, degradation) = synthesizer.synthesize("How do I prime it?", &results(), "").await;

        assert_eq!(degradation, Some(Degradation::LlmTimeout(0)));
        assert!(answer.metadata.error.is_some());
        assert!(answer.text.starts_with(FALLBACK_PREFIX));
    }

    #[tokio::test]
    async fn test_empty_completion_falls_back() {
        let synthesizer = synthesizer(Some(Arc::new(FakeLlm::answering("   "))), 0.0);
        let (_, degradation) = synthesizer.synthesize("How do I prime it?", &results(), "").await;
        assert!(matches!(degradation, Some(Degradation::LlmFailed(_))));
    }

    #[tokio::test]
    async fn test_low_confidence_is_refused_without_llm_call() {
        let llm = Arc::new(FakeLlm::answering("should not be used"));
        let synthesizer = synthesizer(Some(llm.clone()), 0.95);
        let (answer, degradation) = synthesizer.synthesize("How do I prime it?", &results(), "").await;

        assert!(degradation.is_none());
        assert!(answer.metadata.refused);
        assert_eq!(answer.text, LOW_CONFIDENCE_REFUSAL);
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_threshold_never_refuses() {
        let synthesizer = synthesizer(None, 0.0);
        let (answer, _) = synthesizer.synthesize("anything", &[], "").await;
        assert!(!answer.metadata.refused);
        assert_eq!(answer.metadata.confidence, 0.0);
    }
}
