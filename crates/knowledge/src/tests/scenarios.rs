//! End-to-end behaviour of `KnowledgeService`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::AppError;
use docqa_llm::LlmClient;
use tempfile::TempDir;

use super::support::{open_service, test_config, write_pdf, FakeLlm, RecordingSink};
use crate::config::index_dir;
use crate::rag::{Degradation, QueryRequest, LOW_CONFIDENCE_REFUSAL};
use crate::registry::ReingestPolicy;
use crate::service::UPLOAD_FIRST_MESSAGE;
use crate::types::Role;

const MANUAL_PAGES: [&str; 3] = [
    "Installation: mount the pump on a level concrete base.",
    "Priming: fill the pump housing with water before starting.",
    "Warranty: the pump warranty lasts two years from purchase.",
];

fn manual(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_pdf(&path, &MANUAL_PAGES);
    path
}

#[tokio::test]
async fn ingest_three_page_pdf_registers_file() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);

    let report = service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    assert!(report.chunk_count > 0);
    assert_eq!(report.pages, 3);
    assert_eq!(report.total_files, 1);

    let counts = service.file_counts().await;
    assert_eq!(counts.get("manual.pdf"), Some(&report.chunk_count));

    let stats = service.stats().await;
    assert_eq!(stats.chunks, report.chunk_count);
    assert!(stats.initialized);
    assert!(stats.index_bytes > 0);
}

#[tokio::test]
async fn ingest_is_deterministic_across_workspaces() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let a = open_service(first.path(), test_config(), None);
    let b = open_service(second.path(), test_config(), None);

    let ra = a.ingest(&manual(first.path(), "manual.pdf")).await.unwrap();
    let rb = b.ingest(&manual(second.path(), "manual.pdf")).await.unwrap();
    assert_eq!(ra.chunk_count, rb.chunk_count);
}

#[tokio::test]
async fn greeting_is_answered_without_retrieval() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::answering("unused"));
    let service = open_service(temp.path(), test_config(), Some(llm.clone() as Arc<dyn LlmClient>));
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let outcome = service.answer(&QueryRequest::new("hi")).await.unwrap();
    let answer = outcome.answer();

    assert!(!outcome.is_degraded());
    assert!(answer.metadata.is_casual);
    assert_eq!(answer.metadata.confidence, 1.0);
    assert!(answer.citations.is_empty());
    assert_eq!(llm.calls(), 0);

    let turns = service.conversation().await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].role, Role::Assistant);
}

#[tokio::test]
async fn question_before_ingestion_gets_guidance() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);

    let outcome = service
        .answer(&QueryRequest::new("What is the warranty period for the pump?"))
        .await
        .unwrap();

    assert_eq!(outcome.degradation(), Some(&Degradation::NoKnowledgeBase));
    let answer = outcome.answer();
    assert_eq!(answer.text, UPLOAD_FIRST_MESSAGE);
    assert_eq!(answer.metadata.confidence, 0.0);
    assert!(answer.citations.is_empty());
    assert!(service.conversation().await.is_empty());
}

#[tokio::test]
async fn filename_filter_restricts_citations() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);

    let a = temp.path().join("a.pdf");
    write_pdf(&a, &["Pump priming steps for the garden pump.", "Pump storage in winter."]);
    let b = temp.path().join("b.pdf");
    write_pdf(&b, &["Pump priming steps for the pool pump.", "Pump filter cleaning."]);
    service.ingest(&a).await.unwrap();
    service.ingest(&b).await.unwrap();

    let request = QueryRequest::new("How do I prime the pump?").with_filter("a.pdf");
    let answer = service.answer(&request).await.unwrap().into_answer();

    assert!(!answer.citations.is_empty());
    assert!(answer.citations.len() <= service.config().top_k);
    assert!(answer.citations.iter().all(|c| c.filename == "a.pdf"));
}

#[tokio::test]
async fn llm_failure_falls_back_and_records_turns() {
    let temp = TempDir::new().unwrap();
    let llm: Arc<dyn LlmClient> = Arc::new(FakeLlm::failing("model crashed"));
    let sink = Arc::new(RecordingSink::default());
    let service = open_service(temp.path(), test_config(), Some(llm)).with_sink(sink.clone());
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let outcome = service
        .answer(&QueryRequest::new("How long does the pump warranty last?"))
        .await
        .unwrap();

    assert!(matches!(outcome.degradation(), Some(Degradation::LlmFailed(_))));
    let answer = outcome.answer();
    assert!(answer.text.starts_with("Based on the document, here's the relevant content:"));
    assert!(!answer.metadata.error.as_deref().unwrap_or_default().is_empty());
    assert!(!answer.metadata.llm_used);
    assert!(!answer.citations.is_empty());

    assert_eq!(service.conversation().await.len(), 2);
    assert_eq!(sink.interactions.lock().unwrap().len(), 1);
    assert_eq!(sink.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn llm_answer_includes_history_when_requested() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::answering("Two years."));
    let service = open_service(temp.path(), test_config(), Some(llm.clone() as Arc<dyn LlmClient>));
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let first = service
        .answer(&QueryRequest::new("How long does the pump warranty last?"))
        .await
        .unwrap();
    assert!(!first.is_degraded());
    assert_eq!(first.answer().metadata.model.as_deref(), Some("fake-model"));
    // Only earlier turns are rendered, so the first prompt has no transcript.
    assert!(!llm.last_prompt().unwrap().contains("Previous conversation:"));

    service
        .answer(&QueryRequest::new("And where should the pump be mounted?"))
        .await
        .unwrap();
    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.contains("Previous conversation:"));
    assert!(prompt.contains("User: How long does the pump warranty last?"));
    assert!(!prompt.contains("User: And where should the pump be mounted?"));

    service
        .answer(&QueryRequest::new("Does priming need water first?").with_history(false))
        .await
        .unwrap();
    assert!(!llm.last_prompt().unwrap().contains("Previous conversation:"));
}

#[tokio::test]
async fn force_retrieval_bypasses_small_talk() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let request = QueryRequest::new("warranty").with_force_retrieval(true);
    let answer = service.answer(&request).await.unwrap().into_answer();

    assert!(!answer.metadata.is_casual);
    assert!(!answer.citations.is_empty());
}

#[tokio::test]
async fn low_confidence_is_refused_when_gating_enabled() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(FakeLlm::answering("unused"));
    let config = crate::config::KnowledgeConfig {
        confidence_threshold: 0.99,
        ..test_config()
    };
    let service = open_service(temp.path(), config, Some(llm.clone() as Arc<dyn LlmClient>));
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let outcome = service
        .answer(&QueryRequest::new("What colour is the control panel light?"))
        .await
        .unwrap();

    let answer = outcome.answer();
    assert!(answer.metadata.refused);
    assert_eq!(answer.text, LOW_CONFIDENCE_REFUSAL);
    assert_eq!(llm.calls(), 0);
    assert_eq!(service.conversation().await.len(), 2);
}

#[tokio::test]
async fn empty_document_fails_without_mutation() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    let report = service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let blank = temp.path().join("scan.pdf");
    write_pdf(&blank, &["", " "]);
    let err = service.ingest(&blank).await.unwrap_err();

    assert!(matches!(err, AppError::Extraction(_)));
    assert!(err.is_client_error());
    let stats = service.stats().await;
    assert_eq!(stats.files, 1);
    assert_eq!(stats.chunks, report.chunk_count);
}

#[tokio::test]
async fn reingest_accumulates_by_default() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    let path = manual(temp.path(), "manual.pdf");

    let first = service.ingest(&path).await.unwrap();
    let second = service.ingest(&path).await.unwrap();

    let counts = service.file_counts().await;
    assert_eq!(counts["manual.pdf"], first.chunk_count + second.chunk_count);
    assert_eq!(counts.values().sum::<usize>(), service.stats().await.chunks);
}

#[tokio::test]
async fn reingest_rejected_when_configured() {
    let temp = TempDir::new().unwrap();
    let config = crate::config::KnowledgeConfig {
        reingest_policy: ReingestPolicy::Reject,
        ..test_config()
    };
    let sink = Arc::new(RecordingSink::default());
    let service = open_service(temp.path(), config, None).with_sink(sink.clone());
    let path = manual(temp.path(), "manual.pdf");

    let first = service.ingest(&path).await.unwrap();
    let err = service.ingest(&path).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(service.stats().await.chunks, first.chunk_count);

    let errors = sink.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("ingest: "));
}

#[tokio::test]
async fn staged_ingest_registers_target_path() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    let staging = temp.path().join("staging");
    std::fs::create_dir_all(&staging).unwrap();
    let staged = manual(&staging, "manual.pdf");
    let target = temp.path().join("manual.pdf");

    let report = service.ingest_staged(&staged, &target).await.unwrap();
    assert_eq!(report.filename, "manual.pdf");

    let results = service.search("pump warranty", 5, None).await.unwrap();
    assert!(!results.is_empty());
    let expected = target.to_string_lossy().to_string();
    assert!(results.iter().all(|r| r.chunk.source_file == expected));

    let mismatched = service.ingest_staged(&staged, &temp.path().join("other.pdf")).await;
    assert!(mismatched.is_err());
}

#[tokio::test]
async fn reset_twice_leaves_empty_state() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();
    service.answer(&QueryRequest::new("hello")).await.unwrap();

    service.reset_knowledge_base().await.unwrap();
    let after_first = service.stats().await;
    service.reset_knowledge_base().await.unwrap();
    let after_second = service.stats().await;

    assert_eq!(after_first, after_second);
    assert_eq!(after_second.files, 0);
    assert_eq!(after_second.chunks, 0);
    assert!(!after_second.initialized);
    assert_eq!(after_second.conversation_turns, 0);
    assert!(!index_dir(temp.path()).exists());

    let outcome = service
        .answer(&QueryRequest::new("What is the warranty period?"))
        .await
        .unwrap();
    assert_eq!(outcome.degradation(), Some(&Degradation::NoKnowledgeBase));
}

#[tokio::test]
async fn reopening_restores_files_and_chunks() {
    let temp = TempDir::new().unwrap();
    let report = {
        let service = open_service(temp.path(), test_config(), None);
        service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap()
    };

    let reopened = open_service(temp.path(), test_config(), None);
    let files = reopened.files().await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "manual.pdf");
    assert_eq!(files[0].chunk_count, report.chunk_count);
    assert!(reopened.is_initialized().await);
}

#[tokio::test]
async fn concurrent_questions_keep_exchanges_paired() {
    let temp = TempDir::new().unwrap();
    let service = Arc::new(open_service(temp.path(), test_config(), None));
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let question = format!("Question {} about pump warranty coverage?", i);
            service.answer(&QueryRequest::new(question)).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let turns = service.conversation().await;
    assert_eq!(turns.len(), 10);
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}

#[tokio::test]
async fn clear_conversation_keeps_documents() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    service.ingest(&manual(temp.path(), "manual.pdf")).await.unwrap();
    service.answer(&QueryRequest::new("thanks")).await.unwrap();

    service.clear_conversation().await;

    assert!(service.conversation().await.is_empty());
    assert_eq!(service.stats().await.files, 1);
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path(), test_config(), None);
    let err = service.answer(&QueryRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
