//! Test doubles and fixtures.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use docqa_core::{AppError, AppResult};
use docqa_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docqa_prompt::{builtin_prompt, RAG_ANSWER_PROMPT_ID};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::config::KnowledgeConfig;
use crate::embeddings::TrigramProvider;
use crate::service::KnowledgeService;
use crate::telemetry::{InteractionRecord, InteractionSink};
use crate::types::{DocumentChunk, PageSegment, RetrievalResult};

enum Behaviour {
    Answer(String),
    Fail(String),
    Slow(Duration),
}

/// Scripted LLM that records the prompts it receives.
pub struct FakeLlm {
    behaviour: Behaviour,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::with(Behaviour::Answer(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Behaviour::Fail(message.to_string()))
    }

    pub fn slow(delay: Duration) -> Self {
        Self::with(Behaviour::Slow(delay))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let content = match &self.behaviour {
            Behaviour::Answer(text) => text.clone(),
            Behaviour::Fail(message) => return Err(AppError::Llm(message.clone())),
            Behaviour::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                "too late".to_string()
            }
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(10, 5),
        })
    }
}

/// Sink that keeps every record in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub interactions: Mutex<Vec<InteractionRecord>>,
    pub errors: Mutex<Vec<String>>,
}

impl InteractionSink for RecordingSink {
    fn record_interaction(&self, record: &InteractionRecord) {
        self.interactions.lock().unwrap().push(record.clone());
    }

    fn record_error(&self, operation: &str, message: &str, _session_id: Option<&str>) {
        self.errors.lock().unwrap().push(format!("{}: {}", operation, message));
    }
}

/// Write a PDF with one page per entry of `pages`; empty entries produce
/// pages without any text.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// A retrieval result for a chunk of `filename`.
pub fn result(filename: &str, page: u32, text: &str, score: f32) -> RetrievalResult {
    let segment = PageSegment {
        text: text.to_string(),
        page,
        source_file: format!("/docs/{}", filename),
        filename: filename.to_string(),
    };
    RetrievalResult {
        chunk: DocumentChunk::from_segment(&segment, text, 0, Utc::now()),
        score,
    }
}

/// Small chunks and a compact trigram embedder keep tests fast.
pub fn test_config() -> KnowledgeConfig {
    let mut config = KnowledgeConfig {
        chunk_size: 300,
        chunk_overlap: 30,
        llm_timeout_secs: 2,
        ..Default::default()
    };
    config.embedding.dimensions = 128;
    config
}

pub fn open_service(
    workspace: &Path,
    config: KnowledgeConfig,
    llm: Option<Arc<dyn LlmClient>>,
) -> KnowledgeService {
    let embedder = Arc::new(TrigramProvider::new(config.embedding.dimensions));
    let prompt = builtin_prompt(RAG_ANSWER_PROMPT_ID).unwrap();
    KnowledgeService::open(workspace, config, embedder, llm, prompt).unwrap()
}
