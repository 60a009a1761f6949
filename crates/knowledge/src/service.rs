//! The knowledge service: one explicit owner for the index, file registry and
//! conversation memory.
//!
//! Index and registry share one `RwLock` so an ingestion's index insert and
//! registry update are committed together; searches take the read side.
//! Conversation memory has its own `Mutex`. Extraction, embedding and the
//! LLM call all run without holding either lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use docqa_core::{AppConfig, AppError, AppResult};
use docqa_llm::{create_optional_client, LlmClient};
use docqa_prompt::{resolve_prompt, PromptDefinition, RAG_ANSWER_PROMPT_ID};
use tokio::sync::{Mutex, RwLock};

use crate::casual::CasualClassifier;
use crate::config::{index_dir, KnowledgeConfig};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::index::SqliteVectorIndex;
use crate::ingest::{document_filename, prepare_document};
use crate::memory::ConversationMemory;
use crate::rag::types::{
    Answer, AnswerMetadata, AnswerOutcome, Citation, Degradation, QueryRequest,
};
use crate::rag::AnswerSynthesizer;
use crate::registry::FileRegistry;
use crate::splitter::SegmentSplitter;
use crate::telemetry::{InteractionRecord, InteractionSink, TracingSink};
use crate::tokens::TokenCounter;
use crate::types::{
    ConversationTurn, IngestReport, KnowledgeStats, RetrievalResult, UploadedFileRecord,
};
use crate::vector_index::{IndexState, MetadataFilter, VectorIndex};

/// Reply to questions asked before anything was ingested.
pub const UPLOAD_FIRST_MESSAGE: &str =
    "Please upload a document first to initialize the knowledge base.";

/// Reply when the index could not be searched.
pub const RETRIEVAL_FAILED_MESSAGE: &str =
    "Sorry, I could not search the documents just now. Please try again.";

struct KnowledgeState {
    index: Box<dyn VectorIndex>,
    registry: FileRegistry,
}

pub struct KnowledgeService {
    workspace: PathBuf,
    config: KnowledgeConfig,
    splitter: SegmentSplitter,
    classifier: CasualClassifier,
    embedder: Arc<dyn EmbeddingProvider>,
    synthesizer: AnswerSynthesizer,
    state: RwLock<KnowledgeState>,
    memory: Mutex<ConversationMemory>,
    sink: Arc<dyn InteractionSink>,
}

impl KnowledgeService {
    /// Open the knowledge base stored in `workspace`.
    ///
    /// The file registry is rebuilt from the persisted index. `llm` may be
    /// `None`, in which case answers fall back to raw context.
    pub fn open(
        workspace: &Path,
        config: KnowledgeConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmClient>>,
        prompt: PromptDefinition,
    ) -> AppResult<Self> {
        config.validate()?;

        let splitter = SegmentSplitter::new(config.chunk_size, config.chunk_overlap)?;
        let tokens = TokenCounter::from_config(config.tokenizer_path.as_deref())?;
        let index = SqliteVectorIndex::open(index_dir(workspace))?;
        let registry = FileRegistry::from_counts(index.chunk_counts());

        tracing::info!(
            "Opened knowledge base: {} files, {} chunks, LLM {}",
            registry.len(),
            index.len(),
            if llm.is_some() { "enabled" } else { "disabled" }
        );

        let synthesizer = AnswerSynthesizer::new(
            llm,
            prompt,
            tokens,
            config.llm_timeout(),
            config.confidence_threshold,
        );

        Ok(Self {
            workspace: workspace.to_path_buf(),
            classifier: CasualClassifier::new(config.casual_short_message_heuristic),
            memory: Mutex::new(ConversationMemory::new(config.max_history_turns)),
            splitter,
            embedder,
            synthesizer,
            state: RwLock::new(KnowledgeState {
                index: Box::new(index),
                registry,
            }),
            sink: Arc::new(TracingSink),
            config,
        })
    }

    /// Build a service from application config: load the knowledge config,
    /// create the embedder and LLM client, and probe the LLM if configured to.
    pub async fn bootstrap(app_config: &AppConfig) -> AppResult<Self> {
        let workspace = app_config.workspace.as_path();
        let config = KnowledgeConfig::load(workspace)?;

        let embedder = create_provider(&config.embedding, &app_config.endpoint).await?;

        let timeout = app_config.provider_timeout_secs().map(Duration::from_secs);
        let mut llm = create_optional_client(
            &app_config.provider,
            Some(&app_config.endpoint),
            &app_config.model,
            timeout,
        )
        .map_err(AppError::Config)?;

        if config.probe_llm_on_startup {
            if let Some(client) = llm.as_deref() {
                if let Err(e) = client.health_check().await {
                    tracing::warn!(
                        "LLM provider '{}' unreachable, answering without it: {}",
                        client.provider_name(),
                        e
                    );
                    llm = None;
                }
            }
        }

        let prompt = resolve_prompt(workspace, RAG_ANSWER_PROMPT_ID)?;
        Self::open(workspace, config, embedder, llm, prompt)
    }

    /// Replace the interaction sink.
    pub fn with_sink(mut self, sink: Arc<dyn InteractionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn llm_available(&self) -> bool {
        self.synthesizer.llm_available()
    }

    pub fn model(&self) -> Option<&str> {
        self.synthesizer.model()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.index.state() == IndexState::Ready
    }

    /// Ingest one document and return what was added.
    ///
    /// Fails without touching the index or registry when the document cannot
    /// be read, has no extractable text, or is rejected by the re-ingest policy.
    /// Every failure is reported to the interaction sink.
    pub async fn ingest(&self, path: &Path) -> AppResult<IngestReport> {
        self.ingest_from(path, path).await
    }

    /// Ingest a copy of a document staged at `staged`, registering it as if it
    /// had been read from `target`.
    ///
    /// Lets callers keep `target` untouched until ingestion has succeeded.
    /// The file names of both paths must match.
    pub async fn ingest_staged(&self, staged: &Path, target: &Path) -> AppResult<IngestReport> {
        if document_filename(staged)? != document_filename(target)? {
            return Err(AppError::Other(format!(
                "Staged file {:?} does not match target {:?}",
                staged, target
            )));
        }
        self.ingest_from(staged, target).await
    }

    async fn ingest_from(&self, source: &Path, registered: &Path) -> AppResult<IngestReport> {
        let result = self.try_ingest(source, registered).await;
        if let Err(ref e) = result {
            self.sink.record_error("ingest", &e.to_string(), None);
        }
        result
    }

    async fn try_ingest(&self, source: &Path, registered: &Path) -> AppResult<IngestReport> {
        let policy = self.config.reingest_policy;
        let filename = document_filename(registered)?;
        self.state.read().await.registry.check(&filename, policy)?;

        tracing::info!("Ingesting {:?}", registered);
        let mut prepared = prepare_document(
            source,
            &self.splitter,
            self.embedder.as_ref(),
            self.config.embedding.batch_size,
        )
        .await?;

        if source != registered {
            let source_file = registered.to_string_lossy().to_string();
            for entry in &mut prepared.entries {
                entry.chunk.source_file = source_file.clone();
            }
        }

        let chunk_count = prepared.entries.len();
        let mut state = self.state.write().await;
        // Another ingestion may have registered the name while we were embedding.
        state.registry.check(&filename, policy)?;
        state.index.add(prepared.entries)?;
        state.registry.record(&filename, chunk_count, policy)?;

        tracing::info!(
            "Ingested '{}': {} pages, {} chunks ({} files total)",
            filename,
            prepared.pages,
            chunk_count,
            state.registry.len()
        );

        Ok(IngestReport {
            filename,
            chunk_count,
            pages: prepared.pages,
            total_files: state.registry.len(),
        })
    }

    /// Top `k` chunks for `query`, optionally restricted by `filter`.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<RetrievalResult>> {
        if !self.is_initialized().await {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        self.state.read().await.index.search(&embedding, k, filter)
    }

    /// Answer a question.
    ///
    /// Retrieval and LLM problems produce [`AnswerOutcome::Degraded`]; only
    /// invalid requests and internal faults are returned as errors.
    pub async fn answer(&self, request: &QueryRequest) -> AppResult<AnswerOutcome> {
        let started = Instant::now();
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question must not be empty".to_string()));
        }

        if !request.force_retrieval && self.classifier.classify(question) {
            tracing::debug!("Answering small talk without retrieval");
            let text = self.classifier.respond(question).to_string();
            let metadata = AnswerMetadata {
                confidence: 1.0,
                is_casual: true,
                tokens_input: self.synthesizer.tokens().count(question),
                tokens_output: self.synthesizer.tokens().count(&text),
                ..Default::default()
            };
            self.memory.lock().await.append_exchange(question, &text);
            let answer = self.complete(request, text, Vec::new(), metadata, started);
            return Ok(AnswerOutcome::Answered(answer));
        }

        if !self.is_initialized().await {
            tracing::info!("Question received before any document was ingested");
            let text = UPLOAD_FIRST_MESSAGE.to_string();
            let metadata = AnswerMetadata {
                tokens_input: self.synthesizer.tokens().count(question),
                tokens_output: self.synthesizer.tokens().count(&text),
                ..Default::default()
            };
            let answer = self.complete(request, text, Vec::new(), metadata, started);
            return Ok(AnswerOutcome::Degraded {
                answer,
                reason: Degradation::NoKnowledgeBase,
            });
        }

        // The prompt carries the turns before this question; the question
        // itself is only appended with its answer.
        let history = if request.use_history {
            self.memory.lock().await.render_context()
        } else {
            String::new()
        };

        let filter = request.filter_filename.as_deref().map(MetadataFilter::filename);
        let results = match self.search(question, self.config.top_k, filter.as_ref()).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Retrieval failed: {}", e);
                self.sink.record_error("retrieval", &e.to_string(), Some(&request.session_id));
                let text = RETRIEVAL_FAILED_MESSAGE.to_string();
                let metadata = AnswerMetadata {
                    error: Some(e.to_string()),
                    tokens_input: self.synthesizer.tokens().count(question),
                    tokens_output: self.synthesizer.tokens().count(&text),
                    ..Default::default()
                };
                self.memory.lock().await.append_exchange(question, &text);
                let answer = self.complete(request, text, Vec::new(), metadata, started);
                return Ok(AnswerOutcome::Degraded {
                    answer,
                    reason: Degradation::RetrievalFailed(e.to_string()),
                });
            }
        };

        tracing::debug!(
            "Retrieved {} chunks (filter: {:?})",
            results.len(),
            request.filter_filename
        );

        let (synthesized, degradation) = self
            .synthesizer
            .synthesize(question, &results, &history)
            .await;
        if let Some(error) = synthesized.metadata.error.as_deref() {
            self.sink.record_error("llm", error, Some(&request.session_id));
        }

        self.memory
            .lock()
            .await
            .append_exchange(question, &synthesized.text);

        let Answer {
            text,
            citations,
            metadata,
        } = synthesized;
        let answer = self.complete(request, text, citations, metadata, started);

        Ok(match degradation {
            None => AnswerOutcome::Answered(answer),
            Some(reason) => AnswerOutcome::Degraded { answer, reason },
        })
    }

    /// Stamp latency, emit the interaction record and assemble the answer.
    fn complete(
        &self,
        request: &QueryRequest,
        text: String,
        citations: Vec<Citation>,
        mut metadata: AnswerMetadata,
        started: Instant,
    ) -> Answer {
        metadata.latency_ms = started.elapsed().as_millis() as u64;

        self.sink.record_interaction(&InteractionRecord {
            timestamp: Utc::now(),
            session_id: request.session_id.clone(),
            question: request.question.clone(),
            answer: text.clone(),
            latency_ms: metadata.latency_ms,
            tokens_input: metadata.tokens_input,
            tokens_output: metadata.tokens_output,
            confidence: metadata.confidence,
            model: metadata.model.clone(),
            refused: metadata.refused,
            is_casual: metadata.is_casual,
            filter_filename: request.filter_filename.clone(),
            error: metadata.error.clone(),
        });

        Answer {
            text,
            citations,
            metadata,
        }
    }

    /// Ingested files, sorted by name.
    pub async fn files(&self) -> Vec<UploadedFileRecord> {
        self.state.read().await.registry.files()
    }

    /// `filename -> chunk_count` for every ingested file.
    pub async fn file_counts(&self) -> BTreeMap<String, usize> {
        self.state.read().await.registry.as_map().clone()
    }

    pub async fn stats(&self) -> KnowledgeStats {
        let conversation_turns = self.memory.lock().await.len();
        let state = self.state.read().await;
        KnowledgeStats {
            files: state.registry.len(),
            chunks: state.index.len(),
            index_bytes: state.index.storage_bytes(),
            initialized: state.index.state() == IndexState::Ready,
            conversation_turns,
        }
    }

    /// Discard the index, its storage, the registry and the conversation.
    /// Safe to call on an empty knowledge base.
    pub async fn reset_knowledge_base(&self) -> AppResult<()> {
        {
            let mut state = self.state.write().await;
            state.index.clear()?;
            state.registry.clear();
        }
        self.memory.lock().await.clear();
        tracing::info!("Knowledge base reset");
        Ok(())
    }

    pub async fn conversation(&self) -> Vec<ConversationTurn> {
        self.memory.lock().await.turns()
    }

    pub async fn clear_conversation(&self) {
        self.memory.lock().await.clear();
        tracing::info!("Conversation cleared");
    }
}
