//! HTTP API.
//!
//! | Method   | Path               | Description                               |
//! |----------|--------------------|-------------------------------------------|
//! | `GET`    | `/`                | Service banner                            |
//! | `POST`   | `/upload`          | Multipart upload (`file` field), ingests  |
//! | `POST`   | `/chat`            | Answer a question                         |
//! | `GET`    | `/files`           | Ingested files and chunk counts           |
//! | `DELETE` | `/files`           | Reset knowledge base and metrics          |
//! | `GET`    | `/conversation`    | Conversation log                          |
//! | `DELETE` | `/conversation`    | Clear conversation log                    |
//! | `GET`    | `/metrics`         | Aggregated interaction metrics            |
//! | `GET`    | `/metrics/history` | Recent interactions (`session_id`, `limit`) |
//!
//! Errors are returned as `{"detail": "..."}` with status 400 for bad input
//! and 500 for everything else. CORS allows any origin.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docqa_core::{AppConfig, AppError, AppResult};
use docqa_knowledge::{is_supported, InteractionSink, KnowledgeService, QueryRequest, SUPPORTED_EXTENSIONS};
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower_http::cors::{Any, CorsLayer};

use crate::commands::outcome_json;
use crate::metrics::MetricsStore;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    service: Arc<KnowledgeService>,
    metrics: Arc<MetricsStore>,
    uploads_dir: PathBuf,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> AppResult<Self> {
        config.ensure_state_dir()?;
        let uploads_dir = config.uploads_dir();
        tokio::fs::create_dir_all(&uploads_dir).await?;

        let metrics = Arc::new(MetricsStore::new());
        let service = KnowledgeService::bootstrap(config)
            .await?
            .with_sink(metrics.clone());

        Ok(Self {
            service: Arc::new(service),
            metrics,
            uploads_dir,
        })
    }
}

pub async fn run_server(config: &AppConfig, bind: &str) -> AppResult<()> {
    let state = AppState::new(config).await?;
    let llm = state.service.model().unwrap_or("none").to_string();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, llm = %llm, "HTTP server listening");
    println!("DocQA API listening on http://{}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/upload", post(handle_upload))
        .route("/chat", post(handle_chat))
        .route("/files", get(handle_list_files).delete(handle_clear_files))
        .route(
            "/conversation",
            get(handle_conversation).delete(handle_clear_conversation),
        )
        .route("/metrics", get(handle_metrics))
        .route("/metrics/history", get(handle_metrics_history))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Errors ============

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============ Handlers ============

async fn handle_root() -> Json<Value> {
    Json(json!({
        "message": "DocQA API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "Multi-document upload",
            "Conversation memory",
            "Page citations",
            "Confidence metadata",
            "Interaction metrics",
        ],
    }))
}

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (filename, bytes) = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(err) => {
            state.metrics.record_error("upload", &err.detail, None);
            return Err(err);
        }
    };
    store_upload(&state, &filename, &bytes).await.map(Json)
}

/// Filename and contents of the `file` field.
async fn read_upload(mut multipart: Multipart) -> ApiResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Upload has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

/// Ingest an uploaded document and keep it under the uploads directory.
///
/// The bytes are staged in a temporary directory first and only replace
/// `uploads/<filename>` once ingestion succeeded. Ingestion failures are
/// recorded by the knowledge service; everything before that is recorded here.
async fn store_upload(state: &AppState, filename: &str, bytes: &[u8]) -> ApiResult<Value> {
    let (staging, staged, target) = match stage_upload(state, filename, bytes).await {
        Ok(staged) => staged,
        Err(err) => {
            state.metrics.record_error("upload", &err.detail, None);
            return Err(err);
        }
    };

    let report = state.service.ingest_staged(&staged, &target).await?;

    if let Err(e) = tokio::fs::rename(&staged, &target).await {
        let detail = format!("Ingested '{}' but could not keep the upload: {}", report.filename, e);
        state.metrics.record_error("upload", &detail, None);
        return Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        });
    }
    drop(staging);

    Ok(json!({
        "filename": report.filename,
        "status": "Uploaded and processed successfully",
        "chunks": report.chunk_count,
        "pages": report.pages,
        "total_files": report.total_files,
    }))
}

/// Validate the filename and write the bytes into a fresh staging directory
/// inside the uploads directory. Returns the staging directory guard, the
/// staged file and the final path.
async fn stage_upload(
    state: &AppState,
    filename: &str,
    bytes: &[u8],
) -> ApiResult<(TempDir, PathBuf, PathBuf)> {
    let filename = sanitize_filename(filename)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid filename: {:?}", filename)))?;
    let target = state.uploads_dir.join(&filename);

    if !is_supported(&target) {
        return Err(ApiError::bad_request(format!(
            "Unsupported file type. Supported: {}",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(&state.uploads_dir)
        .map_err(AppError::from)?;
    let staged = staging.path().join(&filename);
    tokio::fs::write(&staged, bytes).await.map_err(AppError::from)?;
    tracing::debug!(filename = %filename, bytes = bytes.len(), "Upload staged");

    Ok((staging, staged, target))
}

/// Strip any directory components from a client-supplied filename.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = Path::new(raw.trim()).file_name()?.to_str()?;
    if name.is_empty() || name.starts_with('.') {
        return None;
    }
    Some(name.to_string())
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<Value>> {
    match state.service.answer(&request).await {
        Ok(outcome) => Ok(Json(outcome_json(&outcome))),
        Err(e) => {
            state.metrics.record_error("chat", &e.to_string(), Some(&request.session_id));
            Err(e.into())
        }
    }
}

async fn handle_list_files(State(state): State<AppState>) -> Json<Value> {
    let files = state.service.file_counts().await;
    Json(json!({
        "total_files": files.len(),
        "files": files,
    }))
}

async fn handle_clear_files(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.service.reset_knowledge_base().await?;
    state.metrics.clear();
    Ok(Json(json!({
        "status": "Knowledge base cleared",
        "files_remaining": 0,
    })))
}

async fn handle_conversation(State(state): State<AppState>) -> Json<Value> {
    let history = state.service.conversation().await;
    Json(json!({
        "message_count": history.len(),
        "history": history,
    }))
}

async fn handle_clear_conversation(State(state): State<AppState>) -> Json<Value> {
    state.service.clear_conversation().await;
    Json(json!({ "status": "Conversation history cleared" }))
}

async fn handle_metrics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let summary = serde_json::to_value(state.metrics.summary()).map_err(AppError::from)?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    session_id: Option<String>,
    limit: Option<usize>,
}

async fn handle_metrics_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<Value> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let interactions = state.metrics.history(params.session_id.as_deref(), limit);
    Json(json!({ "interactions": interactions }))
}
