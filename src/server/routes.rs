//! HTTP route handlers for the document search API.

use crate::error::SessionError;
use crate::metrics::MetricsSnapshot;
use crate::server::AppState;
use crate::session::{BatchOutcome, ChunkSource, SearchHit};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub uploaded_files: Vec<String>,
    pub added: usize,
    pub total: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub total: usize,
    pub dimension: Option<usize>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }

    fn bad_request(err: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err)
        } else {
            Self::internal(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/upload", post(upload_documents))
        .route("/query", post(query_documents))
        .route("/session", delete(clear_session))
        .route("/metrics", get(get_metrics))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Handlers ---

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "Document search API is running!"}))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        total: state.store.len()?,
        dimension: state.store.dimension()?,
    }))
}

async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let start = Instant::now();
    let upload_dir = state.config.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(ApiError::internal)?;

    let mut saved: Vec<PathBuf> = Vec::new();
    if let Err(e) = stage_uploads(&mut multipart, &upload_dir, &mut saved).await {
        if !saved.is_empty() {
            warn!(error = %e.message, files = ?saved, "upload aborted; staged uploads retained");
        }
        return Err(e);
    }

    if saved.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "No files uploaded."));
    }

    let worker = Arc::clone(&state);
    let paths = saved.clone();
    let result = tokio::task::spawn_blocking(move || ingest_files(&worker, &paths))
        .await
        .map_err(ApiError::internal)?;

    let uploaded_files: Vec<String> = saved.iter().map(|p| file_name(p)).collect();
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            // sources stay on disk so the upload can be retried or recovered
            warn!(error = %e, files = ?saved, "ingestion failed; staged uploads retained");
            if let Ok(mut metrics) = state.metrics.write() {
                metrics.record_failed_upload();
            }
            return Err(e.into());
        }
    };

    if !state.config.keep_uploads {
        for path in &saved {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "failed to delete staged upload");
            }
        }
    }

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_upload(outcome.added, start.elapsed());
    }
    info!(files = uploaded_files.len(), added = outcome.added, total = outcome.total, "upload ingested");

    Ok(Json(UploadResponse {
        uploaded_files,
        added: outcome.added,
        total: outcome.total,
    }))
}

async fn query_documents(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let top_k = req.top_k.unwrap_or(state.config.default_top_k);
    if top_k == 0 {
        return Err(SessionError::InvalidTopK.into());
    }

    let start = Instant::now();

    let worker = Arc::clone(&state);
    let query = req.query.clone();
    let results = tokio::task::spawn_blocking(move || {
        worker.store.search(&query, top_k, worker.embedder.as_ref())
    })
    .await
    .map_err(ApiError::internal)??;

    let elapsed = start.elapsed();

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query(elapsed);
    }

    Ok(Json(QueryResponse {
        query: req.query,
        results,
    }))
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.clear()?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_clear();
    }

    Ok(Json(serde_json::json!({"status": "cleared"})))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Json<MetricsSnapshot>, ApiError> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| ApiError::internal("Lock poisoned"))?;

    Ok(Json(metrics.snapshot()))
}

// --- Ingestion glue ---

/// Chunk every file, then add all chunks as one batch.
fn ingest_files(state: &AppState, paths: &[PathBuf]) -> Result<BatchOutcome, SessionError> {
    let mut texts = Vec::new();
    let mut sources = Vec::new();
    for path in paths {
        let document_name = file_name(path);
        for chunk in state.pipeline.process(path)? {
            sources.push(ChunkSource::new(document_name.clone(), chunk.page_number));
            texts.push(chunk.text);
        }
    }
    state
        .store
        .add_batch(&texts, &sources, state.embedder.as_ref())
}

/// `<unix millis>_<name>` inside `dir`, with path components stripped and
/// spaces replaced; a counter is inserted if that name is already taken.
/// Write every file field of the request into `dir`, recording each staged
/// path in `saved` as soon as it is on disk.
async fn stage_uploads(
    multipart: &mut Multipart,
    dir: &Path,
    saved: &mut Vec<PathBuf>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::bad_request)? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(ApiError::bad_request)?;
        let path = staged_path(dir, &original_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(ApiError::internal)?;
        saved.push(path);
    }
    Ok(())
}

fn staged_path(dir: &Path, original_name: &str) -> PathBuf {
    let base = Path::new(original_name)
        .file_name()
        .map(|n| n.to_string_lossy().replace(' ', "_"))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload".to_string());
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let mut candidate = dir.join(format!("{}_{}", millis, base));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}_{}", millis, n, base));
        n += 1;
    }
    candidate
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
