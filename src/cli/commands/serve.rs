//! HTTP API server for the policy dashboard.
//!
//! Exposes indexing, retrieval and answering over JSON. Library policies are
//! indexed by path inside `general.library_dir`; one-off uploads are sent as a
//! raw PDF body.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::PolicyError;
use crate::index::{DocumentId, IndexOutcome};
use crate::orchestrator::Orchestrator;
use crate::rag::{AnswerEngine, AnswerResponse, RetrievedChunk};
use crate::vector_store::IndexedDocument;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    answers: AnswerEngine,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let answers = orchestrator.answer_engine(None)?;

    let app = router(Arc::new(AppState {
        orchestrator,
        answers,
    }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("policy-desk API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Index policy", "POST /documents");
    Output::kv("Upload PDF", "POST /uploads");
    Output::kv("List", "GET  /documents");
    Output::kv("Search", "POST /documents/{id}/search");
    Output::kv("Ask", "POST /documents/{id}/ask");
    Output::kv("Summarize", "POST /documents/{id}/summary");
    Output::kv("General question", "POST /ask");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents).post(index_document))
        .route(
            "/uploads",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/documents/{id}/search", post(search))
        .route("/documents/{id}/ask", post(ask))
        .route("/documents/{id}/summary", post(summarize))
        .route("/ask", post(ask_general))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IndexRequest {
    /// Path of the PDF, relative to the policy library or absolute within it.
    path: String,
}

#[derive(Deserialize)]
struct SearchRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    document_id: String,
    results: Vec<RetrievedChunk>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<IndexedDocument>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// A failed request, rendered as a JSON error body.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        let (status, code) = match &err {
            PolicyError::DocumentUnreadable(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "document_unreadable")
            }
            PolicyError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            PolicyError::EntryConflict { .. } => (StatusCode::CONFLICT, "conflict"),
            e if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            warn!("Request failed: {}", err);
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, AppError>;

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndexRequest>,
) -> ApiResult<IndexOutcome> {
    let library = state.orchestrator.settings().library_dir();
    let path = resolve_in_library(&library, &req.path)?;
    let outcome = state.orchestrator.index_manager().index_or_reuse(&path).await?;
    Ok(Json(outcome))
}

/// Resolve `requested` against `library`, refusing anything that lands outside it.
///
/// The returned path keeps the requested file name, so the document ID does
/// not change when the file is a symlink within the library.
fn resolve_in_library(library: &std::path::Path, requested: &str) -> Result<PathBuf, PolicyError> {
    let root = library.canonicalize().map_err(|e| {
        PolicyError::Config(format!(
            "policy library {} is unavailable: {}",
            library.display(),
            e
        ))
    })?;

    let path = root.join(Settings::expand_path(requested));
    let resolved = path.canonicalize().map_err(|e| {
        PolicyError::DocumentUnreadable(format!("{}: {}", requested, e))
    })?;
    if !resolved.starts_with(&root) {
        return Err(PolicyError::InvalidInput(format!(
            "{} is outside the policy library",
            requested
        )));
    }
    Ok(path)
}

async fn upload_document(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<IndexOutcome> {
    if body.is_empty() {
        return Err(PolicyError::InvalidInput("empty upload".to_string()).into());
    }
    let outcome = state
        .orchestrator
        .index_manager()
        .index_as_new(body.to_vec())
        .await?;
    Ok(Json(outcome))
}

async fn list_documents(State(state): State<Arc<AppState>>) -> ApiResult<DocumentListResponse> {
    let documents = state.orchestrator.vector_store().list_documents().await?;
    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let document_id = DocumentId::parse(&id)?;
    let k = req
        .k
        .unwrap_or(state.orchestrator.settings().retrieval.top_k);

    let results = state
        .orchestrator
        .retriever()
        .retrieve(document_id.as_str(), &req.question, k)
        .await?;

    Ok(Json(SearchResponse {
        document_id: document_id.to_string(),
        results,
    }))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> ApiResult<AnswerResponse> {
    let document_id = DocumentId::parse(&id)?;
    let response = state.answers.ask(document_id.as_str(), &req.question).await?;
    Ok(Json(response))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AnswerResponse> {
    let document_id = DocumentId::parse(&id)?;
    let response = state.answers.summarize(document_id.as_str()).await?;
    Ok(Json(response))
}

async fn ask_general(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> ApiResult<AnswerResponse> {
    let response = state.answers.ask_general(&req.question).await?;
    Ok(Json(response))
}
