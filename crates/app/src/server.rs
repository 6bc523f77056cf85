use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use pdf_rag_core::{Answer, IngestError, IngestSummary, RagService, SearchError, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub struct AppState {
    pub service: RagService,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(service: RagService, bind: &str) -> anyhow::Result<()> {
    let state = Arc::new(AppState { service });
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "http server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── Errors ────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Writing an upload to disk failed; the pipeline never ran.
    Upload(String),
    Ingest(IngestError),
    Search(SearchError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn search_status(error: &SearchError) -> StatusCode {
    match error {
        SearchError::Request(_) => StatusCode::BAD_REQUEST,
        SearchError::DuplicateRecord(_) => StatusCode::CONFLICT,
        SearchError::BackendResponse { .. } | SearchError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ingest(IngestError::PdfParse(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Ingest(
                IngestError::MissingFileName(_)
                | IngestError::InvalidArgument(_)
                | IngestError::InvalidChunkConfig(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(IngestError::Store(error)) => search_status(error),
            ApiError::Ingest(IngestError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Search(error) => search_status(error),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Upload(message) => format!("upload failed: {message}"),
            ApiError::Ingest(error) => format!("ingestion failed: {error}"),
            ApiError::Search(error) => format!("query failed: {error}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self.message(), "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

// ── GET /health ───────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ── POST /ingest ──────────────────────────────────

/// Stores every uploaded file under the upload directory, then ingests them.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestSummary>, ApiError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
    {
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let file_name = upload_file_name(&raw_name)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid file name: {raw_name:?}")))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read {file_name}: {e}")))?;
        uploads.push((file_name, bytes));
    }

    if uploads.is_empty() {
        return Err(ApiError::BadRequest("no files provided".to_string()));
    }

    let paths = persist_uploads(&state.service.config().upload_dir, &uploads).await?;
    let summary = state
        .service
        .ingest(&paths)
        .await
        .map_err(ApiError::Ingest)?;

    Ok(Json(summary))
}

/// Last path component of a client-supplied name, so uploads stay inside the upload dir.
fn upload_file_name(raw: &str) -> Option<String> {
    raw.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}

async fn persist_uploads(
    upload_dir: &Path,
    uploads: &[(String, Bytes)],
) -> Result<Vec<PathBuf>, ApiError> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Upload(format!("{}: {e}", upload_dir.display())))?;

    let mut paths = Vec::with_capacity(uploads.len());
    for (name, bytes) in uploads {
        let destination = upload_dir.join(name);
        tokio::fs::write(&destination, bytes)
            .await
            .map_err(|e| ApiError::Upload(format!("{}: {e}", destination.display())))?;
        paths.push(destination);
    }
    Ok(paths)
}

// ── POST /query ───────────────────────────────────

#[derive(Deserialize)]
pub struct QueryForm {
    pub q: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Form(form): Form<QueryForm>,
) -> Result<Json<Answer>, ApiError> {
    let answer = state
        .service
        .answer(&form.q, form.top_k)
        .await
        .map_err(ApiError::Search)?;
    Ok(Json(answer))
}
