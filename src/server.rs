//! HTTP API server.
//!
//! Exposes the ingestion, retrieval, and generation pipeline as a JSON API
//! for the test-case authoring UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Upload a document (multipart `file` field) |
//! | `GET`  | `/document` | Currently ingested document, or `null` |
//! | `POST` | `/retrieve` | Top-k context snippets for a prompt |
//! | `POST` | `/generate` | Generate test cases from prompt + context |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a machine-readable code and a human-readable
//! message:
//!
//! ```json
//! { "error": { "code": "invalid_argument", "message": "prompt must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser-based authoring UI.

use axum::{
    extract::{Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::generate::GenerationClient;
use crate::index::QdrantIndex;
use crate::models::{DocumentRef, RetrievedContext};
use crate::{ingest, retrieval};

/// Shared application state passed to all route handlers.
///
/// Every remote client is constructed once at startup and injected here;
/// handlers never build their own.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub embedder: Arc<EmbeddingClient>,
    pub index: Arc<QdrantIndex>,
    pub generator: Arc<GenerationClient>,
}

impl AppState {
    /// Construct all provider clients from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = EmbeddingClient::new(&config.embedding)?;
        let index = QdrantIndex::new(&config.index, config.embedding.dims)?;
        let generator = GenerationClient::new(&config.generation)?;
        Ok(Self {
            config: Arc::new(config),
            embedder: Arc::new(embedder),
            index: Arc::new(index),
            generator: Arc::new(generator),
        })
    }
}

/// Build the API router for the given state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/document", get(handle_current_document))
        .route("/retrieve", post(handle_retrieve))
        .route("/generate", post(handle_generate))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Ensures the index collection exists, binds to the address configured in
/// `[server].bind`, and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::from_config(config.clone())?;
    state.index.ensure_collection().await?;

    let app = router(state);
    println!("casegen server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

/// Handler for `POST /ingest`.
///
/// Accepts a multipart form with a single `file` field, runs the full
/// ingestion pipeline, and returns the new document's identity.
async fn handle_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentRef>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidArgument(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .unwrap_or("upload")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidArgument(format!("failed to read upload: {}", e)))?;
        upload = Some((name, bytes.to_vec()));
        break;
    }

    let (name, bytes) =
        upload.ok_or_else(|| Error::InvalidArgument("no file uploaded".to_string()))?;

    let document = ingest::ingest(
        &state.embedder,
        &state.index,
        &state.config.chunking,
        &bytes,
        &name,
    )
    .await?;

    Ok(Json(document))
}

// ============ GET /document ============

/// Handler for `GET /document`.
///
/// Returns the currently ingested document's identity, or JSON `null` when
/// the collection is empty.
async fn handle_current_document(
    State(state): State<AppState>,
) -> Result<Json<Option<DocumentRef>>> {
    let document = state.index.current_document().await?;
    Ok(Json(document))
}

// ============ POST /retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    prompt: String,
}

#[derive(Serialize)]
struct RetrieveResponse {
    prompt: String,
    results: Vec<RetrievedContext>,
}

/// Handler for `POST /retrieve`.
///
/// Embeds the prompt and returns the top-k context snippets in the index's
/// similarity order. Zero results is a valid empty outcome, not an error.
async fn handle_retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>> {
    let results = retrieval::retrieve(
        &state.embedder,
        &state.index,
        &request.prompt,
        state.config.server.top_k,
    )
    .await?;

    Ok(Json(RetrieveResponse {
        prompt: request.prompt,
        results,
    }))
}

// ============ POST /generate ============

#[derive(Deserialize)]
struct ContextItem {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    prompt: String,
    #[serde(default)]
    context_items: Vec<ContextItem>,
    count: usize,
}

#[derive(Serialize)]
struct GenerateResponse {
    /// JSON-encoded array of validated test cases. The UI parses this
    /// string into its editable table.
    testcases: String,
}

/// Handler for `POST /generate`.
///
/// Validates the model's output before returning it: the caller receives
/// either a fully valid batch or a structured error, never a partial one.
async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let snippets: Vec<String> = request
        .context_items
        .into_iter()
        .map(|item| item.text)
        .collect();

    let cases = state
        .generator
        .generate_test_cases(&request.prompt, &snippets, request.count)
        .await?;

    let testcases = serde_json::to_string(&cases)
        .map_err(|e| Error::MalformedOutput(e.to_string()))?;

    Ok(Json(GenerateResponse { testcases }))
}
