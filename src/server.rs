//! HTTP surface over the chat core.
//!
//! Thin by design: handlers translate between JSON shapes and the core
//! operations, nothing more. [`build_state`] wires the application root —
//! one session store, one memory store, one gateway, one indexer worker —
//! and [`serve`] runs the router until ctrl-c.

use crate::chat::{AskRequest, ChatService};
use crate::config::FamulusConfig;
use crate::context::{Citation, ContextAssembler};
use crate::gateway::gemini::GeminiProvider;
use crate::gateway::ollama::OllamaProvider;
use crate::gateway::{Gateway, ProviderStatus};
use crate::index::http::HttpVectorIndex;
use crate::index::VectorIndex;
use crate::indexer;
use crate::memory::{DocumentPresence, MemoryStore};
use crate::session::{SessionStore, SessionSummary};
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub sessions: Arc<SessionStore>,
    pub memory: Arc<MemoryStore>,
    pub gateway: Arc<Gateway>,
}

/// Wire the application root from config. Returns the shared state and the
/// background index worker's join handle.
pub fn build_state(config: &FamulusConfig) -> Result<(AppState, JoinHandle<()>)> {
    let memory = Arc::new(
        MemoryStore::new(config.resolved_data_dir()).context("failed to open memory store")?,
    );
    let sessions = Arc::new(SessionStore::new(&config.session));

    let index: Arc<dyn VectorIndex> = Arc::new(
        HttpVectorIndex::new(
            &config.index.base_url,
            &config.index.collection,
            config.index.timeout_secs,
        )
        .map_err(|e| anyhow::anyhow!("failed to build index client: {e}"))?,
    );

    // Local model leads the fallback order; the cloud model takes over when
    // the request prefers it (or the local backend fails).
    let gateway = Arc::new(Gateway::new(vec![
        Arc::new(OllamaProvider::new(&config.providers.local)),
        Arc::new(GeminiProvider::new(&config.providers.cloud)),
    ]));

    let (indexer_handle, worker) = indexer::spawn(index.clone(), config.indexer.queue_capacity);

    let assembler = ContextAssembler::new(memory.clone(), index, sessions.clone(), config);
    let chat = Arc::new(ChatService::new(
        config,
        assembler,
        gateway.clone(),
        sessions.clone(),
        memory.clone(),
        indexer_handle,
    )?);

    Ok((
        AppState {
            chat,
            sessions,
            memory,
            gateway,
        },
        worker,
    ))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/session/new", post(new_session))
        .route("/api/sessions", get(list_sessions))
        .route("/api/session/{id}", get(get_session).delete(delete_session))
        .route("/api/status", get(status))
        .with_state(state)
}

/// Run the HTTP server until ctrl-c.
pub async fn serve(config: FamulusConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let (state, _worker) = build_state(&config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ── Request/response shapes ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequestBody {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_true")]
    use_retrieval: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct ChatResponseBody {
    success: bool,
    response: String,
    provider: String,
    model_used: String,
    session_id: String,
    response_time: f64,
    citations: Vec<Citation>,
    conversation_depth: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
}

#[derive(Serialize)]
struct StatusBody {
    success: bool,
    providers: Vec<ProviderStatus>,
    documents: DocumentPresence,
    live_sessions: usize,
}

#[derive(Serialize)]
struct SessionListBody {
    success: bool,
    count: usize,
    sessions: Vec<SessionSummary>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "famulus",
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, (StatusCode, Json<ErrorBody>)> {
    let request = AskRequest {
        message: body.message,
        session_id: body.session_id,
        model: body.model,
        use_retrieval: body.use_retrieval,
    };

    match state.chat.answer(request).await {
        Ok(answer) => {
            let depth = state
                .sessions
                .get(&answer.session_id)
                .map(|s| s.history.len())
                .unwrap_or(0);
            Ok(Json(ChatResponseBody {
                success: true,
                response: answer.text,
                provider: answer.provider,
                model_used: answer.model,
                session_id: answer.session_id,
                response_time: answer.elapsed_seconds,
                citations: answer.citations,
                conversation_depth: depth,
            }))
        }
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                success: false,
                error: e.to_string(),
                code: e.code(),
            }),
        )),
    }
}

async fn new_session(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session_id = state.sessions.get_or_create(None);
    Json(serde_json::json!({
        "success": true,
        "session_id": session_id,
    }))
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListBody> {
    let sessions = state.sessions.summaries();
    Json(SessionListBody {
        success: true,
        count: sessions.len(),
        sessions,
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorBody>)> {
    match state.sessions.get(&id) {
        Some(session) => Ok(Json(serde_json::json!({
            "success": true,
            "session_id": session.id,
            "started_at": session.started_at,
            "last_activity": session.last_activity,
            "exchanges": session.history.len(),
            "history": session.history,
        }))),
        None => Err(session_not_found(&id)),
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorBody>)> {
    if state.sessions.remove(&id) {
        Ok(Json(serde_json::json!({ "success": true })))
    } else {
        Err(session_not_found(&id))
    }
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        success: true,
        providers: state.gateway.status().await,
        documents: state.memory.document_presence(),
        live_sessions: state.sessions.len(),
    })
}

fn session_not_found(id: &str) -> (StatusCode, Json<ErrorBody>) {
    let err = crate::error::FamulusError::SessionNotFound { id: id.to_string() };
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            error: err.to_string(),
            code: err.code(),
        }),
    )
}
