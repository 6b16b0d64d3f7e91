use crate::state::AppState;
use chat_core::conversation::SubmitOutcome;
use chat_core::session::Frame;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

const INDEX_HTML: &str = include_str!("../static/index.html");

// ── Health ──────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ── Page ────────────────────────────────────────────────────────────────

pub fn page_routes() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ── Sessions ────────────────────────────────────────────────────────────

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/{id}", get(get_session).delete(delete_session))
        .route("/v1/sessions/{id}/messages", post(post_message))
}

#[derive(Debug, Serialize)]
struct SessionView {
    id: String,
    #[serde(flatten)]
    frame: Frame,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum OutcomeKind {
    Answered,
    Ignored,
    Failed,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    outcome: OutcomeKind,
    #[serde(flatten)]
    frame: Frame,
}

fn not_found(id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Session not found: {}", id))
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let handle = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(SessionView {
            id: handle.id().to_string(),
            frame: handle.snapshot(),
        }),
    )
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, (StatusCode, String)> {
    let handle = state.sessions.get(&id).await.ok_or_else(|| not_found(&id))?;
    Ok(Json(SessionView {
        id,
        frame: handle.snapshot(),
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let handle = state.sessions.get(&id).await.ok_or_else(|| not_found(&id))?;

    // One submission at a time per session; a second one is turned away
    // rather than queued behind the first.
    let mut session = handle.session.clone().try_lock_owned().map_err(|_| {
        (
            StatusCode::CONFLICT,
            "The agent is still answering the previous message".to_string(),
        )
    })?;

    // The turn runs on its own task so it completes even if the client
    // disconnects and this handler is dropped.
    let conversation = state.conversation.clone();
    let turn = tokio::spawn(async move {
        let mut display = handle.display();
        let outcome = conversation
            .submit(&mut session, &req.content, &mut display)
            .await;
        handle.touch();
        (outcome, session.render())
    });

    let (outcome, frame) = turn.await.map_err(|e| {
        tracing::error!("Turn task for session {} failed: {}", id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Turn failed: {}", e))
    })?;

    let outcome = match outcome {
        SubmitOutcome::Answered(_) => OutcomeKind::Answered,
        SubmitOutcome::Ignored => OutcomeKind::Ignored,
        SubmitOutcome::Failed(_) => OutcomeKind::Failed,
    };
    Ok(Json(MessageResponse { outcome, frame }))
}
