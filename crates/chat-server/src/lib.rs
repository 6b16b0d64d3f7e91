pub mod routes;
pub mod state;

use chat_core::config::AppConfig;
use chat_core::conversation::ConversationLoop;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Middleware that validates a bearer token from the Authorization header.
///
/// Uses constant-time comparison so response timing does not leak the token.
async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let expected = match &state.config.server.auth_token {
        Some(t) => t,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => {
            next.run(req).await
        }
        _ => (StatusCode::UNAUTHORIZED, "Invalid or missing bearer token").into_response(),
    }
}

/// Build the axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // Session routes require auth when a token is configured.
    let protected = Router::new()
        .merge(routes::session_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Health and the page itself are public; the page sends the token.
    let public = Router::new()
        .merge(routes::health_routes())
        .merge(routes::page_routes());

    let mut app = Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state.clone());

    app = app.layer(TraceLayer::new_for_http());

    if config.server.cors {
        let cors = if config.server.auth_token.is_some() {
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_origin(Any)
        } else {
            CorsLayer::permissive()
        };
        app = app.layer(cors);
    }

    app
}

/// Periodically discard sessions whose browser tab went away without saying so.
fn spawn_idle_sweeper(state: &AppState) {
    let max_idle = Duration::from_secs(state.config.server.session_idle_secs);
    let period = (max_idle / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            sessions.sweep_idle(max_idle).await;
        }
    });
}

/// Start the HTTP server.
pub async fn serve(config: AppConfig, conversation: Arc<ConversationLoop>) -> anyhow::Result<()> {
    let state = AppState::new(config.clone(), conversation);
    spawn_idle_sweeper(&state);
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on http://{}", addr);

    if config.server.auth_token.is_none() {
        tracing::warn!("No auth_token configured, server is unauthenticated");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
