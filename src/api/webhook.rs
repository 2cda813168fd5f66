use crate::event::{classify, TelegramUpdate};
use crate::forward::{ForwardError, ForwardTarget, Forwarder, Relayed};
use crate::router::{LifecycleRouter, RouteDecision};
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<LifecycleRouter>,
    pub forwarder: Forwarder,
    /// Local agent; also receives coordinator traffic
    pub agent: ForwardTarget,
    /// Remote handler for tracked assets
    pub tracked: ForwardTarget,
    /// Larger bodies are rejected with 413 before routing
    pub max_body_bytes: usize,
}

/// Business-level outcome. Always sent with HTTP 200 so the platform does
/// not treat a denial as a delivery failure and retry it.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create API router with webhook and health endpoints
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

/// POST /webhook - classify, route and relay one update
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let update: TelegramUpdate =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidJson(e.to_string()))?;

    let event = classify(&update);
    debug!(
        update_id = update.update_id,
        kind = %event.kind,
        intent = %event.intent,
        channel = %event.channel,
        group_id = ?event.group_id,
        "Classified update"
    );

    let decision = state.router.route(&event, &body).await;
    match decision {
        RouteDecision::ForwardToAgent { .. } | RouteDecision::ForwardCoordinator { .. } => {
            let relayed = state.forwarder.forward(&state.agent, body).await?;
            Ok(relay(relayed))
        }
        RouteDecision::ForwardTracked { .. } => {
            let relayed = state.forwarder.forward(&state.tracked, body).await?;
            Ok(relay(relayed))
        }
        RouteDecision::Waking(ticket) => {
            // The wake task runs detached; the platform is not kept waiting
            info!(asset_id = %ticket.asset_id, "Waking asset, message buffered for replay");
            Ok(status_response("waking", ticket.message))
        }
        RouteDecision::Reject(rejection) => {
            Ok(status_response(rejection.kind.as_str(), rejection.message))
        }
    }
}

fn status_response(status: &str, message: String) -> Response {
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: status.to_string(),
            message,
        }),
    )
        .into_response()
}

/// Pass the target's status and body through unchanged
fn relay(relayed: Relayed) -> Response {
    let mut response = Response::new(Body::from(relayed.body));
    *response.status_mut() = relayed.status;
    if let Some(ct) = relayed
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    response
}

/// Application error types
#[derive(Debug)]
enum AppError {
    InvalidJson(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidJson(msg) => {
                debug!(error = %msg, "Rejected malformed webhook body");
                (StatusCode::BAD_REQUEST, "Invalid JSON".to_string())
            }
            AppError::Unavailable(target) => {
                (StatusCode::BAD_GATEWAY, format!("{} unavailable", target))
            }
        };
        let body = Json(ErrorResponse {
            error: error_message,
        });
        (status, body).into_response()
    }
}

impl From<ForwardError> for AppError {
    fn from(e: ForwardError) -> Self {
        AppError::Unavailable(e.target().to_string())
    }
}
