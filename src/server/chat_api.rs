//! Chat HTTP API.
//!
//! - POST /chat: relay a conversation as `text/event-stream`
//! - GET /health

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::relay::{ChatMessage, StreamRelay};
use crate::server::streaming::frames_to_sse_stream;

/// Application state shared across handlers.
pub struct AppState {
    pub relay: StreamRelay,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(relay: StreamRelay, config: Arc<Config>) -> Self {
        Self {
            relay,
            config,
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes, CORS and request tracing.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.server.cors_origin)?;

    Ok(Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Allow a single origin, with credentials, mirroring any requested method and header.
///
/// Wildcards are not allowed together with credentials, hence mirroring.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("invalid CORS origin {origin:?}"))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Chat relay request. An absent or `null` parameter takes its default.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;

impl ChatRequest {
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub model: String,
}

/// Errors raised before the event stream starts.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
}

/// Error body, `{"detail": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    let Json(req) = payload.map_err(|rejection| {
        warn!(request_id = request_id, error = %rejection.body_text(), "Rejected chat request");
        ApiError::from(rejection)
    })?;

    info!(
        request_id = request_id,
        messages = req.messages.len(),
        temperature = req.temperature(),
        max_tokens = req.max_tokens(),
        "Chat request"
    );

    let frames = state
        .relay
        .relay(&req.messages, req.temperature(), req.max_tokens());

    let sse = Sse::new(frames_to_sse_stream(frames));
    Ok(match state.config.server.keep_alive_secs {
        Some(secs) => sse
            .keep_alive(KeepAlive::new().interval(Duration::from_secs(secs)))
            .into_response(),
        None => sse.into_response(),
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        model: state.config.provider.model.clone(),
    })
}
