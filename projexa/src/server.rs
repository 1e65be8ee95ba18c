// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// HTTP surface
//
// Responsibilities:
// - Liveness and readiness endpoints
// - Body-level checks, JSON decoding and request validation
// - Hand validated requests to the emitter as a streamed text body
// - CORS policy from config
// - Map every pre-stream failure to a JSON `{"detail": ...}` response

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};

use crate::backend::{ChatRequest, GenerationBackend};
use crate::config::{Config, CorsConfig};
use crate::emitter::{emit, scrub_model_id, StreamSettings};
use crate::prompt::build_messages;
use crate::request::{validate, AnalyzeRequest, RequestError};

pub const X_MODEL: HeaderName = HeaderName::from_static("x-model");
pub const X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures that end a request before any body byte is streamed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("request body is empty")]
    EmptyBody,

    #[error("request body too large: limit {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("backend not ready: {0}")]
    BackendUnavailable(String),

    #[error("invalid response header: {0}")]
    InvalidHeader(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Request(RequestError::PayloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Request(RequestError::InvalidOption { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EmptyBody | ApiError::BodyRead(_) => StatusCode::BAD_REQUEST,
            ApiError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        tracing::info!(status = status.as_u16(), %detail, "request rejected");
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn GenerationBackend>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /healthz -> "ok". Never touches the backend.
pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /readyz -> "ready", or 503 when the backend probe fails.
pub async fn readyz(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    match state.backend.probe().await {
        Ok(()) => Ok("ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            let config = &state.config;
            Err(ApiError::BackendUnavailable(scrub_model_id(
                &e.to_string(),
                &config.backend.model,
                &config.display_name,
            )))
        }
    }
}

/// POST /analyze (and /generate).
///
/// Validation happens before the response starts; after that the status
/// is 200 and failures are reported inside the streamed body.
pub async fn analyze(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    let config = &state.config;
    let body = read_body(request, config.limits.max_body_bytes).await?;
    if body.is_empty() {
        return Err(ApiError::EmptyBody);
    }

    let parsed: AnalyzeRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    let validated = validate(parsed, &config.limits, &config.generation)?;

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        request_id = %request_id,
        bytes = validated.byte_size,
        num_predict = validated.options.num_predict,
        "analyze started"
    );

    let chat = ChatRequest {
        model: config.backend.model.clone(),
        messages: build_messages(&validated.text),
        options: validated.options,
    };
    let settings = StreamSettings::from_config(config, request_id);
    let stream = emit(settings, Arc::clone(&state.backend), chat).map(Ok::<Bytes, Infallible>);

    let model = header_value(&config.display_name)?;
    let version = header_value(&config.app_version)?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8)),
            (X_MODEL, model),
            (X_APP_VERSION, version),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Collect the request body, refusing anything above `limit` bytes.
/// A declared Content-Length over the limit is refused before reading.
async fn read_body(request: Request<Body>, limit: usize) -> Result<Bytes, ApiError> {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ApiError::BodyTooLarge { limit });
    }

    let mut chunks = request.into_body().into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| ApiError::BodyRead(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader(e.to_string()))
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// CORS policy. A `*` entry allows any origin without credentials; an
/// explicit list allows credentials and mirrors requested headers.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    if cors.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the router. The backend is injected; nothing here opens a
/// connection.
pub fn build_router(config: Arc<Config>, backend: Arc<dyn GenerationBackend>) -> Router {
    let cors = cors_layer(&config.cors);
    let state = AppState { config, backend };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/analyze", post(analyze))
        .route("/generate", post(analyze))
        .layer(cors)
        .with_state(state)
}
