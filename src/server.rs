//! HTTP surface on axum.
//!
//! ```text
//! GET /transform?key=<key>&w=&h=&f=&q=
//! GET /transform/<key>?w=&h=&f=&q=
//! GET /health
//! ```
//!
//! A handler validates, fetches the original, then runs the engine on the
//! blocking pool so decode/resize/encode never stall the reactor. Success
//! carries `Content-Type`, `Cache-Control: immutable` and a SHA-256 `ETag`;
//! failures become a JSON `{"error": ...}` body with the status for their
//! [`ErrorKind`].

use crate::config::ServiceConfig;
use crate::engine::{Engine, TransformOutput};
use crate::error::{ErrorKind, TransformError};
use crate::imaging::{ImageBackend, RustBackend};
use crate::storage::{ObjectSource, ObjectStoreSource};
use crate::validation::{RawParams, validate_request};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::trace::TraceLayer;

pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Shared, read-only request state.
pub struct AppState<B: ImageBackend = RustBackend> {
    pub engine: Arc<Engine<B>>,
    pub source: Arc<dyn ObjectSource>,
}

impl<B: ImageBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            source: Arc::clone(&self.source),
        }
    }
}

/// `/transform` query string. `key` is only read in the query form.
#[derive(Debug, Default, Deserialize)]
pub struct TransformQuery {
    pub key: Option<String>,
    pub w: Option<String>,
    pub h: Option<String>,
    pub f: Option<String>,
    pub q: Option<String>,
}

impl TransformQuery {
    fn split(self) -> (Option<String>, RawParams) {
        let raw = RawParams {
            w: self.w,
            h: self.h,
            f: self.f,
            q: self.q,
        };
        (self.key, raw)
    }
}

pub fn router<B>(state: AppState<B>) -> Router
where
    B: ImageBackend + Send + 'static,
{
    Router::new()
        .route("/transform", get(transform_by_query::<B>))
        .route("/transform/{*key}", get(transform_by_path::<B>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn transform_by_query<B>(
    State(state): State<AppState<B>>,
    Query(query): Query<TransformQuery>,
) -> Result<Response, AppError>
where
    B: ImageBackend + Send + 'static,
{
    let (key, raw) = query.split();
    let key = key.unwrap_or_default();
    handle(state, &key, raw).await
}

async fn transform_by_path<B>(
    State(state): State<AppState<B>>,
    Path(key): Path<String>,
    Query(query): Query<TransformQuery>,
) -> Result<Response, AppError>
where
    B: ImageBackend + Send + 'static,
{
    let (_, raw) = query.split();
    handle(state, &key, raw).await
}

async fn handle<B>(state: AppState<B>, key: &str, raw: RawParams) -> Result<Response, AppError>
where
    B: ImageBackend + Send + 'static,
{
    let started = Instant::now();
    let request = validate_request(key, &raw, state.engine.limits())?;

    let object = state.source.fetch(&request.key).await.map_err(|e| {
        let err = TransformError::from(e);
        AppError::new(err).with_key(&request.key)
    })?;

    let declared_type = object.declared_type;
    let bytes = object.bytes;
    let engine = Arc::clone(&state.engine);
    let params = request.params.clone();
    let output = tokio::task::spawn_blocking(move || engine.transform(bytes, &params))
        .await
        .map_err(|e| TransformError::Internal(format!("transform task failed: {e}")))?
        .map_err(|e| AppError::new(e).with_key(&request.key))?;

    tracing::info!(
        key = %request.key,
        w = ?request.params.width,
        h = ?request.params.height,
        f = ?request.params.format,
        q = ?request.params.quality.map(|q| q.value()),
        declared_type = declared_type.as_deref().unwrap_or("none"),
        source_format = %output.source_format,
        source_size = ?output.source_size.map(|d| (d.width, d.height)),
        output_size = ?output.output_size.map(|d| (d.width, d.height)),
        output_format = %output.format,
        bytes = output.bytes.len(),
        passthrough = output.is_passthrough(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "transform served"
    );

    Ok(image_response(output))
}

/// Strong validator for a response body.
pub fn etag_for(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("\"{:x}\"", hasher.finalize())
}

fn image_response(output: TransformOutput) -> Response {
    let etag = etag_for(&output.bytes);
    let mut response = (StatusCode::OK, output.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(output.format.content_type()),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_IMMUTABLE),
    );
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    response
}

/// A [`TransformError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct AppError {
    error: TransformError,
    key: Option<String>,
}

impl AppError {
    fn new(error: TransformError) -> Self {
        Self { error, key: None }
    }

    fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl From<TransformError> for AppError {
    fn from(error: TransformError) -> Self {
        Self::new(error)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidParameter | ErrorKind::UnsupportedFormat => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::DecodeFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::EncodeFailed | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(self.error.kind());
        let key = self.key.as_deref().unwrap_or("");
        if self.error.is_client_error() {
            tracing::warn!(key, status = status.as_u16(), error = %self.error, "request rejected");
        } else {
            tracing::error!(key, status = status.as_u16(), error = %self.error, "transform failed");
        }

        let body = serde_json::json!({ "error": self.error.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Run the service until Ctrl-C / SIGTERM.
pub async fn serve(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let limits = Arc::new(config.limits()?);
    let source = ObjectStoreSource::from_config(&config.storage, limits.max_input_bytes)?;
    let state = AppState {
        engine: Arc::new(Engine::with_limits(limits)),
        source: Arc::new(source),
    };

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(%addr, error = %e, "failed to bind");
        e
    })?;
    tracing::info!(
        %addr,
        storage = ?config.storage.backend,
        max_dimension = config.limits.max_dimension,
        "imgforge listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
