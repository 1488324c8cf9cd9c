//! HTTP surface.
//!
//! [`build`] assembles the axum router:
//! - `/api` index and `/api/health`
//! - `/api/file/*` document conversion ([`files`])
//! - `/api/image/*` image operations ([`images`])
//!
//! wrapped in request tracing, permissive CORS and a body limit derived from
//! `max_upload_bytes`.

pub mod error;
pub mod files;
pub mod images;
pub mod upload;

pub use error::ApiError;

use crate::config::ServiceConfig;
use crate::imaging::ImageProcessor;
use crate::tracker::TaskTracker;
use axum::body::{Body, Bytes};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Multipart framing allowance on top of the file limit, so oversize files
/// are reported by the upload check rather than the transport limit.
const BODY_OVERHEAD: u64 = 64 * 1024;

/// Shared state injected into every handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServiceConfig,
    pub tracker: TaskTracker,
    pub images: ImageProcessor,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let tracker = TaskTracker::from_config(&config);
        Self::with_tracker(config, tracker)
    }

    /// State around an existing tracker; images share its storage.
    pub fn with_tracker(config: ServiceConfig, tracker: TaskTracker) -> Self {
        let images = ImageProcessor::new(tracker.storage().clone());
        Self {
            config,
            tracker,
            images,
        }
    }
}

/// Build the complete router for the service.
pub fn build(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes.saturating_add(BODY_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/api", get(index))
        .route("/api/health", get(health))
        .nest("/api/file", files::router())
        .nest("/api/image", images::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "webtools conversion API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "files": "/api/file",
            "images": "/api/image",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── File responses ───────────────────────────────────────────────────────

/// Read size for streamed downloads.
const CHUNK_BYTES: usize = 64 * 1024;

/// An opened file whose contents are sent in chunks rather than buffered.
pub(crate) struct FileBody {
    body: Body,
    len: u64,
}

impl FileBody {
    pub(crate) async fn open(path: &std::path::Path) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            body: Body::from_stream(stream::try_unfold(file, next_chunk)),
            len,
        })
    }
}

async fn next_chunk(mut file: File) -> std::io::Result<Option<(Bytes, File)>> {
    let mut buf = vec![0u8; CHUNK_BYTES];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((Bytes::from(buf), file)))
}

/// Download response with a `Content-Disposition: attachment` header.
pub(crate) fn attachment(file: FileBody, mime: &'static str, file_name: &str) -> Response {
    let mut resp = inline(file, mime);
    if let Ok(v) = HeaderValue::from_str(&content_disposition(file_name)) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, v);
    }
    resp
}

/// Plain file response carrying `Content-Type` and `Content-Length`.
pub(crate) fn inline(file: FileBody, mime: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(mime)),
            (header::CONTENT_LENGTH, HeaderValue::from(file.len)),
        ],
        file.body,
    )
        .into_response()
}

/// `attachment; filename="<ascii>"` plus an RFC 5987 `filename*` when the
/// name is not plain ASCII.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if ascii == file_name {
        return format!("attachment; filename=\"{ascii}\"");
    }
    let mut encoded = String::new();
    for b in file_name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(b as char)
            }
            _ => encoded.push_str(&format!("%{b:02X}")),
        }
    }
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
