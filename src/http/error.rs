//! HTTP error responses.
//!
//! Handlers return `Result<T, ApiError>`. The status code follows the
//! [`ErrorKind`] of the wrapped [`ServiceError`]; the body keeps the two
//! shapes clients already parse:
//!
//! * file routes: `{ "message": ... }` (plus `fileId` when a failed task is
//!   still registered and can be cancelled)
//! * image routes: `{ "success": false, "message": ... }`
//!
//! Conversion failures (converter, renderer, image codec) are reported as
//! `"<summary>: <reason>"`, and image routes also carry the reason in
//! `error`. Storage and internal failures may leak paths, so their detail is
//! logged and only copied into the body when `expose_error_details` is on.

use crate::error::{ErrorKind, ServiceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    File,
    Image,
}

/// A [`ServiceError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: ServiceError,
    shape: Shape,
    /// Client-facing summary used for 5xx responses.
    summary: &'static str,
    expose_details: bool,
}

impl ApiError {
    pub fn file(error: ServiceError, summary: &'static str, expose_details: bool) -> Self {
        Self {
            error,
            shape: Shape::File,
            summary,
            expose_details,
        }
    }

    pub fn image(error: ServiceError, summary: &'static str, expose_details: bool) -> Self {
        Self {
            error,
            shape: Shape::Image,
            summary,
            expose_details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conversion | ErrorKind::Storage | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Reason text safe to return to clients, `None` for storage and
    /// internal errors.
    fn public_reason(&self) -> Option<String> {
        match &self.error {
            ServiceError::ConversionFailed { reason, .. } => Some(reason.clone()),
            e if e.kind() == ErrorKind::Conversion => Some(e.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Map::new();

        if self.shape == Shape::Image {
            body.insert("success".into(), Value::Bool(false));
        }

        if !status.is_server_error() {
            body.insert("message".into(), json!(self.error.to_string()));
        } else {
            error!(error = %self.error, "{}", self.summary);
            let error_field = match self.public_reason() {
                Some(reason) => {
                    let message = format!("{}: {}", self.summary, reason);
                    body.insert("message".into(), json!(message));
                    (self.shape == Shape::Image).then_some(reason)
                }
                None => {
                    body.insert("message".into(), json!(self.summary));
                    if self.expose_details {
                        Some(self.error.to_string())
                    } else {
                        (self.shape == Shape::Image).then(|| "Internal server error".to_string())
                    }
                }
            };
            if let Some(detail) = error_field {
                body.insert("error".into(), json!(detail));
            }
        }

        if let ServiceError::ConversionFailed { task_id, .. } = &self.error {
            body.insert("fileId".into(), json!(task_id));
        }

        (status, Json(Value::Object(body))).into_response()
    }
}
