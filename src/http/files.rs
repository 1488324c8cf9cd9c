//! `/api/file/*`: document conversion routes.

use super::error::ApiError;
use super::upload::{self, UploadRules};
use super::{attachment, AppState, FileBody};
use crate::error::ServiceError;
use crate::format::{self, FormatCatalogue};
use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

const CONVERT_FAILED: &str = "File conversion failed";
const DOWNLOAD_FAILED: &str = "File download failed";
const CANCEL_FAILED: &str = "Cancelling the conversion failed";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/formats", get(formats))
        .route("/convert", post(convert))
        .route("/download/{file_id}", get(download))
        .route("/cancel/{file_id}", post(cancel))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub message: String,
    pub file_id: String,
    pub original_name: String,
    pub extension: String,
    pub passthrough: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn formats() -> Json<FormatCatalogue> {
    Json(format::supported_formats())
}

#[instrument(skip_all)]
async fn convert(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let expose = state.config.expose_error_details;
    let fail = |e: ServiceError| ApiError::file(e, CONVERT_FAILED, expose);
    let storage = state.tracker.storage();

    let form = upload::receive(
        &mut multipart,
        UploadRules {
            file_field: "file",
            storage,
            max_bytes: state.config.max_upload_bytes,
        },
    )
    .await
    .map_err(fail)?;
    let upload = form.require_file("file").map_err(fail)?;

    let Some(target) = form.text("targetFormat") else {
        storage.remove_best_effort(&upload.path).await;
        return Err(fail(ServiceError::MissingField {
            field: "targetFormat",
        }));
    };

    match state
        .tracker
        .submit(&upload.path, target, &upload.original_name)
        .await
    {
        Ok(task) => {
            let message = if task.passthrough {
                "File stored without conversion: no converter exists for this format pair"
            } else {
                "File converted successfully"
            };
            Ok(Json(ConvertResponse {
                message: message.to_string(),
                file_id: task.task_id,
                original_name: task.original_name,
                extension: task.extension,
                passthrough: task.passthrough,
            }))
        }
        // The failed task still owns the upload; cancel releases it.
        Err(e @ ServiceError::ConversionFailed { .. }) => Err(fail(e)),
        Err(e) => {
            storage.remove_best_effort(&upload.path).await;
            Err(fail(e))
        }
    }
}

#[instrument(skip(state))]
async fn download(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let fail = |e: ServiceError| ApiError::file(e, DOWNLOAD_FAILED, state.config.expose_error_details);
    let artifact = state.tracker.resolve(&file_id).await.map_err(fail)?;
    let file = FileBody::open(&artifact.path).await.map_err(|_| {
        fail(ServiceError::MissingArtifact {
            task_id: file_id.clone(),
        })
    })?;
    Ok(attachment(file, artifact.mime_type, &artifact.file_name))
}

#[instrument(skip(state))]
async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.tracker.cancel(&file_id).await {
        info!("Conversion {} cancelled by client", file_id);
        Ok(Json(MessageResponse {
            message: "Conversion cancelled".into(),
        }))
    } else {
        Err(ApiError::file(
            ServiceError::TaskNotFound { task_id: file_id },
            CANCEL_FAILED,
            state.config.expose_error_details,
        ))
    }
}
