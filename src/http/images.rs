//! `/api/image/*`: untracked image operations.

use super::error::ApiError;
use super::upload::{self, UploadForm, UploadRules};
use super::{inline, AppState, FileBody};
use crate::error::ServiceError;
use crate::imaging::{CompressOptions, ImageTarget};
use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

const COMPRESS_FAILED: &str = "Image compression failed";
const CONVERT_FAILED: &str = "Image format conversion failed";
const DOWNLOAD_FAILED: &str = "Image download failed";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/compress", post(compress))
        .route("/format-convert", post(format_convert))
        .route("/download/{image_id}", get(download))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub success: bool,
    pub message: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: i64,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConvertResponse {
    pub success: bool,
    pub message: String,
    pub original_format: String,
    pub converted_format: String,
    pub original_size: u64,
    pub converted_size: u64,
    pub image_url: String,
}

fn image_url(image_id: &str) -> String {
    format!("/api/image/download/{image_id}")
}

async fn receive_image(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<UploadForm, ServiceError> {
    upload::receive(
        multipart,
        UploadRules {
            file_field: "image",
            storage: state.images.storage(),
            max_bytes: state.config.max_upload_bytes,
        },
    )
    .await
}

#[instrument(skip_all)]
async fn compress(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CompressResponse>, ApiError> {
    let fail = |e: ServiceError| ApiError::image(e, COMPRESS_FAILED, state.config.expose_error_details);
    let form = receive_image(&state, &mut multipart).await.map_err(fail)?;
    let upload = form.require_file("image").map_err(fail)?;

    let options = match CompressOptions::from_form(form.text("quality"), form.text("scale")) {
        Ok(o) => o,
        Err(e) => {
            state.images.storage().remove_best_effort(&upload.path).await;
            return Err(fail(e));
        }
    };

    let report = state
        .images
        .compress(&upload.path, options)
        .await
        .map_err(fail)?;
    Ok(Json(CompressResponse {
        success: true,
        message: "Image compressed successfully".into(),
        original_size: report.original_size,
        compressed_size: report.compressed_size,
        compression_ratio: report.compression_ratio,
        image_url: image_url(&report.image_id),
    }))
}

#[instrument(skip_all)]
async fn format_convert(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<FormatConvertResponse>, ApiError> {
    let fail = |e: ServiceError| ApiError::image(e, CONVERT_FAILED, state.config.expose_error_details);
    let form = receive_image(&state, &mut multipart).await.map_err(fail)?;
    let upload = form.require_file("image").map_err(fail)?;

    // Reject bad targets before any image work; the upload is discarded.
    let target = form
        .text("targetFormat")
        .ok_or(ServiceError::MissingField {
            field: "targetFormat",
        })
        .and_then(|t| t.parse::<ImageTarget>());
    let target = match target {
        Ok(t) => t,
        Err(e) => {
            state.images.storage().remove_best_effort(&upload.path).await;
            return Err(fail(e));
        }
    };

    let report = state
        .images
        .convert_format(&upload.path, target.extension())
        .await
        .map_err(fail)?;
    Ok(Json(FormatConvertResponse {
        success: true,
        message: "Image format converted successfully".into(),
        original_format: report.original_format,
        converted_format: report.converted_format,
        original_size: report.original_size,
        converted_size: report.converted_size,
        image_url: image_url(&report.image_id),
    }))
}

#[instrument(skip(state))]
async fn download(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<Response, ApiError> {
    let fail = |e: ServiceError| ApiError::image(e, DOWNLOAD_FAILED, state.config.expose_error_details);
    let (path, mime) = state.images.locate(&image_id).await.map_err(fail)?;
    let file = FileBody::open(&path).await.map_err(|_| {
        fail(ServiceError::ImageNotFound {
            image_id: image_id.clone(),
        })
    })?;
    Ok(inline(file, mime))
}
