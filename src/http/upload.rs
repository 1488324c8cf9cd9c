//! Multipart upload extraction.
//!
//! The file part is streamed straight to storage under a fresh
//! `<uuid>.<ext>` name while its size is checked chunk by chunk. Text parts
//! are collected into a map. If anything fails after the file has been
//! written, the partial or complete upload is removed before returning.

use crate::error::ServiceError;
use crate::format;
use crate::naming;
use crate::storage::StorageLocation;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const MIB: u64 = 1024 * 1024;

/// A file part written to storage.
#[derive(Debug, Clone)]
pub struct SavedUpload {
    pub path: PathBuf,
    /// Name as sent by the client.
    pub original_name: String,
    pub size: u64,
}

/// Everything extracted from one multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<SavedUpload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// The uploaded file, or [`ServiceError::MissingUpload`].
    pub fn require_file(&self, field: &'static str) -> Result<&SavedUpload, ServiceError> {
        self.file
            .as_ref()
            .ok_or(ServiceError::MissingUpload { field })
    }

    /// A non-blank text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Limits and destination for [`receive`].
#[derive(Debug, Clone, Copy)]
pub struct UploadRules<'a> {
    pub file_field: &'static str,
    pub storage: &'a StorageLocation,
    pub max_bytes: u64,
}

/// Drain `multipart`, storing the `rules.file_field` part on disk.
pub async fn receive(
    multipart: &mut Multipart,
    rules: UploadRules<'_>,
) -> Result<UploadForm, ServiceError> {
    let mut form = UploadForm::default();
    match drain(multipart, rules, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            if let Some(saved) = &form.file {
                rules.storage.remove_best_effort(&saved.path).await;
            }
            Err(e)
        }
    }
}

async fn drain(
    multipart: &mut Multipart,
    rules: UploadRules<'_>,
    form: &mut UploadForm,
) -> Result<(), ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, rules.max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == rules.file_field && form.file.is_none() {
            let saved = save_file(field, rules).await?;
            form.file = Some(saved);
        } else if field.file_name().is_none() {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, rules.max_bytes))?;
            form.fields.insert(name, value);
        } else {
            debug!("Ignoring unexpected file part '{}'", name);
        }
    }
    Ok(())
}

async fn save_file(
    mut field: Field<'_>,
    rules: UploadRules<'_>,
) -> Result<SavedUpload, ServiceError> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    if !format::is_accepted_upload(&original_name) {
        let extension = naming::extension_of(&original_name)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        return Err(ServiceError::UnsupportedFileType { extension });
    }

    let path = rules
        .storage
        .path_for(&naming::upload_file_name(&original_name));
    let result = write_stream(&mut field, &path, rules.max_bytes).await;
    match result {
        Ok(size) => {
            debug!("Stored upload '{}' as {} ({} bytes)", original_name, path.display(), size);
            Ok(SavedUpload {
                path,
                original_name,
                size,
            })
        }
        Err(e) => {
            rules.storage.remove_best_effort(&path).await;
            Err(e)
        }
    }
}

async fn write_stream(field: &mut Field<'_>, path: &Path, max_bytes: u64) -> Result<u64, ServiceError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ServiceError::storage(path, e))?;
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        size += chunk.len() as u64;
        if size > max_bytes {
            return Err(ServiceError::UploadTooLarge {
                limit_mb: max_bytes.div_ceil(MIB),
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| ServiceError::storage(path, e))?;
    }
    file.flush()
        .await
        .map_err(|e| ServiceError::storage(path, e))?;
    Ok(size)
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> ServiceError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::UploadTooLarge {
            limit_mb: max_bytes.div_ceil(MIB),
        }
    } else {
        ServiceError::MalformedUpload {
            detail: e.body_text(),
        }
    }
}
