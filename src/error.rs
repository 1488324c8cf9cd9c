//! Error types for the webtools-convert library.
//!
//! Every fallible public operation returns [`ServiceError`]. The variants are
//! grouped the way callers need to react to them, and [`ServiceError::kind`]
//! collapses them into an [`ErrorKind`] the HTTP layer maps to a status code:
//!
//! * **Validation**: the request itself is wrong (missing file, unsupported
//!   format, out-of-range option). Detected before any task is created.
//! * **NotFound**: an unknown task or image id, or an artifact that has been
//!   reclaimed since the task completed.
//! * **Conversion**: a converter or renderer failed for one task.
//! * **Storage**: a file-system operation that had to succeed (writing an
//!   upload). Cleanup-time storage failures never reach this type; they are
//!   logged where they happen and absorbed.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the webtools-convert library.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The multipart request carried no file in the expected field.
    #[error("No file was uploaded (expected form field '{field}')")]
    MissingUpload { field: &'static str },

    /// A required non-file form field was missing or empty.
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    /// The uploaded file's extension is not on the upload allow-list.
    #[error("Unsupported file type: '{extension}'")]
    UnsupportedFileType { extension: String },

    /// The upload exceeded the transport-level size limit.
    #[error("File exceeds the upload limit of {limit_mb}MB")]
    UploadTooLarge { limit_mb: u64 },

    /// The document exceeds the application-level conversion size policy.
    #[error("Document is {size} bytes; conversions are limited to {limit} bytes")]
    DocumentTooLarge { size: u64, limit: u64 },

    /// The requested target format is not a usable format token.
    #[error("Invalid target format '{format}': expected a non-empty alphanumeric extension")]
    InvalidTargetFormat { format: String },

    /// Strict mode is on and the pair is not in the supported-format catalogue.
    #[error("Conversion from '.{source_ext}' to '.{target}' is not supported")]
    UnsupportedConversion { source_ext: String, target: String },

    /// Image format conversion target is not on the allow-list.
    #[error("Unsupported image target format '{format}' (expected one of: jpeg, png, webp, gif, tiff)")]
    UnsupportedImageFormat { format: String },

    /// Image option outside its accepted range or not a number.
    #[error("Invalid image option '{name}': {detail}")]
    InvalidImageOption { name: &'static str, detail: String },

    /// The source file handed to an operation does not exist or is not a file.
    #[error("Source file not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// No task with this id is tracked.
    #[error("File '{task_id}' does not exist or has expired")]
    TaskNotFound { task_id: String },

    /// The task exists but has not reached the completed state.
    #[error("Conversion of '{task_id}' has not completed (status: {status})")]
    TaskNotReady { task_id: String, status: String },

    /// The task completed but its artifact is gone (reclaimed or deleted).
    #[error("Converted file for '{task_id}' has been removed")]
    MissingArtifact { task_id: String },

    /// No processed image with this id exists.
    #[error("Image '{image_id}' does not exist")]
    ImageNotFound { image_id: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The converter for a tracked task failed or produced no output.
    ///
    /// The task stays registered in the failed state under `task_id`, so the
    /// caller can still cancel it to release the uploaded source file.
    #[error("Conversion '{task_id}' failed: {reason}")]
    ConversionFailed { task_id: String, reason: String },

    /// A document renderer returned an error.
    #[error("Rendering with '{renderer}' failed: {detail}")]
    RenderFailed {
        renderer: &'static str,
        detail: String,
    },

    /// A document renderer exceeded its time budget and was torn down.
    #[error("Rendering with '{renderer}' timed out after {secs}s")]
    RenderTimeout { renderer: &'static str, secs: u64 },

    /// The image library could not decode or encode an image.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    // ── Storage errors ────────────────────────────────────────────────────
    /// A file-system operation that must succeed failed.
    #[error("Storage operation on '{path}' failed: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conversion,
    Storage,
    Internal,
}

impl ServiceError {
    /// Classify this error for callers that only care about the failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::MissingUpload { .. }
            | ServiceError::MissingField { .. }
            | ServiceError::MalformedUpload { .. }
            | ServiceError::UnsupportedFileType { .. }
            | ServiceError::UploadTooLarge { .. }
            | ServiceError::DocumentTooLarge { .. }
            | ServiceError::InvalidTargetFormat { .. }
            | ServiceError::UnsupportedConversion { .. }
            | ServiceError::UnsupportedImageFormat { .. }
            | ServiceError::InvalidImageOption { .. }
            | ServiceError::SourceNotFound { .. }
            | ServiceError::InvalidConfig(_) => ErrorKind::Validation,

            ServiceError::TaskNotFound { .. }
            | ServiceError::TaskNotReady { .. }
            | ServiceError::MissingArtifact { .. }
            | ServiceError::ImageNotFound { .. } => ErrorKind::NotFound,

            ServiceError::ConversionFailed { .. }
            | ServiceError::RenderFailed { .. }
            | ServiceError::RenderTimeout { .. }
            | ServiceError::Image(_) => ErrorKind::Conversion,

            ServiceError::Storage { .. } => ErrorKind::Storage,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ServiceError::Storage {
            path: path.into(),
            source,
        }
    }
}
