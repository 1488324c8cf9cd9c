//! # webtools-convert
//!
//! A file-conversion and image-processing web service built around a
//! tracked conversion-task lifecycle.
//!
//! ## Overview
//!
//! ```text
//! upload (multipart)
//!  │
//!  ├─ 1. Store    stream to <storage>/<uuid>.<ext>, size + type checked
//!  ├─ 2. Submit   TaskTracker validates, registers a Processing task
//!  ├─ 3. Convert  routed by (source, target): text → PDF, else passthrough
//!  ├─ 4. Serve    resolve(task_id) → artifact path + MIME type
//!  └─ 5. Reclaim  cancel(task_id) now, or the periodic sweep later
//! ```
//!
//! Image compression and format conversion run next to this as single-shot,
//! untracked operations ([`ImageProcessor`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use webtools_convert::{ServiceConfig, TaskTracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let tracker = TaskTracker::from_config(&config);
//!     tracker.storage().ensure().await?;
//!
//!     let task = tracker.submit(Path::new("uploads/notes.txt"), "pdf", "notes.txt").await?;
//!     let artifact = tracker.resolve(&task.task_id).await?;
//!     println!("{} ({})", artifact.path.display(), artifact.mime_type);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `webtools` server binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library:
//! ```toml
//! webtools-convert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod converter;
pub mod error;
pub mod format;
pub mod http;
pub mod imaging;
pub mod naming;
pub mod reclaim;
pub mod render;
pub mod storage;
pub mod tracker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RendererKind, ServiceConfig, ServiceConfigBuilder};
pub use converter::{ConversionRoute, Converter, ConverterRegistry};
pub use error::{ErrorKind, ServiceError};
pub use format::{supported_formats, DocumentFormat};
pub use http::AppState;
pub use imaging::{CompressOptions, CompressionReport, FormatReport, ImageProcessor, ImageTarget};
pub use reclaim::{spawn_reclaimer, ReclaimSchedule};
pub use render::DocumentRenderer;
pub use storage::StorageLocation;
pub use tracker::{
    ConversionTask, ResolvedArtifact, SubmittedTask, TaskStatus, TaskStore, TaskTracker,
};
