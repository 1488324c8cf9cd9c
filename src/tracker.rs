//! Conversion task tracker.
//!
//! A [`TaskTracker`] owns the lifecycle of every document conversion:
//!
//! ```text
//! submit ──► Processing ──► Completed ──► resolve (download)
//!                 │
//!                 └───────► Failed { reason }
//!
//! cancel: any state ──► removed (record + source + output)
//! sweep:  files older than max_age ──► deleted (map untouched)
//! ```
//!
//! ## Why an injected store?
//!
//! The task map is the only shared mutable state in the service. Keeping it
//! in an explicit [`TaskStore`] handed to the tracker lets tests and embedders
//! run several independent trackers in one process. The lock is held for
//! single map operations only and never across a converter await, so
//! conversions of distinct tasks never contend.
//!
//! ## Cancellation races
//!
//! `cancel` is advisory-destructive: it removes the record, then deletes the
//! files. A conversion still in flight for that id may write its output after
//! the deletion. When it finishes and finds its record gone, it removes that
//! output itself; anything that slips through is left for the sweep.

use crate::config::ServiceConfig;
use crate::converter::{ConversionRoute, ConverterRegistry};
use crate::error::ServiceError;
use crate::format::{self, DocumentFormat};
use crate::naming;
use crate::storage::StorageLocation;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Concurrent deletions per sweep.
const SWEEP_CONCURRENCY: usize = 8;

// ── Task model ───────────────────────────────────────────────────────────

/// Lifecycle state of a conversion task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed { reason: String },
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Processing => f.write_str("processing"),
            TaskStatus::Completed => f.write_str("completed"),
            TaskStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// One tracked conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionTask {
    /// Token naming the task; also the stem of `output_path`.
    pub task_id: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub status: TaskStatus,
    /// Upload name without extension, used for the download file name.
    pub original_name: String,
    /// Normalised target format token.
    pub extension: String,
    pub route: ConversionRoute,
    pub created_at: SystemTime,
}

/// Outcome of a successful [`TaskTracker::submit`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedTask {
    pub task_id: String,
    pub original_name: String,
    pub extension: String,
    pub route: ConversionRoute,
    /// True when the bytes were copied without a real format change.
    pub passthrough: bool,
}

/// A completed artifact ready for download.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub mime_type: &'static str,
    /// `<original_name>.<extension>`
    pub file_name: String,
}

// ── TaskStore ────────────────────────────────────────────────────────────

/// In-memory map of task id → task.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, ConversionTask>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: ConversionTask) {
        self.tasks.write().await.insert(task.task_id.clone(), task);
    }

    pub async fn get(&self, task_id: &str) -> Option<ConversionTask> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// Update the status of an existing record. Returns `false` if it is gone.
    pub async fn set_status(&self, task_id: &str, status: TaskStatus) -> bool {
        match self.tasks.write().await.get_mut(task_id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, task_id: &str) -> Option<ConversionTask> {
        self.tasks.write().await.remove(task_id)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

// ── TaskTracker ──────────────────────────────────────────────────────────

/// Registers, tracks, serves and cancels conversion tasks.
#[derive(Debug, Clone)]
pub struct TaskTracker {
    store: Arc<TaskStore>,
    storage: StorageLocation,
    registry: ConverterRegistry,
    max_document_bytes: u64,
    strict_targets: bool,
}

impl TaskTracker {
    /// Tracker with the default document limit and lenient target handling.
    pub fn new(storage: StorageLocation, registry: ConverterRegistry, store: Arc<TaskStore>) -> Self {
        let defaults = ServiceConfig::default();
        Self {
            store,
            storage,
            registry,
            max_document_bytes: defaults.max_document_bytes,
            strict_targets: defaults.strict_targets,
        }
    }

    /// Tracker wired from a full service configuration with a fresh store.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            StorageLocation::new(&config.storage_dir),
            ConverterRegistry::from_config(config),
            Arc::new(TaskStore::new()),
        )
        .max_document_bytes(config.max_document_bytes)
        .strict_targets(config.strict_targets)
    }

    pub fn max_document_bytes(mut self, bytes: u64) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    pub fn strict_targets(mut self, v: bool) -> Self {
        self.strict_targets = v;
        self
    }

    pub fn storage(&self) -> &StorageLocation {
        &self.storage
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Register a conversion of `source_path` to `target_format` and run it.
    ///
    /// Validation happens before any record exists. Once the record is
    /// inserted the task id is reported on every outcome: a failed
    /// conversion leaves a [`TaskStatus::Failed`] record behind and returns
    /// [`ServiceError::ConversionFailed`] carrying that id.
    #[instrument(skip(self), fields(task_id = tracing::field::Empty))]
    pub async fn submit(
        &self,
        source_path: &Path,
        target_format: &str,
        original_file_name: &str,
    ) -> Result<SubmittedTask, ServiceError> {
        let target = normalise_target(target_format)?;

        let meta = tokio::fs::metadata(source_path)
            .await
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| ServiceError::SourceNotFound {
                path: source_path.to_path_buf(),
            })?;
        if meta.len() > self.max_document_bytes {
            return Err(ServiceError::DocumentTooLarge {
                size: meta.len(),
                limit: self.max_document_bytes,
            });
        }

        let source_ext =
            naming::extension_of(source_path).or_else(|| naming::extension_of(original_file_name));
        if self.strict_targets {
            let pair = source_ext
                .as_deref()
                .and_then(DocumentFormat::from_extension)
                .zip(DocumentFormat::from_extension(&target));
            if !pair.is_some_and(|(s, t)| format::is_supported_pair(s, t)) {
                return Err(ServiceError::UnsupportedConversion {
                    source_ext: source_ext.unwrap_or_default(),
                    target,
                });
            }
        }

        let route = ConversionRoute::for_pair(source_ext.as_deref(), &target);
        let (task_id, file_name) = naming::artifact(&target);
        tracing::Span::current().record("task_id", task_id.as_str());
        let output_path = self.storage.path_for(&file_name);

        let task = ConversionTask {
            task_id: task_id.clone(),
            source_path: source_path.to_path_buf(),
            output_path: output_path.clone(),
            status: TaskStatus::Processing,
            original_name: naming::stem_of(original_file_name),
            extension: target,
            route,
            created_at: SystemTime::now(),
        };
        let submitted = SubmittedTask {
            task_id: task_id.clone(),
            original_name: task.original_name.clone(),
            extension: task.extension.clone(),
            route,
            passthrough: false,
        };
        self.store.insert(task).await;
        debug!("Registered {} task for {}", route, source_path.display());

        let converter = self.registry.converter(route);
        let outcome = match converter.convert(source_path, &output_path).await {
            Ok(()) => {
                if self.storage.exists(&output_path).await {
                    Ok(())
                } else {
                    Err(format!("{} produced no output file", converter.name()))
                }
            }
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(()) => {
                if !self.store.set_status(&task_id, TaskStatus::Completed).await {
                    self.storage.remove_best_effort(&output_path).await;
                    return Err(ServiceError::ConversionFailed {
                        task_id,
                        reason: "task was cancelled during conversion".into(),
                    });
                }
                info!(
                    "Conversion {} completed via {}",
                    task_id,
                    converter.name()
                );
                Ok(SubmittedTask {
                    passthrough: converter.is_passthrough(),
                    ..submitted
                })
            }
            Err(reason) => {
                error!("Conversion {} failed: {}", task_id, reason);
                self.storage.remove_best_effort(&output_path).await;
                self.store
                    .set_status(
                        &task_id,
                        TaskStatus::Failed {
                            reason: reason.clone(),
                        },
                    )
                    .await;
                Err(ServiceError::ConversionFailed { task_id, reason })
            }
        }
    }

    /// Look up a completed task whose artifact still exists.
    #[instrument(skip(self))]
    pub async fn resolve(&self, task_id: &str) -> Result<ResolvedArtifact, ServiceError> {
        let task = self
            .store
            .get(task_id)
            .await
            .ok_or_else(|| ServiceError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;

        if task.status != TaskStatus::Completed {
            return Err(ServiceError::TaskNotReady {
                task_id: task_id.to_string(),
                status: task.status.to_string(),
            });
        }
        if !self.storage.exists(&task.output_path).await {
            warn!("Artifact for {} is gone: {}", task_id, task.output_path.display());
            return Err(ServiceError::MissingArtifact {
                task_id: task_id.to_string(),
            });
        }

        Ok(ResolvedArtifact {
            mime_type: format::mime_for_extension(&task.extension),
            file_name: format!("{}.{}", task.original_name, task.extension),
            path: task.output_path,
        })
    }

    /// Forget a task and delete its files. Returns `false` for unknown ids.
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: &str) -> bool {
        let Some(task) = self.store.remove(task_id).await else {
            return false;
        };
        self.storage.remove_best_effort(&task.source_path).await;
        self.storage.remove_best_effort(&task.output_path).await;
        info!("Cancelled conversion {}", task_id);
        true
    }

    /// Delete every stored file older than `max_age`, tracked or not.
    ///
    /// Returns the number of files removed. The task map is not consulted;
    /// records whose files were swept resolve as [`ServiceError::MissingArtifact`].
    pub async fn reclaim_expired(&self, max_age: Duration) -> usize {
        let expired = self
            .storage
            .expired_entries(max_age, SystemTime::now())
            .await;
        if expired.is_empty() {
            return 0;
        }

        let storage = &self.storage;
        futures::stream::iter(expired)
            .map(|path| async move { storage.remove_best_effort(&path).await })
            .buffer_unordered(SWEEP_CONCURRENCY)
            .filter(|removed| futures::future::ready(*removed))
            .count()
            .await
    }

    pub async fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.store.get(task_id).await.map(|t| t.status)
    }

    /// Snapshot of a task record.
    pub async fn task(&self, task_id: &str) -> Option<ConversionTask> {
        self.store.get(task_id).await
    }
}

/// Trim, drop one leading dot, lowercase; reject anything not alphanumeric.
fn normalise_target(raw: &str) -> Result<String, ServiceError> {
    let token = raw.trim();
    let token = token.strip_prefix('.').unwrap_or(token).to_ascii_lowercase();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ServiceError::InvalidTargetFormat {
            format: raw.to_string(),
        });
    }
    Ok(token)
}
