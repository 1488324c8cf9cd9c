//! Storage location for uploads and artifacts.
//!
//! The service keeps every file it owns in one flat directory. Sources and
//! converted outputs live side by side, named by [`crate::naming`]; the
//! reclamation sweep treats the directory as the source of truth and deletes
//! by modification time without consulting the task map.

use crate::error::ServiceError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// A single directory holding uploaded sources and produced artifacts.
#[derive(Debug, Clone)]
pub struct StorageLocation {
    dir: PathBuf,
}

impl StorageLocation {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the directory (and parents) if it does not exist yet.
    pub async fn ensure(&self) -> Result<(), ServiceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ServiceError::storage(&self.dir, e))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute-or-relative path for `file_name` inside this location.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    pub async fn file_size(&self, path: &Path) -> Result<u64, ServiceError> {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .map_err(|e| ServiceError::storage(path, e))
    }

    /// Delete `path`, logging instead of failing.
    ///
    /// Returns `true` when a file was actually removed. A file that is
    /// already gone is not an error.
    pub async fn remove_best_effort(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Regular files whose mtime is strictly older than `now - max_age`.
    ///
    /// Unreadable directories and entries that cannot be stat'ed are logged
    /// and skipped; the sweep never fails as a whole.
    pub async fn expired_entries(&self, max_age: Duration, now: SystemTime) -> Vec<PathBuf> {
        let Some(cutoff) = now.checked_sub(max_age) else {
            return Vec::new();
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) => {
                warn!("Cannot read storage dir {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut expired = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error while listing {}: {}", self.dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            let meta = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            match meta.modified() {
                Ok(mtime) if mtime < cutoff => expired.push(path),
                Ok(_) => {}
                Err(e) => warn!("No modification time for {}: {}", path.display(), e),
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backdate(path: &Path, age: Duration) {
        let f = std::fs::File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn ensure_creates_nested_dir() {
        let tmp = TempDir::new().unwrap();
        let loc = StorageLocation::new(tmp.path().join("a/b/uploads"));
        loc.ensure().await.unwrap();
        assert!(loc.dir().is_dir());
    }

    #[tokio::test]
    async fn remove_missing_file_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let loc = StorageLocation::new(tmp.path());
        assert!(!loc.remove_best_effort(&loc.path_for("nope.txt")).await);
    }

    #[tokio::test]
    async fn remove_existing_file_reports_true() {
        let tmp = TempDir::new().unwrap();
        let loc = StorageLocation::new(tmp.path());
        let p = loc.path_for("x.txt");
        std::fs::write(&p, b"x").unwrap();
        assert!(loc.remove_best_effort(&p).await);
        assert!(!loc.exists(&p).await);
    }

    #[tokio::test]
    async fn expired_entries_respects_cutoff() {
        let tmp = TempDir::new().unwrap();
        let loc = StorageLocation::new(tmp.path());
        let old = loc.path_for("old.txt");
        let new = loc.path_for("new.txt");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&new, b"new").unwrap();
        std::fs::create_dir(loc.path_for("subdir")).unwrap();
        backdate(&old, Duration::from_secs(2 * 3600));

        let expired = loc
            .expired_entries(Duration::from_secs(3600), SystemTime::now())
            .await;
        assert_eq!(expired, vec![old]);
    }

    #[tokio::test]
    async fn missing_dir_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let loc = StorageLocation::new(tmp.path().join("absent"));
        assert!(loc
            .expired_entries(Duration::ZERO, SystemTime::now())
            .await
            .is_empty());
    }
}
