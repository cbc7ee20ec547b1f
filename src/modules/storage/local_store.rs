//! Directory-backed file store
//!
//! Every saved file gets a fresh name made of a random token and the
//! sanitized original name, so concurrent uploads of identically named files
//! never overwrite each other and a name is never handed out twice.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::AppError;
use crate::shared::validation::sanitize_filename;

/// Stored files live flat inside `root`
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    label: &'static str,
}

impl FileStore {
    /// Create a store over `root`. `label` only tags log lines ("images", "pdfs").
    pub fn new(root: impl Into<PathBuf>, label: &'static str) -> Self {
        Self {
            root: root.into(),
            label,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed. Safe to call repeatedly and concurrently.
    pub async fn ensure_root(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create {} directory {}: {}",
                self.label,
                self.root.display(),
                e
            ))
        })
    }

    /// Write `data` under a new unique name derived from `original_name`.
    ///
    /// # Returns
    /// The stored name, which is what the catalog records.
    pub async fn save(&self, data: &[u8], original_name: &str) -> Result<String, AppError> {
        self.ensure_root().await?;

        let sanitized = sanitize_filename(original_name);
        let stored_name = if sanitized.is_empty() {
            format!("{}_upload", Uuid::new_v4().simple())
        } else {
            format!("{}_{}", Uuid::new_v4().simple(), sanitized)
        };
        let path = self.root.join(&stored_name);

        // create_new: a name collision surfaces as an error instead of an overwrite
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {}", path.display(), e))
            })?;

        if let Err(e) = write_all_and_sync(&mut file, data).await {
            drop(file);
            // Leave no truncated file behind
            let _ = fs::remove_file(&path).await;
            return Err(AppError::Storage(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }

        info!(
            store = self.label,
            stored_name = %stored_name,
            size = data.len(),
            "File saved"
        );

        Ok(stored_name)
    }

    /// Remove a stored file.
    ///
    /// Returns whether a file was actually removed. A missing file or a failed
    /// removal is logged and reported as `false`, never as an error.
    pub async fn delete(&self, stored_name: &str) -> bool {
        let Some(path) = self.resolve(stored_name) else {
            warn!(
                store = self.label,
                stored_name, "Refusing to delete file outside store root"
            );
            return false;
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(store = self.label, stored_name, "File deleted");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(store = self.label, stored_name, "File already absent");
                false
            }
            Err(e) => {
                warn!(
                    store = self.label,
                    stored_name,
                    error = %e,
                    "Failed to delete file"
                );
                false
            }
        }
    }

    /// Whether a stored file is currently present
    #[cfg(test)]
    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.resolve(stored_name) {
            Some(path) => fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    /// Read a stored file for serving.
    ///
    /// Names that would escape the root are rejected as not found before any
    /// filesystem access.
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, AppError> {
        let not_found = || AppError::NotFound(format!("File '{}' not found", stored_name));

        let path = self.resolve(stored_name).ok_or_else(not_found)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Map a stored name to its path, or `None` if it is not a single plain filename
    fn resolve(&self, stored_name: &str) -> Option<PathBuf> {
        if stored_name.is_empty() || stored_name.contains(['/', '\\', '\0']) {
            return None;
        }

        let mut components = Path::new(stored_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.root.join(stored_name)),
            _ => None,
        }
    }
}

async fn write_all_and_sync(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("images"), "images");
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_creates_root_and_round_trips_bytes() {
        let (_dir, store) = store();
        assert!(!store.root().exists());

        let name = store.save(b"\x89PNG data", "scratch.png").await.unwrap();

        assert!(name.ends_with("_scratch.png"));
        assert_eq!(store.read(&name).await.unwrap(), b"\x89PNG data");
    }

    #[tokio::test]
    async fn test_same_original_name_never_overwrites() {
        let (_dir, store) = store();

        let first = store.save(b"first", "map.png").await.unwrap();
        let second = store.save(b"second", "map.png").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.read(&first).await.unwrap(), b"first");
        assert_eq!(store.read(&second).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_distinct_names() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save(&[i], "same.png").await.unwrap()
            }));
        }

        let mut names = Vec::new();
        for handle in handles {
            names.push(handle.await.unwrap());
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 16);
    }

    #[tokio::test]
    async fn test_unsafe_original_name_is_sanitized() {
        let (_dir, store) = store();

        let name = store.save(b"x", "../../evil.png").await.unwrap();

        assert!(!name.contains('/'));
        assert!(store.root().join(&name).is_file());
    }

    #[tokio::test]
    async fn test_delete_reports_whether_file_was_removed() {
        let (_dir, store) = store();
        let name = store.save(b"x", "a.png").await.unwrap();

        assert!(store.delete(&name).await);
        assert!(!store.exists(&name).await);
        assert!(!store.delete(&name).await);
        assert!(!store.delete("never-existed.png").await);
    }

    #[tokio::test]
    async fn test_read_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
        let store = FileStore::new(dir.path().join("pdfs"), "pdfs");
        store.ensure_root().await.unwrap();

        for name in ["../secret.txt", "..", ".", "", "a/b.pdf", "..\\secret.txt"] {
            assert!(
                matches!(store.read(name).await, Err(AppError::NotFound(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(!store.delete("../secret.txt").await);
        assert!(dir.path().join("secret.txt").exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, store) = store();
        store.ensure_root().await.unwrap();
        assert!(matches!(
            store.read("missing.pdf").await,
            Err(AppError::NotFound(_))
        ));
    }
}
