use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Local-disk content store for transfer files.
///
/// Committed files live directly under the root; in-flight uploads are
/// staged in `.staging/` on the same filesystem so commit is a rename.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage root and staging area if missing.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.staging_dir())
            .await
            .with_context(|| format!("creating storage root {}", self.root.display()))?;
        Ok(())
    }

    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(".staging")
    }

    /// Allocate a fresh staging path for one multipart part.
    pub fn staging_path(&self) -> PathBuf {
        self.staging_dir().join(Uuid::new_v4().to_string())
    }

    /// Move a staged upload into its durable location.
    pub async fn commit(&self, temp_path: &Path, stored_name: &str) -> Result<PathBuf> {
        let dest = self.path_for(stored_name);
        tokio::fs::rename(temp_path, &dest)
            .await
            .with_context(|| format!("committing upload to {}", dest.display()))?;
        Ok(dest)
    }

    /// Remove staged leftovers after a failed upload. Best-effort.
    pub async fn discard(&self, temp_path: &Path) {
        if let Err(e) = tokio::fs::remove_file(temp_path).await {
            tracing::warn!(
                "Failed to discard staging file {}: {}",
                temp_path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_moves_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.ensure_root().await.unwrap();

        let staged = storage.staging_path();
        tokio::fs::write(&staged, b"hello").await.unwrap();

        let dest = storage.commit(&staged, "123-abc.txt").await.unwrap();
        assert_eq!(dest, dir.path().join("123-abc.txt"));
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_commit_missing_staged_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.ensure_root().await.unwrap();

        let missing = storage.staging_path();
        assert!(storage.commit(&missing, "gone.txt").await.is_err());
    }
}
