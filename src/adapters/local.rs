use crate::domain::ports::Storage;
use crate::utils::error::{Result, TransferError};
use std::path::{Path, PathBuf};

/// Filesystem storage. Keys are paths, resolved against `base_path` when
/// relative. Writes replace the whole file and are not atomic.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    base_path: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
        }
    }

    /// Keys are used as given, relative to the working directory.
    pub fn cwd() -> Self {
        Self { base_path: None }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        match &self.base_path {
            Some(base) => base.join(key),
            None => PathBuf::from(key),
        }
    }
}

impl Storage for LocalStorage {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(key);
        let data = tokio::fs::read(&full_path).await.map_err(|e| {
            TransferError::storage(format!("failed to read {}: {}", full_path.display(), e))
        })?;
        tracing::info!(path = %full_path.display(), bytes = data.len(), "read local file");
        Ok(data)
    }

    async fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(key);

        if let Some(parent) = full_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        write_whole(&full_path, data).await?;
        tracing::info!(path = %full_path.display(), bytes = data.len(), "saved local file");
        Ok(())
    }
}

async fn write_whole(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data).await.map_err(|e| {
        TransferError::storage(format!("failed to write {}: {}", path.display(), e))
    })
}
