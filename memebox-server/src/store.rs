//! Catalog persistence
//!
//! The catalog is read and written as a whole. Saves go through a temp file in
//! the same directory followed by a rename, so a concurrent `load` sees either
//! the previous document or the new one, never a partial write.

use async_trait::async_trait;
use memebox_common::{Catalog, Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Load-all / save-all persistence for the catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Read the whole catalog, initializing it with seed records if absent
    async fn load(&self) -> Result<Catalog>;

    /// Atomically replace the persisted catalog
    async fn save(&self, catalog: &Catalog) -> Result<()>;
}

/// Catalog stored as one JSON document on the local filesystem
#[derive(Debug, Clone)]
pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    async fn initialize(&self) -> Result<Catalog> {
        info!(
            "Catalog file not found, creating seed catalog at {}",
            self.path.display()
        );
        let parent = self.parent_dir();
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create catalog directory", parent, e))?;
        }
        let seed = Catalog::seed();
        self.save(&seed).await?;
        Ok(seed)
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn load(&self) -> Result<Catalog> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.initialize().await,
            Err(e) => return Err(storage_error("read catalog", &self.path, e)),
        };

        let catalog = Catalog::parse(&raw)?;
        debug!(
            path = %self.path.display(),
            memes = catalog.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    async fn save(&self, catalog: &Catalog) -> Result<()> {
        let json = catalog.serialize()?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        let temp_path = self
            .parent_dir()
            .join(format!(".{}.tmp-{}", file_name, Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&temp_path, json.as_bytes()).await {
            discard_temp(&temp_path).await;
            return Err(storage_error("write temp catalog", &temp_path, e));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            discard_temp(&temp_path).await;
            return Err(storage_error("replace catalog", &self.path, e));
        }

        debug!(
            path = %self.path.display(),
            memes = catalog.len(),
            "Catalog saved"
        );
        Ok(())
    }
}

async fn discard_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temp catalog {}: {}", path.display(), e);
        }
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::StorageUnavailable(format!("Failed to {} {}: {}", action, path.display(), err))
}
