//! Storage layer for Docqa
//!
//! Provides content-addressed blob storage for raw documents and structured
//! database access for documents, chunks, and embeddings.

pub mod blob;
pub mod database;

use crate::error::{DocqaError, Result};
use std::path::PathBuf;

pub use blob::BlobStore;
pub use database::{
    decode_vector, encode_vector, ChunkRecord, Database, DbPool, DbStats, DocumentRecord,
    DocumentStatus, DocumentSummary,
};

/// Storage manager that coordinates blob and database storage
pub struct StorageManager {
    pub blob_store: BlobStore,
    pub database: Database,
    base_path: PathBuf,
}

impl StorageManager {
    /// Create a new storage manager rooted at the given data directory
    pub fn new(base_path: PathBuf) -> Result<Self> {
        let store_dir = base_path.join("store");

        std::fs::create_dir_all(&store_dir).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to create store directory: {}", store_dir.display()),
        })?;

        let blob_store = BlobStore::new(store_dir.clone())?;

        let db_path = store_dir.join("db.sqlite");
        let database = Database::new(&db_path)?;

        Ok(Self {
            blob_store,
            database,
            base_path,
        })
    }

    /// Path of the store directory (database + blobs)
    pub fn store_dir(&self) -> PathBuf {
        self.base_path.join("store")
    }

    /// Get combined storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let db_stats = self.database.stats()?;
        let store_size = dir_size(&self.store_dir())?;

        Ok(StorageStats {
            db: db_stats,
            store_size,
        })
    }
}

/// Calculate directory size recursively
fn dir_size(path: &std::path::Path) -> Result<u64> {
    let mut size = 0u64;

    if path.is_dir() {
        for entry in std::fs::read_dir(path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to read directory: {}", path.display()),
        })? {
            let entry = entry.map_err(|e| DocqaError::Io {
                source: e,
                context: "Failed to read directory entry".to_string(),
            })?;
            let path = entry.path();

            if path.is_dir() {
                size += dir_size(&path)?;
            } else {
                size += entry
                    .metadata()
                    .map_err(|e| DocqaError::Io {
                        source: e,
                        context: format!("Failed to get file metadata: {}", path.display()),
                    })?
                    .len();
            }
        }
    }

    Ok(size)
}

/// Combined storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub db: DbStats,
    pub store_size: u64,
}

impl StorageStats {
    /// Format size as human-readable string
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
