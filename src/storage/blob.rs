//! Content-addressed blob storage with BLAKE3 hashing
//!
//! Holds the raw bytes of uploaded documents. Re-uploading identical bytes
//! maps to the same blob, and the original PDF stays available for
//! re-ingestion.

use crate::error::{DocqaError, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Content-addressed blob storage
pub struct BlobStore {
    base_path: PathBuf,
}

impl BlobStore {
    /// Create a new blob store at the given base path
    pub fn new(base_path: PathBuf) -> Result<Self> {
        let blobs_dir = base_path.join("blobs");
        fs::create_dir_all(&blobs_dir).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to create blobs directory: {}", blobs_dir.display()),
        })?;

        Ok(Self { base_path })
    }

    /// Write data to blob storage, returning (hash, was_new)
    pub fn write(&self, data: &[u8]) -> Result<(String, bool)> {
        let hash = self.hash_data(data);

        let blob_path = self.blob_path(&hash);
        if blob_path.exists() {
            return Ok((hash, false));
        }

        // Write to temporary file first (atomic write)
        let temp_path = self.temp_path(&hash);
        let parent = temp_path
            .parent()
            .ok_or_else(|| DocqaError::Config("Invalid blob path".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to create parent directory: {}", parent.display()),
        })?;

        let mut file = fs::File::create(&temp_path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to create temp blob file: {}", temp_path.display()),
        })?;
        file.write_all(data).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to write blob data: {}", temp_path.display()),
        })?;
        file.sync_all().map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to sync blob file: {}", temp_path.display()),
        })?;
        drop(file);

        fs::rename(&temp_path, &blob_path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!(
                "Failed to rename temp blob to final location: {} -> {}",
                temp_path.display(),
                blob_path.display()
            ),
        })?;

        Ok((hash, true))
    }

    /// Read data from blob storage
    pub fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let blob_path = self.blob_path(hash);

        if !blob_path.exists() {
            return Err(DocqaError::Config(format!("Blob not found: {}", hash)));
        }

        let mut file = fs::File::open(&blob_path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to open blob file: {}", blob_path.display()),
        })?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to read blob data: {}", blob_path.display()),
        })?;

        Ok(data)
    }

    /// Check if a blob exists
    pub fn exists(&self, hash: &str) -> bool {
        self.blob_path(hash).exists()
    }

    /// Delete a blob (call only after checking no document references it)
    pub fn delete(&self, hash: &str) -> Result<()> {
        let blob_path = self.blob_path(hash);
        if blob_path.exists() {
            fs::remove_file(&blob_path).map_err(|e| DocqaError::Io {
                source: e,
                context: format!("Failed to delete blob: {}", blob_path.display()),
            })?;
        }
        Ok(())
    }

    /// Get the size of a blob
    pub fn size(&self, hash: &str) -> Result<u64> {
        let blob_path = self.blob_path(hash);
        let metadata = fs::metadata(&blob_path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to get blob metadata: {}", blob_path.display()),
        })?;
        Ok(metadata.len())
    }

    fn hash_data(&self, data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }

    /// Blob path uses a two-character fan-out to keep directories small
    fn blob_path(&self, hash: &str) -> PathBuf {
        let prefix = &hash[..2.min(hash.len())];
        self.base_path.join("blobs").join(prefix).join(hash)
    }

    fn temp_path(&self, hash: &str) -> PathBuf {
        self.base_path.join("blobs").join(format!(".tmp-{}", hash))
    }
}
