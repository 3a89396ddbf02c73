//! Indexer: embeds a document's chunks and writes (embedding -> chunk)
//! pairs to the store and the vector index.
//!
//! Embedding calls are retried a bounded number of times with exponential
//! backoff. When a batch keeps failing, the failure reports how many chunks
//! were already embedded so the caller can mark the document failed.

use super::{EmbeddingError, EmbeddingProvider, VectorIndex};
use crate::storage::{ChunkRecord, Database};
use crate::config::EmbeddingConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Outcome of a successful indexing run
#[derive(Debug)]
pub struct IndexReport {
    pub embedded: usize,
    pub total: usize,
    pub duration_ms: u64,
}

/// Indexing failure after bounded retries
#[derive(Error, Debug)]
#[error("embedding failed after {attempts} attempts ({embedded}/{total} chunks embedded): {source}")]
pub struct IndexFailure {
    pub embedded: usize,
    pub total: usize,
    pub attempts: usize,
    #[source]
    pub source: EmbeddingError,
}

/// Embeds chunks and persists their vectors
pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    database: Arc<Database>,
    config: EmbeddingConfig,
}

impl Indexer {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        database: Arc<Database>,
        config: EmbeddingConfig,
    ) -> Self {
        Self {
            provider,
            index,
            database,
            config,
        }
    }

    /// Embed and index every chunk, batch by batch in document order.
    ///
    /// Vectors are written to the embeddings table and the in-memory index
    /// together, so a chunk is either fully indexed or not at all.
    pub async fn index_chunks(&self, chunks: &[ChunkRecord]) -> Result<IndexReport, IndexFailure> {
        let start = std::time::Instant::now();
        let total = chunks.len();
        let mut embedded = 0usize;

        info!("Indexing {} chunks", total);

        for batch in chunks.chunks(self.config.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let vectors = match self.embed_with_retry(&texts).await {
                Ok(vectors) => vectors,
                Err(source) => {
                    return Err(IndexFailure {
                        embedded,
                        total,
                        attempts: self.config.max_retries + 1,
                        source,
                    });
                }
            };

            for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                self.database
                    .insert_embedding(chunk.id, vector, self.provider.model_name())
                    .map_err(|e| IndexFailure {
                        embedded,
                        total,
                        attempts: 1,
                        source: EmbeddingError::GenerationError(format!(
                            "failed to persist embedding: {}",
                            e
                        )),
                    })?;
                self.index.insert(chunk.id, vector).map_err(|e| IndexFailure {
                    embedded,
                    total,
                    attempts: 1,
                    source: EmbeddingError::GenerationError(e.to_string()),
                })?;
                embedded += 1;
            }

            debug!("Indexed batch of {} chunks", batch.len());
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Indexing complete: {}/{} chunks in {}ms",
            embedded, total, duration_ms
        );

        Ok(IndexReport {
            embedded,
            total,
            duration_ms,
        })
    }

    /// Embed a batch, retrying transient failures with exponential backoff
    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0usize;

        loop {
            match self.provider.embed_batch(texts) {
                Ok(vectors) => {
                    if vectors.len() != texts.len() {
                        return Err(EmbeddingError::GenerationError(format!(
                            "embedding count mismatch: expected {}, got {}",
                            texts.len(),
                            vectors.len()
                        )));
                    }
                    return Ok(vectors);
                }
                // Bad input will not improve with retries
                Err(e @ EmbeddingError::InvalidInput(_)) => return Err(e),
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    let backoff =
                        Duration::from_millis(self.config.retry_backoff_ms << attempt);
                    warn!(
                        "Embedding attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
