//! Top-K semantic retrieval over indexed chunks
//!
//! Embeds the query with the same provider used at indexing time, searches
//! the vector index, hydrates chunk rows from the database, and applies the
//! optional document filter. An empty index or a filter matching nothing
//! yields an empty result, never an error.

use crate::config::{IndexConfig, RetrievalConfig};
use crate::embedding::{EmbeddingProvider, VectorIndex};
use crate::storage::Database;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

impl From<SearchError> for crate::error::DocqaError {
    fn from(err: SearchError) -> Self {
        crate::error::DocqaError::Retrieval(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Search query with optional document filter
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Maximum number of results
    pub limit: usize,

    /// Restrict results to one document
    pub document_id: Option<i64>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            document_id: None,
        }
    }

    pub fn within_document(mut self, document_id: i64) -> Self {
        self.document_id = Some(document_id);
        self
    }
}

/// A retrieved chunk with its relevance score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: i64,
    pub document_id: i64,
    /// Name of the owning document
    pub document: String,
    /// 1-based page number
    pub page: u32,
    /// Position within the document
    pub seq: i64,
    pub text: String,
    pub score: f32,
}

/// Semantic retriever over the vector index
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    database: Arc<Database>,
    config: RetrievalConfig,
    index_config: IndexConfig,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        database: Arc<Database>,
        config: RetrievalConfig,
        index_config: IndexConfig,
    ) -> Self {
        Self {
            provider,
            index,
            database,
            config,
            index_config,
        }
    }

    /// Retrieve the top chunks for a query
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredChunk>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .provider
            .embed(&query.text)
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;

        // Over-fetch so a document filter still has enough candidates
        let search_limit = query.limit * self.config.search_multiplier;

        let hits = self
            .index
            .search(&query_embedding, search_limit, self.index_config.hnsw_ef_search)
            .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;

        let mut candidates = self.hydrate(hits)?;

        if let Some(document_id) = query.document_id {
            candidates.retain(|c| c.document_id == document_id);
        }

        if self.config.min_similarity > 0.0 {
            candidates.retain(|c| c.score >= self.config.min_similarity);
        }

        // Best score first; equal scores fall back to document order
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.document_id.cmp(&b.document_id))
                .then(a.seq.cmp(&b.seq))
        });
        candidates.truncate(query.limit);

        Ok(candidates)
    }

    /// Turn raw index hits into scored chunks with document metadata
    fn hydrate(
        &self,
        hits: Vec<crate::embedding::SearchResult>,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        let score_map: HashMap<i64, f32> = hits.into_iter().map(|h| (h.id, h.score)).collect();

        // Stale index entries (deleted chunks) simply drop out here
        let chunk_records = self
            .database
            .get_chunks(&ids)
            .map_err(|e| SearchError::DatabaseError(format!("Failed to get chunks: {}", e)))?;

        let mut document_names: HashMap<i64, String> = HashMap::new();
        let mut scored = Vec::with_capacity(chunk_records.len());

        for chunk in chunk_records {
            let score = score_map.get(&chunk.id).copied().unwrap_or(0.0);

            let document = match document_names.get(&chunk.document_id) {
                Some(name) => name.clone(),
                None => {
                    let record = self
                        .database
                        .get_document_by_id(chunk.document_id)
                        .map_err(|e| {
                            SearchError::DatabaseError(format!("Failed to get document: {}", e))
                        })?;
                    let name = match record {
                        Some(d) => d.name,
                        // Chunk whose document vanished mid-flight
                        None => continue,
                    };
                    document_names.insert(chunk.document_id, name.clone());
                    name
                }
            };

            scored.push(ScoredChunk {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                document,
                page: chunk.page,
                seq: chunk.seq,
                text: chunk.text,
                score,
            });
        }

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::EmbeddingError;
    use crate::storage::StorageManager;
    use tempfile::TempDir;

    /// Deterministic byte-histogram embedding; identical text gives an
    /// identical vector, so exact matches score 1.0.
    struct HashProvider {
        dimension: usize,
    }

    impl EmbeddingProvider for HashProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v = vec![0.0f32; self.dimension];
            for (i, b) in text.bytes().enumerate() {
                v[(i + b as usize) % self.dimension] += b as f32;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1.0);
            Ok(v.iter().map(|x| x / norm).collect())
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "hash-test-model"
        }
    }

    struct Fixture {
        retriever: Retriever,
        database: Arc<Database>,
        index: Arc<VectorIndex>,
        provider: Arc<HashProvider>,
        _temp: TempDir,
    }

    fn setup() -> Fixture {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().to_path_buf()).unwrap();
        let database = Arc::new(storage.database);
        let provider = Arc::new(HashProvider { dimension: 16 });
        let index = Arc::new(VectorIndex::new(16, 200, 16));

        let config = Config::default();
        let retriever = Retriever::new(
            provider.clone(),
            index.clone(),
            database.clone(),
            config.retrieval,
            config.index,
        );

        Fixture {
            retriever,
            database,
            index,
            provider,
            _temp: temp,
        }
    }

    fn index_document(f: &Fixture, name: &str, texts: &[&str]) -> i64 {
        let doc = f
            .database
            .upsert_document(name, "hash", 100, 1)
            .unwrap();
        for (i, text) in texts.iter().enumerate() {
            let chunk_id = f
                .database
                .insert_chunk(doc, i as i64, 1, 0, text.len() as i64, text)
                .unwrap();
            let vector = f.provider.embed(text).unwrap();
            f.database
                .insert_embedding(chunk_id, &vector, "hash-test-model")
                .unwrap();
            f.index.insert(chunk_id, &vector).unwrap();
        }
        doc
    }

    #[test]
    fn empty_index_returns_empty() {
        let f = setup();
        let results = f
            .retriever
            .search(&SearchQuery::new("anything", 5))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn empty_query_is_an_error() {
        let f = setup();
        let err = f.retriever.search(&SearchQuery::new("  ", 5)).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[test]
    fn exact_match_ranks_first_with_maximal_score() {
        let f = setup();
        index_document(
            &f,
            "paper.pdf",
            &[
                "transformers use self attention layers",
                "recurrent networks process sequences step by step",
                "convolutional networks excel at image tasks",
            ],
        );

        let results = f
            .retriever
            .search(&SearchQuery::new("transformers use self attention layers", 3))
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].text, "transformers use self attention layers");
        assert!(results[0].score > 0.99);
    }

    #[test]
    fn document_filter_restricts_results() {
        let f = setup();
        let doc_a = index_document(&f, "a.pdf", &["alpha text one", "alpha text two"]);
        let doc_b = index_document(&f, "b.pdf", &["beta text one", "beta text two"]);

        let results = f
            .retriever
            .search(&SearchQuery::new("text one", 10).within_document(doc_b))
            .unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|c| c.document_id == doc_b));
        assert!(results.iter().all(|c| c.document == "b.pdf"));

        // Filter matching an empty document is empty, not an error
        f.database.delete_document("a.pdf").unwrap();
        let results = f
            .retriever
            .search(&SearchQuery::new("alpha text", 10).within_document(doc_a))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn deleted_chunks_drop_out_of_results() {
        let f = setup();
        index_document(&f, "gone.pdf", &["ephemeral content"]);
        f.database.delete_document("gone.pdf").unwrap();

        // The index still holds the stale vector; hydration drops it
        let results = f
            .retriever
            .search(&SearchQuery::new("ephemeral content", 5))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn results_are_limited_to_top_k() {
        let f = setup();
        let texts: Vec<String> = (0..20).map(|i| format!("chunk number {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        index_document(&f, "many.pdf", &refs);

        let results = f
            .retriever
            .search(&SearchQuery::new("chunk number 3", 4))
            .unwrap();
        assert!(results.len() <= 4);
    }
}
