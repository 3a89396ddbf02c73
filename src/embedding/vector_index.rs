/// HNSW vector index for similarity search
///
/// Maps chunk ids to embedding vectors and answers nearest-neighbor queries
/// by cosine similarity. The index is in-memory only; the embeddings table
/// in SQLite is the source of truth and the index is rebuilt from it at
/// startup and after deletions (HNSW has no point removal).
use hnsw_rs::prelude::*;
use std::sync::{Arc, RwLock};
use thiserror::Error;

impl From<VectorIndexError> for crate::error::DocqaError {
    fn from(err: VectorIndexError) -> Self {
        crate::error::DocqaError::Index(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search result with chunk id and similarity score
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Chunk id the vector belongs to
    pub id: i64,
    /// Cosine similarity score (higher is more similar)
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// Uses cosine distance; scores are reported as 1 - distance.
pub struct VectorIndex {
    index: Arc<RwLock<Hnsw<'static, f32, DistCosine>>>,
    dimension: usize,
    ef_construction: usize,
    m: usize,
    count: Arc<RwLock<u64>>,
}

impl VectorIndex {
    /// Create an empty vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `m` - HNSW M parameter (number of connections per layer)
    pub fn new(dimension: usize, ef_construction: usize, m: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            dimension,
            ef_construction,
            200, // max_nb_connection
            DistCosine,
        );

        Self {
            index: Arc::new(RwLock::new(index)),
            dimension,
            ef_construction,
            m,
            count: Arc::new(RwLock::new(0)),
        }
    }

    /// Insert a vector under a chunk id
    pub fn insert(&self, id: i64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let data = vector.to_vec();

        let index = self.index.write().unwrap();
        index.insert((&data, id as usize));

        let mut count = self.count.write().unwrap();
        *count += 1;

        Ok(())
    }

    /// Insert multiple vectors in batch
    pub fn insert_batch(&self, items: &[(i64, Vec<f32>)]) -> Result<(), VectorIndexError> {
        for (id, vector) in items {
            self.insert(*id, vector)?;
        }
        Ok(())
    }

    /// Search for the k nearest neighbors of a query vector
    ///
    /// Returns results sorted by similarity, best first. An empty index
    /// yields an empty result, not an error.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap();
        let results = index.search(query, k, ef_search);

        Ok(results
            .into_iter()
            .map(|neighbor| SearchResult {
                id: neighbor.d_id as i64,
                score: 1.0 - neighbor.distance,
            })
            .collect())
    }

    /// Number of vectors in the index
    pub fn len(&self) -> u64 {
        *self.count.read().unwrap()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Drop all vectors, leaving an empty index with the same parameters
    pub fn clear(&self) {
        let mut index = self.index.write().unwrap();
        *index = Hnsw::<f32, DistCosine>::new(
            self.m,
            self.dimension,
            self.ef_construction,
            200, // max_nb_connection
            DistCosine,
        );

        let mut count = self.count.write().unwrap();
        *count = 0;
    }

    /// Replace the index contents with the given (id, vector) pairs
    pub fn rebuild(&self, items: &[(i64, Vec<f32>)]) -> Result<(), VectorIndexError> {
        self.clear();
        self.insert_batch(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new(384, 200, 16);
        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_empty_index_search_returns_nothing() {
        let index = VectorIndex::new(4, 200, 16);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 5, 50).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let index = VectorIndex::new(384, 200, 16);

        let mut vec1 = vec![0.0; 384];
        vec1[0] = 1.0;

        let mut vec2 = vec![0.0; 384];
        vec2[1] = 1.0;

        let mut vec3 = vec![0.0; 384];
        vec3[0] = 0.9;
        vec3[1] = 0.1;

        index.insert(1, &vec1).unwrap();
        index.insert(2, &vec2).unwrap();
        index.insert(3, &vec3).unwrap();

        assert_eq!(index.len(), 3);

        let results = index.search(&vec1, 2, 50).unwrap();
        assert_eq!(results.len(), 2);

        // Identical vector ranks first with maximal similarity
        assert_eq!(results[0].id, 1);
        assert!(results[0].score > 0.99);
    }

    #[test]
    fn test_dimension_validation() {
        let index = VectorIndex::new(384, 200, 16);

        let vec = vec![1.0; 128];
        assert!(index.insert(1, &vec).is_err());
        assert!(index.search(&vec, 5, 50).is_err());
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let index = VectorIndex::new(4, 200, 16);

        index.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(index.len(), 2);

        let items = vec![(7, vec![0.0, 0.0, 1.0, 0.0])];
        index.rebuild(&items).unwrap();

        assert_eq!(index.len(), 1);
        let results = index.search(&[0.0, 0.0, 1.0, 0.0], 5, 50).unwrap();
        assert_eq!(results[0].id, 7);
    }

    #[test]
    fn test_batch_insert() {
        let index = VectorIndex::new(8, 200, 16);

        let items: Vec<(i64, Vec<f32>)> = (0..10).map(|i| (i, vec![i as f32 + 1.0; 8])).collect();

        index.insert_batch(&items).unwrap();
        assert_eq!(index.len(), 10);
    }
}
