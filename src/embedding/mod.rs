//! Embedding generation and vector indexing
//!
//! - `EmbeddingProvider` trait for abstraction over embedding backends
//! - `FastEmbedProvider` for local embedding (all-MiniLM-L6-v2, 384-dim)
//! - HNSW vector index for cosine similarity search
//! - `Indexer` writing (embedding -> chunk) pairs with bounded retry
//!
//! The same provider instance embeds both chunks and queries, so relevance
//! scores always compare vectors from one model version.

mod indexer;
mod provider;
mod vector_index;

pub use indexer::{IndexFailure, IndexReport, Indexer};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};
