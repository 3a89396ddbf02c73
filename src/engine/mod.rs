//! Engine: the facade wiring ingestion, indexing, retrieval, and answering
//!
//! Owns the store, the embedding provider, the vector index, and the
//! external clients. Every entry point of the system is a method here:
//! upload, query, summarize, paper search, fetch-and-ingest, delete, list.
//!
//! Writes to one document identity are serialized by a per-name async lock
//! held for the whole ingest/re-ingest/delete, so concurrent requests cannot
//! interleave partial writes.

use crate::answer::{Answerer, ChatProvider, ContextEntry, GroqClient};
use crate::arxiv::{ArxivClient, PaperMeta};
use crate::config::Config;
use crate::embedding::{
    EmbeddingProvider, FastEmbedProvider, IndexFailure, Indexer, VectorIndex,
};
use crate::error::{DocqaError, Result};
use crate::ingest::Ingestor;
use crate::retrieval::{Retriever, ScoredChunk, SearchQuery};
use crate::storage::{
    BlobStore, Database, DocumentRecord, DocumentStatus, DocumentSummary, StorageManager,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Answer given when retrieval finds nothing; no model call is made
const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in the uploaded documents to answer your question.";

/// Result of an upload or fetch-and-ingest
#[derive(Debug)]
pub struct UploadReport {
    pub document: DocumentRecord,
    pub chunks: usize,
    pub embedded: usize,
    /// Pages that yielded no extractable text
    pub skipped_pages: Vec<u32>,
}

/// Answer with its evidence chunks
#[derive(Debug, Serialize)]
pub struct Answer {
    pub text: String,
    pub evidence: Vec<ScoredChunk>,
}

/// Summary of a document
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub text: String,
    pub chunks_used: usize,
}

/// Document Q&A engine
pub struct Engine {
    config: Config,
    database: Arc<Database>,
    blob_store: BlobStore,
    index: Arc<VectorIndex>,
    ingestor: Ingestor,
    indexer: Indexer,
    retriever: Retriever,
    answerer: Answerer,
    arxiv: ArxivClient,
    /// Per-document write locks; one writer per document identity
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
    /// Build an engine from explicit components. Used directly by tests;
    /// production callers go through [`Engine::open`].
    pub fn new(
        config: Config,
        data_dir: PathBuf,
        provider: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        let storage = StorageManager::new(data_dir)?;
        let database = Arc::new(storage.database);
        let blob_store = storage.blob_store;

        let dimension = provider.dimension();
        if dimension != config.index.vector_dim {
            tracing::warn!(
                configured = config.index.vector_dim,
                actual = dimension,
                "index.vector_dim does not match the embedding model; using the model's dimension"
            );
        }

        let index = Arc::new(VectorIndex::new(
            dimension,
            config.index.hnsw_ef_construction,
            config.index.hnsw_m,
        ));

        // The store is the source of truth; load existing vectors
        let items = database.all_embeddings()?;
        if !items.is_empty() {
            tracing::info!("Loading {} vectors into the index", items.len());
            index.rebuild(&items)?;
        }

        let ingestor = Ingestor::new(config.ingest.clone());
        let indexer = Indexer::new(
            provider.clone(),
            index.clone(),
            database.clone(),
            config.embedding.clone(),
        );
        let retriever = Retriever::new(
            provider,
            index.clone(),
            database.clone(),
            config.retrieval.clone(),
            config.index.clone(),
        );
        let answerer = Answerer::new(chat, config.llm.clone());
        let arxiv = ArxivClient::new(config.arxiv.clone())
            .map_err(|e| DocqaError::Config(format!("Failed to build arXiv client: {}", e)))?;

        Ok(Self {
            config,
            database,
            blob_store,
            index,
            ingestor,
            indexer,
            retriever,
            answerer,
            arxiv,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Open the engine with production components.
    ///
    /// Fails fast when the API key environment variable is absent; a missing
    /// credential is a startup error, not something to retry later.
    pub fn open(config: Config) -> Result<Self> {
        let api_key = std::env::var(&config.llm.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DocqaError::MissingApiKey {
                env: config.llm.api_key_env.clone(),
            })?;

        let provider = Arc::new(
            FastEmbedProvider::new(&config.embedding.model)
                .map_err(|e| DocqaError::Config(format!("Embedding model: {}", e)))?,
        );

        let chat = Arc::new(
            GroqClient::new(&config.llm, api_key)
                .map_err(|e| DocqaError::Config(format!("Failed to build LLM client: {}", e)))?,
        );

        let data_dir = expand_path(&config.storage.data_dir)?;
        Self::new(config, data_dir, provider, chat)
    }

    /// Upload a document: extract, chunk, register, embed, index.
    ///
    /// Re-uploading an existing name replaces its prior generation entirely.
    pub async fn upload(&self, name: &str, bytes: &[u8]) -> Result<UploadReport> {
        if name.trim().is_empty() {
            return Err(DocqaError::Config(
                "Document name cannot be empty".to_string(),
            ));
        }

        let _guard = self.lock_document(name).await;

        let previous = self.database.get_document(name)?;
        let existed = previous.is_some();

        // Limits and extraction run before any store mutation
        let extracted = self.ingestor.extract(name, bytes)?;
        let skipped_pages = extracted.skipped_pages();

        let (blob_hash, _) = self.blob_store.write(bytes)?;
        let document_id = self.database.upsert_document(
            name,
            &blob_hash,
            bytes.len() as u64,
            extracted.page_count,
        )?;

        // A replaced generation may leave its old bytes unreferenced
        if let Some(prev) = previous {
            if prev.blob_hash != blob_hash
                && self.database.count_blob_refs(&prev.blob_hash)? == 0
            {
                self.blob_store.delete(&prev.blob_hash)?;
            }
        }

        let drafts = self.ingestor.chunk(&extracted);
        for draft in &drafts {
            self.database.insert_chunk(
                document_id,
                draft.seq,
                draft.page,
                draft.start_offset,
                draft.text.chars().count() as i64,
                &draft.text,
            )?;
        }
        let chunks = self.database.get_document_chunks(document_id)?;

        if existed {
            // Purge the prior generation's vectors before adding new ones
            self.rebuild_index()?;
        }

        tracing::info!(
            document = name,
            pages = extracted.page_count,
            chunks = chunks.len(),
            "document registered"
        );

        match self.indexer.index_chunks(&chunks).await {
            Ok(report) => {
                self.database
                    .set_document_status(document_id, DocumentStatus::Processed)?;
                let document = self
                    .database
                    .get_document_by_id(document_id)?
                    .ok_or_else(|| DocqaError::NotFound {
                        name: name.to_string(),
                    })?;
                Ok(UploadReport {
                    document,
                    chunks: chunks.len(),
                    embedded: report.embedded,
                    skipped_pages,
                })
            }
            Err(IndexFailure {
                embedded,
                total,
                source,
                ..
            }) => {
                self.database
                    .set_document_status(document_id, DocumentStatus::Failed)?;
                Err(DocqaError::EmbeddingFailed {
                    succeeded: embedded,
                    total,
                    message: source.to_string(),
                })
            }
        }
    }

    /// Answer a question, optionally restricted to one document.
    ///
    /// Empty retrieval yields a fixed no-context answer without a model call.
    pub async fn query(&self, question: &str, document: Option<&str>) -> Result<Answer> {
        let document_id = match document {
            Some(name) => {
                let doc =
                    self.database
                        .get_document(name)?
                        .ok_or_else(|| DocqaError::NotFound {
                            name: name.to_string(),
                        })?;
                Some(doc.id)
            }
            None => None,
        };

        let mut search = SearchQuery::new(question, self.config.retrieval.top_k);
        if let Some(id) = document_id {
            search = search.within_document(id);
        }

        let chunks = self.retriever.search(&search)?;

        if chunks.is_empty() {
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                evidence: Vec::new(),
            });
        }

        let entries: Vec<ContextEntry> = chunks
            .iter()
            .map(|c| ContextEntry {
                document: c.document.clone(),
                page: c.page,
                text: c.text.clone(),
            })
            .collect();

        let text = self.answerer.answer(question, &entries).await?;

        Ok(Answer {
            text,
            evidence: chunks,
        })
    }

    /// Summarize a document from its full chunk set
    pub async fn summarize(&self, name: &str) -> Result<SummaryReport> {
        let doc = self
            .database
            .get_document(name)?
            .ok_or_else(|| DocqaError::NotFound {
                name: name.to_string(),
            })?;

        let chunks = self.database.get_document_chunks(doc.id)?;
        if chunks.is_empty() {
            return Err(DocqaError::DocumentNotReady {
                name: name.to_string(),
                status: doc.status.as_str().to_string(),
            });
        }

        let entries: Vec<ContextEntry> = chunks
            .iter()
            .map(|c| ContextEntry {
                document: doc.name.clone(),
                page: c.page,
                text: c.text.clone(),
            })
            .collect();

        let text = self.answerer.summarize(&entries).await?;

        Ok(SummaryReport {
            text,
            chunks_used: entries.len(),
        })
    }

    /// Search arXiv for papers by keyword
    pub async fn search_papers(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<PaperMeta>> {
        let max = max_results.unwrap_or(self.config.arxiv.max_results);
        Ok(self.arxiv.search(query, max).await?)
    }

    /// Download a paper by arXiv id and ingest it like an upload
    pub async fn fetch_paper(
        &self,
        arxiv_id: &str,
        name: Option<String>,
    ) -> Result<UploadReport> {
        let bytes = self.arxiv.download(arxiv_id).await?;
        let name = name.unwrap_or_else(|| format!("{}.pdf", arxiv_id));
        self.upload(&name, &bytes).await
    }

    /// Delete a document and all its chunks and embeddings
    pub async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.lock_document(name).await;

        let doc = self
            .database
            .get_document(name)?
            .ok_or_else(|| DocqaError::NotFound {
                name: name.to_string(),
            })?;

        self.database.delete_document(name)?;

        if self.database.count_blob_refs(&doc.blob_hash)? == 0 {
            self.blob_store.delete(&doc.blob_hash)?;
        }

        // HNSW has no point removal; rebuild from the surviving embeddings
        self.rebuild_index()?;

        tracing::info!(document = name, "document deleted");
        Ok(())
    }

    /// List all documents
    pub fn documents(&self) -> Result<Vec<DocumentSummary>> {
        self.database.list_documents()
    }

    /// Rebuild the in-memory vector index from the embeddings table
    fn rebuild_index(&self) -> Result<()> {
        let items = self.database.all_embeddings()?;
        self.index.rebuild(&items)?;
        Ok(())
    }

    /// Acquire the write lock for a document identity
    async fn lock_document(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            map.entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DocqaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DocqaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
