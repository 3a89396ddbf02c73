//! SQLite database management with migrations
//!
//! Structured storage for documents, chunks, and embeddings. The database is
//! the single source of truth; the in-memory vector index is rebuilt from the
//! embeddings table.

use crate::error::{DocqaError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processed" => DocumentStatus::Processed,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Pending,
        }
    }
}

/// A registered document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub name: String,
    pub blob_hash: String,
    pub byte_size: u64,
    pub page_count: usize,
    pub ingested_at: i64,
    pub status: DocumentStatus,
}

/// Document listing entry with chunk count
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub name: String,
    pub byte_size: u64,
    pub page_count: usize,
    pub chunk_count: usize,
    pub ingested_at: i64,
    pub status: String,
}

/// An ordered fragment of a document's extracted text
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: i64,
    pub document_id: i64,
    pub seq: i64,
    pub page: u32,
    pub start_offset: i64,
    pub length: i64,
    pub text: String,
}

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocqaError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        // Pragmas run per pooled connection; foreign_keys in particular is
        // connection-local and cascade deletes rely on it
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| DocqaError::Config(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| DocqaError::Config(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    // --- documents ---

    /// Register a document, replacing any prior generation under the same name.
    ///
    /// Deleting the old row cascades to its chunks and embeddings, so exactly
    /// one generation of a document identity exists at any time.
    pub fn upsert_document(
        &self,
        name: &str,
        blob_hash: &str,
        byte_size: u64,
        page_count: usize,
    ) -> Result<i64> {
        let conn = self.get_conn()?;

        conn.execute("DELETE FROM documents WHERE name = ?1", params![name])?;
        conn.execute(
            "INSERT INTO documents (name, blob_hash, byte_size, page_count, ingested_at, status)
             VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now'), ?5)",
            params![
                name,
                blob_hash,
                byte_size as i64,
                page_count as i64,
                DocumentStatus::Pending.as_str()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Look up a document by name
    pub fn get_document(&self, name: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.get_conn()?;

        conn.query_row(
            "SELECT id, name, blob_hash, byte_size, page_count, ingested_at, status
             FROM documents WHERE name = ?1",
            params![name],
            Self::row_to_document,
        )
        .optional()
        .map_err(DocqaError::from)
    }

    /// Look up a document by id
    pub fn get_document_by_id(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let conn = self.get_conn()?;

        conn.query_row(
            "SELECT id, name, blob_hash, byte_size, page_count, ingested_at, status
             FROM documents WHERE id = ?1",
            params![id],
            Self::row_to_document,
        )
        .optional()
        .map_err(DocqaError::from)
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        let status: String = row.get(6)?;
        Ok(DocumentRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            blob_hash: row.get(2)?,
            byte_size: row.get::<_, i64>(3)? as u64,
            page_count: row.get::<_, i64>(4)? as usize,
            ingested_at: row.get(5)?,
            status: DocumentStatus::parse(&status),
        })
    }

    /// Update a document's status
    pub fn set_document_status(&self, id: i64, status: DocumentStatus) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Delete a document; chunks and embeddings cascade.
    /// Returns false if no document existed under the name.
    pub fn delete_document(&self, name: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM documents WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }

    /// List all documents with their chunk counts
    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT d.id, d.name, d.byte_size, d.page_count, COUNT(c.id), d.ingested_at, d.status
             FROM documents d
             LEFT JOIN chunks c ON c.document_id = d.id
             GROUP BY d.id
             ORDER BY d.ingested_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DocumentSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                byte_size: row.get::<_, i64>(2)? as u64,
                page_count: row.get::<_, i64>(3)? as usize,
                chunk_count: row.get::<_, i64>(4)? as usize,
                ingested_at: row.get(5)?,
                status: row.get(6)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DocqaError::from)
    }

    /// Count documents referencing a blob hash
    pub fn count_blob_refs(&self, hash: &str) -> Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE blob_hash = ?1",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // --- chunks ---

    /// Insert a chunk, returning its id
    pub fn insert_chunk(
        &self,
        document_id: i64,
        seq: i64,
        page: u32,
        start_offset: i64,
        length: i64,
        text: &str,
    ) -> Result<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO chunks (document_id, seq, page, start_offset, length, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![document_id, seq, page, start_offset, length, text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch chunks by id; missing ids are silently skipped
    pub fn get_chunks(&self, ids: &[i64]) -> Result<Vec<ChunkRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, document_id, seq, page, start_offset, length, text
             FROM chunks WHERE id IN ({})",
            placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), Self::row_to_chunk)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DocqaError::from)
    }

    /// Fetch all chunks of a document in document order
    pub fn get_document_chunks(&self, document_id: i64) -> Result<Vec<ChunkRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, seq, page, start_offset, length, text
             FROM chunks WHERE document_id = ?1 ORDER BY seq",
        )?;

        let rows = stmt.query_map(params![document_id], Self::row_to_chunk)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DocqaError::from)
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
        Ok(ChunkRecord {
            id: row.get(0)?,
            document_id: row.get(1)?,
            seq: row.get(2)?,
            page: row.get::<_, i64>(3)? as u32,
            start_offset: row.get(4)?,
            length: row.get(5)?,
            text: row.get(6)?,
        })
    }

    // --- embeddings ---

    /// Store an embedding vector for a chunk
    pub fn insert_embedding(&self, chunk_id: i64, vector: &[f32], model: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (chunk_id, vector, model, created_at)
             VALUES (?1, ?2, ?3, strftime('%s', 'now'))",
            params![chunk_id, encode_vector(vector), model],
        )?;
        Ok(())
    }

    /// Load every stored embedding as (chunk_id, vector)
    pub fn all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT chunk_id, vector FROM embeddings")?;

        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, decode_vector(&blob)))
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DocqaError::from)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        let total_bytes: i64 = conn.query_row(
            "SELECT COALESCE(SUM(byte_size), 0) FROM documents",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            embedding_count: embedding_count as usize,
            total_document_bytes: total_bytes as u64,
        })
    }
}

/// Encode an f32 vector as little-endian bytes for BLOB storage
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into an f32 vector
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedding_count: usize,
    pub total_document_bytes: u64,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Documents table
    CREATE TABLE documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        blob_hash TEXT NOT NULL,
        byte_size INTEGER NOT NULL,
        page_count INTEGER NOT NULL,
        ingested_at INTEGER NOT NULL,
        status TEXT NOT NULL
    );

    CREATE INDEX idx_documents_status ON documents(status);
    CREATE INDEX idx_documents_blob ON documents(blob_hash);

    -- Chunks table (ordered fragments of extracted text)
    CREATE TABLE chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL,
        seq INTEGER NOT NULL,
        page INTEGER NOT NULL,
        start_offset INTEGER NOT NULL,
        length INTEGER NOT NULL,
        text TEXT NOT NULL,
        UNIQUE(document_id, seq),
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_chunks_document ON chunks(document_id);

    -- Embeddings table
    CREATE TABLE embeddings (
        chunk_id INTEGER PRIMARY KEY,
        vector BLOB NOT NULL,
        model TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_embeddings_model ON embeddings(model);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let _db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_migrations() {
        let (db, _temp) = test_db();

        let conn = db.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();

        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_document_roundtrip() {
        let (db, _temp) = test_db();

        let id = db.upsert_document("paper.pdf", "abc123", 2048, 5).unwrap();
        let doc = db.get_document("paper.pdf").unwrap().unwrap();

        assert_eq!(doc.id, id);
        assert_eq!(doc.byte_size, 2048);
        assert_eq!(doc.page_count, 5);
        assert_eq!(doc.status, DocumentStatus::Pending);

        db.set_document_status(id, DocumentStatus::Processed).unwrap();
        let doc = db.get_document("paper.pdf").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
    }

    #[test]
    fn test_upsert_replaces_prior_generation() {
        let (db, _temp) = test_db();

        let first = db.upsert_document("paper.pdf", "hash1", 100, 1).unwrap();
        db.insert_chunk(first, 0, 1, 0, 5, "hello").unwrap();

        let second = db.upsert_document("paper.pdf", "hash2", 200, 2).unwrap();
        assert_ne!(first, second);

        // Old generation's chunks cascaded away
        assert!(db.get_document_chunks(first).unwrap().is_empty());
        let doc = db.get_document("paper.pdf").unwrap().unwrap();
        assert_eq!(doc.id, second);
        assert_eq!(doc.blob_hash, "hash2");
    }

    #[test]
    fn test_chunk_ordering() {
        let (db, _temp) = test_db();

        let doc = db.upsert_document("a.pdf", "h", 10, 1).unwrap();
        db.insert_chunk(doc, 1, 1, 10, 10, "second").unwrap();
        db.insert_chunk(doc, 0, 1, 0, 10, "first").unwrap();
        db.insert_chunk(doc, 2, 2, 0, 10, "third").unwrap();

        let chunks = db.get_document_chunks(doc).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_delete_cascades() {
        let (db, _temp) = test_db();

        let doc = db.upsert_document("a.pdf", "h", 10, 1).unwrap();
        let chunk = db.insert_chunk(doc, 0, 1, 0, 5, "hello").unwrap();
        db.insert_embedding(chunk, &[0.1, 0.2], "test-model").unwrap();

        assert!(db.delete_document("a.pdf").unwrap());
        assert!(db.get_document("a.pdf").unwrap().is_none());
        assert!(db.get_chunks(&[chunk]).unwrap().is_empty());
        assert!(db.all_embeddings().unwrap().is_empty());

        // Unknown name deletes nothing
        assert!(!db.delete_document("a.pdf").unwrap());
    }

    #[test]
    fn test_vector_encoding_roundtrip() {
        let vector = vec![0.25_f32, -1.5, 3.75, 0.0];
        let decoded = decode_vector(&encode_vector(&vector));
        assert_eq!(decoded, vector);
    }

    #[test]
    fn test_stats() {
        let (db, _temp) = test_db();

        let doc = db.upsert_document("a.pdf", "h", 1000, 2).unwrap();
        let chunk = db.insert_chunk(doc, 0, 1, 0, 5, "hello").unwrap();
        db.insert_embedding(chunk, &[1.0; 4], "m").unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.embedding_count, 1);
        assert_eq!(stats.total_document_bytes, 1000);
    }
}
