//! Configuration management for Docqa
//!
//! All tunable constants of the pipeline live here: size limits, chunking
//! parameters, embedding model, HNSW settings, retrieval depth, language
//! model provider and token budget, and arXiv endpoints. The configuration
//! is constructed once at startup and passed to each component.

use crate::error::{DocqaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub arxiv: ArxivConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Ingestion configuration: document limits and chunking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum page count accepted per document
    pub max_pages: usize,
    /// Maximum raw document size, e.g. "50MB"
    pub max_file_size: String,
    /// Chunk length in characters
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters (must be < chunk_size)
    pub chunk_overlap: usize,
}

impl IngestConfig {
    /// Parse `max_file_size` into bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        parse_size(&self.max_file_size).unwrap_or(u64::MAX)
    }
}

/// Parse a size string like "50MB" into bytes
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let (digits, multiplier) = if let Some(stripped) = s.strip_suffix("GB") {
        (stripped, 1024 * 1024 * 1024)
    } else if let Some(stripped) = s.strip_suffix("MB") {
        (stripped, 1024 * 1024)
    } else if let Some(stripped) = s.strip_suffix("KB") {
        (stripped, 1024)
    } else if let Some(stripped) = s.strip_suffix('B') {
        (stripped, 1)
    } else {
        (s.as_str(), 1)
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub model: String,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Bounded retry count for failed embedding calls
    pub max_retries: usize,
    /// Initial backoff between retries, doubled per attempt
    pub retry_backoff_ms: u64,
}

/// HNSW vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimension (must match embedding dimension)
    pub vector_dim: usize,
    /// HNSW construction parameter (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW M parameter (number of connections per layer)
    pub hnsw_m: usize,
    /// HNSW search parameter (higher = better recall, slower search)
    pub hnsw_ef_search: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks returned per query
    pub top_k: usize,
    /// Over-fetch factor applied before document filtering
    pub search_multiplier: usize,
    /// Minimum similarity score; results below are dropped (0.0 disables)
    pub min_similarity: f32,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    /// Environment variable holding the API key (required, no default value)
    pub api_key_env: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    /// Upstream per-request token budget (prompt + completion)
    pub max_tokens_per_request: usize,
    /// Completion tokens reserved for question answering
    pub answer_tokens: usize,
    /// Completion tokens reserved for summarization
    pub summary_tokens: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// arXiv API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    pub api_url: String,
    pub pdf_url: String,
    /// Default number of search results
    pub max_results: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocqaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DOCQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "INGEST__MAX_PAGES" => {
                self.ingest.max_pages = parse_env(path, value)?;
            }
            "INGEST__CHUNK_SIZE" => {
                self.ingest.chunk_size = parse_env(path, value)?;
            }
            "INGEST__CHUNK_OVERLAP" => {
                self.ingest.chunk_overlap = parse_env(path, value)?;
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k = parse_env(path, value)?;
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__BASE_URL" => {
                self.llm.base_url = value.to_string();
            }
            "LLM__MAX_TOKENS_PER_REQUEST" => {
                self.llm.max_tokens_per_request = parse_env(path, value)?;
            }
            "ARXIV__API_URL" => {
                self.arxiv.api_url = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocqaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docqa").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| DocqaError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".docqa"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DocqaError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.docqa"),
            },
            ingest: IngestConfig {
                max_pages: 30,
                max_file_size: "50MB".to_string(),
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
                max_retries: 3,
                retry_backoff_ms: 500,
            },
            index: IndexConfig {
                vector_dim: 384,
                hnsw_ef_construction: 200,
                hnsw_m: 16,
                hnsw_ef_search: 50,
            },
            retrieval: RetrievalConfig {
                top_k: 5,
                search_multiplier: 4,
                min_similarity: 0.0,
            },
            llm: LlmConfig {
                provider: "groq".to_string(),
                api_key_env: "GROQ_API_KEY".to_string(),
                model: "openai/gpt-oss-120b".to_string(),
                base_url: "https://api.groq.com/openai/v1".to_string(),
                temperature: 0.1,
                max_tokens_per_request: 8000,
                answer_tokens: 500,
                summary_tokens: 800,
                request_timeout_secs: 60,
            },
            arxiv: ArxivConfig {
                api_url: "https://export.arxiv.org/api/query".to_string(),
                pdf_url: "https://arxiv.org/pdf".to_string(),
                max_results: 5,
                request_timeout_secs: 30,
            },
        }
    }
}
