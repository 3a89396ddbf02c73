use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Docqa application
#[derive(Error, Debug)]
pub enum DocqaError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Required API credential is missing from the environment
    #[error("API key environment variable {env} is not set")]
    MissingApiKey { env: String },

    /// Document exceeds the configured page limit
    #[error("Document has {pages} pages, exceeding the configured maximum of {max_pages}")]
    PageLimitExceeded { pages: usize, max_pages: usize },

    /// Document exceeds the configured byte-size limit
    #[error("Document is {bytes} bytes, exceeding the configured maximum of {max_bytes}")]
    SizeLimitExceeded { bytes: u64, max_bytes: u64 },

    /// Text extraction failed for an entire document
    #[error("Text extraction failed for {name}: {message}")]
    Extraction { name: String, message: String },

    /// Embedding failed after bounded retries
    #[error("Embedding failed after retries ({succeeded}/{total} chunks embedded): {message}")]
    EmbeddingFailed {
        succeeded: usize,
        total: usize,
        message: String,
    },

    /// Upstream provider rate-limited the request
    #[error("Rate limited by the language model provider{}", .retry_after_secs.map(|s| format!(", retry suggested after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Prompt cannot be made to fit the configured token budget
    #[error("Prompt needs {needed} tokens but the budget is {budget}")]
    TokenBudgetExceeded { needed: usize, budget: usize },

    /// Unknown document identity
    #[error("Document not found: {name}")]
    NotFound { name: String },

    /// Document exists but has no queryable chunks yet
    #[error("Document {name} is not ready ({status})")]
    DocumentNotReady { name: String, status: String },

    /// Language model API returned an error response
    #[error("Language model API error ({status}): {message}")]
    LlmApi { status: u16, message: String },

    /// Retrieval failure (query embedding or search)
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Vector index failure
    #[error("Vector index error: {0}")]
    Index(String),

    /// arXiv search or download failure
    #[error("arXiv error: {0}")]
    Arxiv(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Docqa operations
pub type Result<T> = std::result::Result<T, DocqaError>;
