use crate::config::{parse_size, Config};
use crate::error::{DocqaError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_ingest(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_arxiv(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocqaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory path cannot be empty",
            ));
        }
    }

    fn validate_ingest(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.ingest.max_pages == 0 {
            errors.push(ValidationError::new(
                "ingest.max_pages",
                "Page limit must be greater than 0",
            ));
        }

        if parse_size(&config.ingest.max_file_size).is_none() {
            errors.push(ValidationError::new(
                "ingest.max_file_size",
                format!("Invalid size format: {}", config.ingest.max_file_size),
            ));
        }

        if config.ingest.chunk_size == 0 {
            errors.push(ValidationError::new(
                "ingest.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if config.ingest.chunk_overlap >= config.ingest.chunk_size {
            errors.push(ValidationError::new(
                "ingest.chunk_overlap",
                format!(
                    "Overlap ({}) must be smaller than chunk size ({})",
                    config.ingest.chunk_overlap, config.ingest.chunk_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.index.vector_dim == 0 {
            errors.push(ValidationError::new(
                "index.vector_dim",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        if config.retrieval.search_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.search_multiplier",
                "Search multiplier must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&config.retrieval.min_similarity) {
            errors.push(ValidationError::new(
                "retrieval.min_similarity",
                format!(
                    "Minimum similarity must be between 0.0 and 1.0, got {}",
                    config.retrieval.min_similarity
                ),
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.llm.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "llm.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        if !config.llm.base_url.starts_with("http") {
            errors.push(ValidationError::new(
                "llm.base_url",
                format!("Base URL must be an HTTP(S) URL, got '{}'", config.llm.base_url),
            ));
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let valid_providers = ["groq", "openai"];
        if !valid_providers.contains(&config.llm.provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, config.llm.provider
                ),
            ));
        }

        // The completion reserve must leave room for an actual prompt
        let reserve = config.llm.answer_tokens.max(config.llm.summary_tokens);
        if config.llm.max_tokens_per_request <= reserve {
            errors.push(ValidationError::new(
                "llm.max_tokens_per_request",
                format!(
                    "Token budget ({}) must exceed the completion reserve ({})",
                    config.llm.max_tokens_per_request, reserve
                ),
            ));
        }
    }

    fn validate_arxiv(config: &Config, errors: &mut Vec<ValidationError>) {
        if !config.arxiv.api_url.starts_with("http") {
            errors.push(ValidationError::new(
                "arxiv.api_url",
                format!("API URL must be an HTTP(S) URL, got '{}'", config.arxiv.api_url),
            ));
        }

        if !config.arxiv.pdf_url.starts_with("http") {
            errors.push(ValidationError::new(
                "arxiv.pdf_url",
                format!("PDF URL must be an HTTP(S) URL, got '{}'", config.arxiv.pdf_url),
            ));
        }

        if config.arxiv.max_results == 0 {
            errors.push(ValidationError::new(
                "arxiv.max_results",
                "max_results must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.ingest.chunk_overlap = config.ingest.chunk_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_budget_must_exceed_reserve() {
        let mut config = Config::default();
        config.llm.max_tokens_per_request = config.llm.summary_tokens;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_invalid_provider() {
        let mut config = Config::default();
        config.llm.provider = "carrier-pigeon".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
