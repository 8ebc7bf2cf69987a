use crate::config::Config;
use crate::error::{CortexError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_ingestion(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CortexError::ConfigValidation { errors })
        }
    }

    fn validate_ingestion(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.ingestion.chunk_window == 0 {
            errors.push(ValidationError::new(
                "ingestion.chunk_window",
                "Chunk window must be greater than 0",
            ));
        }

        if config.ingestion.chunk_overlap >= config.ingestion.chunk_window {
            errors.push(ValidationError::new(
                "ingestion.chunk_overlap",
                format!(
                    "Overlap ({}) must be smaller than the chunk window ({})",
                    config.ingestion.chunk_overlap, config.ingestion.chunk_window
                ),
            ));
        }

        if !(0.0..=1.0).contains(&config.ingestion.max_link_ratio) {
            errors.push(ValidationError::new(
                "ingestion.max_link_ratio",
                "Link ratio must be between 0.0 and 1.0",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Embedding model must not be empty",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.index.collection.is_empty() {
            errors.push(ValidationError::new(
                "index.collection",
                "Collection name must not be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.vector_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.vector_top_k",
                "Vector top-k must be greater than 0",
            ));
        }

        if config.retrieval.keyword_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.keyword_top_k",
                "Keyword top-k must be greater than 0",
            ));
        }

        for (path, weight) in [
            ("retrieval.semantic_weight", config.retrieval.semantic_weight),
            ("retrieval.keyword_weight", config.retrieval.keyword_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                errors.push(ValidationError::new(
                    path,
                    "Fusion weight must be between 0.0 and 1.0",
                ));
            }
        }

        // Edge weights 0 and 1 are valid; both zero means every score fuses to 0
        if config.retrieval.semantic_weight == 0.0 && config.retrieval.keyword_weight == 0.0 {
            errors.push(ValidationError::new(
                "retrieval.semantic_weight",
                "At least one fusion weight must be non-zero",
            ));
        }

        if config.retrieval.recency_half_life_days <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.recency_half_life_days",
                "Recency half-life must be greater than 0",
            ));
        }
    }
}
