//! Configuration management for Cortex
//!
//! Loading, validation, and env-override handling for the retrieval core.
//! Fusion weights and the recency half-life are deliberately configuration,
//! not constants: they are policy choices tuned per deployment.

use crate::error::{CortexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ingestion: IngestionConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub providers: ProvidersConfig,
}

/// Ingestion gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Chunk window size in characters
    pub chunk_window: usize,
    /// Overlap between consecutive chunks in characters (must be < window)
    pub chunk_overlap: usize,
    /// Documents shorter than this (after trimming) are rejected
    pub min_text_len: usize,
    /// Reject when more than this fraction of the text is URLs
    pub max_link_ratio: f32,
    /// Invoke the model-based spam classifier after heuristics pass
    pub classifier_enabled: bool,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier, stored on every chunk for migration detection
    pub model: String,
    /// Embedding dimension (1536 for text-embedding-3-small)
    pub dimension: usize,
    /// Texts per provider call
    pub batch_size: usize,
    /// Deterministic truncation point for over-long texts, in characters
    pub max_input_chars: usize,
    /// Retries per failed batch before ingestion gives up
    pub max_retries: u32,
    /// Base backoff delay in milliseconds, doubled per attempt
    pub retry_base_ms: u64,
}

/// Index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector store collection name
    pub collection: String,
}

/// Retrieval and ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates requested from the vector signal
    pub vector_top_k: usize,
    /// Candidates requested from the keyword signal
    pub keyword_top_k: usize,
    /// Weight of the normalized vector-similarity score in fusion
    pub semantic_weight: f32,
    /// Weight of the normalized keyword-match score in fusion
    pub keyword_weight: f32,
    /// Fused candidates passed to the cross-encoder reranker
    pub rerank_top_k: usize,
    /// Days for a fused score to decay to 50%
    pub recency_half_life_days: f32,
    /// History turns the query rewriter may consume
    pub rewrite_history_turns: usize,
}

/// External provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// OpenAI-compatible API base URL (embeddings + chat)
    pub openai_base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Chat model for query rewriting and spam classification
    pub chat_model: String,
    /// Rerank endpoint URL (Cohere/Jina-style), empty disables reranking
    pub rerank_url: String,
    /// Rerank model name
    pub rerank_model: String,
    /// Environment variable holding the rerank API key; requests go out
    /// unauthenticated when the variable is unset (local rerankers)
    pub rerank_api_key_env: String,
    /// Per-call timeout in seconds for provider requests
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CortexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CortexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CortexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CORTEX_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("CORTEX_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "INDEX__COLLECTION" => {
                self.index.collection = value.to_string();
            }
            "PROVIDERS__OPENAI_BASE_URL" => {
                self.providers.openai_base_url = value.to_string();
            }
            "PROVIDERS__CHAT_MODEL" => {
                self.providers.chat_model = value.to_string();
            }
            "PROVIDERS__RERANK_URL" => {
                self.providers.rerank_url = value.to_string();
            }
            "RETRIEVAL__SEMANTIC_WEIGHT" => {
                self.retrieval.semantic_weight =
                    value.parse().map_err(|_| CortexError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as float", value),
                    })?;
            }
            "RETRIEVAL__KEYWORD_WEIGHT" => {
                self.retrieval.keyword_weight =
                    value.parse().map_err(|_| CortexError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as float", value),
                    })?;
            }
            "INGESTION__CLASSIFIER_ENABLED" => {
                self.ingestion.classifier_enabled =
                    value.parse().map_err(|_| CortexError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingestion: IngestionConfig {
                chunk_window: 1024,
                chunk_overlap: 50,
                min_text_len: 25,
                max_link_ratio: 0.5,
                classifier_enabled: false,
            },
            embedding: EmbeddingConfig {
                model: "text-embedding-3-small".to_string(),
                dimension: 1536,
                batch_size: 32,
                max_input_chars: 8000,
                max_retries: 3,
                retry_base_ms: 250,
            },
            index: IndexConfig {
                collection: "cortex_chunks".to_string(),
            },
            retrieval: RetrievalConfig {
                vector_top_k: 20,
                keyword_top_k: 20,
                semantic_weight: 0.7,
                keyword_weight: 0.3,
                rerank_top_k: 10,
                recency_half_life_days: 90.0,
                rewrite_history_turns: 6,
            },
            providers: ProvidersConfig {
                openai_base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                rerank_url: String::new(),
                rerank_model: "rerank-english-v3.0".to_string(),
                rerank_api_key_env: "RERANK_API_KEY".to_string(),
                timeout_secs: 60,
            },
        }
    }
}
