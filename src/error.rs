use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the Cortex retrieval core
#[derive(Error, Debug)]
pub enum CortexError {
    /// Document text was empty after normalization; nothing to fingerprint
    #[error("document content is empty after normalization")]
    EmptyContent,

    /// Chunking parameters are unusable (fail-fast, caller-fixable)
    #[error("invalid chunk configuration: window={window}, overlap={overlap}")]
    InvalidChunkConfig { window: usize, overlap: usize },

    /// Vector dimension or embedding model does not match the collection
    #[error("index schema mismatch: expected {expected}, got {actual}")]
    IndexSchemaMismatch { expected: String, actual: String },

    /// Ingestion failed after retries; the document is absent from the index
    /// and the caller should re-invoke ingestion
    #[error("ingestion failed for document {document_id}: {reason}")]
    IngestionFailed { document_id: Uuid, reason: String },

    /// Embedding provider errors
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Keyword index errors
    #[error("keyword index error: {0}")]
    KeywordIndex(String),

    /// Document store collaborator errors
    #[error("document store error: {0}")]
    Store(String),

    /// Configuration related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

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

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CortexError {
    /// Whether the caller's retry collaborator should re-invoke the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, CortexError::IngestionFailed { .. })
    }
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

/// Result type for Cortex operations
pub type Result<T> = std::result::Result<T, CortexError>;
