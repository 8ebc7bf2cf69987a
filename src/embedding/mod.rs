//! Text embedding: provider seam plus batching/retry wrapper
//!
//! The provider trait is the capability boundary to the embedding service;
//! `Embedder` adds the operational behavior every provider needs: input
//! truncation, batch splitting, retry with exponential backoff, and
//! dimension verification.

mod provider;

pub use provider::OpenAiEmbedder;

use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding provider request failed: {0}")]
    Provider(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

/// Capability seam to the embedding service
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Vector dimension this provider produces
    fn dimension(&self) -> usize;

    /// Model identifier recorded alongside every stored vector
    fn model_id(&self) -> &str;
}

/// Embedding front-end used by ingestion and query paths
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_input_chars: usize,
    max_retries: u32,
    retry_base: Duration,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            max_input_chars: config.max_input_chars,
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
        }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Embed one query string
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Embed a list of texts, preserving input order. Inputs longer than the
    /// provider limit are truncated on a char boundary; truncation is
    /// deterministic so re-ingestion produces the same vectors.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared: Vec<String> = texts.iter().map(|t| self.truncate(t)).collect();

        let mut vectors = Vec::with_capacity(prepared.len());
        for batch in prepared.chunks(self.batch_size) {
            let batch_vectors = self.embed_batch_with_retry(batch).await?;
            if batch_vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: batch_vectors.len(),
                });
            }
            for vector in &batch_vectors {
                if vector.len() != self.provider.dimension() {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.provider.dimension(),
                        actual: vector.len(),
                    });
                }
            }
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    async fn embed_batch_with_retry(
        &self,
        batch: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.provider.embed_batch(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.retry_base * 2u32.pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Embedding batch failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_input_chars {
            return text.to_string();
        }
        text.chars().take(self.max_input_chars).collect()
    }
}
