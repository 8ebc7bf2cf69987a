//! OpenAI-compatible embedding provider

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::{EmbeddingConfig, ProvidersConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider speaking the OpenAI `/embeddings` protocol
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        providers: &ProvidersConfig,
        embedding: &EmbeddingConfig,
    ) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&providers.api_key_env).map_err(|_| {
            EmbeddingError::Provider(format!(
                "API key environment variable {} is not set",
                providers.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(providers.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Provider(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: providers.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: embedding.model.clone(),
            dimension: embedding.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Provider(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!(
                "embeddings endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(format!("invalid response body: {}", e)))?;

        // Responses are not guaranteed to arrive in input order
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
