//! HTTP reranker client speaking the Cohere-style rerank protocol

use crate::config::ProvidersConfig;
use crate::retrieval::{RerankError, RerankProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

pub struct HttpReranker {
    client: reqwest::Client,
    url: String,
    model: String,
    /// Bearer token, absent for unauthenticated local endpoints
    api_key: Option<String>,
}

impl HttpReranker {
    pub fn new(config: &ProvidersConfig) -> Result<Self, RerankError> {
        if config.rerank_url.is_empty() {
            return Err(RerankError::Provider(
                "rerank URL is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RerankError::Provider(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            url: config.rerank_url.clone(),
            model: config.rerank_model.clone(),
            api_key: std::env::var(&config.rerank_api_key_env).ok(),
        })
    }
}

#[async_trait]
impl RerankProvider for HttpReranker {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RerankError::Provider(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RerankError::Provider(format!(
                "rerank endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| RerankError::Provider(format!("invalid response body: {}", e)))?;

        // Results come back sorted by relevance; re-key them to input order
        let mut scores = vec![0.0; documents.len()];
        for result in parsed.results {
            if result.index >= scores.len() {
                return Err(RerankError::Provider(format!(
                    "result index {} out of range",
                    result.index
                )));
            }
            scores[result.index] = result.relevance_score;
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_url(api_key_env: &str) -> ProvidersConfig {
        let mut config = crate::config::Config::default().providers;
        config.rerank_url = "http://localhost:9000/rerank".to_string();
        config.rerank_api_key_env = api_key_env.to_string();
        config
    }

    #[test]
    fn test_missing_url_rejected() {
        let config = crate::config::Config::default().providers;
        assert!(HttpReranker::new(&config).is_err());
    }

    #[test]
    fn test_unset_key_env_builds_unauthenticated_client() {
        let config = config_with_url("CORTEX_TEST_RERANK_KEY_THAT_IS_NEVER_SET");
        let reranker = HttpReranker::new(&config).unwrap();
        assert!(reranker.api_key.is_none());
    }

    #[test]
    fn test_key_env_picked_up_for_bearer_auth() {
        std::env::set_var("CORTEX_TEST_RERANK_KEY_SET", "sk-test");
        let config = config_with_url("CORTEX_TEST_RERANK_KEY_SET");
        let reranker = HttpReranker::new(&config).unwrap();
        assert_eq!(reranker.api_key.as_deref(), Some("sk-test"));
        std::env::remove_var("CORTEX_TEST_RERANK_KEY_SET");
    }
}
