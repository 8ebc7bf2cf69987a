//! Reranking seam
//!
//! A cross-encoder reranker scores query/chunk pairs jointly and is far
//! more accurate than either retrieval signal, but it is also the slowest
//! and flakiest stage. The engine treats it as strictly optional: any
//! failure keeps the pre-rerank ordering.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("rerank provider failed: {0}")]
    Provider(String),
}

/// Capability seam to the reranking service
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Score each document against the query; one score per document, in
    /// input order
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError>;
}
