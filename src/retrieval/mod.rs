//! Hybrid retrieval: fusion, recency decay, reranking, and the query engine

mod engine;
mod fusion;
mod recency;
mod rerank;

pub use engine::HybridQueryEngine;
pub use fusion::{dedup_by_document, fuse, Candidate};
pub use recency::multiplier as recency_multiplier;
pub use rerank::{RerankError, RerankProvider};

use crate::config::RetrievalConfig;
use crate::rewrite::Turn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A search request: who is asking, what they asked, and the conversation
/// that led up to it
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub tenant_id: String,
    pub query: String,
    pub history: Vec<Turn>,
}

impl QueryContext {
    pub fn new(tenant_id: &str, query: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            query: query.to_string(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

/// Per-request tuning knobs, defaulted from configuration
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub vector_top_k: usize,
    pub keyword_top_k: usize,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub rerank_top_k: usize,
    pub recency_half_life_days: f32,
    /// Keep every matching chunk of a document instead of only its best one
    pub multi_chunk_per_document: bool,
    /// Maximum results returned to the caller
    pub limit: usize,
}

impl SearchParams {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            vector_top_k: config.vector_top_k,
            keyword_top_k: config.keyword_top_k,
            semantic_weight: config.semantic_weight,
            keyword_weight: config.keyword_weight,
            rerank_top_k: config.rerank_top_k,
            recency_half_life_days: config.recency_half_life_days,
            multi_chunk_per_document: false,
            limit: config.rerank_top_k,
        }
    }
}

/// One ranked result with its full score breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSource {
    pub document_id: Uuid,
    pub chunk_index: usize,
    /// Chunk text clipped for display
    pub preview: String,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
    /// Weighted sum of the normalized retrieval signals
    pub fused_score: f32,
    /// Fused score after recency decay
    pub adjusted_score: f32,
    /// Cross-encoder score, absent when reranking was skipped or failed
    pub rerank_score: Option<f32>,
    /// Ordering key: adjusted score, multiplied by the rerank score when
    /// one exists
    pub final_score: f32,
}
