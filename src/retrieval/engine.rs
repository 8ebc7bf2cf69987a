//! Hybrid query engine
//!
//! Pipeline: rewrite, embed, search both signals concurrently, fuse, decay
//! by recency, collapse to one chunk per document, rerank. Rewrite and
//! rerank degrade on failure; the search fails only when a retrieval signal
//! itself fails.

use super::fusion::{self, Candidate};
use super::recency;
use super::rerank::RerankProvider;
use super::{QueryContext, RankedSource, SearchParams};
use crate::embedding::Embedder;
use crate::error::{CortexError, Result};
use crate::index::IndexManager;
use crate::rewrite::QueryRewriter;
use chrono::Utc;
use std::sync::Arc;

/// Result previews are clipped for display
const PREVIEW_CHARS: usize = 200;

pub struct HybridQueryEngine {
    rewriter: QueryRewriter,
    embedder: Embedder,
    index: Arc<IndexManager>,
    reranker: Option<Arc<dyn RerankProvider>>,
}

impl HybridQueryEngine {
    pub fn new(
        rewriter: QueryRewriter,
        embedder: Embedder,
        index: Arc<IndexManager>,
        reranker: Option<Arc<dyn RerankProvider>>,
    ) -> Self {
        Self {
            rewriter,
            embedder,
            index,
            reranker,
        }
    }

    /// Run a hybrid search for one tenant.
    ///
    /// Fails with `Embedding`, `VectorStore`, or `KeywordIndex` when the
    /// corresponding signal fails, so callers can tell which backend broke.
    pub async fn search(
        &self,
        context: &QueryContext,
        params: &SearchParams,
    ) -> Result<Vec<RankedSource>> {
        let query = self
            .rewriter
            .rewrite(&context.history, &context.query)
            .await;

        let vector = self
            .embedder
            .embed_query(&query)
            .await
            .map_err(|e| CortexError::Embedding(e.to_string()))?;

        let (semantic, keyword) = tokio::join!(
            self.index
                .vector_search(&context.tenant_id, &vector, params.vector_top_k),
            self.index
                .keyword_search(&context.tenant_id, &query, params.keyword_top_k),
        );
        let semantic = semantic?;
        let keyword = keyword?;

        tracing::debug!(tenant = %context.tenant_id, semantic = semantic.len(),
            keyword = keyword.len(), "Retrieval signals collected");

        let mut candidates = fusion::fuse(
            semantic,
            keyword,
            params.semantic_weight,
            params.keyword_weight,
        );
        recency::apply(&mut candidates, params.recency_half_life_days, Utc::now());

        if !params.multi_chunk_per_document {
            candidates = fusion::dedup_by_document(candidates);
        }
        candidates.truncate(params.rerank_top_k);

        self.rerank(&query, &mut candidates).await;

        candidates.truncate(params.limit);
        Ok(candidates.into_iter().map(ranked_source).collect())
    }

    /// Apply the cross-encoder when configured. Any failure or malformed
    /// response keeps the pre-rerank ordering.
    async fn rerank(&self, query: &str, candidates: &mut Vec<Candidate>) {
        let Some(reranker) = &self.reranker else {
            return;
        };
        if candidates.is_empty() {
            return;
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        match reranker.rerank(query, &documents).await {
            Ok(scores) if scores.len() == candidates.len() => {
                for (candidate, score) in candidates.iter_mut().zip(scores) {
                    candidate.rerank_score = Some(score);
                }
                fusion::sort_by_score(candidates, final_score);
            }
            Ok(scores) => {
                tracing::warn!(
                    expected = candidates.len(),
                    actual = scores.len(),
                    "Reranker returned wrong score count, keeping fused order"
                );
            }
            Err(e) => {
                tracing::warn!("Reranking failed, keeping fused order: {}", e);
            }
        }
    }
}

/// Recency-adjusted score, scaled by the rerank score when present
fn final_score(candidate: &Candidate) -> f32 {
    match candidate.rerank_score {
        Some(rerank) => candidate.adjusted_score * rerank,
        None => candidate.adjusted_score,
    }
}

fn ranked_source(candidate: Candidate) -> RankedSource {
    let final_score = final_score(&candidate);
    RankedSource {
        document_id: candidate.document_id,
        chunk_index: candidate.chunk_index,
        preview: preview(&candidate.text),
        source_timestamp: candidate.source_timestamp,
        metadata: candidate.metadata,
        fused_score: candidate.fused_score,
        adjusted_score: candidate.adjusted_score,
        rerank_score: candidate.rerank_score,
        final_score,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::{EmbeddingError, EmbeddingProvider};
    use crate::index::{ChunkPoint, InMemoryVectorStore, KeywordIndex};
    use crate::retrieval::rerank::RerankError;
    use crate::rewrite::NoopRewriteProvider;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Maps known phrases onto fixed directions so similarity is predictable
    struct PhraseEmbedder;

    #[async_trait]
    impl EmbeddingProvider for PhraseEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("steel") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            "stub-embed"
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl RerankProvider for FailingReranker {
        async fn rerank(&self, _: &str, _: &[String]) -> std::result::Result<Vec<f32>, RerankError> {
            Err(RerankError::Provider("unreachable".to_string()))
        }
    }

    /// Strongly prefers documents mentioning "quote"
    struct QuoteReranker;

    #[async_trait]
    impl RerankProvider for QuoteReranker {
        async fn rerank(&self, _: &str, docs: &[String]) -> std::result::Result<Vec<f32>, RerankError> {
            Ok(docs
                .iter()
                .map(|d| if d.contains("quote") { 10.0 } else { 0.1 })
                .collect())
        }
    }

    async fn engine_with(
        temp: &TempDir,
        reranker: Option<Arc<dyn RerankProvider>>,
    ) -> (HybridQueryEngine, Arc<IndexManager>) {
        let config = Config::default();
        let keyword = KeywordIndex::new(temp.path().join("kw")).unwrap();
        let index = Arc::new(IndexManager::new(
            Arc::new(InMemoryVectorStore::new()),
            keyword,
            2,
            "stub-embed",
        ));
        let embedder = Embedder::new(Arc::new(PhraseEmbedder), &config.embedding);
        let rewriter = QueryRewriter::new(Arc::new(NoopRewriteProvider), 6);
        let engine = HybridQueryEngine::new(rewriter, embedder, index.clone(), reranker);
        (engine, index)
    }

    fn chunk(tenant: &str, doc: Uuid, index: usize, text: &str, vector: Vec<f32>) -> ChunkPoint {
        ChunkPoint {
            point_id: ChunkPoint::derive_id(doc, index),
            tenant_id: tenant.to_string(),
            document_id: doc,
            chunk_index: index,
            text: text.to_string(),
            vector,
            embedding_model: "stub-embed".to_string(),
            source_timestamp: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_hybrid_search_finds_both_signals() {
        let temp = TempDir::new().unwrap();
        let (engine, index) = engine_with(&temp, None).await;

        let semantic_doc = Uuid::new_v4();
        let keyword_doc = Uuid::new_v4();
        index
            .upsert_chunks(vec![
                chunk(
                    "acme",
                    semantic_doc,
                    0,
                    "metal shipment arriving at the warehouse",
                    vec![1.0, 0.0],
                ),
                chunk(
                    "acme",
                    keyword_doc,
                    0,
                    "steel order confirmation attached",
                    vec![0.0, 1.0],
                ),
            ])
            .await
            .unwrap();

        let results = engine
            .search(
                &QueryContext::new("acme", "steel"),
                &SearchParams::from_config(&Config::default().retrieval),
            )
            .await
            .unwrap();

        let ids: Vec<Uuid> = results.iter().map(|r| r.document_id).collect();
        assert!(ids.contains(&semantic_doc));
        assert!(ids.contains(&keyword_doc));
    }

    #[tokio::test]
    async fn test_search_respects_tenant_boundary() {
        let temp = TempDir::new().unwrap();
        let (engine, index) = engine_with(&temp, None).await;

        let doc = Uuid::new_v4();
        index
            .upsert_chunks(vec![chunk(
                "globex",
                doc,
                0,
                "steel pricing for the quarter",
                vec![1.0, 0.0],
            )])
            .await
            .unwrap();

        let results = engine
            .search(
                &QueryContext::new("acme", "steel"),
                &SearchParams::from_config(&Config::default().retrieval),
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_rerank_failure_degrades_to_fused_order() {
        let temp = TempDir::new().unwrap();
        let (engine, index) = engine_with(&temp, Some(Arc::new(FailingReranker))).await;

        let doc = Uuid::new_v4();
        index
            .upsert_chunks(vec![chunk(
                "acme",
                doc,
                0,
                "steel beams for the new building",
                vec![1.0, 0.0],
            )])
            .await
            .unwrap();

        let results = engine
            .search(
                &QueryContext::new("acme", "steel"),
                &SearchParams::from_config(&Config::default().retrieval),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].rerank_score.is_none());
        assert_eq!(results[0].final_score, results[0].adjusted_score);
    }

    #[tokio::test]
    async fn test_rerank_scores_reorder_results() {
        let temp = TempDir::new().unwrap();
        let (engine, index) = engine_with(&temp, Some(Arc::new(QuoteReranker))).await;

        let invoice_doc = Uuid::new_v4();
        let quote_doc = Uuid::new_v4();
        index
            .upsert_chunks(vec![
                chunk("acme", invoice_doc, 0, "steel invoice for march", vec![1.0, 0.0]),
                chunk("acme", quote_doc, 0, "steel quote for april", vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let results = engine
            .search(
                &QueryContext::new("acme", "steel"),
                &SearchParams::from_config(&Config::default().retrieval),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        // The reranker's strong preference overrides the fused ordering
        assert_eq!(results[0].document_id, quote_doc);
        assert!(results[0].rerank_score.unwrap() > results[1].rerank_score.unwrap());
        assert!(results[0].final_score > results[1].final_score);
    }

    #[tokio::test]
    async fn test_one_chunk_per_document_by_default() {
        let temp = TempDir::new().unwrap();
        let (engine, index) = engine_with(&temp, None).await;

        let doc = Uuid::new_v4();
        index
            .upsert_chunks(vec![
                chunk("acme", doc, 0, "steel delivery part one", vec![1.0, 0.0]),
                chunk("acme", doc, 1, "steel delivery part two", vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let params = SearchParams::from_config(&Config::default().retrieval);
        let results = engine
            .search(&QueryContext::new("acme", "steel"), &params)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let mut multi = params.clone();
        multi.multi_chunk_per_document = true;
        let results = engine
            .search(&QueryContext::new("acme", "steel"), &multi)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }
}
