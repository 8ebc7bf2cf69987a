//! Vector store seam and implementations
//!
//! The Qdrant implementation talks to a running server; the in-memory one
//! is a brute-force cosine scan for tests and offline use. Both enforce the
//! same contract: every point carries its tenant, and search never crosses
//! tenants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, point_id::PointIdOptions, points_selector::PointsSelectorOneOf,
        r#match::MatchValue, value::Kind, vectors_config::Config as VectorsConfigKind, Condition,
        CreateCollection, Distance, FieldCondition, Filter, Match, PointId, PointStruct,
        PointsSelector, SearchPoints, Value as QdrantValue, VectorParams, VectorsConfig,
        WithPayloadSelector, with_payload_selector::SelectorOptions,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("vector store backend error: {0}")]
    Backend(String),

    #[error("malformed point payload: {0}")]
    Payload(String),
}

/// One embedded chunk, ready for upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPoint {
    /// UUIDv5 of (document id, chunk index); re-ingestion overwrites in place
    pub point_id: Uuid,
    pub tenant_id: String,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
    /// Model the vector was produced with; mixed-model collections are invalid
    pub embedding_model: String,
    /// Source timestamp in epoch seconds, for recency scoring
    pub source_timestamp: Option<i64>,
    /// Display metadata carried into search results (title, source, sender)
    pub metadata: HashMap<String, String>,
}

impl ChunkPoint {
    /// Deterministic point id: same document and chunk index always map to
    /// the same id, making upserts idempotent.
    pub fn derive_id(document_id: Uuid, chunk_index: usize) -> Uuid {
        Uuid::new_v5(&document_id, &chunk_index.to_be_bytes())
    }
}

/// One hit from a similarity search
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub point_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

/// Capability seam to the vector index backend
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing, sized to `dimension`
    async fn ensure_collection(&self, dimension: usize) -> Result<(), VectorStoreError>;

    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<(), VectorStoreError>;

    /// Similarity search restricted to one tenant
    async fn search(
        &self,
        tenant_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorStoreError>;

    async fn delete_by_document(
        &self,
        tenant_id: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError>;

    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<(), VectorStoreError>;
}

/// Qdrant-backed vector store
pub struct QdrantVectorStore {
    client: QdrantClient,
    collection: String,
}

impl QdrantVectorStore {
    pub fn new(url: &str, collection: &str) -> Result<Self, VectorStoreError> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Backend(format!("client init failed: {}", e)))?;
        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    fn keyword_condition(key: &str, value: &str) -> Condition {
        Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(value.to_string())),
                }),
                ..Default::default()
            })),
        }
    }

    fn filter_selector(filter: Filter) -> PointsSelector {
        PointsSelector {
            points_selector_one_of: Some(PointsSelectorOneOf::Filter(filter)),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<(), VectorStoreError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorStoreError::Backend(format!("list collections failed: {}", e)))?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(&CreateCollection {
                collection_name: self.collection.clone(),
                vectors_config: Some(VectorsConfig {
                    config: Some(VectorsConfigKind::Params(VectorParams {
                        size: dimension as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| VectorStoreError::Backend(format!("create collection failed: {}", e)))?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let mut payload: HashMap<String, QdrantValue> = HashMap::new();
                payload.insert("tenant_id".to_string(), QdrantValue::from(p.tenant_id));
                payload.insert(
                    "document_id".to_string(),
                    QdrantValue::from(p.document_id.to_string()),
                );
                payload.insert(
                    "chunk_index".to_string(),
                    QdrantValue::from(p.chunk_index as i64),
                );
                payload.insert("text".to_string(), QdrantValue::from(p.text));
                payload.insert(
                    "embedding_model".to_string(),
                    QdrantValue::from(p.embedding_model),
                );
                if let Some(ts) = p.source_timestamp {
                    payload.insert("source_timestamp".to_string(), QdrantValue::from(ts));
                }
                for (key, value) in p.metadata {
                    payload.insert(format!("meta_{}", key), QdrantValue::from(value));
                }
                PointStruct::new(p.point_id.to_string(), p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .map_err(|e| VectorStoreError::Backend(format!("upsert failed: {}", e)))?;
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let filter = Filter {
            must: vec![Self::keyword_condition("tenant_id", tenant_id)],
            ..Default::default()
        };

        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: vector.to_vec(),
                limit: top_k as u64,
                filter: Some(filter),
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| VectorStoreError::Backend(format!("search failed: {}", e)))?;

        response
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let point_id = parse_point_id(&point.id)?;
                let document_id = payload_str(&payload, "document_id")?
                    .parse::<Uuid>()
                    .map_err(|e| VectorStoreError::Payload(format!("document_id: {}", e)))?;
                let chunk_index = payload_int(&payload, "chunk_index")? as usize;
                let text = payload_str(&payload, "text")?;
                let source_timestamp = payload
                    .get("source_timestamp")
                    .and_then(value_as_int)
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));

                let metadata = payload
                    .iter()
                    .filter_map(|(key, value)| {
                        let name = key.strip_prefix("meta_")?;
                        value_as_str(value).map(|v| (name.to_string(), v))
                    })
                    .collect();

                Ok(SearchHit {
                    point_id,
                    document_id,
                    chunk_index,
                    text,
                    score: point.score,
                    source_timestamp,
                    metadata,
                })
            })
            .collect()
    }

    async fn delete_by_document(
        &self,
        tenant_id: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError> {
        let filter = Filter {
            must: vec![
                Self::keyword_condition("tenant_id", tenant_id),
                Self::keyword_condition("document_id", &document_id.to_string()),
            ],
            ..Default::default()
        };
        self.client
            .delete_points(&self.collection, None, &Self::filter_selector(filter), None)
            .await
            .map_err(|e| VectorStoreError::Backend(format!("delete by document failed: {}", e)))?;
        Ok(())
    }

    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<(), VectorStoreError> {
        let filter = Filter {
            must: vec![Self::keyword_condition("tenant_id", tenant_id)],
            ..Default::default()
        };
        self.client
            .delete_points(&self.collection, None, &Self::filter_selector(filter), None)
            .await
            .map_err(|e| VectorStoreError::Backend(format!("delete by tenant failed: {}", e)))?;
        Ok(())
    }
}

fn parse_point_id(id: &Option<PointId>) -> Result<Uuid, VectorStoreError> {
    match id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(u)) => u
            .parse::<Uuid>()
            .map_err(|e| VectorStoreError::Payload(format!("point id: {}", e))),
        other => Err(VectorStoreError::Payload(format!(
            "unexpected point id variant: {:?}",
            other
        ))),
    }
}

fn payload_str(
    payload: &HashMap<String, QdrantValue>,
    key: &str,
) -> Result<String, VectorStoreError> {
    payload
        .get(key)
        .and_then(value_as_str)
        .ok_or_else(|| VectorStoreError::Payload(format!("missing string field {}", key)))
}

fn payload_int(
    payload: &HashMap<String, QdrantValue>,
    key: &str,
) -> Result<i64, VectorStoreError> {
    payload
        .get(key)
        .and_then(value_as_int)
        .ok_or_else(|| VectorStoreError::Payload(format!("missing integer field {}", key)))
}

fn value_as_str(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref() {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn value_as_int(value: &QdrantValue) -> Option<i64> {
    match value.kind.as_ref() {
        Some(Kind::IntegerValue(i)) => Some(*i),
        _ => None,
    }
}

/// Brute-force in-memory vector store for tests and offline use
pub struct InMemoryVectorStore {
    points: tokio::sync::RwLock<HashMap<Uuid, ChunkPoint>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            points: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, _dimension: usize) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<ChunkPoint>) -> Result<(), VectorStoreError> {
        let mut stored = self.points.write().await;
        for point in points {
            stored.insert(point.point_id, point);
        }
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let stored = self.points.read().await;
        let mut hits: Vec<SearchHit> = stored
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .map(|p| SearchHit {
                point_id: p.point_id,
                document_id: p.document_id,
                chunk_index: p.chunk_index,
                text: p.text.clone(),
                score: Self::cosine(&p.vector, vector),
                source_timestamp: p
                    .source_timestamp
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                metadata: p.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_document(
        &self,
        tenant_id: &str,
        document_id: Uuid,
    ) -> Result<(), VectorStoreError> {
        self.points
            .write()
            .await
            .retain(|_, p| !(p.tenant_id == tenant_id && p.document_id == document_id));
        Ok(())
    }

    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<(), VectorStoreError> {
        self.points
            .write()
            .await
            .retain(|_, p| p.tenant_id != tenant_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(tenant: &str, doc: Uuid, index: usize, vector: Vec<f32>) -> ChunkPoint {
        ChunkPoint {
            point_id: ChunkPoint::derive_id(doc, index),
            tenant_id: tenant.to_string(),
            document_id: doc,
            chunk_index: index,
            text: format!("chunk {}", index),
            vector,
            embedding_model: "stub-embed".to_string(),
            source_timestamp: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_point_id_derivation_is_stable() {
        let doc = Uuid::new_v4();
        assert_eq!(
            ChunkPoint::derive_id(doc, 3),
            ChunkPoint::derive_id(doc, 3)
        );
        assert_ne!(
            ChunkPoint::derive_id(doc, 3),
            ChunkPoint::derive_id(doc, 4)
        );
    }

    #[tokio::test]
    async fn test_search_is_tenant_scoped() {
        let store = InMemoryVectorStore::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        store
            .upsert(vec![
                point("acme", doc_a, 0, vec![1.0, 0.0]),
                point("globex", doc_b, 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search("acme", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, doc_a);
    }

    #[tokio::test]
    async fn test_upsert_same_point_id_overwrites() {
        let store = InMemoryVectorStore::new();
        let doc = Uuid::new_v4();
        store
            .upsert(vec![point("acme", doc, 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(vec![point("acme", doc, 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_by_document_removes_all_chunks() {
        let store = InMemoryVectorStore::new();
        let doc = Uuid::new_v4();
        let other = Uuid::new_v4();
        store
            .upsert(vec![
                point("acme", doc, 0, vec![1.0, 0.0]),
                point("acme", doc, 1, vec![0.5, 0.5]),
                point("acme", other, 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        store.delete_by_document("acme", doc).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_results_ranked_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        let close = Uuid::new_v4();
        let far = Uuid::new_v4();
        store
            .upsert(vec![
                point("acme", close, 0, vec![1.0, 0.1]),
                point("acme", far, 0, vec![0.1, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search("acme", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].document_id, close);
        assert!(hits[0].score > hits[1].score);
    }
}
