//! Index manager coordinating the vector and keyword indexes
//!
//! Both indexes hold the same chunk set under the same point ids; the
//! manager is the single write path, so they cannot drift apart. The tenant
//! argument is mandatory on every read and delete, never optional.

mod keyword;
mod vector_store;

pub use keyword::{KeywordEntry, KeywordHit, KeywordIndex, KeywordIndexError};
pub use vector_store::{
    ChunkPoint, InMemoryVectorStore, QdrantVectorStore, SearchHit, VectorStore, VectorStoreError,
};

use crate::error::{CortexError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Single write/read path for the chunk indexes
pub struct IndexManager {
    vector: Arc<dyn VectorStore>,
    keyword: RwLock<KeywordIndex>,
    dimension: usize,
    embedding_model: String,
}

impl IndexManager {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        keyword: KeywordIndex,
        dimension: usize,
        embedding_model: &str,
    ) -> Self {
        Self {
            vector,
            keyword: RwLock::new(keyword),
            dimension,
            embedding_model: embedding_model.to_string(),
        }
    }

    /// Create the vector collection if missing
    pub async fn init(&self) -> Result<()> {
        self.vector
            .ensure_collection(self.dimension)
            .await
            .map_err(|e| CortexError::VectorStore(e.to_string()))
    }

    /// Write chunks to both indexes. Rejects vectors whose dimension or
    /// producing model does not match the collection; a mixed-model index
    /// returns meaningless similarities.
    pub async fn upsert_chunks(&self, points: Vec<ChunkPoint>) -> Result<()> {
        for point in &points {
            if point.vector.len() != self.dimension {
                return Err(CortexError::IndexSchemaMismatch {
                    expected: format!("dimension {}", self.dimension),
                    actual: format!("dimension {}", point.vector.len()),
                });
            }
            if point.embedding_model != self.embedding_model {
                return Err(CortexError::IndexSchemaMismatch {
                    expected: format!("model {}", self.embedding_model),
                    actual: format!("model {}", point.embedding_model),
                });
            }
        }

        let entries: Vec<KeywordEntry> = points
            .iter()
            .map(|p| KeywordEntry {
                point_id: p.point_id,
                tenant_id: p.tenant_id.clone(),
                document_id: p.document_id,
                chunk_index: p.chunk_index,
                text: p.text.clone(),
                source_timestamp: p.source_timestamp,
            })
            .collect();

        self.vector
            .upsert(points)
            .await
            .map_err(|e| CortexError::VectorStore(e.to_string()))?;

        let mut keyword = self.keyword.write().await;
        keyword
            .insert_batch(&entries)
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))?;
        keyword
            .commit()
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))?;
        Ok(())
    }

    pub async fn vector_search(
        &self,
        tenant_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.vector
            .search(tenant_id, vector, top_k)
            .await
            .map_err(|e| CortexError::VectorStore(e.to_string()))
    }

    pub async fn keyword_search(
        &self,
        tenant_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KeywordHit>> {
        self.keyword
            .read()
            .await
            .search(tenant_id, query, top_k)
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))
    }

    /// Remove every chunk of one document from both indexes
    pub async fn delete_document(&self, tenant_id: &str, document_id: Uuid) -> Result<()> {
        self.vector
            .delete_by_document(tenant_id, document_id)
            .await
            .map_err(|e| CortexError::VectorStore(e.to_string()))?;

        let mut keyword = self.keyword.write().await;
        keyword
            .delete_document(document_id)
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))?;
        keyword
            .commit()
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))?;
        Ok(())
    }

    /// Remove all of a tenant's chunks from both indexes
    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<()> {
        self.vector
            .delete_by_tenant(tenant_id)
            .await
            .map_err(|e| CortexError::VectorStore(e.to_string()))?;

        let mut keyword = self.keyword.write().await;
        keyword
            .delete_tenant(tenant_id)
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))?;
        keyword
            .commit()
            .map_err(|e| CortexError::KeywordIndex(e.to_string()))?;
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}
