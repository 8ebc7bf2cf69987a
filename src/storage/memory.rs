//! In-memory document store for tests and offline operation

use super::{Document, DocumentStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Document store backed by process memory.
///
/// Upsert keys on `(tenant_id, source, source_id)` the same way the durable
/// backend does, so pipeline behavior is identical in tests.
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    /// (tenant_id, source, source_id) -> document id
    source_keys: RwLock<HashMap<(String, String, String), Uuid>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            source_keys: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_by_fingerprint(
        &self,
        tenant_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .find(|d| {
                d.tenant_id == tenant_id
                    && d.fingerprint == fingerprint
                    && d.rejected_reason.is_none()
            })
            .cloned())
    }

    async fn save(&self, document: Document) -> Result<(), StoreError> {
        let key = (
            document.tenant_id.clone(),
            document.source.clone(),
            document.source_id.clone(),
        );

        let mut source_keys = self.source_keys.write().await;
        let mut documents = self.documents.write().await;

        if let Some(existing_id) = source_keys.get(&key) {
            if *existing_id != document.id {
                documents.remove(existing_id);
            }
        }
        source_keys.insert(key, document.id);
        documents.insert(document.id, document);
        Ok(())
    }

    async fn mark_rejected(&self, document_id: Uuid, reason: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&document_id)
            .ok_or(StoreError::NotFound(document_id))?;
        document.rejected_reason = Some(reason.to_string());
        Ok(())
    }

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(&document_id).cloned())
    }
}
