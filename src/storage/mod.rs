//! Durable document records and the store collaborator seam
//!
//! The relational store itself is an external collaborator; this module
//! defines the record shape and the narrow trait the ingestion pipeline
//! needs, plus an in-memory implementation for tests and offline use.

mod memory;

pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(Uuid),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Tenant-scoped unit of ingested content.
///
/// `(tenant_id, source, source_id)` is unique; the fingerprint is checked
/// per-tenant only, so identical content in two tenants never collides.
/// Immutable after creation except for metadata patches and the rejected
/// audit flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: String,
    /// Source system tag ("gmail", "outlook", "gdrive", ...)
    pub source: String,
    /// Source-native identifier (message id, file id)
    pub source_id: String,
    pub title: String,
    pub text: String,
    /// BLAKE3 fingerprint of the normalized text
    pub fingerprint: String,
    /// Free-form metadata: sender, participants, mime type
    pub metadata: HashMap<String, serde_json::Value>,
    /// Source-native creation/modification time, used for recency scoring
    pub source_timestamp: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    /// Set when the quality gate rejected the document (kept for audit)
    pub rejected_reason: Option<String>,
}

/// Narrow interface to the durable document store collaborator
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Per-tenant fingerprint lookup used by the dedup gate
    async fn get_by_fingerprint(
        &self,
        tenant_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Persist a document, upserting on `(tenant_id, source, source_id)`
    async fn save(&self, document: Document) -> Result<(), StoreError>;

    /// Record a quality-gate rejection for audit; the document stays out of
    /// the index
    async fn mark_rejected(&self, document_id: Uuid, reason: &str) -> Result<(), StoreError>;

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>, StoreError>;
}
