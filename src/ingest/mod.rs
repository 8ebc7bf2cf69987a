//! Ingestion pipeline: dedup gate, quality gate, chunk, embed, index
//!
//! Every stage decision is an outcome, not an error: duplicates and
//! rejections are normal results callers can act on. The pipeline only
//! fails when indexing itself fails; it then rolls back partial index
//! writes and leaves no document record, so a retry runs the full pipeline
//! again instead of stopping at the dedup gate.

use crate::chunker;
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::embedding::Embedder;
use crate::error::{CortexError, Result};
use crate::index::{ChunkPoint, IndexManager};
use crate::quality::{QualityClassifier, QualityFilter, QualityVerdict, RejectReason};
use crate::storage::{Document, DocumentStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Metadata values are clipped before landing in index payloads
const MAX_META_VALUE_LEN: usize = 200;

/// A candidate document as delivered by a source connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub tenant_id: String,
    pub source: String,
    pub source_id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub source_timestamp: Option<DateTime<Utc>>,
}

/// Terminal outcome of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Indexed; `chunks` spans were written to both indexes
    Accepted { document_id: Uuid, chunks: usize },
    /// Content already present for this tenant; nothing written
    Duplicate { document_id: Uuid },
    /// Quality or content gate rejected it; recorded for audit, not indexed
    Rejected {
        document_id: Uuid,
        reason: RejectReason,
    },
}

/// The ingestion pipeline
pub struct IngestionPipeline {
    dedup: Deduplicator,
    quality: QualityFilter,
    chunk_window: usize,
    chunk_overlap: usize,
    embedder: Embedder,
    index: Arc<IndexManager>,
    store: Arc<dyn DocumentStore>,
}

impl IngestionPipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        embedder: Embedder,
        index: Arc<IndexManager>,
        classifier: Option<Arc<dyn QualityClassifier>>,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(),
            quality: QualityFilter::new(&config.ingestion, classifier),
            chunk_window: config.ingestion.chunk_window,
            chunk_overlap: config.ingestion.chunk_overlap,
            embedder,
            index,
            store,
        }
    }

    /// Ingest one document end to end.
    ///
    /// Returns `Err` only when chunks could not be embedded or indexed; the
    /// error is retryable and partial index writes have been rolled back.
    pub async fn ingest(&self, raw: RawDocument) -> Result<IngestOutcome> {
        let document_id = Uuid::new_v4();

        let fingerprint = match self.dedup.check(&raw.text) {
            Ok(fp) => fp,
            Err(CortexError::EmptyContent) => {
                tracing::debug!(tenant = %raw.tenant_id, source_id = %raw.source_id,
                    "Document empty after normalization, rejecting");
                return Ok(IngestOutcome::Rejected {
                    document_id,
                    reason: RejectReason::EmptyContent,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(existing) = self
            .store
            .get_by_fingerprint(&raw.tenant_id, &fingerprint.hash)
            .await
            .map_err(|e| CortexError::Store(e.to_string()))?
        {
            tracing::debug!(tenant = %raw.tenant_id, existing = %existing.id,
                "Duplicate content, skipping");
            return Ok(IngestOutcome::Duplicate {
                document_id: existing.id,
            });
        }

        let sender = raw.metadata.get("sender").map(String::as_str);
        let verdict = self.quality.assess(&raw.title, &raw.text, sender).await;

        let document = Document {
            id: document_id,
            tenant_id: raw.tenant_id.clone(),
            source: raw.source.clone(),
            source_id: raw.source_id.clone(),
            title: raw.title.clone(),
            text: raw.text.clone(),
            fingerprint: fingerprint.hash,
            metadata: raw
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
            source_timestamp: raw.source_timestamp,
            ingested_at: Utc::now(),
            rejected_reason: None,
        };
        if let QualityVerdict::Reject(reason) = verdict {
            self.store
                .save(document)
                .await
                .map_err(|e| CortexError::Store(e.to_string()))?;
            self.store
                .mark_rejected(document_id, &reason.to_string())
                .await
                .map_err(|e| CortexError::Store(e.to_string()))?;
            tracing::info!(tenant = %raw.tenant_id, document = %document_id, %reason,
                "Document rejected by quality gate");
            return Ok(IngestOutcome::Rejected {
                document_id,
                reason,
            });
        }

        let chunks: Vec<(chunker::ChunkSpan, String)> =
            chunker::split(&raw.text, self.chunk_window, self.chunk_overlap)?
                .map(|(span, text)| (span, text.to_string()))
                .collect();

        if let Err(e) = self.index_chunks(&raw, document_id, &chunks).await {
            return Err(self.rollback(&raw.tenant_id, document_id, e).await);
        }

        // The document record is saved only once the index writes committed;
        // a failed attempt leaves no record behind, so a retry passes the
        // dedup gate instead of terminating as Duplicate.
        if let Err(e) = self.store.save(document).await {
            return Err(self
                .rollback(&raw.tenant_id, document_id, CortexError::Store(e.to_string()))
                .await);
        }

        tracing::info!(tenant = %raw.tenant_id, document = %document_id,
            chunks = chunks.len(), "Document ingested");
        Ok(IngestOutcome::Accepted {
            document_id,
            chunks: chunks.len(),
        })
    }

    /// Remove any partial index writes and wrap the cause as a retryable
    /// ingestion failure
    async fn rollback(&self, tenant_id: &str, document_id: Uuid, cause: CortexError) -> CortexError {
        if let Err(cleanup) = self.index.delete_document(tenant_id, document_id).await {
            tracing::warn!(document = %document_id,
                "Index cleanup after failed ingestion also failed: {}", cleanup);
        }
        CortexError::IngestionFailed {
            document_id,
            reason: cause.to_string(),
        }
    }

    async fn index_chunks(
        &self,
        raw: &RawDocument,
        document_id: Uuid,
        chunks: &[(chunker::ChunkSpan, String)],
    ) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self
            .embedder
            .embed_texts(&texts)
            .await
            .map_err(|e| CortexError::Embedding(e.to_string()))?;

        let metadata = payload_metadata(raw);
        let source_timestamp = raw.source_timestamp.map(|ts| ts.timestamp());

        let points: Vec<ChunkPoint> = chunks
            .iter()
            .zip(vectors)
            .map(|((span, text), vector)| ChunkPoint {
                point_id: ChunkPoint::derive_id(document_id, span.index),
                tenant_id: raw.tenant_id.clone(),
                document_id,
                chunk_index: span.index,
                text: text.clone(),
                vector,
                embedding_model: self.embedder.model_id().to_string(),
                source_timestamp,
                metadata: metadata.clone(),
            })
            .collect();

        self.index.upsert_chunks(points).await
    }
}

/// Display metadata for index payloads: title and source always, connector
/// metadata clipped to a bounded length
fn payload_metadata(raw: &RawDocument) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("title".to_string(), clip(&raw.title));
    metadata.insert("source".to_string(), raw.source.clone());
    for (key, value) in &raw.metadata {
        metadata.insert(key.clone(), clip(value));
    }
    metadata
}

fn clip(value: &str) -> String {
    if value.chars().count() <= MAX_META_VALUE_LEN {
        return value.to_string();
    }
    value.chars().take(MAX_META_VALUE_LEN).collect()
}
