//! Tantivy keyword index with tenant-scoped BM25 search

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, Value, FAST, INDEXED, STORED, STRING, TEXT,
};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError, Term};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    Initialization(String),

    #[error("Insert failed: {0}")]
    Insert(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] TantivyError),
}

/// One BM25 hit from the keyword index
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub point_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
    pub source_timestamp: Option<DateTime<Utc>>,
}

/// Chunk record to index
#[derive(Debug, Clone)]
pub struct KeywordEntry {
    pub point_id: Uuid,
    pub tenant_id: String,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub source_timestamp: Option<i64>,
}

/// Full-text index over chunk text.
///
/// Every entry carries its tenant as an exact-match field; `search` always
/// conjoins the tenant term with the parsed query, so results never cross
/// tenants.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    point_id_field: Field,
    tenant_field: Field,
    document_field: Field,
    chunk_index_field: Field,
    text_field: Field,
    timestamp_field: Field,
    #[allow(dead_code)]
    index_path: PathBuf,
}

impl KeywordIndex {
    pub fn new(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        if index_path.exists() && index_path.join("meta.json").exists() {
            Self::load(index_path)
        } else {
            Self::create(index_path)
        }
    }

    fn create(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        std::fs::create_dir_all(&index_path)?;

        let mut schema_builder = Schema::builder();
        let point_id_field = schema_builder.add_text_field("point_id", STRING | STORED);
        let tenant_field = schema_builder.add_text_field("tenant_id", STRING | STORED);
        let document_field = schema_builder.add_text_field("document_id", STRING | STORED);
        let chunk_index_field = schema_builder.add_u64_field("chunk_index", INDEXED | STORED);
        let text_field = schema_builder.add_text_field("text", TEXT | STORED);
        let timestamp_field = schema_builder.add_i64_field("source_timestamp", STORED | FAST);
        let schema = schema_builder.build();

        let index = Index::create_in_dir(&index_path, schema)
            .map_err(|e| KeywordIndexError::Initialization(e.to_string()))?;

        Self::open(index, index_path)
    }

    fn load(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        let index = Index::open_in_dir(&index_path)
            .map_err(|e| KeywordIndexError::Initialization(e.to_string()))?;
        Self::open(index, index_path)
    }

    fn open(index: Index, index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                KeywordIndexError::Initialization(format!("Missing '{}' field in schema", name))
            })
        };
        let point_id_field = field("point_id")?;
        let tenant_field = field("tenant_id")?;
        let document_field = field("document_id")?;
        let chunk_index_field = field("chunk_index")?;
        let text_field = field("text")?;
        let timestamp_field = field("source_timestamp")?;

        let writer = index
            .writer(50_000_000)
            .map_err(|e| KeywordIndexError::Initialization(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: TantivyError| KeywordIndexError::Initialization(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer,
            point_id_field,
            tenant_field,
            document_field,
            chunk_index_field,
            text_field,
            timestamp_field,
            index_path,
        })
    }

    /// Insert an entry. Existing entries with the same point id are replaced,
    /// making re-ingestion idempotent.
    pub fn insert(&mut self, entry: &KeywordEntry) -> Result<(), KeywordIndexError> {
        let point_id = entry.point_id.to_string();
        self.writer
            .delete_term(Term::from_field_text(self.point_id_field, &point_id));

        let mut document = doc!(
            self.point_id_field => point_id,
            self.tenant_field => entry.tenant_id.clone(),
            self.document_field => entry.document_id.to_string(),
            self.chunk_index_field => entry.chunk_index as u64,
            self.text_field => entry.text.clone(),
        );
        if let Some(ts) = entry.source_timestamp {
            document.add_i64(self.timestamp_field, ts);
        }

        self.writer
            .add_document(document)
            .map_err(|e| KeywordIndexError::Insert(e.to_string()))?;
        Ok(())
    }

    pub fn insert_batch(&mut self, entries: &[KeywordEntry]) -> Result<(), KeywordIndexError> {
        for entry in entries {
            self.insert(entry)?;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::Insert(e.to_string()))?;
        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::Search(e.to_string()))?;
        Ok(())
    }

    /// BM25 search restricted to one tenant
    pub fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KeywordHit>, KeywordIndexError> {
        let searcher = self.reader.searcher();

        // Lenient parsing: user queries with stray quotes or parentheses
        // still search on whatever parses instead of failing the signal
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (text_query, parse_errors) = query_parser.parse_query_lenient(query);
        if !parse_errors.is_empty() {
            tracing::debug!(query, ?parse_errors, "Query parsed leniently");
        }

        let tenant_query: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(self.tenant_field, tenant_id),
            IndexRecordOption::Basic,
        ));
        let scoped = BooleanQuery::new(vec![
            (Occur::Must, tenant_query),
            (Occur::Must, text_query),
        ]);

        let top_docs = searcher
            .search(&scoped, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::Search(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: tantivy::TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::Search(e.to_string()))?;

            let uuid_field = |field: Field, name: &str| -> Result<Uuid, KeywordIndexError> {
                retrieved
                    .get_first(field)
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<Uuid>().ok())
                    .ok_or_else(|| {
                        KeywordIndexError::Search(format!("Missing or invalid {} field", name))
                    })
            };

            let point_id = uuid_field(self.point_id_field, "point_id")?;
            let document_id = uuid_field(self.document_field, "document_id")?;
            let chunk_index = retrieved
                .get_first(self.chunk_index_field)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            let text = retrieved
                .get_first(self.text_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let source_timestamp = retrieved
                .get_first(self.timestamp_field)
                .and_then(|v| v.as_i64())
                .and_then(|secs| DateTime::from_timestamp(secs, 0));

            hits.push(KeywordHit {
                point_id,
                document_id,
                chunk_index,
                text,
                score,
                source_timestamp,
            });
        }

        Ok(hits)
    }

    /// Remove every chunk of one document
    pub fn delete_document(&mut self, document_id: Uuid) -> Result<(), KeywordIndexError> {
        self.writer.delete_term(Term::from_field_text(
            self.document_field,
            &document_id.to_string(),
        ));
        Ok(())
    }

    /// Remove every chunk of one tenant
    pub fn delete_tenant(&mut self, tenant_id: &str) -> Result<(), KeywordIndexError> {
        self.writer
            .delete_term(Term::from_field_text(self.tenant_field, tenant_id));
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(tenant: &str, doc: Uuid, index: usize, text: &str) -> KeywordEntry {
        KeywordEntry {
            point_id: Uuid::new_v5(&doc, &index.to_be_bytes()),
            tenant_id: tenant.to_string(),
            document_id: doc,
            chunk_index: index,
            text: text.to_string(),
            source_timestamp: None,
        }
    }

    #[test]
    fn test_search_is_tenant_scoped() {
        let temp = TempDir::new().unwrap();
        let mut index = KeywordIndex::new(temp.path().join("kw")).unwrap();

        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        index
            .insert(&entry("acme", doc_a, 0, "steel delivery scheduled"))
            .unwrap();
        index
            .insert(&entry("globex", doc_b, 0, "steel delivery scheduled"))
            .unwrap();
        index.commit().unwrap();

        let hits = index.search("acme", "steel", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, doc_a);
    }

    #[test]
    fn test_reinsert_same_point_replaces() {
        let temp = TempDir::new().unwrap();
        let mut index = KeywordIndex::new(temp.path().join("kw")).unwrap();

        let doc = Uuid::new_v4();
        index.insert(&entry("acme", doc, 0, "first version")).unwrap();
        index.commit().unwrap();
        index.insert(&entry("acme", doc, 0, "second version")).unwrap();
        index.commit().unwrap();

        assert_eq!(index.len(), 1);
        let hits = index.search("acme", "second", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_delete_document_removes_all_chunks() {
        let temp = TempDir::new().unwrap();
        let mut index = KeywordIndex::new(temp.path().join("kw")).unwrap();

        let doc = Uuid::new_v4();
        let other = Uuid::new_v4();
        index.insert(&entry("acme", doc, 0, "alpha")).unwrap();
        index.insert(&entry("acme", doc, 1, "beta")).unwrap();
        index.insert(&entry("acme", other, 0, "gamma")).unwrap();
        index.commit().unwrap();

        index.delete_document(doc).unwrap();
        index.commit().unwrap();

        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_malformed_query_still_searches() {
        let temp = TempDir::new().unwrap();
        let mut index = KeywordIndex::new(temp.path().join("kw")).unwrap();

        let doc = Uuid::new_v4();
        index
            .insert(&entry("acme", doc, 0, "steel delivery schedule"))
            .unwrap();
        index.commit().unwrap();

        // A stray parenthesis must not fail the signal
        let hits = index.search("acme", "steel (delivery", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, doc);

        // Even a fully unbalanced quote degrades to a search, not an error
        assert!(index.search("acme", "\"steel (delivery", 10).is_ok());
    }

    #[test]
    fn test_delete_tenant_leaves_other_tenants_intact() {
        let temp = TempDir::new().unwrap();
        let mut index = KeywordIndex::new(temp.path().join("kw")).unwrap();

        index
            .insert(&entry("acme", Uuid::new_v4(), 0, "shared topic"))
            .unwrap();
        index
            .insert(&entry("globex", Uuid::new_v4(), 0, "shared topic"))
            .unwrap();
        index.commit().unwrap();

        index.delete_tenant("acme").unwrap();
        index.commit().unwrap();

        assert!(index.search("acme", "shared", 10).unwrap().is_empty());
        assert_eq!(index.search("globex", "shared", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_reload_preserves_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kw");
        let doc = Uuid::new_v4();

        {
            let mut index = KeywordIndex::new(path.clone()).unwrap();
            index
                .insert(&entry("acme", doc, 0, "persisted content"))
                .unwrap();
            index.commit().unwrap();
        }

        let index = KeywordIndex::new(path).unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search("acme", "persisted", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, doc);
    }
}
