//! Cortex - Multi-Tenant Hybrid Retrieval Core
//!
//! Turns raw ingested text into searchable, deduplicated, ranked knowledge
//! and answers user questions with a ranked, time-aware, source-attributed
//! context. Ingestion runs dedup -> quality -> chunk -> embed -> index;
//! querying runs rewrite -> hybrid retrieval -> fusion -> recency -> rerank.

pub mod chunker;
pub mod config;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod providers;
pub mod quality;
pub mod retrieval;
pub mod rewrite;
pub mod storage;

pub use error::{CortexError, Result};

/// Initialize tracing with an env-filter (`RUST_LOG` style).
///
/// Library consumers that install their own subscriber should skip this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
