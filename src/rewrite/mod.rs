//! Conversational query rewriting
//!
//! Follow-up questions ("what about the second one?") are useless as search
//! strings. The rewriter folds recent conversation history into a
//! standalone query via an LLM provider. It degrades rather than fails: any
//! provider problem falls back to the raw query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Turns are clipped before being sent to the provider
const MAX_TURN_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("rewrite provider failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn preceding the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Capability seam to the rewriting LLM
#[async_trait]
pub trait RewriteProvider: Send + Sync {
    /// Produce a standalone search query from history plus the raw query
    async fn rewrite(&self, history: &[Turn], query: &str) -> Result<String, RewriteError>;
}

/// Provider that never rewrites; used when no LLM is configured
pub struct NoopRewriteProvider;

#[async_trait]
impl RewriteProvider for NoopRewriteProvider {
    async fn rewrite(&self, _history: &[Turn], query: &str) -> Result<String, RewriteError> {
        Ok(query.to_string())
    }
}

/// Query rewriter front-end
pub struct QueryRewriter {
    provider: std::sync::Arc<dyn RewriteProvider>,
    max_turns: usize,
}

impl QueryRewriter {
    pub fn new(provider: std::sync::Arc<dyn RewriteProvider>, max_turns: usize) -> Self {
        Self { provider, max_turns }
    }

    /// Rewrite `query` in the context of `history`. Empty history skips the
    /// provider entirely; provider failure falls back to the raw query.
    pub async fn rewrite(&self, history: &[Turn], query: &str) -> String {
        if history.is_empty() {
            return query.to_string();
        }

        let tail_start = history.len().saturating_sub(self.max_turns);
        let clipped: Vec<Turn> = history[tail_start..]
            .iter()
            .map(|turn| Turn {
                role: turn.role,
                text: clip(&turn.text),
            })
            .collect();

        match self.provider.rewrite(&clipped, query).await {
            Ok(rewritten) => {
                let rewritten = strip_quotes(rewritten.trim());
                if rewritten.is_empty() {
                    query.to_string()
                } else {
                    tracing::debug!(original = query, rewritten = %rewritten, "Query rewritten");
                    rewritten.to_string()
                }
            }
            Err(e) => {
                tracing::warn!("Query rewrite failed, using raw query: {}", e);
                query.to_string()
            }
        }
    }
}

/// Models often wrap the rewritten query in quotation marks
fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    if text.len() >= 2 {
        let stripped = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
        if let Some(inner) = stripped {
            return inner.trim();
        }
    }
    text
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_TURN_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_TURN_CHARS).collect()
}
