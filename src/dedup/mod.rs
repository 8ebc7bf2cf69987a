//! Content deduplication via BLAKE3 fingerprints of normalized text
//!
//! Normalization strips the volatile parts of re-sent content (quoted-reply
//! tails, whitespace variation, case) so near-identical re-sends of the same
//! email hash to the same fingerprint. The per-tenant existence lookup is the
//! ingestion pipeline's job; this module is a pure function over its input.

use crate::error::{CortexError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fingerprint of a document's normalized content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint {
    /// BLAKE3 hex digest of the normalized text
    pub hash: String,
    /// The normalized text the digest was computed over
    pub normalized: String,
}

/// Content deduplicator
pub struct Deduplicator {
    quoted_line: Regex,
    reply_marker: Regex,
    whitespace: Regex,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            // Quoted-reply lines ("> ..." and ">> ...")
            quoted_line: Regex::new(r"(?m)^\s*>.*$").expect("static regex"),
            // Everything from a reply/forward marker to the end of the text
            reply_marker: Regex::new(
                r"(?is)(^|\n)\s*(on .{1,120}? wrote:|-{2,}\s*original message\s*-{2,}|-{2,}\s*forwarded message\s*-{2,}).*$",
            )
            .expect("static regex"),
            whitespace: Regex::new(r"\s+").expect("static regex"),
        }
    }

    /// Compute the fingerprint of a document's text.
    ///
    /// Fails with `EmptyContent` when normalization leaves nothing to hash;
    /// such a document is non-ingestible.
    pub fn check(&self, text: &str) -> Result<ContentFingerprint> {
        let normalized = self.normalize(text);
        if normalized.is_empty() {
            return Err(CortexError::EmptyContent);
        }

        let hash = blake3::hash(normalized.as_bytes()).to_hex().to_string();
        Ok(ContentFingerprint { hash, normalized })
    }

    /// Normalize text for consistent hashing: drop quoted-reply boilerplate,
    /// lowercase, collapse whitespace runs, trim.
    pub fn normalize(&self, text: &str) -> String {
        let stripped = self.reply_marker.replace(text, "");
        let stripped = self.quoted_line.replace_all(&stripped, "");
        let lowered = stripped.to_lowercase();
        self.whitespace.replace_all(&lowered, " ").trim().to_string()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}
