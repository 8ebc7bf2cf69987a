//! Quality/spam gate for candidate documents
//!
//! Cheap heuristics run first and short-circuit; the model-based classifier
//! is only consulted for documents that pass them. A rejection here is a
//! terminal outcome for the document, not an error: the ingestion pipeline
//! records the reason and moves on.

use crate::config::IngestionConfig;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier provider failed: {0}")]
    Provider(String),
}

/// Model-based spam classification of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Business,
    Spam,
}

/// Classifier capability seam. The real implementation calls an LLM; tests
/// and degraded deployments use none at all.
#[async_trait]
pub trait QualityClassifier: Send + Sync {
    async fn classify(&self, title: &str, text: &str) -> Result<Classification, ClassifierError>;
}

/// Why a document was rejected before indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Nothing left after normalization
    EmptyContent,
    /// Below the minimum text length
    TooShort,
    /// Mostly links, little prose
    LinkHeavy,
    /// Newsletter/marketing boilerplate detected
    Boilerplate,
    /// Model-based classifier voted spam
    Spam,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::EmptyContent => "empty_content",
            RejectReason::TooShort => "too_short",
            RejectReason::LinkHeavy => "link_heavy",
            RejectReason::Boilerplate => "boilerplate",
            RejectReason::Spam => "spam",
        };
        f.write_str(s)
    }
}

/// Outcome of the quality gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityVerdict {
    Accept,
    Reject(RejectReason),
}

/// Sender/title substrings that mark a document as obviously business and
/// skip the classifier call entirely
const BUSINESS_INDICATORS: &[&str] = &[
    "invoice", "quote", "proposal", "contract", "order", "meeting", "project", "delivery",
    "shipment",
];

/// Boilerplate phrases typical of newsletters and bulk mail
const BOILERPLATE_PHRASES: &[&str] = &[
    "unsubscribe",
    "view this email in your browser",
    "you are receiving this email because",
    "update your preferences",
    "no longer wish to receive",
];

/// Quality/spam filter combining heuristics with an optional classifier
pub struct QualityFilter {
    min_text_len: usize,
    max_link_ratio: f32,
    classifier: Option<Arc<dyn QualityClassifier>>,
    url: Regex,
}

impl QualityFilter {
    pub fn new(config: &IngestionConfig, classifier: Option<Arc<dyn QualityClassifier>>) -> Self {
        let classifier = if config.classifier_enabled {
            classifier
        } else {
            None
        };

        Self {
            min_text_len: config.min_text_len,
            max_link_ratio: config.max_link_ratio,
            classifier,
            url: Regex::new(r"https?://\S+").expect("static regex"),
        }
    }

    /// Assess a candidate document for inclusion. Heuristic rejections
    /// short-circuit before the classifier is invoked (cost control);
    /// classifier failures degrade to accept rather than blocking ingestion.
    pub async fn assess(&self, title: &str, text: &str, sender: Option<&str>) -> QualityVerdict {
        let trimmed = text.trim();

        if trimmed.chars().count() < self.min_text_len {
            return QualityVerdict::Reject(RejectReason::TooShort);
        }

        if self.link_ratio(trimmed) > self.max_link_ratio {
            return QualityVerdict::Reject(RejectReason::LinkHeavy);
        }

        let lowered = trimmed.to_lowercase();
        let boilerplate_hits = BOILERPLATE_PHRASES
            .iter()
            .filter(|p| lowered.contains(*p))
            .count();
        if boilerplate_hits >= 2 {
            return QualityVerdict::Reject(RejectReason::Boilerplate);
        }

        // Obvious business content never needs a model call
        if self.has_business_indicator(title, sender) {
            return QualityVerdict::Accept;
        }

        if let Some(classifier) = &self.classifier {
            match classifier.classify(title, trimmed).await {
                Ok(Classification::Spam) => {
                    return QualityVerdict::Reject(RejectReason::Spam);
                }
                Ok(Classification::Business) => {}
                Err(e) => {
                    // When in doubt, keep the document
                    tracing::warn!("Quality classifier failed, accepting document: {}", e);
                }
            }
        }

        QualityVerdict::Accept
    }

    fn has_business_indicator(&self, title: &str, sender: Option<&str>) -> bool {
        let title = title.to_lowercase();
        let sender = sender.map(str::to_lowercase).unwrap_or_default();
        BUSINESS_INDICATORS
            .iter()
            .any(|ind| title.contains(ind) || sender.contains(ind))
    }

    /// Fraction of the text occupied by URLs
    fn link_ratio(&self, text: &str) -> f32 {
        let total = text.chars().count();
        if total == 0 {
            return 0.0;
        }
        let link_chars: usize = self
            .url
            .find_iter(text)
            .map(|m| m.as_str().chars().count())
            .sum();
        link_chars as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    struct SpamClassifier;

    #[async_trait]
    impl QualityClassifier for SpamClassifier {
        async fn classify(&self, _: &str, _: &str) -> Result<Classification, ClassifierError> {
            Ok(Classification::Spam)
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl QualityClassifier for FailingClassifier {
        async fn classify(&self, _: &str, _: &str) -> Result<Classification, ClassifierError> {
            Err(ClassifierError::Provider("unreachable".to_string()))
        }
    }

    fn filter_with(classifier: Option<Arc<dyn QualityClassifier>>) -> QualityFilter {
        let mut config = Config::default().ingestion;
        config.classifier_enabled = classifier.is_some();
        QualityFilter::new(&config, classifier)
    }

    #[tokio::test]
    async fn test_short_text_rejected() {
        let filter = filter_with(None);
        let verdict = filter.assess("Hi", "ok thanks", None).await;
        assert_eq!(verdict, QualityVerdict::Reject(RejectReason::TooShort));
    }

    #[tokio::test]
    async fn test_link_heavy_rejected() {
        let filter = filter_with(None);
        let text = "click https://example.com/a/very/long/promotional/link/that/dominates/this/text/entirely/x";
        let verdict = filter.assess("Deals", text, None).await;
        assert_eq!(verdict, QualityVerdict::Reject(RejectReason::LinkHeavy));
    }

    #[tokio::test]
    async fn test_boilerplate_rejected() {
        let filter = filter_with(None);
        let text = "Weekly deals for you! Click below to shop. \
                    Unsubscribe here if you no longer wish to receive these messages. \
                    View this email in your browser.";
        let verdict = filter.assess("Newsletter", text, None).await;
        assert_eq!(verdict, QualityVerdict::Reject(RejectReason::Boilerplate));
    }

    #[tokio::test]
    async fn test_plain_business_text_accepted() {
        let filter = filter_with(None);
        let text = "The supplier confirmed the steel delivery for next Thursday morning.";
        let verdict = filter.assess("Delivery update", text, None).await;
        assert_eq!(verdict, QualityVerdict::Accept);
    }

    #[tokio::test]
    async fn test_business_indicator_skips_classifier() {
        // SpamClassifier would reject, but the indicator fast path wins
        let filter = filter_with(Some(Arc::new(SpamClassifier)));
        let text = "Please find the invoice for March attached to this message.";
        let verdict = filter.assess("Invoice #4211", text, None).await;
        assert_eq!(verdict, QualityVerdict::Accept);
    }

    #[tokio::test]
    async fn test_classifier_spam_rejected() {
        let filter = filter_with(Some(Arc::new(SpamClassifier)));
        let text = "You have been selected for an exclusive prize, act now before midnight.";
        let verdict = filter.assess("Congratulations", text, None).await;
        assert_eq!(verdict, QualityVerdict::Reject(RejectReason::Spam));
    }

    #[tokio::test]
    async fn test_classifier_failure_accepts() {
        let filter = filter_with(Some(Arc::new(FailingClassifier)));
        let text = "A long enough message that passes every heuristic check easily.";
        let verdict = filter.assess("Status", text, None).await;
        assert_eq!(verdict, QualityVerdict::Accept);
    }
}
