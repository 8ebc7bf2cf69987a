//! Score fusion for hybrid search
//!
//! Semantic and keyword scores live on different scales (cosine similarity
//! vs BM25), so each result list is min-max normalized to [0, 1] before the
//! weighted sum. A chunk found by only one signal contributes 0 for the
//! other; it is never dropped.

use crate::index::{KeywordHit, SearchHit};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// A chunk candidate flowing through fusion, recency, and reranking
#[derive(Debug, Clone)]
pub struct Candidate {
    pub point_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub text: String,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
    pub semantic_score: Option<f32>,
    pub keyword_score: Option<f32>,
    pub fused_score: f32,
    /// Fused score after the recency multiplier
    pub adjusted_score: f32,
    pub rerank_score: Option<f32>,
}

/// Merge both result lists into fused candidates, sorted by fused score
/// descending. Ties break toward the more recent source timestamp; a missing
/// timestamp loses to any present one.
pub fn fuse(
    semantic: Vec<SearchHit>,
    keyword: Vec<KeywordHit>,
    semantic_weight: f32,
    keyword_weight: f32,
) -> Vec<Candidate> {
    let semantic_norm = normalize(semantic.iter().map(|h| h.score));
    let keyword_norm = normalize(keyword.iter().map(|h| h.score));

    let mut by_point: HashMap<Uuid, Candidate> = HashMap::new();

    for (hit, score) in semantic.into_iter().zip(semantic_norm) {
        by_point.insert(
            hit.point_id,
            Candidate {
                point_id: hit.point_id,
                document_id: hit.document_id,
                chunk_index: hit.chunk_index,
                text: hit.text,
                source_timestamp: hit.source_timestamp,
                metadata: hit.metadata,
                semantic_score: Some(score),
                keyword_score: None,
                fused_score: 0.0,
                adjusted_score: 0.0,
                rerank_score: None,
            },
        );
    }

    for (hit, score) in keyword.into_iter().zip(keyword_norm) {
        match by_point.get_mut(&hit.point_id) {
            Some(candidate) => {
                candidate.keyword_score = Some(score);
            }
            None => {
                by_point.insert(
                    hit.point_id,
                    Candidate {
                        point_id: hit.point_id,
                        document_id: hit.document_id,
                        chunk_index: hit.chunk_index,
                        text: hit.text,
                        source_timestamp: hit.source_timestamp,
                        metadata: HashMap::new(),
                        semantic_score: None,
                        keyword_score: Some(score),
                        fused_score: 0.0,
                        adjusted_score: 0.0,
                        rerank_score: None,
                    },
                );
            }
        }
    }

    let mut candidates: Vec<Candidate> = by_point
        .into_values()
        .map(|mut c| {
            let semantic = c.semantic_score.unwrap_or(0.0);
            let keyword = c.keyword_score.unwrap_or(0.0);
            c.fused_score = semantic_weight * semantic + keyword_weight * keyword;
            c.adjusted_score = c.fused_score;
            c
        })
        .collect();

    sort_by_score(&mut candidates, |c| c.fused_score);
    candidates
}

/// Keep only the best-scoring chunk per document, preserving order
pub fn dedup_by_document(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.document_id))
        .collect()
}

/// Sort descending by score, breaking ties toward the most recent timestamp
pub fn sort_by_score<F>(candidates: &mut [Candidate], score: F)
where
    F: Fn(&Candidate) -> f32,
{
    candidates.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.source_timestamp.cmp(&a.source_timestamp))
    });
}

/// Min-max normalize to [0, 1]. A constant list (including a single score)
/// normalizes to 1.0 so a lone hit keeps full weight.
fn normalize(scores: impl Iterator<Item = f32> + Clone) -> Vec<f32> {
    let min = scores.clone().fold(f32::INFINITY, f32::min);
    let max = scores.clone().fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let range = max - min;

    scores
        .map(|s| {
            if range == 0.0 {
                1.0
            } else {
                (s - min) / range
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn semantic_hit(point: Uuid, doc: Uuid, score: f32) -> SearchHit {
        SearchHit {
            point_id: point,
            document_id: doc,
            chunk_index: 0,
            text: "text".to_string(),
            score,
            source_timestamp: None,
            metadata: HashMap::new(),
        }
    }

    fn keyword_hit(point: Uuid, doc: Uuid, score: f32) -> KeywordHit {
        KeywordHit {
            point_id: point,
            document_id: doc,
            chunk_index: 0,
            text: "text".to_string(),
            score,
            source_timestamp: None,
        }
    }

    #[test]
    fn test_chunk_in_both_lists_gets_weighted_sum() {
        let point = Uuid::new_v4();
        let doc = Uuid::new_v4();
        let other_point = Uuid::new_v4();
        let other_doc = Uuid::new_v4();

        let fused = fuse(
            vec![
                semantic_hit(point, doc, 0.9),
                semantic_hit(other_point, other_doc, 0.1),
            ],
            vec![
                keyword_hit(point, doc, 12.0),
                keyword_hit(other_point, other_doc, 2.0),
            ],
            0.7,
            0.3,
        );

        // Best in both lists: 0.7 * 1.0 + 0.3 * 1.0
        assert_eq!(fused[0].point_id, point);
        assert!((fused[0].fused_score - 1.0).abs() < 1e-6);
        // Worst in both: normalizes to 0
        assert!((fused[1].fused_score - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_signal_contributes_zero_for_missing() {
        let semantic_only = Uuid::new_v4();
        let doc_a = Uuid::new_v4();
        let keyword_only = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        let fused = fuse(
            vec![semantic_hit(semantic_only, doc_a, 0.8)],
            vec![keyword_hit(keyword_only, doc_b, 5.0)],
            0.7,
            0.3,
        );

        assert_eq!(fused.len(), 2);
        // Lone hits normalize to 1.0 within their own list
        let semantic_candidate = fused.iter().find(|c| c.point_id == semantic_only).unwrap();
        let keyword_candidate = fused.iter().find(|c| c.point_id == keyword_only).unwrap();
        assert!((semantic_candidate.fused_score - 0.7).abs() < 1e-6);
        assert!((keyword_candidate.fused_score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_toward_recent_timestamp() {
        let old_point = Uuid::new_v4();
        let new_point = Uuid::new_v4();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        let mut old_hit = semantic_hit(old_point, doc_a, 0.5);
        old_hit.source_timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut new_hit = semantic_hit(new_point, doc_b, 0.5);
        new_hit.source_timestamp = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());

        let fused = fuse(vec![old_hit, new_hit], vec![], 1.0, 0.0);
        assert_eq!(fused[0].point_id, new_point);
    }

    #[test]
    fn test_missing_timestamp_loses_tie() {
        let dated = Uuid::new_v4();
        let undated = Uuid::new_v4();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();

        let mut dated_hit = semantic_hit(dated, doc_a, 0.5);
        dated_hit.source_timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let undated_hit = semantic_hit(undated, doc_b, 0.5);

        let fused = fuse(vec![dated_hit, undated_hit], vec![], 1.0, 0.0);
        assert_eq!(fused[0].point_id, dated);
    }

    #[test]
    fn test_dedup_keeps_best_chunk_per_document() {
        let doc = Uuid::new_v4();
        let other = Uuid::new_v4();
        let fused = fuse(
            vec![
                semantic_hit(Uuid::new_v4(), doc, 0.9),
                semantic_hit(Uuid::new_v4(), doc, 0.5),
                semantic_hit(Uuid::new_v4(), other, 0.7),
            ],
            vec![],
            1.0,
            0.0,
        );

        let deduped = dedup_by_document(fused);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].document_id, doc);
        assert!((deduped[0].semantic_score.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_inputs_fuse_to_empty() {
        let fused = fuse(vec![], vec![], 0.7, 0.3);
        assert!(fused.is_empty());
    }
}
