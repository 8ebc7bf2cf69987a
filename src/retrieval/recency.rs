//! Recency decay postprocessor
//!
//! Multiplies each candidate's fused score by an exponential half-life
//! decay: a source exactly one half-life old keeps 50% of its score.
//! Undated candidates are left untouched rather than penalized, and future
//! timestamps (clock skew) clamp to no decay.

use super::fusion::{sort_by_score, Candidate};
use chrono::{DateTime, Utc};

/// Apply the decay multiplier and re-sort by adjusted score
pub fn apply(candidates: &mut Vec<Candidate>, half_life_days: f32, now: DateTime<Utc>) {
    for candidate in candidates.iter_mut() {
        candidate.adjusted_score = candidate.fused_score
            * multiplier(candidate.source_timestamp, half_life_days, now);
    }
    sort_by_score(candidates, |c| c.adjusted_score);
}

/// Decay multiplier in (0, 1] for a candidate's timestamp
pub fn multiplier(
    timestamp: Option<DateTime<Utc>>,
    half_life_days: f32,
    now: DateTime<Utc>,
) -> f32 {
    let Some(ts) = timestamp else {
        return 1.0;
    };

    let age_days = (now - ts).num_seconds() as f32 / 86_400.0;
    if age_days <= 0.0 {
        return 1.0;
    }
    0.5_f32.powf(age_days / half_life_days)
}
