use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::models::{ContentId, UserId};

/// The engine's sole output artifact: ordered content ids with scores plus
/// provenance metadata.
///
/// Invariant: `content_ids` and `scores` always have the same length. The
/// constructors reject mismatches, so a `RecommendationResult` in hand is
/// always well-formed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub content_ids: Vec<ContentId>,
    pub scores: Vec<f64>,
    pub algorithm_name: String,
    /// 0 is permitted for non-personalized results (e.g. global trending)
    pub user_id: UserId,
    pub generated_at: DateTime<Utc>,
    /// Algorithm-specific diagnostics; informational only
    pub metadata: HashMap<String, Value>,
}

impl RecommendationResult {
    pub fn new(
        content_ids: Vec<ContentId>,
        scores: Vec<f64>,
        algorithm_name: impl Into<String>,
        user_id: UserId,
    ) -> EngineResult<Self> {
        if content_ids.len() != scores.len() {
            return Err(EngineError::InvalidResult(format!(
                "content_ids and scores must have same length ({} != {})",
                content_ids.len(),
                scores.len()
            )));
        }
        Ok(Self {
            content_ids,
            scores,
            algorithm_name: algorithm_name.into(),
            user_id,
            generated_at: Utc::now(),
            metadata: HashMap::new(),
        })
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// An empty result carrying only provenance; used when a scorer has
    /// nothing to recommend or has absorbed an internal failure.
    pub fn empty(algorithm_name: impl Into<String>, user_id: UserId) -> Self {
        Self {
            content_ids: Vec::new(),
            scores: Vec::new(),
            algorithm_name: algorithm_name.into(),
            user_id,
            generated_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// An empty result tagged with the failure reason that produced it
    pub fn failed(
        algorithm_name: impl Into<String>,
        user_id: UserId,
        reason: impl Into<String>,
    ) -> Self {
        let mut result = Self::empty(algorithm_name, user_id);
        result
            .metadata
            .insert("failure_reason".to_string(), Value::String(reason.into()));
        result
    }

    pub fn is_empty(&self) -> bool {
        self.content_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content_ids.len()
    }

    /// Iterate over (content_id, score) pairs in rank order
    pub fn entries(&self) -> impl Iterator<Item = (ContentId, f64)> + '_ {
        self.content_ids
            .iter()
            .copied()
            .zip(self.scores.iter().copied())
    }

    /// Top N entries by score descending. Returns everything (re-sorted)
    /// when fewer than N entries exist.
    pub fn top_n(&self, n: usize) -> (Vec<ContentId>, Vec<f64>) {
        let mut pairs: Vec<(ContentId, f64)> = self.entries().collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs.truncate(n);
        pairs.into_iter().unzip()
    }

    /// Scale scores so the maximum becomes exactly 1.0. No-op on empty
    /// results or when every score is zero.
    pub fn normalize_scores(&mut self) {
        let max = self.scores.iter().copied().fold(f64::MIN, f64::max);
        if max > 0.0 {
            for score in &mut self.scores {
                *score /= max;
            }
        }
    }
}

/// One human-readable reason supporting a recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplanationReason {
    /// Machine-readable reason kind (e.g. "tag_similarity")
    pub kind: String,
    /// Strength of this signal in [0, 1]
    pub strength: f64,
    pub description: String,
}

/// Explanation of why a content item was (or would be) recommended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub content_id: ContentId,
    pub algorithm: String,
    pub summary: String,
    pub reasons: Vec<ExplanationReason>,
    /// Overall confidence in [0, 1]
    pub confidence: f64,
    /// Contributing evidence (similar users, matched tags, metrics, ...)
    pub evidence: HashMap<String, Value>,
}

impl Explanation {
    pub fn new(
        content_id: ContentId,
        algorithm: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            content_id,
            algorithm: algorithm.into(),
            summary: summary.into(),
            reasons: Vec::new(),
            confidence: 0.0,
            evidence: HashMap::new(),
        }
    }

    pub fn add_reason(
        &mut self,
        kind: impl Into<String>,
        strength: f64,
        description: impl Into<String>,
    ) {
        self.reasons.push(ExplanationReason {
            kind: kind.into(),
            strength,
            description: description.into(),
        });
    }
}
