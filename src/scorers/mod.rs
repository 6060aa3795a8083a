//! Scoring strategies and the contract they share.

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    ContentId, Explanation, Interaction, InteractionType, RecommendationRequest,
    RecommendationResult, UserId,
};

mod collaborative;
mod content_based;
mod hybrid;
mod trending;

pub use collaborative::{CollaborativeMode, CollaborativeScorer};
pub use content_based::ContentBasedScorer;
pub use hybrid::{AbVariant, AlgorithmWeights, HybridScorer};
pub use trending::{TrendingScorer, TrendingVariant};

/// Capability interface every scoring strategy implements.
///
/// `generate` validates its request at the boundary (validation errors
/// propagate), then absorbs all internal failures into an empty result
/// tagged with `metadata["failure_reason"]` so that callers composing
/// several scorers can rely on partial-failure isolation.
#[async_trait]
pub trait RecommendationAlgorithm: Send + Sync {
    /// Human-readable provenance name
    fn name(&self) -> &str;

    async fn generate(&self, request: &RecommendationRequest)
        -> EngineResult<RecommendationResult>;

    async fn explain(
        &self,
        user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation>;
}

/// The four strategy kinds known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    ContentBased,
    Collaborative,
    Trending,
    Hybrid,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::ContentBased => "content_based",
            AlgorithmKind::Collaborative => "collaborative",
            AlgorithmKind::Trending => "trending",
            AlgorithmKind::Hybrid => "hybrid",
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content_based" => Ok(AlgorithmKind::ContentBased),
            "collaborative" => Ok(AlgorithmKind::Collaborative),
            "trending" => Ok(AlgorithmKind::Trending),
            "hybrid" => Ok(AlgorithmKind::Hybrid),
            other => Err(EngineError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Preference weight of an interaction: how strongly it signals that the
/// user values the content.
///
/// Likes 1.0, saves 1.2, shares 1.5; ratings scale linearly from 0.2 (one
/// star) to 1.0 (five stars). Anything else counts 0.5.
pub(crate) fn interaction_weight(
    interaction_type: InteractionType,
    rating: Option<f64>,
) -> f64 {
    let base = match interaction_type {
        InteractionType::Like => 1.0,
        InteractionType::Save => 1.2,
        InteractionType::Share => 1.5,
        InteractionType::Rate => 1.0,
        _ => 0.5,
    };

    if interaction_type == InteractionType::Rate {
        if let Some(rating) = rating {
            return base * ((rating - 1.0) / 4.0 * 0.8 + 0.2);
        }
    }

    base
}

/// Recency decay for interaction weighting: `exp(-days_since / 30)`.
/// Month-old interactions keep ~37% weight; ~90 days approaches zero but
/// never reaches it.
pub(crate) fn recency_weight(interacted_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days_ago = (now - interacted_at).num_days().max(0) as f64;
    (-days_ago / 30.0).exp()
}

/// Combined preference weight of one interaction
pub(crate) fn preference_weight(interaction: &Interaction, now: DateTime<Utc>) -> f64 {
    recency_weight(interaction.created_at, now)
        * interaction_weight(interaction.interaction_type, interaction.rating)
}

/// Jaccard similarity |A ∩ B| / |A ∪ B|; 0 when either side is empty
pub(crate) fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// The positive interaction types scorers filter on when reading history
pub(crate) fn positive_interaction_types() -> Vec<InteractionType> {
    vec![
        InteractionType::Like,
        InteractionType::Save,
        InteractionType::Rate,
    ]
}
