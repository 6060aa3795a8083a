use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod profile;
mod result;

pub use profile::UserProfile;
pub use result::{Explanation, ExplanationReason, RecommendationResult};

use crate::error::{EngineError, EngineResult};

/// Identifier type shared by users and content items
pub type UserId = i64;
pub type ContentId = i64;

/// Types of user-content interactions observed by the engine.
///
/// The engine never writes interactions; it consumes them as a read-only
/// point-in-time snapshot through the interaction port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Like,
    Save,
    Share,
    Rate,
    Comment,
}

/// A single user-content interaction (external, read-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub interaction_type: InteractionType,
    /// 1-5 stars, only present for `Rate` interactions
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    /// Positive-preference signal: likes, saves, and ratings of 4+ stars
    pub fn is_positive(&self) -> bool {
        match self.interaction_type {
            InteractionType::Like | InteractionType::Save => true,
            InteractionType::Rate => self.rating.map(|r| r >= 4.0).unwrap_or(false),
            _ => false,
        }
    }
}

/// Minimal content shape the engine needs to score and explain an item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentSummary {
    pub id: ContentId,
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub category_id: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub trending_score: f64,
}

/// Aggregate engagement counters for a content item
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentStats {
    pub views: u64,
    pub likes: u64,
    pub saves: u64,
    pub shares: u64,
    pub engagement_rate: f64,
}

/// A content item together with its engagement counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentWithStats {
    pub content: ContentSummary,
    pub stats: ContentStats,
}

/// A user similar to the target, as computed by the interaction port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarUser {
    pub user_id: UserId,
    pub similarity_score: f64,
}

/// Per-user aggregates used by the hybrid orchestrator to pick weights
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserRecommendationData {
    pub total_interactions: u64,
    pub preferred_content_types: Vec<String>,
    /// Interaction counts keyed by type name (e.g. "like_count")
    pub interaction_summary: HashMap<String, u64>,
}

/// Request-scoped context supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecommendationContext {
    /// Local hour of day (0-23), used for peak-hours weight adjustment
    pub current_hour: Option<u32>,
}

/// A validated recommendation request.
///
/// Validation happens at the call boundary; scorers can assume the
/// invariants hold once a request reaches them.
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    pub count: usize,
    pub exclude_content_ids: Vec<ContentId>,
    pub context: RecommendationContext,
}

/// Maximum recommendations a single request may ask for
pub const MAX_RECOMMENDATIONS: usize = 100;

impl RecommendationRequest {
    pub fn new(user_id: UserId, count: usize) -> Self {
        Self {
            user_id,
            count,
            exclude_content_ids: Vec::new(),
            context: RecommendationContext::default(),
        }
    }

    pub fn with_excluded(mut self, exclude_content_ids: Vec<ContentId>) -> Self {
        self.exclude_content_ids = exclude_content_ids;
        self
    }

    pub fn with_context(mut self, context: RecommendationContext) -> Self {
        self.context = context;
        self
    }

    /// Fail-fast precondition checks; never silently clamps.
    pub fn validate(&self) -> EngineResult<()> {
        if self.user_id < 0 {
            return Err(EngineError::Validation(
                "user_id must be a non-negative integer".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(EngineError::Validation(
                "count must be a positive integer".to_string(),
            ));
        }
        if self.count > MAX_RECOMMENDATIONS {
            return Err(EngineError::Validation(format!(
                "count cannot exceed {}",
                MAX_RECOMMENDATIONS
            )));
        }
        if let Some(hour) = self.context.current_hour {
            if hour > 23 {
                return Err(EngineError::Validation(
                    "context.current_hour must be in 0-23".to_string(),
                ));
            }
        }
        Ok(())
    }
}
