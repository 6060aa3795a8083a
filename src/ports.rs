//! Read-only data ports.
//!
//! The engine never owns storage; it consumes interaction and content data
//! through these two traits. Implementations live with the collaborators
//! (database, cache, fixtures in tests) and every read is treated as a
//! point-in-time snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineResult;
use crate::models::{
    ContentId, ContentSummary, ContentWithStats, Interaction, InteractionType, SimilarUser,
    UserId, UserRecommendationData,
};

/// Access to user interaction history and interaction-derived aggregates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionPort: Send + Sync {
    /// Interactions of one user, optionally restricted to certain types
    async fn get_user_interactions(
        &self,
        user_id: UserId,
        types: Option<Vec<InteractionType>>,
    ) -> EngineResult<Vec<Interaction>>;

    /// Users with overlapping liked content, with similarity =
    /// common likes / |target's liked set|, ordered by similarity
    async fn get_similar_users(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> EngineResult<Vec<SimilarUser>>;

    /// Content ids trending over the last `days`, best first
    async fn get_trending_content_ids(
        &self,
        days: i64,
        limit: usize,
    ) -> EngineResult<Vec<ContentId>>;

    /// Per-user aggregates driving personalization decisions
    async fn get_user_recommendation_data(
        &self,
        user_id: UserId,
    ) -> EngineResult<UserRecommendationData>;

    /// All interactions in the half-open window [start, end); the trending
    /// scorer aggregates these into engagement scores
    async fn get_interactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> EngineResult<Vec<Interaction>>;
}

/// Access to content metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentPort: Send + Sync {
    /// Published candidate content excluding the given user's own items and
    /// the explicitly excluded ids
    async fn get_content_for_recommendations(
        &self,
        exclude_user_id: UserId,
        exclude_content_ids: Vec<ContentId>,
        limit: usize,
    ) -> EngineResult<Vec<ContentSummary>>;

    /// Content similar to the given item, best first
    async fn get_similar_content(
        &self,
        content_id: ContentId,
        limit: usize,
    ) -> EngineResult<Vec<ContentSummary>>;

    /// One content item with its engagement counters, if it exists
    async fn get_content_with_stats(
        &self,
        content_id: ContentId,
    ) -> EngineResult<Option<ContentWithStats>>;

    /// Batch metadata lookup; missing ids are silently absent from the
    /// returned list
    async fn get_content_summaries(
        &self,
        content_ids: Vec<ContentId>,
    ) -> EngineResult<Vec<ContentSummary>>;
}
