//! Content-based scorer: recommends items similar to what the user has
//! previously liked, saved, or rated highly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ContentBasedConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ContentId, ContentSummary, Explanation, RecommendationRequest, RecommendationResult, UserId,
    UserProfile,
};
use crate::ports::{ContentPort, InteractionPort};
use crate::scorers::{
    jaccard_similarity, positive_interaction_types, preference_weight, RecommendationAlgorithm,
};

const ALGORITHM_NAME: &str = "Content-Based Filtering";

/// Per-component similarity breakdown between a profile and one item
#[derive(Debug, Clone, Default)]
pub(crate) struct SimilarityBreakdown {
    pub tag_score: f64,
    pub category_score: f64,
    pub content_type_score: f64,
    pub text_score: f64,
    pub total_score: f64,
}

pub struct ContentBasedScorer {
    interactions: Arc<dyn InteractionPort>,
    content: Arc<dyn ContentPort>,
    config: ContentBasedConfig,
}

impl ContentBasedScorer {
    pub fn new(
        interactions: Arc<dyn InteractionPort>,
        content: Arc<dyn ContentPort>,
        config: ContentBasedConfig,
    ) -> Self {
        Self {
            interactions,
            content,
            config,
        }
    }

    /// Build the user's taste profile from positive interaction history.
    ///
    /// Each qualifying interaction contributes its content's tags,
    /// category, and type, weighted by recency decay and interaction
    /// strength.
    pub(crate) async fn build_profile(&self, user_id: UserId) -> EngineResult<UserProfile> {
        let history = self
            .interactions
            .get_user_interactions(user_id, Some(positive_interaction_types()))
            .await?;

        let now = Utc::now();
        let qualifying: Vec<_> = history.iter().filter(|i| i.is_positive()).collect();

        let content_ids: Vec<ContentId> = qualifying.iter().map(|i| i.content_id).collect();
        let summaries = self.content.get_content_summaries(content_ids).await?;
        let by_id: HashMap<ContentId, &ContentSummary> =
            summaries.iter().map(|s| (s.id, s)).collect();

        let weighted: Vec<(&ContentSummary, f64)> = qualifying
            .iter()
            .filter_map(|interaction| {
                by_id
                    .get(&interaction.content_id)
                    .map(|summary| (*summary, preference_weight(interaction, now)))
            })
            .collect();

        Ok(UserProfile::build(
            user_id,
            &weighted,
            self.config.min_interactions,
        ))
    }

    /// Similarity of one candidate to the profile:
    /// `0.4·tagJaccard + 0.3·categoryMatch + 0.2·typeMatch + 0.1·textOverlap`
    pub(crate) fn similarity(
        &self,
        profile: &UserProfile,
        content: &ContentSummary,
    ) -> SimilarityBreakdown {
        let tag_score = jaccard_similarity(&profile.preferred_tags, &content.tags);

        let category_score = match content.category_id {
            Some(category_id) if profile.preferred_categories.contains(&category_id) => 1.0,
            _ => 0.0,
        };

        let content_type_score = if profile
            .preferred_content_types
            .contains(&content.content_type)
        {
            1.0
        } else {
            0.0
        };

        // Cheap proxy for text similarity: tag overlap scaled down. True
        // text/embedding similarity is a declared non-goal.
        let text_score = if content.title.is_empty() && content.description.is_empty() {
            0.0
        } else {
            tag_score * 0.5
        };

        let total_score = tag_score * self.config.tag_weight
            + category_score * self.config.category_weight
            + content_type_score * self.config.content_type_weight
            + text_score * self.config.text_weight;

        SimilarityBreakdown {
            tag_score,
            category_score,
            content_type_score,
            text_score,
            total_score,
        }
    }

    async fn generate_inner(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let profile = self.build_profile(request.user_id).await?;

        if !profile.has_sufficient_data {
            return self.trending_fallback(request).await;
        }

        let candidates = self
            .content
            .get_content_for_recommendations(
                request.user_id,
                request.exclude_content_ids.clone(),
                self.config.candidate_limit,
            )
            .await?;

        if candidates.is_empty() {
            return Ok(RecommendationResult::empty(ALGORITHM_NAME, request.user_id));
        }

        let mut scored: Vec<(ContentId, f64)> = candidates
            .iter()
            .map(|content| (content.id, self.similarity(&profile, content).total_score))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.count);

        let (content_ids, scores): (Vec<_>, Vec<_>) = scored.into_iter().unzip();

        let mut metadata = HashMap::new();
        metadata.insert(
            "user_profile_tags".to_string(),
            json!(profile.preferred_tags.iter().take(10).collect::<Vec<_>>()),
        );
        metadata.insert(
            "user_profile_categories".to_string(),
            json!(profile.preferred_categories),
        );
        metadata.insert("total_candidates".to_string(), json!(candidates.len()));
        metadata.insert(
            "algorithm_params".to_string(),
            json!({
                "tag_weight": self.config.tag_weight,
                "category_weight": self.config.category_weight,
                "content_type_weight": self.config.content_type_weight,
                "text_weight": self.config.text_weight,
            }),
        );

        Ok(
            RecommendationResult::new(content_ids, scores, ALGORITHM_NAME, request.user_id)?
                .with_metadata(metadata),
        )
    }

    /// Trending fallback for users without enough history to profile
    async fn trending_fallback(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let trending_ids = self
            .interactions
            .get_trending_content_ids(self.config.fallback_window_days, request.count)
            .await?;

        // Floored: ranks past 10 would otherwise go negative
        let scores: Vec<f64> = (0..trending_ids.len())
            .map(|rank| (1.0 - rank as f64 * 0.1).max(0.0))
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert(
            "fallback_reason".to_string(),
            Value::String("insufficient_user_data".to_string()),
        );
        metadata.insert(
            "min_interactions_required".to_string(),
            json!(self.config.min_interactions),
        );

        Ok(RecommendationResult::new(
            trending_ids,
            scores,
            format!("{} (Trending Fallback)", ALGORITHM_NAME),
            request.user_id,
        )?
        .with_metadata(metadata))
    }
}

#[async_trait]
impl RecommendationAlgorithm for ContentBasedScorer {
    fn name(&self) -> &str {
        ALGORITHM_NAME
    }

    async fn generate(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        request.validate()?;

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "content_based_generate",
            request_id = %request_id,
            user_id = request.user_id,
            count = request.count,
        );

        match self.generate_inner(request).instrument(span).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(user_id = request.user_id, error = %e, "Content-based scoring failed");
                Ok(RecommendationResult::failed(
                    ALGORITHM_NAME,
                    request.user_id,
                    e.to_string(),
                ))
            }
        }
    }

    async fn explain(
        &self,
        user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation> {
        let profile = self.build_profile(user_id).await?;

        let with_stats = self
            .content
            .get_content_with_stats(content_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("content {}", content_id)))?;

        let content = with_stats.content;
        let breakdown = self.similarity(&profile, &content);

        let mut explanation = Explanation::new(
            content_id,
            "content_based",
            format!("Similarity to your taste profile: {:.2}", breakdown.total_score),
        );
        explanation.confidence = breakdown.total_score;

        if breakdown.tag_score > 0.3 {
            let common: Vec<&String> = profile
                .preferred_tags
                .iter()
                .filter(|tag| content.tags.contains(tag))
                .take(3)
                .collect();
            if !common.is_empty() {
                let tags = common
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                explanation.add_reason(
                    "tag_similarity",
                    breakdown.tag_score,
                    format!("Matches your interest in: {}", tags),
                );
            }
        }

        if breakdown.category_score > 0.5 {
            explanation.add_reason(
                "category_similarity",
                breakdown.category_score,
                "Similar to other content you've liked in this category".to_string(),
            );
        }

        if breakdown.content_type_score > 0.5 {
            explanation.add_reason(
                "content_type_similarity",
                breakdown.content_type_score,
                format!("Matches your preference for {} content", content.content_type),
            );
        }

        explanation.evidence.insert(
            "user_profile_summary".to_string(),
            json!({
                "total_interactions": profile.total_interactions,
                "top_tags": profile.preferred_tags.iter().take(5).collect::<Vec<_>>(),
                "top_categories": profile.preferred_categories.iter().take(3).collect::<Vec<_>>(),
            }),
        );
        explanation.evidence.insert(
            "similarity_factors".to_string(),
            json!({
                "tag_score": breakdown.tag_score,
                "category_score": breakdown.category_score,
                "content_type_score": breakdown.content_type_score,
                "text_score": breakdown.text_score,
                "total_score": breakdown.total_score,
            }),
        );

        Ok(explanation)
    }
}
