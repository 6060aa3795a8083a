//! Collaborative-filtering scorer with user-based and item-based modes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::CollaborativeConfig;
use crate::error::EngineResult;
use crate::models::{
    ContentId, ContentSummary, Explanation, Interaction, RecommendationRequest,
    RecommendationResult, UserId,
};
use crate::ports::{ContentPort, InteractionPort};
use crate::scorers::{
    interaction_weight, jaccard_similarity, positive_interaction_types, RecommendationAlgorithm,
};

const ALGORITHM_NAME: &str = "Collaborative Filtering";

/// Similarity floor so that port-nominated candidates are never fully
/// discarded when feature overlap is zero
const MIN_ITEM_SIMILARITY: f64 = 0.05;

/// Which collaborative strategy a scorer instance runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaborativeMode {
    /// "Users who liked what you liked also liked..."
    UserBased,
    /// "Items similar to what you liked..."
    ItemBased,
}

pub struct CollaborativeScorer {
    interactions: Arc<dyn InteractionPort>,
    content: Arc<dyn ContentPort>,
    config: CollaborativeConfig,
    mode: CollaborativeMode,
}

impl CollaborativeScorer {
    pub fn new(
        interactions: Arc<dyn InteractionPort>,
        content: Arc<dyn ContentPort>,
        config: CollaborativeConfig,
        mode: CollaborativeMode,
    ) -> Self {
        Self {
            interactions,
            content,
            config,
            mode,
        }
    }

    /// Item-item similarity from content features: tag overlap dominates,
    /// category and type matches refine. Floored so every suggested pair
    /// keeps a minimal affinity.
    pub(crate) fn item_similarity(
        source: Option<&ContentSummary>,
        candidate: &ContentSummary,
    ) -> f64 {
        let source = match source {
            Some(source) => source,
            None => return MIN_ITEM_SIMILARITY,
        };

        let tag_score = jaccard_similarity(&source.tags, &candidate.tags);
        let category_score = match (source.category_id, candidate.category_id) {
            (Some(a), Some(b)) if a == b => 1.0,
            _ => 0.0,
        };
        let type_score = if source.content_type == candidate.content_type {
            1.0
        } else {
            0.0
        };

        (0.6 * tag_score + 0.25 * category_score + 0.15 * type_score).max(MIN_ITEM_SIMILARITY)
    }

    async fn generate_inner(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let history = self
            .interactions
            .get_user_interactions(request.user_id, Some(positive_interaction_types()))
            .await?;

        if history.len() < self.config.min_interactions {
            return self.popular_fallback(request).await;
        }

        match self.mode {
            CollaborativeMode::UserBased => self.user_based(request, &history).await,
            CollaborativeMode::ItemBased => self.item_based(request, &history).await,
        }
    }

    async fn user_based(
        &self,
        request: &RecommendationRequest,
        _history: &[Interaction],
    ) -> EngineResult<RecommendationResult> {
        let similar_users = self
            .interactions
            .get_similar_users(request.user_id, self.config.max_similar_users)
            .await?;

        if similar_users.is_empty() {
            return self.popular_fallback(request).await;
        }

        // Everything the target already touched is off the table
        let target_history = self
            .interactions
            .get_user_interactions(request.user_id, None)
            .await?;
        let mut seen: HashSet<ContentId> =
            target_history.iter().map(|i| i.content_id).collect();
        seen.extend(request.exclude_content_ids.iter().copied());

        let mut scores: HashMap<ContentId, f64> = HashMap::new();
        let mut recommenders: HashMap<ContentId, Vec<Value>> = HashMap::new();

        for similar_user in &similar_users {
            let their_history = self
                .interactions
                .get_user_interactions(similar_user.user_id, Some(positive_interaction_types()))
                .await?;

            for interaction in &their_history {
                if seen.contains(&interaction.content_id) {
                    continue;
                }

                let weight =
                    interaction_weight(interaction.interaction_type, interaction.rating);
                *scores.entry(interaction.content_id).or_insert(0.0) +=
                    similar_user.similarity_score * weight;

                recommenders
                    .entry(interaction.content_id)
                    .or_default()
                    .push(json!({
                        "user_id": similar_user.user_id,
                        "similarity": similar_user.similarity_score,
                        "interaction_type": interaction.interaction_type,
                    }));
            }
        }

        let total_candidates = scores.len();
        let mut ranked: Vec<(ContentId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(request.count);

        let (content_ids, scores): (Vec<_>, Vec<_>) = ranked.into_iter().unzip();

        let avg_similarity = similar_users
            .iter()
            .map(|u| u.similarity_score)
            .sum::<f64>()
            / similar_users.len() as f64;

        let mut metadata = HashMap::new();
        metadata.insert("method".to_string(), json!("user_based"));
        metadata.insert(
            "similar_users_count".to_string(),
            json!(similar_users.len()),
        );
        metadata.insert("avg_similarity".to_string(), json!(avg_similarity));
        metadata.insert("total_candidates".to_string(), json!(total_candidates));
        metadata.insert(
            "recommender_details".to_string(),
            json!(content_ids
                .iter()
                .take(5)
                .map(|id| {
                    let detail: Vec<Value> = recommenders
                        .get(id)
                        .map(|list| list.iter().take(3).cloned().collect())
                        .unwrap_or_default();
                    (id.to_string(), detail)
                })
                .collect::<HashMap<String, Vec<Value>>>()),
        );

        let mut result = RecommendationResult::new(
            content_ids,
            scores,
            format!("{} (User-Based)", ALGORITHM_NAME),
            request.user_id,
        )?
        .with_metadata(metadata);
        result.normalize_scores();

        Ok(result)
    }

    async fn item_based(
        &self,
        request: &RecommendationRequest,
        history: &[Interaction],
    ) -> EngineResult<RecommendationResult> {
        let mut seen: HashSet<ContentId> = history.iter().map(|i| i.content_id).collect();
        seen.extend(request.exclude_content_ids.iter().copied());

        let source_ids: Vec<ContentId> = history.iter().map(|i| i.content_id).collect();
        let source_summaries = self.content.get_content_summaries(source_ids).await?;
        let sources_by_id: HashMap<ContentId, &ContentSummary> =
            source_summaries.iter().map(|s| (s.id, s)).collect();

        let mut scores: HashMap<ContentId, f64> = HashMap::new();
        let mut similarity_details: HashMap<ContentId, Vec<Value>> = HashMap::new();

        for interaction in history {
            let similar = self
                .content
                .get_similar_content(interaction.content_id, self.config.similar_content_limit)
                .await?;

            let preference =
                interaction_weight(interaction.interaction_type, interaction.rating);
            let source = sources_by_id.get(&interaction.content_id).copied();

            for candidate in &similar {
                if seen.contains(&candidate.id) {
                    continue;
                }

                let similarity = Self::item_similarity(source, candidate);
                *scores.entry(candidate.id).or_insert(0.0) += preference * similarity;

                similarity_details
                    .entry(candidate.id)
                    .or_default()
                    .push(json!({
                        "source_content_id": interaction.content_id,
                        "similarity": similarity,
                        "user_preference": preference,
                    }));
            }
        }

        let total_candidates = scores.len();
        let mut ranked: Vec<(ContentId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(request.count);

        let (content_ids, scores): (Vec<_>, Vec<_>) = ranked.into_iter().unzip();

        let mut metadata = HashMap::new();
        metadata.insert("method".to_string(), json!("item_based"));
        metadata.insert("user_liked_content_count".to_string(), json!(history.len()));
        metadata.insert("total_candidates".to_string(), json!(total_candidates));
        metadata.insert(
            "similarity_details".to_string(),
            json!(content_ids
                .iter()
                .take(5)
                .map(|id| {
                    let detail: Vec<Value> = similarity_details
                        .get(id)
                        .map(|list| list.iter().take(3).cloned().collect())
                        .unwrap_or_default();
                    (id.to_string(), detail)
                })
                .collect::<HashMap<String, Vec<Value>>>()),
        );

        let mut result = RecommendationResult::new(
            content_ids,
            scores,
            format!("{} (Item-Based)", ALGORITHM_NAME),
            request.user_id,
        )?
        .with_metadata(metadata);
        result.normalize_scores();

        Ok(result)
    }

    /// Fallback to longer-window popular content for thin histories
    async fn popular_fallback(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let trending_ids = self
            .interactions
            .get_trending_content_ids(self.config.fallback_window_days, request.count)
            .await?;

        // Floored: ranks past 20 would otherwise go negative
        let scores: Vec<f64> = (0..trending_ids.len())
            .map(|rank| (1.0 - rank as f64 * 0.05).max(0.0))
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert(
            "fallback_reason".to_string(),
            Value::String("insufficient_interaction_data".to_string()),
        );
        metadata.insert(
            "min_interactions_required".to_string(),
            json!(self.config.min_interactions),
        );

        Ok(RecommendationResult::new(
            trending_ids,
            scores,
            format!("{} (Popular Fallback)", ALGORITHM_NAME),
            request.user_id,
        )?
        .with_metadata(metadata))
    }

    async fn explain_user_based(
        &self,
        user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation> {
        let similar_users = self
            .interactions
            .get_similar_users(user_id, self.config.max_similar_users)
            .await?;

        let mut recommending = Vec::new();
        for similar_user in similar_users.iter().take(10) {
            let their_history = self
                .interactions
                .get_user_interactions(similar_user.user_id, Some(positive_interaction_types()))
                .await?;

            if let Some(interaction) = their_history
                .iter()
                .find(|i| i.content_id == content_id)
            {
                recommending.push(json!({
                    "user_id": similar_user.user_id,
                    "similarity_score": similar_user.similarity_score,
                    "interaction_type": interaction.interaction_type,
                    "rating": interaction.rating,
                }));
            }
        }

        let avg_similarity = if recommending.is_empty() {
            0.0
        } else {
            recommending
                .iter()
                .filter_map(|v| v["similarity_score"].as_f64())
                .sum::<f64>()
                / recommending.len() as f64
        };

        let mut explanation = Explanation::new(
            content_id,
            "collaborative_user_based",
            format!(
                "Recommended because {} users with similar tastes liked this content",
                recommending.len()
            ),
        );
        explanation.confidence = avg_similarity.min(1.0);
        if !recommending.is_empty() {
            explanation.add_reason(
                "similar_users",
                explanation.confidence,
                format!(
                    "{} similar users interacted positively with this item",
                    recommending.len()
                ),
            );
        }
        explanation
            .evidence
            .insert("similar_users_count".to_string(), json!(recommending.len()));
        explanation.evidence.insert(
            "recommending_users".to_string(),
            json!(recommending.into_iter().take(5).collect::<Vec<_>>()),
        );

        Ok(explanation)
    }

    async fn explain_item_based(
        &self,
        user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation> {
        let history = self
            .interactions
            .get_user_interactions(user_id, Some(positive_interaction_types()))
            .await?;

        let mut ids: Vec<ContentId> = history.iter().map(|i| i.content_id).collect();
        ids.push(content_id);
        let summaries = self.content.get_content_summaries(ids).await?;
        let by_id: HashMap<ContentId, &ContentSummary> =
            summaries.iter().map(|s| (s.id, s)).collect();

        let mut evidence = Vec::new();
        let mut best_similarity: f64 = 0.0;

        if let Some(target) = by_id.get(&content_id).copied() {
            for interaction in &history {
                let source = by_id.get(&interaction.content_id).copied();
                let similarity = Self::item_similarity(source, target);

                if similarity > 0.3 {
                    best_similarity = best_similarity.max(similarity);
                    evidence.push(json!({
                        "content_id": interaction.content_id,
                        "similarity_score": similarity,
                        "user_interaction": interaction.interaction_type,
                        "user_rating": interaction.rating,
                    }));
                }
            }
        }

        let mut explanation = Explanation::new(
            content_id,
            "collaborative_item_based",
            format!(
                "Recommended because it's similar to {} items you've liked",
                evidence.len()
            ),
        );
        explanation.confidence = best_similarity.min(1.0);
        if !evidence.is_empty() {
            explanation.add_reason(
                "similar_items",
                explanation.confidence,
                format!("Shares features with {} items in your history", evidence.len()),
            );
        }
        explanation
            .evidence
            .insert("similar_items_count".to_string(), json!(evidence.len()));
        explanation.evidence.insert(
            "similar_items".to_string(),
            json!(evidence.into_iter().take(3).collect::<Vec<_>>()),
        );

        Ok(explanation)
    }
}

#[async_trait]
impl RecommendationAlgorithm for CollaborativeScorer {
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
            "collaborative_generate",
            request_id = %request_id,
            user_id = request.user_id,
            count = request.count,
            mode = ?self.mode,
        );

        match self.generate_inner(request).instrument(span).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(user_id = request.user_id, error = %e, "Collaborative scoring failed");
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
        match self.mode {
            CollaborativeMode::UserBased => self.explain_user_based(user_id, content_id).await,
            CollaborativeMode::ItemBased => self.explain_item_based(user_id, content_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InteractionType, SimilarUser};
    use crate::ports::{MockContentPort, MockInteractionPort};
    use chrono::Utc;

    fn interaction(
        user_id: UserId,
        content_id: ContentId,
        interaction_type: InteractionType,
        rating: Option<f64>,
    ) -> Interaction {
        Interaction {
            user_id,
            content_id,
            interaction_type,
            rating,
            created_at: Utc::now(),
        }
    }

    fn likes(user_id: UserId, content_ids: &[ContentId]) -> Vec<Interaction> {
        content_ids
            .iter()
            .map(|&id| interaction(user_id, id, InteractionType::Like, None))
            .collect()
    }

    fn summary(id: ContentId, tags: &[&str], category: Option<i64>) -> ContentSummary {
        ContentSummary {
            id,
            title: format!("content {}", id),
            description: String::new(),
            content_type: "article".to_string(),
            category_id: category,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
            trending_score: 0.0,
        }
    }

    fn scorer(
        interactions: MockInteractionPort,
        content: MockContentPort,
        mode: CollaborativeMode,
    ) -> CollaborativeScorer {
        CollaborativeScorer::new(
            Arc::new(interactions),
            Arc::new(content),
            CollaborativeConfig::default(),
            mode,
        )
    }

    #[tokio::test]
    async fn test_thin_history_falls_back_to_popular() {
        let mut interactions = MockInteractionPort::new();
        interactions
            .expect_get_user_interactions()
            .returning(|user_id, _| Ok(likes(user_id, &[1, 2]))); // below the gate of 5
        interactions
            .expect_get_trending_content_ids()
            .withf(|days, _| *days == 30)
            .returning(|_, _| Ok(vec![50, 51]));

        let result = scorer(interactions, MockContentPort::new(), CollaborativeMode::UserBased)
            .generate(&RecommendationRequest::new(1, 5))
            .await
            .unwrap();

        assert_eq!(result.content_ids, vec![50, 51]);
        assert_eq!(result.scores, vec![1.0, 0.95]);
        assert_eq!(
            result.metadata["fallback_reason"],
            Value::String("insufficient_interaction_data".to_string())
        );
    }

    #[tokio::test]
    async fn test_fallback_scores_never_go_negative() {
        let mut interactions = MockInteractionPort::new();
        interactions
            .expect_get_user_interactions()
            .returning(|_, _| Ok(vec![]));
        interactions
            .expect_get_trending_content_ids()
            .returning(|_, limit| Ok((0..limit as ContentId).collect()));

        let result = scorer(interactions, MockContentPort::new(), CollaborativeMode::UserBased)
            .generate(&RecommendationRequest::new(1, 25))
            .await
            .unwrap();

        assert_eq!(result.len(), 25);
        assert!(result.scores.iter().all(|s| (0.0..=1.0).contains(s)));
        // Rank 20 onward sits at the floor
        assert_eq!(result.scores[20], 0.0);
        assert_eq!(result.scores[24], 0.0);
    }

    #[tokio::test]
    async fn test_user_based_scores_and_normalizes() {
        let mut interactions = MockInteractionPort::new();
        // Target user 1 liked 1-5; similar users 2 and 3 like other content
        interactions
            .expect_get_user_interactions()
            .returning(|user_id, _| match user_id {
                1 => Ok(likes(1, &[1, 2, 3, 4, 5])),
                2 => Ok(likes(2, &[10, 11])),
                3 => Ok(vec![interaction(3, 10, InteractionType::Save, None)]),
                _ => Ok(vec![]),
            });
        interactions.expect_get_similar_users().returning(|_, _| {
            Ok(vec![
                SimilarUser {
                    user_id: 2,
                    similarity_score: 0.8,
                },
                SimilarUser {
                    user_id: 3,
                    similarity_score: 0.5,
                },
            ])
        });

        let result = scorer(interactions, MockContentPort::new(), CollaborativeMode::UserBased)
            .generate(&RecommendationRequest::new(1, 10))
            .await
            .unwrap();

        // content 10: 0.8*1.0 + 0.5*1.2 = 1.4; content 11: 0.8
        assert_eq!(result.content_ids[0], 10);
        assert_eq!(result.scores[0], 1.0); // normalized by max
        assert!((result.scores[1] - 0.8 / 1.4).abs() < 1e-9);
        assert_eq!(result.metadata["method"], json!("user_based"));
        assert_eq!(result.metadata["similar_users_count"], json!(2));
    }

    #[tokio::test]
    async fn test_user_based_excludes_seen_and_requested() {
        let mut interactions = MockInteractionPort::new();
        interactions
            .expect_get_user_interactions()
            .returning(|user_id, _| match user_id {
                1 => Ok(likes(1, &[1, 2, 3, 4, 5])),
                2 => Ok(likes(2, &[1, 20, 21])), // 1 already seen by target
                _ => Ok(vec![]),
            });
        interactions.expect_get_similar_users().returning(|_, _| {
            Ok(vec![SimilarUser {
                user_id: 2,
                similarity_score: 0.6,
            }])
        });

        let request = RecommendationRequest::new(1, 10).with_excluded(vec![21]);
        let result = scorer(interactions, MockContentPort::new(), CollaborativeMode::UserBased)
            .generate(&request)
            .await
            .unwrap();

        assert_eq!(result.content_ids, vec![20]);
    }

    #[tokio::test]
    async fn test_item_based_uses_feature_similarity() {
        let mut interactions = MockInteractionPort::new();
        interactions
            .expect_get_user_interactions()
            .returning(|user_id, _| Ok(likes(user_id, &[1, 2, 3, 4, 5])));

        let mut content = MockContentPort::new();
        content.expect_get_content_summaries().returning(|ids| {
            Ok(ids
                .into_iter()
                .map(|id| summary(id, &["rust", "systems"], Some(1)))
                .collect())
        });
        content
            .expect_get_similar_content()
            .returning(|source_id, _| {
                // One on-feature candidate, one off-feature candidate
                Ok(vec![
                    summary(100 + source_id, &["rust", "systems"], Some(1)),
                    summary(200 + source_id, &["cooking"], Some(9)),
                ])
            });

        let result = scorer(interactions, content, CollaborativeMode::ItemBased)
            .generate(&RecommendationRequest::new(1, 10))
            .await
            .unwrap();

        assert!(!result.is_empty());
        assert_eq!(result.metadata["method"], json!("item_based"));
        // The best score is normalized to 1.0 and belongs to an on-feature item
        assert_eq!(result.scores[0], 1.0);
        assert!(result.content_ids[0] > 100 && result.content_ids[0] < 200);
        // Off-feature candidates survive at the similarity floor, scored lower
        assert!(result.content_ids.iter().any(|&id| id > 200));
    }

    #[test]
    fn test_item_similarity_components() {
        let a = summary(1, &["rust", "systems"], Some(1));
        let b = summary(2, &["rust", "systems"], Some(1));
        // Identical features: 0.6*1 + 0.25*1 + 0.15*1 = 1.0
        assert!((CollaborativeScorer::item_similarity(Some(&a), &b) - 1.0).abs() < 1e-9);

        let mut c = summary(3, &["cooking"], Some(9));
        c.content_type = "video".to_string();
        // Nothing in common: floored
        assert_eq!(
            CollaborativeScorer::item_similarity(Some(&a), &c),
            MIN_ITEM_SIMILARITY
        );

        // Missing source metadata: floored
        assert_eq!(
            CollaborativeScorer::item_similarity(None, &b),
            MIN_ITEM_SIMILARITY
        );
    }

    #[tokio::test]
    async fn test_port_failure_becomes_empty_result() {
        let mut interactions = MockInteractionPort::new();
        interactions
            .expect_get_user_interactions()
            .returning(|_, _| Err(crate::error::EngineError::Port("down".to_string())));

        let result = scorer(interactions, MockContentPort::new(), CollaborativeMode::UserBased)
            .generate(&RecommendationRequest::new(1, 5))
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(result.metadata.contains_key("failure_reason"));
    }
}
