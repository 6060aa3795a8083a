//! Trending scorer: engagement-weighted popularity over a time window,
//! with hot, rising, fresh, and viral variants.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::TrendingConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ContentId, Explanation, Interaction, InteractionType, RecommendationRequest,
    RecommendationResult, UserId,
};
use crate::ports::{ContentPort, InteractionPort};
use crate::scorers::RecommendationAlgorithm;

const ALGORITHM_NAME: &str = "Trending Content";

/// Which trending signal a scorer instance ranks by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendingVariant {
    /// High current activity (1-day window)
    Hot,
    /// Increasing activity velocity (3-day window, split in half)
    Rising,
    /// Recent content with good engagement (7-day window)
    Fresh,
    /// Share-rate-driven exponential growth (1-day window)
    Viral,
}

impl TrendingVariant {
    pub fn window_days(&self) -> i64 {
        match self {
            TrendingVariant::Hot | TrendingVariant::Viral => 1,
            TrendingVariant::Rising => 3,
            TrendingVariant::Fresh => 7,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TrendingVariant::Hot => "hot",
            TrendingVariant::Rising => "rising",
            TrendingVariant::Fresh => "fresh",
            TrendingVariant::Viral => "viral",
        }
    }

    fn result_name(&self) -> String {
        match self {
            TrendingVariant::Hot => format!("{} (Hot)", ALGORITHM_NAME),
            TrendingVariant::Rising => format!("{} (Rising)", ALGORITHM_NAME),
            TrendingVariant::Fresh => format!("{} (Fresh)", ALGORITHM_NAME),
            TrendingVariant::Viral => format!("{} (Viral)", ALGORITHM_NAME),
        }
    }
}

/// Engagement rollup for one content item over a window
#[derive(Debug, Clone, Default)]
pub(crate) struct EngagementAggregate {
    pub content_id: ContentId,
    pub score: f64,
    pub total_interactions: u64,
    pub unique_users: usize,
    pub shares: u64,
}

/// Engagement weight of one interaction in the trending score
fn engagement_weight(interaction_type: InteractionType) -> f64 {
    match interaction_type {
        InteractionType::View => 1.0,
        InteractionType::Like => 3.0,
        InteractionType::Save => 4.0,
        InteractionType::Share => 8.0,
        InteractionType::Rate => 2.0,
        InteractionType::Comment => 0.0,
    }
}

pub struct TrendingScorer {
    interactions: Arc<dyn InteractionPort>,
    content: Arc<dyn ContentPort>,
    config: TrendingConfig,
    variant: TrendingVariant,
}

impl TrendingScorer {
    pub fn new(
        interactions: Arc<dyn InteractionPort>,
        content: Arc<dyn ContentPort>,
        config: TrendingConfig,
        variant: TrendingVariant,
    ) -> Self {
        Self {
            interactions,
            content,
            config,
            variant,
        }
    }

    /// Aggregate a window of interactions into per-content engagement
    /// scores. Items below the interaction or unique-user floor do not
    /// qualify.
    pub(crate) fn aggregate(
        &self,
        interactions: &[Interaction],
        exclude: &HashSet<ContentId>,
    ) -> Vec<EngagementAggregate> {
        let mut by_content: HashMap<ContentId, (EngagementAggregate, HashSet<UserId>)> =
            HashMap::new();

        for interaction in interactions {
            if exclude.contains(&interaction.content_id) {
                continue;
            }

            let (aggregate, users) = by_content
                .entry(interaction.content_id)
                .or_insert_with(|| {
                    (
                        EngagementAggregate {
                            content_id: interaction.content_id,
                            ..EngagementAggregate::default()
                        },
                        HashSet::new(),
                    )
                });

            aggregate.score += engagement_weight(interaction.interaction_type);
            aggregate.total_interactions += 1;
            if interaction.interaction_type == InteractionType::Share {
                aggregate.shares += 1;
            }
            users.insert(interaction.user_id);
        }

        by_content
            .into_values()
            .filter_map(|(mut aggregate, users)| {
                aggregate.unique_users = users.len();
                let qualifies = aggregate.total_interactions
                    >= self.config.min_interactions as u64
                    && aggregate.unique_users >= self.config.min_unique_users;
                qualifies.then_some(aggregate)
            })
            .collect()
    }

    async fn window_aggregates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: &HashSet<ContentId>,
    ) -> EngineResult<Vec<EngagementAggregate>> {
        let interactions = self
            .interactions
            .get_interactions_between(start, end)
            .await?;
        Ok(self.aggregate(&interactions, exclude))
    }

    async fn generate_inner(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let exclude: HashSet<ContentId> =
            request.exclude_content_ids.iter().copied().collect();
        let now = Utc::now();

        match self.variant {
            TrendingVariant::Hot => self.hot(request, now, &exclude).await,
            TrendingVariant::Rising => self.rising(request, now, &exclude).await,
            TrendingVariant::Fresh => self.fresh(request, now, &exclude).await,
            TrendingVariant::Viral => self.viral(request, now, &exclude).await,
        }
    }

    async fn hot(
        &self,
        request: &RecommendationRequest,
        now: DateTime<Utc>,
        exclude: &HashSet<ContentId>,
    ) -> EngineResult<RecommendationResult> {
        let window = Duration::days(self.variant.window_days());
        let mut aggregates = self.window_aggregates(now - window, now, exclude).await?;

        aggregates
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let total_candidates = aggregates.len();
        aggregates.truncate(request.count);

        let scoring_details: Vec<_> = aggregates
            .iter()
            .take(5)
            .map(|a| {
                json!({
                    "content_id": a.content_id,
                    "raw_score": a.score,
                    "interaction_count": a.total_interactions,
                    "unique_users": a.unique_users,
                })
            })
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert("trending_type".to_string(), json!("hot"));
        metadata.insert(
            "time_window_days".to_string(),
            json!(self.variant.window_days()),
        );
        metadata.insert("total_candidates".to_string(), json!(total_candidates));
        metadata.insert(
            "min_interactions".to_string(),
            json!(self.config.min_interactions),
        );
        metadata.insert("scoring_details".to_string(), json!(scoring_details));

        self.finalize(request, aggregates.into_iter().map(|a| (a.content_id, a.score)), metadata)
    }

    async fn rising(
        &self,
        request: &RecommendationRequest,
        now: DateTime<Utc>,
        exclude: &HashSet<ContentId>,
    ) -> EngineResult<RecommendationResult> {
        let days = self.variant.window_days();
        let half = Duration::days(days) / 2;
        let midpoint = now - half;
        let window_start = now - Duration::days(days);

        let recent = self.window_aggregates(midpoint, now, exclude).await?;
        let older = self.window_aggregates(window_start, midpoint, exclude).await?;

        let older_scores: HashMap<ContentId, f64> =
            older.iter().map(|a| (a.content_id, a.score)).collect();

        let mut rising: Vec<(ContentId, f64, f64)> = Vec::new();
        for aggregate in &recent {
            let older_score = older_scores.get(&aggregate.content_id).copied().unwrap_or(0.0);
            // New content takes its whole recent score as velocity
            let velocity = if older_score > 0.0 {
                (aggregate.score - older_score) / older_score
            } else {
                aggregate.score
            };

            if velocity > self.config.rising_velocity_threshold {
                rising.push((aggregate.content_id, velocity, aggregate.score * (1.0 + velocity)));
            }
        }

        rising.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        let total_candidates = rising.len();
        rising.truncate(request.count);

        let avg_velocity = if rising.is_empty() {
            0.0
        } else {
            rising.iter().map(|(_, v, _)| v).sum::<f64>() / rising.len() as f64
        };
        let rising_details: Vec<_> = rising
            .iter()
            .take(5)
            .map(|(id, velocity, score)| {
                json!({
                    "content_id": id,
                    "velocity": velocity,
                    "rising_score": score,
                })
            })
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert("trending_type".to_string(), json!("rising"));
        metadata.insert("time_window_days".to_string(), json!(days));
        metadata.insert(
            "comparison_periods".to_string(),
            json!(format!("last {}h vs previous {}h", half.num_hours(), half.num_hours())),
        );
        metadata.insert("total_candidates".to_string(), json!(total_candidates));
        metadata.insert("avg_velocity".to_string(), json!(avg_velocity));
        metadata.insert("rising_details".to_string(), json!(rising_details));

        self.finalize(request, rising.into_iter().map(|(id, _, score)| (id, score)), metadata)
    }

    async fn fresh(
        &self,
        request: &RecommendationRequest,
        now: DateTime<Utc>,
        exclude: &HashSet<ContentId>,
    ) -> EngineResult<RecommendationResult> {
        let window = Duration::days(self.variant.window_days());
        let aggregates = self.window_aggregates(now - window, now, exclude).await?;

        let ids: Vec<ContentId> = aggregates.iter().map(|a| a.content_id).collect();
        let summaries = self.content.get_content_summaries(ids).await?;
        let created_at: HashMap<ContentId, DateTime<Utc>> =
            summaries.iter().map(|s| (s.id, s.created_at)).collect();

        let mut fresh: Vec<(ContentId, f64, f64, f64)> = aggregates
            .iter()
            .map(|aggregate| {
                // Unknown ages get no freshness boost
                let (age_hours, multiplier) = match created_at.get(&aggregate.content_id) {
                    Some(created) => {
                        let age = (now - *created).num_minutes().max(0) as f64 / 60.0;
                        (age, (-age / 24.0).exp())
                    }
                    None => (0.0, 0.0),
                };
                (
                    aggregate.content_id,
                    age_hours,
                    multiplier,
                    aggregate.score * (1.0 + multiplier),
                )
            })
            .collect();

        fresh.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));
        let total_candidates = fresh.len();
        fresh.truncate(request.count);

        let avg_age_hours = if fresh.is_empty() {
            0.0
        } else {
            fresh.iter().map(|(_, age, _, _)| age).sum::<f64>() / fresh.len() as f64
        };
        let fresh_details: Vec<_> = fresh
            .iter()
            .take(5)
            .map(|(id, age, multiplier, score)| {
                json!({
                    "content_id": id,
                    "age_hours": age,
                    "freshness_multiplier": multiplier,
                    "fresh_score": score,
                })
            })
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert("trending_type".to_string(), json!("fresh"));
        metadata.insert(
            "time_window_days".to_string(),
            json!(self.variant.window_days()),
        );
        metadata.insert("freshness_boost_applied".to_string(), json!(true));
        metadata.insert("total_candidates".to_string(), json!(total_candidates));
        metadata.insert("avg_content_age_hours".to_string(), json!(avg_age_hours));
        metadata.insert("fresh_details".to_string(), json!(fresh_details));

        self.finalize(
            request,
            fresh.into_iter().map(|(id, _, _, score)| (id, score)),
            metadata,
        )
    }

    async fn viral(
        &self,
        request: &RecommendationRequest,
        now: DateTime<Utc>,
        exclude: &HashSet<ContentId>,
    ) -> EngineResult<RecommendationResult> {
        let window = Duration::days(self.variant.window_days());
        let aggregates = self.window_aggregates(now - window, now, exclude).await?;

        let mut viral: Vec<(ContentId, f64, f64, f64)> = Vec::new();
        for aggregate in &aggregates {
            let share_rate = if aggregate.total_interactions > 0 {
                aggregate.shares as f64 / aggregate.total_interactions as f64
            } else {
                0.0
            };

            let multiplier = if share_rate > 0.1 {
                (share_rate * 10.0).exp()
            } else {
                1.0
            };

            if multiplier > self.config.viral_multiplier_threshold {
                viral.push((
                    aggregate.content_id,
                    share_rate,
                    multiplier,
                    aggregate.score * multiplier,
                ));
            }
        }

        viral.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));
        let total_candidates = viral.len();
        viral.truncate(request.count);

        let avg_multiplier = if viral.is_empty() {
            0.0
        } else {
            viral.iter().map(|(_, _, m, _)| m).sum::<f64>() / viral.len() as f64
        };
        let viral_details: Vec<_> = viral
            .iter()
            .take(5)
            .map(|(id, share_rate, multiplier, score)| {
                json!({
                    "content_id": id,
                    "share_rate": share_rate,
                    "viral_multiplier": multiplier,
                    "viral_score": score,
                })
            })
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert("trending_type".to_string(), json!("viral"));
        metadata.insert(
            "time_window_days".to_string(),
            json!(self.variant.window_days()),
        );
        metadata.insert(
            "viral_threshold".to_string(),
            json!(self.config.viral_multiplier_threshold),
        );
        metadata.insert("total_candidates".to_string(), json!(total_candidates));
        metadata.insert("avg_viral_multiplier".to_string(), json!(avg_multiplier));
        metadata.insert("viral_details".to_string(), json!(viral_details));

        self.finalize(
            request,
            viral.into_iter().map(|(id, _, _, score)| (id, score)),
            metadata,
        )
    }

    /// Build the final result: max-normalized scores, variant name, metadata
    fn finalize(
        &self,
        request: &RecommendationRequest,
        ranked: impl Iterator<Item = (ContentId, f64)>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> EngineResult<RecommendationResult> {
        let (content_ids, scores): (Vec<_>, Vec<_>) = ranked.unzip();

        let mut result = RecommendationResult::new(
            content_ids,
            scores,
            self.variant.result_name(),
            request.user_id,
        )?
        .with_metadata(metadata);
        result.normalize_scores();

        Ok(result)
    }
}

#[async_trait]
impl RecommendationAlgorithm for TrendingScorer {
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
            "trending_generate",
            request_id = %request_id,
            user_id = request.user_id,
            count = request.count,
            variant = self.variant.label(),
        );

        match self.generate_inner(request).instrument(span).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(user_id = request.user_id, error = %e, "Trending scoring failed");
                Ok(RecommendationResult::failed(
                    self.variant.result_name(),
                    request.user_id,
                    e.to_string(),
                ))
            }
        }
    }

    async fn explain(
        &self,
        _user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation> {
        let with_stats = self
            .content
            .get_content_with_stats(content_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("content {}", content_id)))?;

        let stats = with_stats.stats;
        let mut explanation = Explanation::new(
            content_id,
            format!("trending_{}", self.variant.label()),
            format!("This content is currently {}", self.variant.label()),
        );
        explanation.confidence = stats.engagement_rate.min(1.0);

        let (kind, description) = match self.variant {
            TrendingVariant::Hot => ("current_activity", "High current engagement activity"),
            TrendingVariant::Rising => ("velocity", "Rapidly increasing in popularity"),
            TrendingVariant::Fresh => (
                "freshness",
                "Recently published with strong initial engagement",
            ),
            TrendingVariant::Viral => (
                "share_growth",
                "Showing exponential growth in shares and engagement",
            ),
        };
        explanation.add_reason(kind, explanation.confidence.max(0.5), description);

        if stats.engagement_rate > 0.1 {
            explanation.add_reason(
                "engagement_rate",
                stats.engagement_rate.min(1.0),
                format!("High engagement rate ({:.1}%)", stats.engagement_rate * 100.0),
            );
        }
        if stats.shares > 0 {
            explanation.add_reason(
                "shares",
                0.5,
                format!("Being actively shared ({} shares)", stats.shares),
            );
        }

        explanation.evidence.insert(
            "metrics".to_string(),
            json!({
                "views": stats.views,
                "likes": stats.likes,
                "saves": stats.saves,
                "shares": stats.shares,
                "engagement_rate": stats.engagement_rate,
            }),
        );

        Ok(explanation)
    }
}
