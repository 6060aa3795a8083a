//! Hybrid orchestrator: fans out to the component scorers concurrently,
//! merges their weighted scores, and re-ranks for diversity.
//!
//! Components are isolated from each other. A component that fails or
//! times out contributes nothing; the merge proceeds with whatever came
//! back, and only a fully empty merge triggers the trending fallback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::HybridConfig;
use crate::error::EngineResult;
use crate::models::{
    ContentId, Explanation, RecommendationRequest, RecommendationResult, UserId,
};
use crate::ports::{ContentPort, InteractionPort};
use crate::scorers::RecommendationAlgorithm;

const ALGORITHM_NAME: &str = "Hybrid Recommendations";

/// Consensus bonus per additional component recommending the same item
const CONSENSUS_BONUS: f64 = 0.1;

/// Diversity re-rank boosts for unseen category and content type
const CATEGORY_BOOST: f64 = 0.2;
const CONTENT_TYPE_BOOST: f64 = 0.1;

/// Blend weights across the component scorers plus the diversity signal.
///
/// A well-formed weight vector sums to 1.0 within 0.001; `normalize`
/// restores that invariant after any adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlgorithmWeights {
    pub content_based: f64,
    pub collaborative: f64,
    pub trending: f64,
    pub diversity: f64,
}

impl Default for AlgorithmWeights {
    fn default() -> Self {
        Self {
            content_based: 0.4,
            collaborative: 0.3,
            trending: 0.2,
            diversity: 0.1,
        }
    }
}

impl AlgorithmWeights {
    /// Cold-start blend: lean on trending, keep personalization light
    pub fn new_user() -> Self {
        Self {
            content_based: 0.2,
            collaborative: 0.1,
            trending: 0.5,
            diversity: 0.2,
        }
    }

    /// Blend for users with a rich interaction history
    pub fn high_personalization() -> Self {
        Self {
            content_based: 0.5,
            collaborative: 0.4,
            trending: 0.05,
            diversity: 0.05,
        }
    }

    pub fn sum(&self) -> f64 {
        self.content_based + self.collaborative + self.trending + self.diversity
    }

    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= 0.001
    }

    /// Scale the vector back to a sum of 1.0. A degenerate all-zero vector
    /// resets to the default blend.
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum <= f64::EPSILON {
            *self = Self::default();
            return;
        }
        self.content_based /= sum;
        self.collaborative /= sum;
        self.trending /= sum;
        self.diversity /= sum;
    }

    /// Shift weight toward trending during peak hours, then renormalize
    pub fn apply_peak_hours(&mut self) {
        self.trending += 0.1;
        self.content_based = (self.content_based - 0.05).max(0.0);
        self.collaborative = (self.collaborative - 0.05).max(0.0);
        self.normalize();
    }
}

/// A/B test buckets for the hybrid weight vector.
///
/// Assignment is a pure function of the user id, so a user lands in the
/// same bucket on every request. The variant never mutates shared state;
/// it supplies the starting weight vector for the current call only, and
/// personalization adjustments still apply on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbVariant {
    Control,
    ContentHeavy,
    CollaborativeHeavy,
    TrendingHeavy,
}

impl AbVariant {
    pub fn for_user(user_id: UserId) -> Self {
        match user_id.rem_euclid(4) {
            0 => AbVariant::Control,
            1 => AbVariant::ContentHeavy,
            2 => AbVariant::CollaborativeHeavy,
            _ => AbVariant::TrendingHeavy,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AbVariant::Control => "control",
            AbVariant::ContentHeavy => "content_heavy",
            AbVariant::CollaborativeHeavy => "collaborative_heavy",
            AbVariant::TrendingHeavy => "trending_heavy",
        }
    }

    /// Starting weight vector for this bucket; control keeps the default
    pub fn weights(&self) -> Option<AlgorithmWeights> {
        let heavy = |content_based, collaborative, trending| AlgorithmWeights {
            content_based,
            collaborative,
            trending,
            diversity: 0.0,
        };
        match self {
            AbVariant::Control => None,
            AbVariant::ContentHeavy => Some(heavy(0.6, 0.2, 0.2)),
            AbVariant::CollaborativeHeavy => Some(heavy(0.2, 0.6, 0.2)),
            AbVariant::TrendingHeavy => Some(heavy(0.2, 0.2, 0.6)),
        }
    }
}

fn personalization_level(total_interactions: u64) -> &'static str {
    match total_interactions {
        0..=2 => "minimal",
        3..=19 => "low",
        20..=49 => "medium",
        _ => "high",
    }
}

pub struct HybridScorer {
    interactions: Arc<dyn InteractionPort>,
    content: Arc<dyn ContentPort>,
    content_based: Arc<dyn RecommendationAlgorithm>,
    collaborative: Arc<dyn RecommendationAlgorithm>,
    trending: Arc<dyn RecommendationAlgorithm>,
    config: HybridConfig,
}

impl HybridScorer {
    pub fn new(
        interactions: Arc<dyn InteractionPort>,
        content: Arc<dyn ContentPort>,
        content_based: Arc<dyn RecommendationAlgorithm>,
        collaborative: Arc<dyn RecommendationAlgorithm>,
        trending: Arc<dyn RecommendationAlgorithm>,
        config: HybridConfig,
    ) -> Self {
        Self {
            interactions,
            content,
            content_based,
            collaborative,
            trending,
            config,
        }
    }

    /// Pick the weight vector for this request: the A/B bucket chooses the
    /// starting vector, then the personalization profile and peak-hours
    /// shift adjust it. Immutable once chosen.
    fn select_weights(
        &self,
        request: &RecommendationRequest,
        total_interactions: u64,
        is_new_user: bool,
    ) -> (AlgorithmWeights, Option<AbVariant>) {
        let variant = self
            .config
            .ab_testing_enabled
            .then(|| AbVariant::for_user(request.user_id));
        let base = variant.and_then(|v| v.weights()).unwrap_or_default();

        // Strong personalization signals win over the bucket's starting
        // vector; lightly-profiled users keep it as-is.
        let mut weights = if is_new_user {
            AlgorithmWeights::new_user()
        } else {
            match personalization_level(total_interactions) {
                "high" => AlgorithmWeights::high_personalization(),
                "medium" => AlgorithmWeights::default(),
                _ => base,
            }
        };

        if let Some(hour) = request.context.current_hour {
            if hour >= self.config.peak_start_hour && hour <= self.config.peak_end_hour {
                weights.apply_peak_hours();
            }
        }
        weights.normalize();

        (weights, variant)
    }

    /// Run one component under the configured timeout. Failures and
    /// timeouts become empty results so the merge never blocks on them.
    async fn run_component(
        &self,
        label: &'static str,
        scorer: &Arc<dyn RecommendationAlgorithm>,
        request: &RecommendationRequest,
    ) -> RecommendationResult {
        let timeout = Duration::from_millis(self.config.scorer_timeout_ms);
        match tokio::time::timeout(timeout, scorer.generate(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(component = label, error = %e, "Component scorer failed");
                RecommendationResult::failed(scorer.name(), request.user_id, e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    component = label,
                    timeout_ms = self.config.scorer_timeout_ms,
                    "Component scorer timed out"
                );
                RecommendationResult::failed(scorer.name(), request.user_id, "timed out")
            }
        }
    }

    /// Weighted merge with a consensus bonus for items several components
    /// agree on.
    fn merge(
        &self,
        components: &[(&RecommendationResult, f64)],
    ) -> Vec<(ContentId, f64)> {
        let mut totals: HashMap<ContentId, f64> = HashMap::new();
        let mut contributors: HashMap<ContentId, usize> = HashMap::new();

        for (result, weight) in components {
            for (content_id, score) in result.entries() {
                *totals.entry(content_id).or_default() += weight * score;
                *contributors.entry(content_id).or_default() += 1;
            }
        }

        let mut merged: Vec<(ContentId, f64)> = totals
            .into_iter()
            .map(|(content_id, score)| {
                let extra = contributors[&content_id].saturating_sub(1);
                (content_id, score * (1.0 + CONSENSUS_BONUS * extra as f64))
            })
            .collect();

        merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        merged
    }

    /// Greedy diversity re-rank: at each step prefer candidates whose
    /// category or content type has not been selected yet. Pure
    /// permutation; the merged scores themselves are never altered. When
    /// metadata cannot be fetched the merged order is kept as-is.
    async fn diversify(
        &self,
        merged: Vec<(ContentId, f64)>,
        count: usize,
    ) -> (Vec<(ContentId, f64)>, Option<f64>) {
        let ids: Vec<ContentId> = merged.iter().map(|(id, _)| *id).collect();
        let summaries = match self.content.get_content_summaries(ids).await {
            Ok(summaries) => summaries,
            Err(e) => {
                tracing::warn!(error = %e, "Diversity metadata fetch failed; keeping merge order");
                let mut selected = merged;
                selected.truncate(count);
                return (selected, None);
            }
        };

        let meta: HashMap<ContentId, (Option<i64>, &str)> = summaries
            .iter()
            .map(|s| (s.id, (s.category_id, s.content_type.as_str())))
            .collect();

        let mut remaining = merged;
        let mut selected: Vec<(ContentId, f64)> = Vec::with_capacity(count);
        let mut seen_categories: HashSet<i64> = HashSet::new();
        let mut seen_types: HashSet<String> = HashSet::new();

        while selected.len() < count && !remaining.is_empty() {
            let mut best_index = 0;
            let mut best_adjusted = f64::MIN;
            for (index, (content_id, score)) in remaining.iter().enumerate() {
                let mut adjusted = *score;
                if let Some((category_id, content_type)) = meta.get(content_id) {
                    if category_id.map_or(false, |c| !seen_categories.contains(&c)) {
                        adjusted += CATEGORY_BOOST;
                    }
                    if !seen_types.contains(*content_type) {
                        adjusted += CONTENT_TYPE_BOOST;
                    }
                }
                if adjusted > best_adjusted {
                    best_adjusted = adjusted;
                    best_index = index;
                }
            }

            let (content_id, score) = remaining.remove(best_index);
            if let Some((category_id, content_type)) = meta.get(&content_id) {
                if let Some(category_id) = category_id {
                    seen_categories.insert(*category_id);
                }
                seen_types.insert(content_type.to_string());
            }
            selected.push((content_id, score));
        }

        let diversity_score = if selected.is_empty() {
            0.0
        } else {
            let category_diversity = seen_categories.len() as f64 / selected.len() as f64;
            let type_diversity = seen_types.len() as f64 / selected.len() as f64;
            0.7 * category_diversity + 0.3 * type_diversity
        };

        (selected, Some(diversity_score))
    }

    async fn generate_inner(
        &self,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let profile = self
            .interactions
            .get_user_recommendation_data(request.user_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = request.user_id, error = %e, "Profile lookup failed; treating as new user");
                Default::default()
            });

        let total_interactions = profile.total_interactions;
        let is_new_user =
            total_interactions < self.config.min_interactions_for_personalization;
        let level = personalization_level(total_interactions);
        let (weights, variant) = self.select_weights(request, total_interactions, is_new_user);

        tracing::debug!(
            user_id = request.user_id,
            personalization_level = level,
            is_new_user,
            ?weights,
            "Selected hybrid weights"
        );

        // Components score a wider candidate pool than the final count
        let mut component_request = request.clone();
        component_request.count = self.config.candidate_limit.max(request.count);

        let (content_based, collaborative, trending) = tokio::join!(
            self.run_component("content_based", &self.content_based, &component_request),
            self.run_component("collaborative", &self.collaborative, &component_request),
            self.run_component("trending", &self.trending, &component_request),
        );

        let contributions = json!({
            "content_based": content_based.len(),
            "collaborative": collaborative.len(),
            "trending": trending.len(),
        });

        let merged = self.merge(&[
            (&content_based, weights.content_based),
            (&collaborative, weights.collaborative),
            (&trending, weights.trending),
        ]);

        if merged.is_empty() {
            return Ok(self.fallback(request).await);
        }

        let (selected, diversity_score) = self.diversify(merged, request.count).await;
        let (content_ids, scores): (Vec<_>, Vec<_>) = selected.into_iter().unzip();

        let algorithm_name = match variant {
            Some(v) => format!("{} (Variant: {})", ALGORITHM_NAME, v.label()),
            None => ALGORITHM_NAME.to_string(),
        };

        let mut metadata = HashMap::new();
        metadata.insert(
            "algorithm_weights".to_string(),
            serde_json::to_value(weights).unwrap_or_default(),
        );
        metadata.insert("algorithm_contributions".to_string(), contributions);
        metadata.insert("personalization_level".to_string(), json!(level));
        metadata.insert("is_new_user".to_string(), json!(is_new_user));
        if let Some(diversity_score) = diversity_score {
            metadata.insert("diversity_score".to_string(), json!(diversity_score));
        }
        if let Some(variant) = variant {
            metadata.insert("ab_test_variant".to_string(), json!(variant.label()));
        }

        let mut result =
            RecommendationResult::new(content_ids, scores, algorithm_name, request.user_id)?
                .with_metadata(metadata);
        result.normalize_scores();

        Ok(result)
    }

    /// Last resort when no component produced anything: lean on trending
    /// alone, and fail soft to an empty tagged result if even that is dry.
    async fn fallback(&self, request: &RecommendationRequest) -> RecommendationResult {
        tracing::warn!(
            user_id = request.user_id,
            "All components returned empty; falling back to trending"
        );

        let fallback_name = format!("{} (Fallback)", ALGORITHM_NAME);
        match self.trending.generate(request).await {
            Ok(mut result) if !result.is_empty() => {
                result.algorithm_name = fallback_name;
                result
                    .metadata
                    .insert("fallback_reason".to_string(), json!("no_component_results"));
                result
            }
            Ok(_) => RecommendationResult::failed(
                fallback_name,
                request.user_id,
                "no_component_results",
            ),
            Err(e) => {
                tracing::warn!(user_id = request.user_id, error = %e, "Trending fallback failed");
                RecommendationResult::failed(fallback_name, request.user_id, e.to_string())
            }
        }
    }
}

#[async_trait]
impl RecommendationAlgorithm for HybridScorer {
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
            "hybrid_generate",
            request_id = %request_id,
            user_id = request.user_id,
            count = request.count,
        );

        self.generate_inner(request).instrument(span).await
    }

    /// Combine the component explanations into one blended view
    async fn explain(
        &self,
        user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation> {
        let (content_based, collaborative, trending) = tokio::join!(
            self.content_based.explain(user_id, content_id),
            self.collaborative.explain(user_id, content_id),
            self.trending.explain(user_id, content_id),
        );

        let mut explanation = Explanation::new(
            content_id,
            "hybrid",
            "Recommended by a blend of personalized and trending signals",
        );

        for (label, component) in [
            ("content_based", content_based),
            ("collaborative", collaborative),
            ("trending", trending),
        ] {
            match component {
                Ok(sub) => {
                    explanation.confidence = explanation.confidence.max(sub.confidence);
                    for reason in sub.reasons {
                        explanation.add_reason(
                            format!("{}:{}", label, reason.kind),
                            reason.strength,
                            reason.description,
                        );
                    }
                    explanation
                        .evidence
                        .insert(label.to_string(), json!(sub.evidence));
                }
                Err(e) => {
                    tracing::debug!(component = label, error = %e, "Component explanation unavailable");
                }
            }
        }

        Ok(explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{ContentSummary, UserRecommendationData};
    use crate::ports::{MockContentPort, MockInteractionPort};
    use chrono::Utc;

    /// A component stub that always returns the same ranked list
    struct StaticScorer {
        name: &'static str,
        entries: Vec<(ContentId, f64)>,
        delay: Option<Duration>,
    }

    impl StaticScorer {
        fn new(name: &'static str, entries: Vec<(ContentId, f64)>) -> Arc<Self> {
            Arc::new(Self {
                name,
                entries,
                delay: None,
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                entries: vec![(99, 1.0)],
                delay: Some(delay),
            })
        }
    }

    #[async_trait]
    impl RecommendationAlgorithm for StaticScorer {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(
            &self,
            request: &RecommendationRequest,
        ) -> EngineResult<RecommendationResult> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let (ids, scores): (Vec<_>, Vec<_>) = self.entries.iter().copied().unzip();
            RecommendationResult::new(ids, scores, self.name, request.user_id)
        }

        async fn explain(
            &self,
            _user_id: UserId,
            content_id: ContentId,
        ) -> EngineResult<Explanation> {
            let mut explanation = Explanation::new(content_id, self.name, "static");
            explanation.confidence = 0.4;
            explanation.add_reason("static", 0.4, "stub reason");
            Ok(explanation)
        }
    }

    fn summary(id: ContentId, content_type: &str, category_id: Option<i64>) -> ContentSummary {
        ContentSummary {
            id,
            title: format!("content {}", id),
            description: String::new(),
            content_type: content_type.to_string(),
            category_id,
            tags: vec![],
            created_at: Utc::now(),
            trending_score: 0.0,
        }
    }

    fn interaction_port(total_interactions: u64) -> Arc<MockInteractionPort> {
        let mut port = MockInteractionPort::new();
        port.expect_get_user_recommendation_data()
            .returning(move |_| {
                Ok(UserRecommendationData {
                    total_interactions,
                    ..Default::default()
                })
            });
        Arc::new(port)
    }

    fn content_port_with_summaries(summaries: Vec<ContentSummary>) -> Arc<MockContentPort> {
        let mut port = MockContentPort::new();
        port.expect_get_content_summaries()
            .returning(move |ids| {
                Ok(summaries
                    .iter()
                    .filter(|s| ids.contains(&s.id))
                    .cloned()
                    .collect())
            });
        Arc::new(port)
    }

    fn scorer(
        interactions: Arc<MockInteractionPort>,
        content: Arc<MockContentPort>,
        content_based: Arc<dyn RecommendationAlgorithm>,
        collaborative: Arc<dyn RecommendationAlgorithm>,
        trending: Arc<dyn RecommendationAlgorithm>,
        config: HybridConfig,
    ) -> HybridScorer {
        HybridScorer::new(
            interactions,
            content,
            content_based,
            collaborative,
            trending,
            config,
        )
    }

    #[test]
    fn test_weight_presets_are_normalized() {
        assert!(AlgorithmWeights::default().is_normalized());
        assert!(AlgorithmWeights::new_user().is_normalized());
        assert!(AlgorithmWeights::high_personalization().is_normalized());
    }

    #[test]
    fn test_peak_hours_shift_toward_trending() {
        let mut weights = AlgorithmWeights::default();
        weights.apply_peak_hours();

        assert!(weights.is_normalized());
        assert!(weights.trending > AlgorithmWeights::default().trending);
        assert!(weights.content_based < AlgorithmWeights::default().content_based);
    }

    #[test]
    fn test_ab_variant_assignment_is_deterministic() {
        assert_eq!(AbVariant::for_user(4), AbVariant::Control);
        assert_eq!(AbVariant::for_user(1), AbVariant::ContentHeavy);
        assert_eq!(AbVariant::for_user(2), AbVariant::CollaborativeHeavy);
        assert_eq!(AbVariant::for_user(7), AbVariant::TrendingHeavy);
        // Same user, same bucket
        assert_eq!(AbVariant::for_user(7), AbVariant::for_user(7));
    }

    #[test]
    fn test_ab_variant_weights_are_normalized() {
        assert!(AbVariant::Control.weights().is_none());
        for variant in [
            AbVariant::ContentHeavy,
            AbVariant::CollaborativeHeavy,
            AbVariant::TrendingHeavy,
        ] {
            let weights = variant.weights().unwrap();
            assert!(weights.is_normalized());
            assert_eq!(weights.diversity, 0.0);
        }
        assert_eq!(AbVariant::TrendingHeavy.weights().unwrap().trending, 0.6);
    }

    #[test]
    fn test_personalization_levels() {
        assert_eq!(personalization_level(0), "minimal");
        assert_eq!(personalization_level(2), "minimal");
        assert_eq!(personalization_level(3), "low");
        assert_eq!(personalization_level(19), "low");
        assert_eq!(personalization_level(20), "medium");
        assert_eq!(personalization_level(49), "medium");
        assert_eq!(personalization_level(50), "high");
    }

    #[tokio::test]
    async fn test_merge_applies_weights_and_consensus() {
        // Medium personalization keeps default weights 0.4/0.3/0.2
        let hybrid = scorer(
            interaction_port(30),
            content_port_with_summaries(vec![
                summary(1, "article", Some(1)),
                summary(2, "video", Some(2)),
            ]),
            StaticScorer::new("cb", vec![(1, 1.0), (2, 0.5)]),
            StaticScorer::new("cf", vec![(1, 1.0)]),
            StaticScorer::new("tr", vec![]),
            HybridConfig::default(),
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(4, 10))
            .await
            .unwrap();

        // id 1: (0.4 + 0.3) * 1.1 consensus = 0.77; id 2: 0.4 * 0.5 = 0.2
        assert_eq!(result.content_ids, vec![1, 2]);
        assert_eq!(result.scores[0], 1.0);
        assert!((result.scores[1] - 0.2 / 0.77).abs() < 1e-9);
        assert_eq!(result.metadata["personalization_level"], json!("medium"));
        assert_eq!(result.metadata["is_new_user"], json!(false));
        assert_eq!(result.metadata["algorithm_contributions"]["content_based"], json!(2));
        assert_eq!(result.metadata["algorithm_contributions"]["trending"], json!(0));
    }

    #[tokio::test]
    async fn test_new_user_leans_on_trending() {
        let hybrid = scorer(
            interaction_port(2),
            content_port_with_summaries(vec![summary(5, "article", Some(1))]),
            StaticScorer::new("cb", vec![]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![(5, 1.0)]),
            HybridConfig::default(),
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(4, 5))
            .await
            .unwrap();

        assert_eq!(result.metadata["is_new_user"], json!(true));
        assert_eq!(result.metadata["personalization_level"], json!("minimal"));
        assert_eq!(result.metadata["algorithm_weights"]["trending"], json!(0.5));
        assert_eq!(result.content_ids, vec![5]);
    }

    #[tokio::test]
    async fn test_slow_component_is_timed_out() {
        let config = HybridConfig {
            scorer_timeout_ms: 20,
            ..HybridConfig::default()
        };
        let hybrid = scorer(
            interaction_port(30),
            content_port_with_summaries(vec![summary(1, "article", Some(1))]),
            StaticScorer::new("cb", vec![(1, 1.0)]),
            StaticScorer::slow("cf", Duration::from_millis(500)),
            StaticScorer::new("tr", vec![]),
            config,
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(4, 5))
            .await
            .unwrap();

        // The slow component's candidate 99 never lands
        assert_eq!(result.content_ids, vec![1]);
        assert_eq!(result.metadata["algorithm_contributions"]["collaborative"], json!(0));
    }

    #[tokio::test]
    async fn test_diversity_reranks_without_changing_scores() {
        // Three articles in category 1 lead on score; the video in
        // category 2 jumps ahead of the near-tied articles.
        let hybrid = scorer(
            interaction_port(30),
            content_port_with_summaries(vec![
                summary(1, "article", Some(1)),
                summary(2, "article", Some(1)),
                summary(3, "article", Some(1)),
                summary(4, "video", Some(2)),
            ]),
            StaticScorer::new("cb", vec![(1, 1.0), (2, 0.95), (3, 0.9), (4, 0.85)]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![]),
            HybridConfig::default(),
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(4, 4))
            .await
            .unwrap();

        assert_eq!(result.content_ids[0], 1);
        assert_eq!(result.content_ids[1], 4);
        // Scores stay sorted-by-merge, so the permuted list is not monotonic
        assert_eq!(result.scores[0], 1.0);
        let diversity = result.metadata["diversity_score"].as_f64().unwrap();
        assert!(diversity > 0.0);
    }

    #[tokio::test]
    async fn test_metadata_fetch_failure_keeps_merge_order() {
        let mut content = MockContentPort::new();
        content
            .expect_get_content_summaries()
            .returning(|_| Err(EngineError::Port("metadata unavailable".to_string())));

        let hybrid = scorer(
            interaction_port(30),
            Arc::new(content),
            StaticScorer::new("cb", vec![(1, 1.0), (2, 0.5)]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![]),
            HybridConfig::default(),
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(4, 5))
            .await
            .unwrap();

        assert_eq!(result.content_ids, vec![1, 2]);
        assert!(!result.metadata.contains_key("diversity_score"));
    }

    #[tokio::test]
    async fn test_empty_merge_falls_back_to_trending() {
        let hybrid = scorer(
            interaction_port(30),
            content_port_with_summaries(vec![]),
            StaticScorer::new("cb", vec![]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![]),
            HybridConfig::default(),
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(4, 5))
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.algorithm_name, "Hybrid Recommendations (Fallback)");
        assert_eq!(result.metadata["failure_reason"], json!("no_component_results"));
    }

    #[tokio::test]
    async fn test_ab_variant_is_the_starting_vector() {
        let config = HybridConfig {
            ab_testing_enabled: true,
            ..HybridConfig::default()
        };
        // A lightly-profiled user (low band, not new) keeps the bucket's
        // vector untouched
        let hybrid = scorer(
            interaction_port(10),
            content_port_with_summaries(vec![summary(5, "article", Some(1))]),
            StaticScorer::new("cb", vec![]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![(5, 1.0)]),
            config,
        );

        // user 7 -> trending_heavy
        let result = hybrid
            .generate(&RecommendationRequest::new(7, 5))
            .await
            .unwrap();

        assert_eq!(result.metadata["ab_test_variant"], json!("trending_heavy"));
        assert_eq!(result.metadata["algorithm_weights"]["trending"], json!(0.6));
        assert_eq!(
            result.algorithm_name,
            "Hybrid Recommendations (Variant: trending_heavy)"
        );
    }

    #[tokio::test]
    async fn test_personalization_adjusts_over_the_ab_vector() {
        let config = HybridConfig {
            ab_testing_enabled: true,
            ..HybridConfig::default()
        };
        // A richly-profiled user in the trending_heavy bucket still gets
        // the high-personalization blend; the bucket is only recorded.
        let hybrid = scorer(
            interaction_port(100),
            content_port_with_summaries(vec![summary(5, "article", Some(1))]),
            StaticScorer::new("cb", vec![]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![(5, 1.0)]),
            config,
        );

        let result = hybrid
            .generate(&RecommendationRequest::new(7, 5))
            .await
            .unwrap();

        assert_eq!(result.metadata["ab_test_variant"], json!("trending_heavy"));
        assert_eq!(result.metadata["algorithm_weights"]["trending"], json!(0.05));
        assert_eq!(
            result.metadata["algorithm_weights"]["content_based"],
            json!(0.5)
        );

        // A brand-new user in the same bucket gets the cold-start blend
        let hybrid = scorer(
            interaction_port(1),
            content_port_with_summaries(vec![summary(5, "article", Some(1))]),
            StaticScorer::new("cb", vec![]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![(5, 1.0)]),
            HybridConfig {
                ab_testing_enabled: true,
                ..HybridConfig::default()
            },
        );
        let result = hybrid
            .generate(&RecommendationRequest::new(7, 5))
            .await
            .unwrap();
        assert_eq!(result.metadata["algorithm_weights"]["trending"], json!(0.5));
        assert_eq!(result.metadata["is_new_user"], json!(true));
    }

    #[tokio::test]
    async fn test_explain_combines_component_reasons() {
        let hybrid = scorer(
            interaction_port(30),
            content_port_with_summaries(vec![]),
            StaticScorer::new("cb", vec![]),
            StaticScorer::new("cf", vec![]),
            StaticScorer::new("tr", vec![]),
            HybridConfig::default(),
        );

        let explanation = hybrid.explain(1, 42).await.unwrap();
        assert_eq!(explanation.algorithm, "hybrid");
        assert_eq!(explanation.reasons.len(), 3);
        assert!(explanation
            .reasons
            .iter()
            .any(|r| r.kind == "content_based:static"));
        assert!((explanation.confidence - 0.4).abs() < 1e-9);
    }
}
