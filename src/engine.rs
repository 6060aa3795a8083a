//! The engine facade: owns one instance of each scoring strategy and
//! dispatches requests by algorithm kind.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{
    CollaborativeConfig, ContentBasedConfig, EngineConfig, HybridConfig, TrendingConfig,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{ContentId, Explanation, RecommendationRequest, RecommendationResult, UserId};
use crate::ports::{ContentPort, InteractionPort};
use crate::scorers::{
    AlgorithmKind, CollaborativeMode, CollaborativeScorer, ContentBasedScorer, HybridScorer,
    RecommendationAlgorithm, TrendingScorer, TrendingVariant,
};

/// The recommendation engine.
///
/// Construction wires every scorer over the same pair of data ports; the
/// hybrid orchestrator reuses the same component instances it dispatches
/// to directly, so standalone and blended calls see identical behavior.
pub struct RecommendationEngine {
    algorithms: HashMap<AlgorithmKind, Arc<dyn RecommendationAlgorithm>>,
}

impl RecommendationEngine {
    pub fn new(
        interactions: Arc<dyn InteractionPort>,
        content: Arc<dyn ContentPort>,
        config: EngineConfig,
    ) -> Self {
        let content_based: Arc<dyn RecommendationAlgorithm> = Arc::new(ContentBasedScorer::new(
            Arc::clone(&interactions),
            Arc::clone(&content),
            ContentBasedConfig::default(),
        ));
        let collaborative: Arc<dyn RecommendationAlgorithm> = Arc::new(CollaborativeScorer::new(
            Arc::clone(&interactions),
            Arc::clone(&content),
            CollaborativeConfig::default(),
            CollaborativeMode::UserBased,
        ));
        let trending: Arc<dyn RecommendationAlgorithm> = Arc::new(TrendingScorer::new(
            Arc::clone(&interactions),
            Arc::clone(&content),
            TrendingConfig::default(),
            TrendingVariant::Hot,
        ));
        let hybrid: Arc<dyn RecommendationAlgorithm> = Arc::new(HybridScorer::new(
            Arc::clone(&interactions),
            Arc::clone(&content),
            Arc::clone(&content_based),
            Arc::clone(&collaborative),
            Arc::clone(&trending),
            HybridConfig::from_engine(&config),
        ));

        let mut algorithms: HashMap<AlgorithmKind, Arc<dyn RecommendationAlgorithm>> =
            HashMap::new();
        algorithms.insert(AlgorithmKind::ContentBased, content_based);
        algorithms.insert(AlgorithmKind::Collaborative, collaborative);
        algorithms.insert(AlgorithmKind::Trending, trending);
        algorithms.insert(AlgorithmKind::Hybrid, hybrid);

        Self { algorithms }
    }

    fn algorithm(&self, kind: AlgorithmKind) -> EngineResult<&Arc<dyn RecommendationAlgorithm>> {
        // All four kinds are inserted at construction
        self.algorithms.get(&kind).ok_or_else(|| {
            EngineError::Internal(format!("algorithm {} not registered", kind.as_str()))
        })
    }

    /// Generate recommendations with the named algorithm.
    ///
    /// Unknown algorithm names and invalid requests are rejected; runtime
    /// failures inside the chosen scorer surface as empty results tagged
    /// with a failure reason.
    pub async fn generate_recommendations(
        &self,
        algorithm: &str,
        request: &RecommendationRequest,
    ) -> EngineResult<RecommendationResult> {
        let kind = AlgorithmKind::from_str(algorithm)?;
        tracing::info!(
            algorithm = kind.as_str(),
            user_id = request.user_id,
            count = request.count,
            "Generating recommendations"
        );
        self.algorithm(kind)?.generate(request).await
    }

    /// Explain why the named algorithm would recommend this content item
    pub async fn explain_recommendation(
        &self,
        algorithm: &str,
        user_id: UserId,
        content_id: ContentId,
    ) -> EngineResult<Explanation> {
        if user_id < 0 {
            return Err(EngineError::Validation(
                "user_id must be a non-negative integer".to_string(),
            ));
        }
        let kind = AlgorithmKind::from_str(algorithm)?;
        self.algorithm(kind)?.explain(user_id, content_id).await
    }

    /// Names accepted by `generate_recommendations`
    pub fn available_algorithms(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.algorithms.keys().map(AlgorithmKind::as_str).collect();
        names.sort_unstable();
        names
    }
}
