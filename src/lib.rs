//! Medley is a hybrid content recommendation engine.
//!
//! Four scoring strategies (content-based, collaborative filtering,
//! trending, and a hybrid blend of the three) rank content for a user
//! from interaction history and content metadata, consumed read-only
//! through the [`ports`] traits. Offline ranking metrics live in
//! [`eval`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use medley::{EngineConfig, RecommendationEngine, RecommendationRequest};
//! # async fn example(
//! #     interactions: Arc<dyn medley::InteractionPort>,
//! #     content: Arc<dyn medley::ContentPort>,
//! # ) -> anyhow::Result<()> {
//! let engine = RecommendationEngine::new(interactions, content, EngineConfig::from_env()?);
//! let request = RecommendationRequest::new(42, 10);
//! let result = engine.generate_recommendations("hybrid", &request).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod models;
pub mod ports;
pub mod scorers;

pub use config::EngineConfig;
pub use engine::RecommendationEngine;
pub use error::{EngineError, EngineResult};
pub use models::{
    ContentId, Explanation, Interaction, InteractionType, RecommendationContext,
    RecommendationRequest, RecommendationResult, UserId,
};
pub use ports::{ContentPort, InteractionPort};
pub use scorers::{AlgorithmKind, RecommendationAlgorithm};
