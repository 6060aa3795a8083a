use serde::Deserialize;

/// Engine configuration loaded from environment variables.
///
/// These are the operational knobs (candidate pool sizes, scorer timeout,
/// peak-hour window). Per-algorithm scoring parameters live in the
/// algorithm config structs below and are immutable once a scorer is
/// constructed.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Maximum candidates requested from each component scorer
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Per-scorer timeout inside the hybrid fan-out, in milliseconds
    #[serde(default = "default_scorer_timeout_ms")]
    pub scorer_timeout_ms: u64,

    /// Start of the peak-hours window (inclusive, 0-23)
    #[serde(default = "default_peak_start_hour")]
    pub peak_start_hour: u32,

    /// End of the peak-hours window (inclusive, 0-23)
    #[serde(default = "default_peak_end_hour")]
    pub peak_end_hour: u32,

    /// Whether hybrid requests are bucketed into A/B weight variants
    #[serde(default)]
    pub ab_testing_enabled: bool,
}

fn default_candidate_limit() -> usize {
    50
}

fn default_scorer_timeout_ms() -> u64 {
    5_000
}

fn default_peak_start_hour() -> u32 {
    18
}

fn default_peak_end_hour() -> u32 {
    22
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            scorer_timeout_ms: default_scorer_timeout_ms(),
            peak_start_hour: default_peak_start_hour(),
            peak_end_hour: default_peak_end_hour(),
            ab_testing_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (MEDLEY_* prefix)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::prefixed("MEDLEY_")
            .from_env::<EngineConfig>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}

/// Parameters for the content-based scorer
#[derive(Debug, Clone)]
pub struct ContentBasedConfig {
    /// Minimum qualifying interactions to build a profile
    pub min_interactions: usize,
    /// Similarity component weights
    pub tag_weight: f64,
    pub category_weight: f64,
    pub content_type_weight: f64,
    pub text_weight: f64,
    /// Candidate pool size fetched from the content port
    pub candidate_limit: usize,
    /// Trending-fallback window in days
    pub fallback_window_days: i64,
}

impl Default for ContentBasedConfig {
    fn default() -> Self {
        Self {
            min_interactions: 3,
            tag_weight: 0.4,
            category_weight: 0.3,
            content_type_weight: 0.2,
            text_weight: 0.1,
            candidate_limit: 100,
            fallback_window_days: 7,
        }
    }
}

/// Parameters for the collaborative-filtering scorer
#[derive(Debug, Clone)]
pub struct CollaborativeConfig {
    /// Minimum positive interactions before personalizing
    pub min_interactions: usize,
    /// Maximum similar users considered in user-based mode
    pub max_similar_users: usize,
    /// Similar-content candidates fetched per liked item in item-based mode
    pub similar_content_limit: usize,
    /// Trending-fallback window in days
    pub fallback_window_days: i64,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            min_interactions: 5,
            max_similar_users: 50,
            similar_content_limit: 20,
            fallback_window_days: 30,
        }
    }
}

/// Parameters for the trending scorer
#[derive(Debug, Clone)]
pub struct TrendingConfig {
    /// Minimum interactions for a content item to qualify
    pub min_interactions: usize,
    /// Minimum distinct users for a content item to qualify
    pub min_unique_users: usize,
    /// Velocity floor for the rising variant (fractional growth)
    pub rising_velocity_threshold: f64,
    /// Multiplier floor for the viral variant
    pub viral_multiplier_threshold: f64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            min_interactions: 5,
            min_unique_users: 3,
            rising_velocity_threshold: 0.10,
            viral_multiplier_threshold: 1.5,
        }
    }
}

/// Parameters for the hybrid orchestrator
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Candidates requested from each component scorer
    pub candidate_limit: usize,
    /// Per-scorer timeout in milliseconds
    pub scorer_timeout_ms: u64,
    /// Interaction count below which a user is treated as new
    pub min_interactions_for_personalization: u64,
    /// Peak-hours window (inclusive bounds, 0-23)
    pub peak_start_hour: u32,
    pub peak_end_hour: u32,
    /// Bucket requests into A/B weight variants by user id
    pub ab_testing_enabled: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 50,
            scorer_timeout_ms: 5_000,
            min_interactions_for_personalization: 5,
            peak_start_hour: 18,
            peak_end_hour: 22,
            ab_testing_enabled: false,
        }
    }
}

impl HybridConfig {
    /// Derive the hybrid parameters from the engine-level configuration
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            candidate_limit: config.candidate_limit,
            scorer_timeout_ms: config.scorer_timeout_ms,
            peak_start_hour: config.peak_start_hour,
            peak_end_hour: config.peak_end_hour,
            ab_testing_enabled: config.ab_testing_enabled,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.candidate_limit, 50);
        assert_eq!(config.scorer_timeout_ms, 5_000);
        assert_eq!(config.peak_start_hour, 18);
        assert_eq!(config.peak_end_hour, 22);
        assert!(!config.ab_testing_enabled);
    }

    #[test]
    fn test_content_based_weights_sum_to_one() {
        let config = ContentBasedConfig::default();
        let total = config.tag_weight
            + config.category_weight
            + config.content_type_weight
            + config.text_weight;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_from_engine() {
        let engine = EngineConfig {
            candidate_limit: 25,
            scorer_timeout_ms: 100,
            peak_start_hour: 19,
            peak_end_hour: 23,
            ab_testing_enabled: true,
        };
        let hybrid = HybridConfig::from_engine(&engine);
        assert_eq!(hybrid.candidate_limit, 25);
        assert_eq!(hybrid.scorer_timeout_ms, 100);
        assert_eq!(hybrid.peak_start_hour, 19);
        assert!(hybrid.ab_testing_enabled);
        assert_eq!(hybrid.min_interactions_for_personalization, 5);
    }
}
