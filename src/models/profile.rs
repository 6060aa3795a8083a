use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{ContentSummary, UserId};

/// Derived user taste profile, built on demand from interaction history.
///
/// Never stored: each request builds a fresh profile from the current
/// interaction snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Number of qualifying (positive) interactions behind this profile
    pub total_interactions: usize,
    /// Whether enough data exists to personalize; when false the scorer
    /// falls back to trending instead of using a degenerate profile
    pub has_sufficient_data: bool,
    /// Top 20 tags by accumulated weight
    pub preferred_tags: Vec<String>,
    /// Top 5 categories by accumulated weight
    pub preferred_categories: Vec<i64>,
    /// Top 3 content types by accumulated weight
    pub preferred_content_types: Vec<String>,
    /// Raw accumulated weights, kept for similarity math
    pub tag_weights: HashMap<String, f64>,
    pub category_weights: HashMap<i64, f64>,
    pub content_type_weights: HashMap<String, f64>,
}

const MAX_PREFERRED_TAGS: usize = 20;
const MAX_PREFERRED_CATEGORIES: usize = 5;
const MAX_PREFERRED_CONTENT_TYPES: usize = 3;

impl UserProfile {
    /// Build a profile from weighted content features.
    ///
    /// `weighted_content` pairs each positively-interacted item with its
    /// combined recency-and-type weight. `min_interactions` gates
    /// `has_sufficient_data`; an insufficient profile keeps empty
    /// preference lists.
    pub fn build(
        user_id: UserId,
        weighted_content: &[(&ContentSummary, f64)],
        min_interactions: usize,
    ) -> Self {
        let mut profile = Self {
            user_id,
            total_interactions: weighted_content.len(),
            has_sufficient_data: weighted_content.len() >= min_interactions,
            ..Self::default()
        };

        if !profile.has_sufficient_data {
            return profile;
        }

        for (content, weight) in weighted_content {
            for tag in &content.tags {
                *profile.tag_weights.entry(tag.clone()).or_insert(0.0) += weight;
            }
            if let Some(category_id) = content.category_id {
                *profile.category_weights.entry(category_id).or_insert(0.0) += weight;
            }
            *profile
                .content_type_weights
                .entry(content.content_type.clone())
                .or_insert(0.0) += weight;
        }

        profile.preferred_tags = top_keys(&profile.tag_weights, MAX_PREFERRED_TAGS);
        profile.preferred_categories = top_keys(&profile.category_weights, MAX_PREFERRED_CATEGORIES);
        profile.preferred_content_types =
            top_keys(&profile.content_type_weights, MAX_PREFERRED_CONTENT_TYPES);

        profile
    }
}

/// Keys of a weight map ranked by weight descending, truncated to `limit`.
/// Ties break on the key for deterministic output.
fn top_keys<K: Clone + Ord>(weights: &HashMap<K, f64>, limit: usize) -> Vec<K> {
    let mut entries: Vec<(&K, f64)> = weights.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    entries.into_iter().take(limit).map(|(k, _)| k.clone()).collect()
}
