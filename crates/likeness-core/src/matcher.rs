//! Match decisions: query variants against a stored person profile.

use crate::profile::PersonProfile;
use crate::types::NormalizedEmbedding;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.95;
pub const DEFAULT_COSINE_THRESHOLD: f32 = 0.62;
pub const DEFAULT_REQUIRED_VARIANT_MATCHES: usize = 1;

/// Decision thresholds, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// A pair passes when its Euclidean distance is at most this.
    pub distance: f32,
    /// A pair passes when its cosine similarity is at least this.
    pub cosine: f32,
    /// Minimum number of passing pairs for a match.
    pub required_variant_matches: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            distance: DEFAULT_DISTANCE_THRESHOLD,
            cosine: DEFAULT_COSINE_THRESHOLD,
            required_variant_matches: DEFAULT_REQUIRED_VARIANT_MATCHES,
        }
    }
}

/// Result of comparing one query photo against one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Smallest distance over all (query, stored) variant pairs.
    pub min_distance: f32,
    /// Largest similarity over all (query, stored) variant pairs.
    pub max_similarity: f32,
    /// Distance from the first query variant to the stored centroid. Reported only.
    pub centroid_distance: f32,
    /// Similarity of the first query variant to the stored centroid. Reported only.
    pub centroid_similarity: f32,
    /// Pairs passing both thresholds at once.
    pub variant_matches: usize,
    pub is_match: bool,
    pub thresholds: Thresholds,
}

/// Strategy for comparing query embeddings against a stored profile.
pub trait Matcher {
    fn compare(&self, query: &[NormalizedEmbedding], profile: &PersonProfile) -> MatchResult;
}

/// Exhaustive pairwise voting over every (query variant, stored variant) pair.
///
/// A pair votes when it satisfies the distance and the cosine threshold
/// together. The final decision also requires the global best distance and
/// best similarity to pass, and at least `required_variant_matches` votes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantVotingMatcher {
    pub thresholds: Thresholds,
}

impl VariantVotingMatcher {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Matcher for VariantVotingMatcher {
    fn compare(&self, query: &[NormalizedEmbedding], profile: &PersonProfile) -> MatchResult {
        let t = self.thresholds;
        let mut min_distance = f32::INFINITY;
        let mut max_similarity = f32::NEG_INFINITY;
        let mut variant_matches = 0usize;

        // No early exit: every pair contributes to min/max.
        for q in query {
            for stored in &profile.embeddings {
                let distance = q.distance(stored);
                let similarity = q.similarity(stored);
                min_distance = min_distance.min(distance);
                max_similarity = max_similarity.max(similarity);
                if distance <= t.distance && similarity >= t.cosine {
                    variant_matches += 1;
                }
            }
        }

        // Centroid figures use the first query variant (the full frame) only.
        let (centroid_distance, centroid_similarity) = match query.first() {
            Some(first) => (
                first.distance(&profile.centroid),
                first.similarity(&profile.centroid),
            ),
            None => (f32::INFINITY, f32::NEG_INFINITY),
        };

        let is_match = min_distance <= t.distance
            && max_similarity >= t.cosine
            && variant_matches >= t.required_variant_matches;

        MatchResult {
            min_distance,
            max_similarity,
            centroid_distance,
            centroid_similarity,
            variant_matches,
            is_match,
            thresholds: t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(values: &[f32]) -> NormalizedEmbedding {
        NormalizedEmbedding::new(values)
    }

    fn profile_of(embeddings: Vec<NormalizedEmbedding>) -> PersonProfile {
        PersonProfile::build(embeddings).unwrap()
    }

    #[test]
    fn test_identical_variants_all_vote() {
        let variants = vec![
            unit(&[1.0, 0.1, 0.0]),
            unit(&[1.0, 0.0, 0.1]),
            unit(&[0.9, 0.1, 0.1]),
        ];
        let profile = profile_of(variants.clone());
        let result = VariantVotingMatcher::default().compare(&variants, &profile);
        assert!(result.min_distance.abs() < 1e-6);
        assert!((result.max_similarity - 1.0).abs() < 1e-6);
        assert_eq!(result.variant_matches, 9);
        assert!(result.is_match);
    }

    #[test]
    fn test_orthogonal_query_rejected() {
        let profile = profile_of(vec![unit(&[1.0, 0.0])]);
        let result = VariantVotingMatcher::default().compare(&[unit(&[0.0, 1.0])], &profile);
        assert_eq!(result.variant_matches, 0);
        assert!(!result.is_match);
        assert!(result.max_similarity.abs() < 1e-6);
    }

    #[test]
    fn test_zero_distance_threshold_rejects_non_identical() {
        let profile = profile_of(vec![unit(&[1.0, 0.0, 0.0])]);
        let query = [unit(&[1.0, 0.01, 0.0])];
        let thresholds = Thresholds {
            distance: 0.0,
            ..Thresholds::default()
        };
        let result = VariantVotingMatcher::new(thresholds).compare(&query, &profile);
        assert!(result.max_similarity > 0.99);
        assert!(!result.is_match);
    }

    #[test]
    fn test_votes_are_conjunctive_per_pair() {
        let profile = profile_of(vec![unit(&[1.0, 0.0]), unit(&[0.0, 1.0])]);
        // Against [1, 0]: distance ≈ 0.283, similarity 0.96.
        let q = unit(&[0.96, 0.28]);

        let loose = Thresholds {
            distance: 0.5,
            cosine: 0.95,
            required_variant_matches: 1,
        };
        let result = VariantVotingMatcher::new(loose).compare(&[q.clone()], &profile);
        assert_eq!(result.variant_matches, 1);
        assert!(result.is_match);

        // Distance still passes, similarity no longer does: no vote.
        let strict_cosine = Thresholds {
            cosine: 0.99,
            ..loose
        };
        let result = VariantVotingMatcher::new(strict_cosine).compare(&[q], &profile);
        assert!(result.min_distance <= strict_cosine.distance);
        assert_eq!(result.variant_matches, 0);
        assert!(!result.is_match);
    }

    #[test]
    fn test_required_votes_gate_decision() {
        let stored = vec![unit(&[1.0, 0.0]), unit(&[0.0, 1.0])];
        let profile = profile_of(stored);
        let thresholds = Thresholds {
            required_variant_matches: 2,
            ..Thresholds::default()
        };
        let result = VariantVotingMatcher::new(thresholds).compare(&[unit(&[1.0, 0.0])], &profile);
        assert_eq!(result.variant_matches, 1);
        assert!(!result.is_match);
    }

    #[test]
    fn test_centroid_uses_first_query_variant() {
        let profile = profile_of(vec![unit(&[1.0, 0.0])]);
        let query = [unit(&[0.0, 1.0]), unit(&[1.0, 0.0])];
        let result = VariantVotingMatcher::default().compare(&query, &profile);
        // Second variant is identical, but centroid figures come from the first.
        assert!(result.centroid_similarity.abs() < 1e-6);
        assert!((result.centroid_distance - std::f32::consts::SQRT_2).abs() < 1e-6);
        assert!(result.is_match);
    }

    #[test]
    fn test_empty_query_is_non_match() {
        let profile = profile_of(vec![unit(&[1.0, 0.0])]);
        let result = VariantVotingMatcher::default().compare(&[], &profile);
        assert!(!result.is_match);
        assert_eq!(result.variant_matches, 0);
        assert_eq!(result.min_distance, f32::INFINITY);
    }
}
