//! Person profiles: the stored identity signature of one enrolled name.

use crate::types::NormalizedEmbedding;
use crate::vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProfileError {
    #[error("cannot build a profile from zero embeddings")]
    Empty,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding contains a non-finite value")]
    NonFinite,
}

/// All enrolled variant embeddings of one person plus their centroid and
/// dispersion statistics.
///
/// Replaced wholesale on re-enrollment; never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonProfile {
    pub embeddings: Vec<NormalizedEmbedding>,
    pub centroid: NormalizedEmbedding,
    /// Largest distance from any enrolled variant to the centroid.
    pub max_intra_distance: f32,
    /// Smallest cosine similarity of any enrolled variant to the centroid.
    pub min_intra_similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl PersonProfile {
    /// Build a profile from the flattened variant embeddings of one enrollment.
    ///
    /// The centroid is the re-normalized mean. The intra statistics describe
    /// how tightly the person's own variants cluster around it; they are
    /// reported, not used for matching.
    pub fn build(embeddings: Vec<NormalizedEmbedding>) -> Result<Self, ProfileError> {
        let dim = embeddings.first().ok_or(ProfileError::Empty)?.len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(ProfileError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        if embeddings.iter().any(|e| !vector::is_finite(e.as_slice())) {
            return Err(ProfileError::NonFinite);
        }

        let mean = vector::average(&embeddings).ok_or(ProfileError::Empty)?;
        let centroid = NormalizedEmbedding::new(&mean);

        let mut max_intra_distance = f32::NEG_INFINITY;
        let mut min_intra_similarity = f32::INFINITY;
        for e in &embeddings {
            max_intra_distance = max_intra_distance.max(e.distance(&centroid));
            min_intra_similarity = min_intra_similarity.min(e.similarity(&centroid));
        }
        // Huge finite components can still overflow the statistics.
        if !vector::is_finite(centroid.as_slice())
            || !max_intra_distance.is_finite()
            || !min_intra_similarity.is_finite()
        {
            return Err(ProfileError::NonFinite);
        }

        tracing::debug!(
            samples = embeddings.len(),
            dim,
            max_intra_distance,
            min_intra_similarity,
            "profile built"
        );

        Ok(Self {
            embeddings,
            centroid,
            max_intra_distance,
            min_intra_similarity,
            enrolled_at: Some(Utc::now()),
            model_version: None,
        })
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn samples(&self) -> usize {
        self.embeddings.len()
    }
}
