use crate::vector;
use serde::{Deserialize, Serialize};

/// Raw face embedding as produced by the recognizer (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// L2-normalize into a [`NormalizedEmbedding`].
    pub fn normalize(&self) -> NormalizedEmbedding {
        NormalizedEmbedding::new(&self.values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An embedding scaled to unit length.
///
/// The only way to build one is through [`vector::normalize`], so the dot
/// product in [`similarity`](Self::similarity) is a true cosine similarity.
/// Degenerate inputs (zero or non-finite norm) are kept as-is.
///
/// Serialized as a bare float array. Deserialization re-normalizes, which is
/// a no-op (up to rounding) for vectors that were written normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct NormalizedEmbedding(Vec<f32>);

impl NormalizedEmbedding {
    pub fn new(values: &[f32]) -> Self {
        Self(vector::normalize(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &NormalizedEmbedding) -> f32 {
        vector::cosine_similarity(&self.0, &other.0)
    }

    /// Euclidean distance in [0, 2] between unit vectors.
    pub fn distance(&self, other: &NormalizedEmbedding) -> f32 {
        vector::euclidean_distance(&self.0, &other.0)
    }
}

impl AsRef<[f32]> for NormalizedEmbedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for NormalizedEmbedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(&values)
    }
}

impl From<NormalizedEmbedding> for Vec<f32> {
    fn from(embedding: NormalizedEmbedding) -> Self {
        embedding.0
    }
}
