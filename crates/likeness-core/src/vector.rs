//! Vector math over fixed-length `f32` embeddings.
//!
//! These helpers operate on plain slices. Length agreement between operands
//! is the caller's responsibility; mismatched lengths are not detected here.

/// Euclidean (L2) norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// True when every component is a finite number.
pub fn is_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Scale `v` to unit length.
///
/// A zero or non-finite norm leaves the vector untouched instead of failing.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm > 0.0 && norm.is_finite() {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// √Σ(aᵢ−bᵢ)².
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Plain dot product Σaᵢbᵢ.
///
/// This equals cosine similarity only when both inputs are unit-normalized.
/// Prefer [`NormalizedEmbedding::similarity`](crate::NormalizedEmbedding::similarity),
/// which enforces that precondition through the type.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Element-wise mean of equal-length vectors. `None` for an empty collection.
pub fn average<V: AsRef<[f32]>>(vectors: &[V]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut acc = vec![0.0f32; first.as_ref().len()];

    for v in vectors {
        for (slot, x) in acc.iter_mut().zip(v.as_ref()) {
            *slot += x;
        }
    }

    let n = vectors.len() as f32;
    for x in &mut acc {
        *x /= n;
    }

    Some(acc)
}
