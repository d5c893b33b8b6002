//! Cosine distance for the flat index.
//!
//! Distance is `1 - cosine_similarity`, range \[0, 2\], lower is better. Inner
//! loops run over fixed-size chunks so the compiler can auto-vectorize them.

use serde::{Deserialize, Serialize};

/// Distance metric recorded in a collection header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance: `1 - cosine_similarity`.
    #[default]
    Cosine,
}

impl DistanceMetric {
    /// Distance between a query and a stored vector whose norm is already known.
    #[inline]
    pub fn distance_prenorm(&self, query: &[f32], query_norm: f32, stored: &[f32], stored_norm: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let denom = query_norm * stored_norm;
                if denom < 1e-10 {
                    return 1.0;
                }
                1.0 - dot(query, stored) / denom
            }
        }
    }

    /// Exact distance between two vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.distance_prenorm(a, norm(a), b, norm(b))
    }
}

const CHUNK: usize = 16;

/// Dot product with chunked f32 accumulation.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut acc = [0.0f32; CHUNK];
    let mut ca = a.chunks_exact(CHUNK);
    let mut cb = b.chunks_exact(CHUNK);
    for (xa, xb) in ca.by_ref().zip(cb.by_ref()) {
        for j in 0..CHUNK {
            acc[j] += xa[j] * xb[j];
        }
    }
    let mut sum: f32 = acc.iter().sum();
    for (x, y) in ca.remainder().iter().zip(cb.remainder()) {
        sum += x * y;
    }
    sum
}

/// Euclidean norm.
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_zero() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0]);
        assert!(d.abs() < 1e-6, "self-distance should be ~0, got {d}");
    }

    #[test]
    fn test_orthogonal_is_one() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!((d - 1.0).abs() < 1e-6, "orthogonal cosine distance = 1.0, got {d}");
    }

    #[test]
    fn test_opposite_is_two() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_maximally_unrelated() {
        let d = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);
        assert_eq!(d, 1.0);
    }

    #[test]
    fn test_scale_invariant() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 1.0], &[5.0, 5.0]);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn test_dot_with_remainder() {
        let a: Vec<f32> = (0..37).map(|i| i as f32).collect();
        let expected: f32 = a.iter().map(|x| x * x).sum();
        assert!((dot(&a, &a) - expected).abs() < 1e-2);
    }

    #[test]
    fn test_metric_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DistanceMetric::Cosine).unwrap(), "\"cosine\"");
    }
}
