//! Distance metrics for vector dissimilarity

use crate::error::{EmbedDbError, Result};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Norm guard for cosine distance: keeps the denominator non-zero for
/// near-zero vectors instead of erroring or returning NaN.
const NORM_EPSILON: f64 = 1e-30;

/// Distance metrics for scoring vector dissimilarity. Lower is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean (L2) distance: sum((x_i - y_i)^2)
    L2,
    /// Cosine distance: 1 - dot(x,y) / ((|x| + eps) * (|y| + eps))
    Cosine,
    /// Inner-product distance: 1 - dot(x,y). Not a true metric — it is not
    /// bounded below and is not comparable across differently-normalized
    /// vectors. Treat it as a ranking score only.
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric.
    pub fn distance(&self, x: &Vector, y: &Vector) -> Result<f32> {
        if !x.has_same_dimension(y) {
            return Err(EmbedDbError::Dimensionality {
                expected: x.dimension(),
                actual: y.dimension(),
            });
        }

        Ok(match self {
            DistanceMetric::L2 => l2_distance(x, y),
            DistanceMetric::Cosine => cosine_distance(x, y),
            DistanceMetric::InnerProduct => 1.0 - dot_product(x, y),
        })
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::InnerProduct => write!(f, "ip"),
        }
    }
}

/// Squared Euclidean (L2) distance. No square root: ranking is unchanged
/// and an exact match scores 0 either way.
pub fn l2_distance(x: &Vector, y: &Vector) -> f32 {
    x.as_slice()
        .iter()
        .zip(y.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
}

/// Cosine distance: 1 - dot(x,y) / ((|x| + eps) * (|y| + eps)).
///
/// Accumulates in f64 so the epsilon-padded denominator survives for zero
/// vectors (a pair of zero vectors scores 1.0, not NaN). Range is
/// approximately [0, 2].
pub fn cosine_distance(x: &Vector, y: &Vector) -> f32 {
    let mut dot = 0f64;
    let mut nx = 0f64;
    let mut ny = 0f64;
    for (a, b) in x.as_slice().iter().zip(y.as_slice().iter()) {
        let (a, b) = (*a as f64, *b as f64);
        dot += a * b;
        nx += a * a;
        ny += b * b;
    }
    let denom = (nx.sqrt() + NORM_EPSILON) * (ny.sqrt() + NORM_EPSILON);
    (1.0 - dot / denom) as f32
}

/// Compute the dot product of two vectors
pub fn dot_product(x: &Vector, y: &Vector) -> f32 {
    x.as_slice()
        .iter()
        .zip(y.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}
