//! Distance kernels over dense float vectors.
//!
//! Every kernel returns a *distance*: smaller is always better, including
//! [`dot`], which negates the raw dot product so the universal ranking rule
//! holds across all three metrics.

use crate::config::DistanceMetric;
use crate::error::{Result, VdbError};

/// Checks that every component of `v` is finite, returning
/// [`VdbError::NumericDomain`] on the first NaN or infinite value found.
pub fn validate_finite(v: &[f32]) -> Result<()> {
    for (i, x) in v.iter().enumerate() {
        if !x.is_finite() {
            return Err(VdbError::numeric_domain(format!(
                "component {i} is not finite: {x}"
            )));
        }
    }
    Ok(())
}

/// Checks that `v.len() == expected`, returning
/// [`VdbError::DimensionMismatch`] otherwise.
pub fn validate_dimension(v: &[f32], expected: usize) -> Result<()> {
    if v.len() != expected {
        return Err(VdbError::dimension_mismatch(expected, v.len()));
    }
    Ok(())
}

/// Euclidean (L2) norm of `v`.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Returns a unit-length copy of `v`. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / n).collect()
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine distance: `1 - cos(a, b)`. When either vector has zero norm,
/// returns `1.0` (maximally dissimilar) rather than dividing by zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot_product(a, b) / (na * nb)
}

/// Euclidean distance: `sqrt(sum((a_i - b_i)^2))`.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Negated dot product, expressed as a distance: smaller is more similar.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    -dot_product(a, b)
}

/// Computes distance between `a` and `b` using the given metric.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine(a, b),
        DistanceMetric::Euclidean => euclidean(a, b),
        DistanceMetric::Dot => dot(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors_is_zero() {
        let v = [1.0, 2.0, 3.0];
        assert!(cosine(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors_is_one() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_maximally_dissimilar() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(cosine(&a, &b), 1.0);
    }

    #[test]
    fn test_euclidean_identical_vectors_is_zero() {
        let v = [1.0, -2.0, 3.5];
        assert_eq!(euclidean(&v, &v), 0.0);
    }

    #[test]
    fn test_euclidean_known_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((euclidean(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_negates_similarity() {
        let a = [1.0, 1.0];
        let b = [1.0, 1.0];
        assert_eq!(dot(&a, &b), -2.0);
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = [3.0, 4.0];
        let n = normalize(&v);
        assert!((norm(&n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let v = [0.0, 0.0];
        assert_eq!(normalize(&v), v.to_vec());
    }

    #[test]
    fn test_validate_finite_rejects_nan() {
        let v = [1.0, f32::NAN];
        let err = validate_finite(&v).unwrap_err();
        assert!(err.is_numeric_domain());
    }

    #[test]
    fn test_validate_finite_rejects_infinity() {
        let v = [f32::INFINITY, 0.0];
        assert!(validate_finite(&v).is_err());
    }

    #[test]
    fn test_validate_finite_accepts_normal_values() {
        let v = [1.0, -2.0, 0.0];
        assert!(validate_finite(&v).is_ok());
    }

    #[test]
    fn test_validate_dimension_mismatch() {
        let v = [1.0, 2.0];
        let err = validate_dimension(&v, 3).unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn test_distance_dispatches_by_metric() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert_eq!(distance(DistanceMetric::Euclidean, &a, &b), euclidean(&a, &b));
        assert_eq!(distance(DistanceMetric::Cosine, &a, &b), cosine(&a, &b));
        assert_eq!(distance(DistanceMetric::Dot, &a, &b), dot(&a, &b));
    }

    #[test]
    fn test_stability_with_large_dimension_and_magnitude() {
        let d = 10_000;
        let a: Vec<f32> = (0..d).map(|i| (i % 1000) as f32 - 500.0).collect();
        let b: Vec<f32> = (0..d).map(|i| ((i + 7) % 1000) as f32 - 500.0).collect();
        let dist = euclidean(&a, &b);
        assert!(dist.is_finite());
        let dist = cosine(&a, &b);
        assert!(dist.is_finite());
    }
}
