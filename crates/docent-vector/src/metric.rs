//! Distance metrics and their similarity mappings.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Distance metric a store is created with.
///
/// The metric is fixed for the lifetime of a collection. Every metric owns a
/// monotonically non-increasing mapping from its raw distance to a similarity
/// in `[0.0, 1.0]`, where `1.0` means identical:
///
/// | Metric         | Distance range | Similarity               |
/// |----------------|----------------|--------------------------|
/// | `Cosine`       | `[0, 2]`       | `clamp(1 - d/2, 0, 1)`   |
/// | `InnerProduct` | `[0, 2]`       | `clamp(1 - d/2, 0, 1)`   |
/// | `SquaredL2`    | `[0, inf)`     | `1 / (1 + d)`            |
///
/// `InnerProduct` distance is `1 - <a, b>` and assumes unit-length vectors.
/// Non-finite distances map to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DistanceMetric {
    /// Cosine distance, `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// Inner-product distance, `1 - <a, b>`.
    InnerProduct,
    /// Squared euclidean distance.
    #[strum(to_string = "squared_l2", serialize = "l2")]
    SquaredL2,
}

impl DistanceMetric {
    /// Converts a raw distance into a similarity in `[0.0, 1.0]`.
    pub fn similarity(&self, distance: f64) -> f64 {
        if !distance.is_finite() {
            return 0.0;
        }

        match self {
            Self::Cosine | Self::InnerProduct => (1.0 - distance / 2.0).clamp(0.0, 1.0),
            Self::SquaredL2 => 1.0 / (1.0 + distance.max(0.0)),
        }
    }

    /// Computes the raw distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            Self::Cosine => {
                let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
                for (x, y) in a.iter().zip(b) {
                    let (x, y) = (f64::from(*x), f64::from(*y));
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }

                if norm_a == 0.0 || norm_b == 0.0 {
                    // A zero vector has no direction; treat it as orthogonal.
                    return 1.0;
                }

                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            Self::InnerProduct => {
                let dot: f64 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| f64::from(*x) * f64::from(*y))
                    .sum();
                1.0 - dot
            }
            Self::SquaredL2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum(),
        }
    }

    /// Returns the Chroma `hnsw:space` name for this metric.
    pub fn chroma_space(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::InnerProduct => "ip",
            Self::SquaredL2 => "l2",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_endpoints() {
        let metric = DistanceMetric::Cosine;
        assert_eq!(metric.similarity(0.0), 1.0);
        assert_eq!(metric.similarity(2.0), 0.0);
        assert_eq!(metric.similarity(1.0), 0.5);
    }

    #[test]
    fn cosine_similarity_is_monotonic() {
        let metric = DistanceMetric::Cosine;
        let mut previous = metric.similarity(0.0);
        for step in 1..=200 {
            let current = metric.similarity(f64::from(step) * 0.01);
            assert!(current <= previous, "similarity increased at step {step}");
            previous = current;
        }
    }

    #[test]
    fn cosine_similarity_is_clamped() {
        let metric = DistanceMetric::Cosine;
        assert_eq!(metric.similarity(-0.5), 1.0);
        assert_eq!(metric.similarity(3.0), 0.0);
        assert_eq!(metric.similarity(f64::NAN), 0.0);
    }

    #[test]
    fn squared_l2_similarity() {
        let metric = DistanceMetric::SquaredL2;
        assert_eq!(metric.similarity(0.0), 1.0);
        assert_eq!(metric.similarity(1.0), 0.5);
        assert!(metric.similarity(100.0) < metric.similarity(10.0));
        assert_eq!(metric.similarity(f64::INFINITY), 0.0);
    }

    #[test]
    fn cosine_distance() {
        let metric = DistanceMetric::Cosine;
        assert!(metric.distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-9);
        assert!((metric.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert!((metric.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
        assert_eq!(metric.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn squared_l2_distance() {
        let metric = DistanceMetric::SquaredL2;
        assert_eq!(metric.distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[test]
    fn parse_from_str() {
        assert_eq!("cosine".parse::<DistanceMetric>().ok(), Some(DistanceMetric::Cosine));
        assert_eq!("L2".parse::<DistanceMetric>().ok(), Some(DistanceMetric::SquaredL2));
        assert_eq!(
            "inner_product".parse::<DistanceMetric>().ok(),
            Some(DistanceMetric::InnerProduct)
        );
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }
}
