//! Distance and similarity measures between feature vectors

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KnnError, Result};

/// Metric used to rank master items against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// sqrt(Σ(aᵢ−bᵢ)²)
    Euclidean,
    /// Σ|aᵢ−bᵢ|
    Manhattan,
    /// max|aᵢ−bᵢ|
    Chebyshev,
    /// Σ|aᵢ−bᵢ| / (|aᵢ|+|bᵢ|)
    Canberra,
    /// Pearson correlation coefficient; a similarity, larger is closer
    Correlation,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Euclidean,
        Metric::Manhattan,
        Metric::Chebyshev,
        Metric::Canberra,
        Metric::Correlation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "Euclidean",
            Metric::Manhattan => "Manhattan",
            Metric::Chebyshev => "Chebyshev",
            Metric::Canberra => "Canberra",
            Metric::Correlation => "Correlation",
        }
    }

    pub fn measure(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        match self {
            Metric::Euclidean => euclidean(a, b),
            Metric::Manhattan => manhattan(a, b),
            Metric::Chebyshev => chebyshev(a, b),
            Metric::Canberra => canberra(a, b),
            Metric::Correlation => correlation(a, b),
        }
    }

    /// Whether larger values mean closer vectors.
    pub fn is_similarity(&self) -> bool {
        matches!(self, Metric::Correlation)
    }

    /// Orders two measured values closest-first.
    pub fn closer_first(&self, a: f64, b: f64) -> Ordering {
        if self.is_similarity() {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = KnnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" => Ok(Metric::Manhattan),
            "chebyshev" => Ok(Metric::Chebyshev),
            "canberra" => Ok(Metric::Canberra),
            "correlation" | "pearson" | "correlation-coefficient" => Ok(Metric::Correlation),
            _ => Err(KnnError::UnknownMetric(s.to_string())),
        }
    }
}

fn check_dimensions(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(KnnError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

pub fn euclidean(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dimensions(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}

pub fn manhattan(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum())
}

pub fn chebyshev(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dimensions(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max))
}

pub fn canberra(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dimensions(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| {
            let denominator = x.abs() + y.abs();
            if denominator == 0.0 {
                0.0
            } else {
                (x - y).abs() / denominator
            }
        })
        .sum())
}

pub fn correlation(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dimensions(a, b)?;
    if a.is_empty() {
        return Ok(0.0);
    }

    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut sum_sq_a = 0.0;
    let mut sum_sq_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        numerator += dx * dy;
        sum_sq_a += dx * dx;
        sum_sq_b += dy * dy;
    }

    let denominator = sum_sq_a * sum_sq_b;
    if denominator == 0.0 {
        return Ok(0.0);
    }
    Ok(numerator / denominator.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn known_distances() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((euclidean(&a, &b).unwrap() - 5.0).abs() < EPS);
        assert!((manhattan(&a, &b).unwrap() - 7.0).abs() < EPS);
        assert!((chebyshev(&a, &b).unwrap() - 4.0).abs() < EPS);
        // both terms have |a|+|b| = |b|
        assert!((canberra(&a, &b).unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn canberra_skips_zero_denominators() {
        let a = [0.0, 1.0, -2.0];
        let b = [0.0, 3.0, 2.0];
        // 0 + 2/4 + 4/4
        assert!((canberra(&a, &b).unwrap() - 1.5).abs() < EPS);
    }

    #[test]
    fn correlation_detects_linear_relationships() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((correlation(&a, &up).unwrap() - 1.0).abs() < EPS);
        assert!((correlation(&a, &down).unwrap() + 1.0).abs() < EPS);
    }

    #[test]
    fn correlation_is_zero_without_variance() {
        let flat = [5.0, 5.0, 5.0];
        let a = [1.0, 2.0, 3.0];
        assert_eq!(correlation(&flat, &a).unwrap(), 0.0);
        assert_eq!(correlation(&flat, &flat).unwrap(), 0.0);
    }

    #[test]
    fn every_metric_rejects_mismatched_lengths() {
        for metric in Metric::ALL {
            let err = metric.measure(&[1.0, 2.0], &[1.0]).unwrap_err();
            assert!(matches!(
                err,
                KnnError::DimensionMismatch {
                    expected: 2,
                    actual: 1
                }
            ));
        }
    }

    #[test]
    fn closer_first_inverts_for_similarity() {
        assert_eq!(Metric::Euclidean.closer_first(1.0, 2.0), Ordering::Less);
        assert_eq!(Metric::Correlation.closer_first(1.0, 2.0), Ordering::Greater);
    }

    #[test]
    fn metric_names_parse() {
        assert_eq!("Canberra".parse::<Metric>().unwrap(), Metric::Canberra);
        assert_eq!("pearson".parse::<Metric>().unwrap(), Metric::Correlation);
        assert!(matches!(
            "cosine".parse::<Metric>(),
            Err(KnnError::UnknownMetric(_))
        ));
    }

    fn vector_pair() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
        (1usize..16).prop_flat_map(|len| {
            (
                prop::collection::vec(-100.0f64..100.0, len),
                prop::collection::vec(-100.0f64..100.0, len),
            )
        })
    }

    const DISTANCES: [Metric; 4] = [
        Metric::Euclidean,
        Metric::Manhattan,
        Metric::Chebyshev,
        Metric::Canberra,
    ];

    proptest! {
        #[test]
        fn distance_to_self_is_zero(a in prop::collection::vec(-100.0f64..100.0, 1..16)) {
            for metric in DISTANCES {
                prop_assert_eq!(metric.measure(&a, &a).unwrap(), 0.0);
            }
        }

        #[test]
        fn self_correlation_is_one_or_zero(a in prop::collection::vec(-100.0f64..100.0, 2..16)) {
            let r = correlation(&a, &a).unwrap();
            prop_assert!((r - 1.0).abs() < 1e-9 || r == 0.0);
        }

        #[test]
        fn distances_are_symmetric((a, b) in vector_pair()) {
            for metric in DISTANCES {
                let ab = metric.measure(&a, &b).unwrap();
                let ba = metric.measure(&b, &a).unwrap();
                prop_assert!((ab - ba).abs() < 1e-9);
            }
        }

        #[test]
        fn norm_inequality_holds((a, b) in vector_pair()) {
            let cheb = chebyshev(&a, &b).unwrap();
            let eucl = euclidean(&a, &b).unwrap();
            let manh = manhattan(&a, &b).unwrap();
            prop_assert!(cheb <= eucl + 1e-9);
            prop_assert!(eucl <= manh + 1e-9);
        }
    }
}
