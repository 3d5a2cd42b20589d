//! Feature normalization

#![allow(non_snake_case)]

use std::f64::consts::SQRT_2;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{KnnError, Result};

/// Below this, a standard deviation is treated as zero.
const MIN_STD: f64 = 1e-12;

/// Which values the descriptive statistics are taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationScope {
    /// Each feature column across all items.
    PerFeature,
    /// Each item's own vector across its feature types.
    PerItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Center {
    Mean,
    Median,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizedOutput {
    /// The raw z-score.
    ZScore,
    /// 1 − Φ(|z|), in [0, 1].
    Survival,
}

impl NormalizedOutput {
    fn apply(&self, z: f64) -> f64 {
        match self {
            NormalizedOutput::ZScore => z,
            NormalizedOutput::Survival => survival(z),
        }
    }

    /// Value written for inputs without spread: the image of z = 0.
    pub fn neutral(&self) -> f64 {
        self.apply(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizationConfig {
    #[serde(default = "default_scope")]
    pub scope: NormalizationScope,
    #[serde(default = "default_center")]
    pub center: Center,
    #[serde(default = "default_output")]
    pub output: NormalizedOutput,
}

fn default_scope() -> NormalizationScope {
    NormalizationScope::PerFeature
}

fn default_center() -> Center {
    Center::Mean
}

fn default_output() -> NormalizedOutput {
    NormalizedOutput::Survival
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            center: default_center(),
            output: default_output(),
        }
    }
}

/// 1 − Φ(|z|) for the standard normal Φ.
pub fn survival(z: f64) -> f64 {
    0.5 * libm::erfc(z.abs() / SQRT_2)
}

pub fn median(values: ArrayView1<f64>) -> f64 {
    let mut sorted = values.to_vec();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (n − 1 denominator). `None` below two values.
pub fn standard_deviation(values: ArrayView1<f64>) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.std(1.0))
}

fn has_spread(std: f64) -> bool {
    std.is_finite() && std >= MIN_STD
}

fn center_of(values: ArrayView1<f64>, center: Center) -> f64 {
    match center {
        Center::Mean => values.mean().unwrap_or(0.0),
        Center::Median => median(values),
    }
}

fn normalize_view(
    values: ArrayView1<f64>,
    center: Center,
    output: NormalizedOutput,
) -> Result<Array1<f64>> {
    let std = standard_deviation(values)
        .filter(|s| has_spread(*s))
        .ok_or_else(|| KnnError::DegenerateFeatureVariance {
            context: format!("vector of {} values", values.len()),
        })?;
    let c = center_of(values, center);
    Ok(values.mapv(|v| output.apply((v - c) / std)))
}

/// Normalizes one vector against its own statistics.
///
/// Fails with [`KnnError::DegenerateFeatureVariance`] when all values are equal
/// (or fewer than two are given), instead of dividing by zero.
pub fn normalize_values(
    values: &[f64],
    center: Center,
    output: NormalizedOutput,
) -> Result<Vec<f64>> {
    Ok(normalize_view(ArrayView1::from(values), center, output)?.to_vec())
}

/// Fitted normalizer over an (items × features) matrix.
///
/// Per-feature scope learns one center/σ per column in [`fit`](Self::fit).
/// Per-item scope needs no fitting; every row uses its own statistics.
/// Columns or rows without spread are reported in
/// [`degenerate`](Self::degenerate) and mapped to the neutral value.
pub struct DataNormalizer {
    config: NormalizationConfig,
    centers: Option<Array1<f64>>,
    std: Option<Array1<f64>>,
    degenerate: Vec<usize>,
    is_fitted: bool,
}

impl DataNormalizer {
    pub fn new(config: NormalizationConfig) -> Self {
        Self {
            config,
            centers: None,
            std: None,
            degenerate: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> NormalizationConfig {
        self.config
    }

    /// Columns (per-feature) or rows (per-item) that had no spread in the
    /// last `fit`/`transform`.
    pub fn degenerate(&self) -> &[usize] {
        &self.degenerate
    }

    /// An empty matrix fits fine: every column is then degenerate.
    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        self.degenerate.clear();
        if self.config.scope == NormalizationScope::PerFeature {
            let columns = X.ncols();
            if X.nrows() == 0 {
                tracing::warn!("No items to fit; every feature maps to the neutral value");
            }

            let mut std = if X.nrows() < 2 {
                Array1::from_elem(columns, f64::NAN)
            } else {
                X.std_axis(Axis(0), 1.0)
            };
            let centers = match self.config.center {
                Center::Mean => X
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(columns)),
                Center::Median => X.axis_iter(Axis(1)).map(median).collect::<Array1<f64>>(),
            };

            for (j, s) in std.iter_mut().enumerate() {
                if !has_spread(*s) {
                    if X.nrows() > 0 {
                        tracing::warn!("zero variance in feature column {}; mapped to neutral", j);
                    }
                    self.degenerate.push(j);
                    *s = f64::NAN;
                }
            }
            self.centers = Some(centers);
            self.std = Some(std);
        }

        self.is_fitted = true;
        Ok(())
    }

    pub fn transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(KnnError::invalid("normalizer", "not fitted"));
        }

        let mut normalized = X.clone();
        match self.config.scope {
            NormalizationScope::PerFeature => {
                for mut row in normalized.rows_mut() {
                    let values = self.transform_row(row.view())?;
                    row.assign(&values);
                }
            }
            NormalizationScope::PerItem => {
                self.degenerate.clear();
                let NormalizationConfig { center, output, .. } = self.config;
                for (i, mut row) in normalized.rows_mut().into_iter().enumerate() {
                    match normalize_view(row.view(), center, output) {
                        Ok(values) => row.assign(&values),
                        Err(e) => {
                            tracing::warn!("row {}: {}; row mapped to the neutral value", i, e);
                            self.degenerate.push(i);
                            row.fill(output.neutral());
                        }
                    }
                }
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }

    /// Normalizes a single vector the same way `transform` treats a row.
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(KnnError::invalid("normalizer", "not fitted"));
        }

        let output = self.config.output;
        match self.config.scope {
            NormalizationScope::PerFeature => {
                let centers = self
                    .centers
                    .as_ref()
                    .ok_or_else(|| KnnError::invalid("normalizer", "centers not computed"))?;
                let std = self
                    .std
                    .as_ref()
                    .ok_or_else(|| KnnError::invalid("normalizer", "std not computed"))?;
                if row.len() != centers.len() {
                    return Err(KnnError::DimensionMismatch {
                        expected: centers.len(),
                        actual: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(centers.iter().zip(std.iter()))
                    .map(|(v, (c, s))| {
                        if s.is_nan() {
                            output.neutral()
                        } else {
                            output.apply((v - c) / s)
                        }
                    })
                    .collect())
            }
            NormalizationScope::PerItem => {
                match normalize_view(row, self.config.center, output) {
                    Ok(values) => Ok(values),
                    Err(e) => {
                        tracing::warn!("{}; vector mapped to the neutral value", e);
                        Ok(Array1::from_elem(row.len(), output.neutral()))
                    }
                }
            }
        }
    }
}

impl Default for DataNormalizer {
    fn default() -> Self {
        Self::new(NormalizationConfig::default())
    }
}
