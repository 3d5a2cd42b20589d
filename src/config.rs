//! Classifier run configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KnnError, Result};
use crate::models::metrics::Metric;
use crate::preprocessing::feature_selection::FeatureSelector;
use crate::preprocessing::normalization::NormalizationConfig;
use crate::preprocessing::split::check_ratio;
use crate::types::Feature;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Share of the dataset used as the master set.
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    #[serde(default = "default_features")]
    pub features: Vec<Feature>,
    #[serde(default = "default_metric")]
    pub metric: Metric,
    #[serde(default)]
    pub normalization: NormalizationConfig,
}

fn default_k() -> usize {
    3
}

fn default_split_ratio() -> f64 {
    0.6
}

fn default_metric() -> Metric {
    Metric::Canberra
}

fn default_features() -> Vec<Feature> {
    vec![
        Feature::UniqueTokens,
        Feature::ShortTokens,
        Feature::MediumTokens,
        Feature::LongTokens,
        Feature::AverageTokenLength,
        Feature::NumericTokens,
        Feature::KeywordsFirstHalf,
        Feature::KeywordDensity,
    ]
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            split_ratio: default_split_ratio(),
            features: default_features(),
            metric: default_metric(),
            normalization: NormalizationConfig::default(),
        }
    }
}

impl KnnConfig {
    /// Builds a configuration from free-form names, as feature and metric
    /// choices arrive from outside the crate.
    pub fn from_names<S: AsRef<str>>(
        k: usize,
        split_ratio: f64,
        feature_names: &[S],
        metric_name: &str,
    ) -> Result<Self> {
        let features = feature_names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Feature>>>()?;
        let config = Self {
            k,
            split_ratio,
            features,
            metric: metric_name.parse()?,
            normalization: NormalizationConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(KnnError::invalid("k", "must be at least 1"));
        }
        check_ratio(self.split_ratio)?;
        if self.features.is_empty() {
            return Err(KnnError::invalid("features", "at least one feature must be selected"));
        }
        Ok(())
    }

    /// Selected slots, in canonical order.
    pub fn feature_indices(&self) -> Vec<usize> {
        FeatureSelector::indices_of(&self.features)
    }

    pub fn with_k(&self, k: usize) -> Self {
        Self { k, ..self.clone() }
    }

    pub fn with_metric(&self, metric: Metric) -> Self {
        Self { metric, ..self.clone() }
    }

    /// `count` configurations starting at this one's k, each `step` further.
    pub fn k_sweep(&self, step: usize, count: usize) -> Vec<Self> {
        (0..count).map(|i| self.with_k(self.k + i * step)).collect()
    }
}
