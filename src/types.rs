//! Data types shared by preprocessing and models

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KnnError, Result};
use crate::models::metrics::Metric;

/// Length of every item's feature vector.
pub const FEATURE_COUNT: usize = 10;

/// Geographic category of an article. Declaration order is the vocabulary order
/// used when rendering the confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Place {
    Canada,
    France,
    Japan,
    Uk,
    Usa,
    WestGermany,
}

impl Place {
    pub const ALL: [Place; 6] = [
        Place::Canada,
        Place::France,
        Place::Japan,
        Place::Uk,
        Place::Usa,
        Place::WestGermany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Place::Canada => "canada",
            Place::France => "france",
            Place::Japan => "japan",
            Place::Uk => "uk",
            Place::Usa => "usa",
            Place::WestGermany => "west-germany",
        }
    }

    /// Row/column position in the confusion matrix.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Place {
    type Err = KnnError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Place::ALL
            .into_iter()
            .find(|place| place.as_str() == wanted)
            .ok_or_else(|| KnnError::UnknownLabel(s.to_string()))
    }
}

/// Labels attached to an item, either ground truth or predicted.
/// Ordered, so whole sets compare lexicographically.
pub type LabelSet = BTreeSet<Place>;

pub fn parse_labels<S: AsRef<str>>(labels: &[S]) -> Result<LabelSet> {
    labels.iter().map(|label| label.as_ref().parse()).collect()
}

/// Lexical statistic computed for every article, in canonical slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    TotalTokens,
    UniqueTokens,
    ShortTokens,
    MediumTokens,
    LongTokens,
    AverageTokenLength,
    NumericTokens,
    Keywords,
    KeywordsFirstHalf,
    KeywordDensity,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::TotalTokens,
        Feature::UniqueTokens,
        Feature::ShortTokens,
        Feature::MediumTokens,
        Feature::LongTokens,
        Feature::AverageTokenLength,
        Feature::NumericTokens,
        Feature::Keywords,
        Feature::KeywordsFirstHalf,
        Feature::KeywordDensity,
    ];

    /// Slot of this feature in an item's feature vector.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::TotalTokens => "total-tokens",
            Feature::UniqueTokens => "unique-tokens",
            Feature::ShortTokens => "short-tokens",
            Feature::MediumTokens => "medium-tokens",
            Feature::LongTokens => "long-tokens",
            Feature::AverageTokenLength => "average-token-length",
            Feature::NumericTokens => "numeric-tokens",
            Feature::Keywords => "keywords",
            Feature::KeywordsFirstHalf => "keywords-first-half",
            Feature::KeywordDensity => "keyword-density",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Feature::TotalTokens => "Count of all tokens in an article",
            Feature::UniqueTokens => "Count of unique tokens in an article",
            Feature::ShortTokens => "Count of short tokens in an article (length up to 3 chars)",
            Feature::MediumTokens => {
                "Count of medium tokens in an article (length between 4 and 7 chars)"
            }
            Feature::LongTokens => {
                "Count of long tokens in an article (length greater or equal 8 chars)"
            }
            Feature::AverageTokenLength => "Average length of tokens in an article",
            Feature::NumericTokens => {
                "Count of tokens representing a numerical value in an article"
            }
            Feature::Keywords => "Count of tokens which are keywords in an article",
            Feature::KeywordsFirstHalf => {
                "Count of tokens which are keywords and appear in the first half of an article"
            }
            Feature::KeywordDensity => "Density of keywords in an article",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = KnnError;

    /// Accepts the kebab-case name or the long description.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Feature::ALL
            .into_iter()
            .find(|feature| {
                feature.name().eq_ignore_ascii_case(trimmed) || feature.description() == trimmed
            })
            .ok_or_else(|| KnnError::UnknownFeature(s.to_string()))
    }
}

/// A classified article (“Article” in the corpus tooling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub labels: LabelSet,
    /// Raw extracted values; never rewritten by normalization.
    pub features: Vec<f64>,
    /// Latest predicted labels, one entry per metric that has been run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub predictions: BTreeMap<Metric, LabelSet>,
}

impl Item {
    pub fn new(id: u32, labels: LabelSet, features: Vec<f64>) -> Self {
        Self {
            id,
            labels,
            features,
            predictions: BTreeMap::new(),
        }
    }

    pub fn prediction(&self, metric: Metric) -> Option<&LabelSet> {
        self.predictions.get(&metric)
    }

    pub(crate) fn check_dimensions(&self) -> Result<()> {
        if self.features.len() != FEATURE_COUNT {
            return Err(KnnError::DimensionMismatch {
                expected: FEATURE_COUNT,
                actual: self.features.len(),
            });
        }
        Ok(())
    }
}
