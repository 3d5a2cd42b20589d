//! Data preparation ahead of classification

pub mod feature_selection;
pub mod normalization;
pub mod split;

pub use feature_selection::FeatureSelector;
pub use normalization::{
    Center, DataNormalizer, NormalizationConfig, NormalizationScope, NormalizedOutput,
};
pub use split::{Dataset, Split};
