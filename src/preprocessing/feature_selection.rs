//! Mapping of requested features onto feature-vector slots

use crate::error::Result;
use crate::types::{Feature, FEATURE_COUNT};

pub struct FeatureSelector;

impl FeatureSelector {
    /// Resolves feature names to slot indices.
    ///
    /// The result follows canonical slot order, whatever order the names were
    /// given in; repeated names collapse to one slot.
    pub fn select_indices<S: AsRef<str>>(names: &[S]) -> Result<Vec<usize>> {
        let features = names
            .iter()
            .map(|name| name.as_ref().parse::<Feature>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::indices_of(&features))
    }

    pub fn indices_of(features: &[Feature]) -> Vec<usize> {
        let mut selected = [false; FEATURE_COUNT];
        for feature in features {
            selected[feature.index()] = true;
        }
        (0..FEATURE_COUNT).filter(|&slot| selected[slot]).collect()
    }

    /// Same as [`indices_of`](Self::indices_of) but returning the features themselves.
    pub fn canonical(features: &[Feature]) -> Vec<Feature> {
        Self::indices_of(features)
            .into_iter()
            .map(|slot| Feature::ALL[slot])
            .collect()
    }

    /// Copies the selected slots out of a full feature vector.
    pub fn project(values: &[f64], indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&slot| values[slot]).collect()
    }
}
