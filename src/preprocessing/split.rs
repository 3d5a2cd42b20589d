//! Dataset preparation: validation, one-time shuffle, master/test split

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::error::{KnnError, Result};
use crate::types::{parse_labels, Item, FEATURE_COUNT};

/// Item as delivered by the feature-extraction step.
#[derive(Debug, Deserialize)]
struct ItemRecord {
    id: u32,
    labels: Vec<String>,
    features: Vec<f64>,
}

/// Validated, ordered collection of items.
#[derive(Debug, Clone)]
pub struct Dataset {
    items: Vec<Item>,
}

impl Dataset {
    /// Keeps the caller's order. Every item must carry exactly
    /// [`FEATURE_COUNT`] finite features and ids must be unique.
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut ids = HashSet::with_capacity(items.len());
        for item in &items {
            item.check_dimensions()?;
            if item.features.iter().any(|v| !v.is_finite()) {
                return Err(KnnError::invalid(
                    "features",
                    format!("item {} has a non-finite feature value", item.id),
                ));
            }
            if !ids.insert(item.id) {
                return Err(KnnError::invalid("id", format!("duplicate item id {}", item.id)));
            }
        }
        Ok(Self { items })
    }

    pub fn shuffled(items: Vec<Item>, seed: u64) -> Result<Self> {
        Ok(Self::new(items)?.shuffle(seed))
    }

    /// Reorders the items once; the resulting order backs every later split.
    pub fn shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.items.shuffle(&mut rng);
        tracing::debug!("Shuffled {} items with seed {}", self.items.len(), seed);
        self
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let records: Vec<ItemRecord> = serde_json::from_reader(reader)?;
        let items = records
            .into_iter()
            .map(|record| -> Result<Item> {
                Ok(Item::new(
                    record.id,
                    parse_labels(&record.labels)?,
                    record.features,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(items)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let dataset = Self::from_json_reader(BufReader::new(file))?;
        tracing::info!("Loaded {} items from {}", dataset.len(), path.as_ref().display());
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Raw features as an (items × features) matrix.
    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        let flat: Vec<f64> = self
            .items
            .iter()
            .flat_map(|item| item.features.iter().copied())
            .collect();
        let actual = flat.len();
        Array2::from_shape_vec((self.items.len(), FEATURE_COUNT), flat).map_err(|_| {
            KnnError::DimensionMismatch {
                expected: self.items.len() * FEATURE_COUNT,
                actual,
            }
        })
    }

    /// Splits positions into a leading master part of ⌊N·ratio⌋ items and a
    /// trailing test part.
    pub fn split(&self, ratio: f64) -> Result<Split> {
        let (master_len, _) = split_sizes(self.items.len(), ratio)?;
        Ok(Split {
            master: (0..master_len).collect(),
            test: (master_len..self.items.len()).collect(),
        })
    }
}

/// Positions into a [`Dataset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub master: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn check_ratio(ratio: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(KnnError::invalid(
            "split_ratio",
            format!("must lie in [0, 1], got {}", ratio),
        ));
    }
    Ok(())
}

/// (master, test) sizes for `total` items.
pub fn split_sizes(total: usize, ratio: f64) -> Result<(usize, usize)> {
    check_ratio(ratio)?;
    let master = ((total as f64 * ratio).floor() as usize).min(total);
    Ok((master, total - master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LabelSet, Place};
    use proptest::prelude::*;

    fn items(n: u32) -> Vec<Item> {
        (0..n)
            .map(|id| {
                let labels: LabelSet = [Place::Usa].into_iter().collect();
                Item::new(id, labels, vec![id as f64; FEATURE_COUNT])
            })
            .collect()
    }

    #[test]
    fn split_hundred_at_sixty_percent() {
        let dataset = Dataset::new(items(100)).unwrap();
        let split = dataset.split(0.6).unwrap();
        assert_eq!(split.master.len(), 60);
        assert_eq!(split.test.len(), 40);
        assert_eq!(split.master[0], 0);
        assert_eq!(split.test[0], 60);
    }

    #[test]
    fn ratio_out_of_range_is_rejected() {
        assert!(split_sizes(10, 1.5).is_err());
        assert!(split_sizes(10, -0.1).is_err());
        assert!(split_sizes(10, f64::NAN).is_err());
    }

    #[test]
    fn shuffle_is_reproducible() {
        let a = Dataset::shuffled(items(50), 7).unwrap();
        let b = Dataset::shuffled(items(50), 7).unwrap();
        let ids_a: Vec<u32> = a.items().iter().map(|i| i.id).collect();
        let ids_b: Vec<u32> = b.items().iter().map(|i| i.id).collect();
        assert_eq!(ids_a, ids_b);
        assert_ne!(ids_a, (0..50).collect::<Vec<u32>>());
    }

    #[test]
    fn wrong_feature_count_is_rejected() {
        let mut bad = items(2);
        bad[1].features.pop();
        assert!(matches!(
            Dataset::new(bad),
            Err(KnnError::DimensionMismatch { expected: 10, actual: 9 })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut dup = items(2);
        dup[1].id = 0;
        assert!(Dataset::new(dup).is_err());
    }

    #[test]
    fn loads_items_from_json() {
        let json = r#"[
            {"id": 1, "labels": ["usa", "canada"], "features": [1,2,3,4,5,6,7,8,9,10]},
            {"id": 2, "labels": ["japan"], "features": [0,0,0,0,0,0,0,0,0,0.5]}
        ]"#;
        let dataset = Dataset::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.items()[0].labels.contains(&Place::Canada));
        let matrix = dataset.feature_matrix().unwrap();
        assert_eq!(matrix.dim(), (2, FEATURE_COUNT));
        assert_eq!(matrix[[1, 9]], 0.5);
    }

    #[test]
    fn unknown_label_in_json_is_rejected() {
        let json = r#"[{"id": 1, "labels": ["mars"], "features": [1,2,3,4,5,6,7,8,9,10]}]"#;
        assert!(matches!(
            Dataset::from_json_reader(json.as_bytes()),
            Err(KnnError::UnknownLabel(label)) if label == "mars"
        ));
    }

    proptest! {
        #[test]
        fn split_covers_every_item(total in 0usize..500, ratio in 0.0f64..=1.0) {
            let (master, test) = split_sizes(total, ratio).unwrap();
            prop_assert_eq!(master + test, total);
        }
    }
}
