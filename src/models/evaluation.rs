//! Scoring of predicted against actual label sets

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{LabelSet, Place};

const LABELS: usize = Place::ALL.len();

/// Prediction made for one test item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub item_id: u32,
    /// `None` when no prediction could be made.
    pub predicted: Option<LabelSet>,
    pub actual: LabelSet,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl LabelScores {
    fn new(precision: f64, recall: f64) -> Self {
        Self {
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
        }
    }
}

/// Predicted × actual co-occurrence counts over the place vocabulary.
///
/// An item adds one to every (p, a) cell with p in its prediction and a in its
/// actual labels, so multi-label items contribute several counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: [[u64; LABELS]; LABELS],
}

impl ConfusionMatrix {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a LabelSet, &'a LabelSet)>) -> Self {
        let mut matrix = Self::default();
        for (predicted, actual) in pairs {
            matrix.add(predicted, actual);
        }
        matrix
    }

    pub fn add(&mut self, predicted: &LabelSet, actual: &LabelSet) {
        for p in predicted {
            for a in actual {
                self.counts[p.index()][a.index()] += 1;
            }
        }
    }

    pub fn count(&self, predicted: Place, actual: Place) -> u64 {
        self.counts[predicted.index()][actual.index()]
    }

    pub fn row_sum(&self, predicted: Place) -> u64 {
        self.counts[predicted.index()].iter().sum()
    }

    pub fn column_sum(&self, actual: Place) -> u64 {
        self.counts.iter().map(|row| row[actual.index()]).sum()
    }

    pub fn trace(&self) -> u64 {
        (0..LABELS).map(|i| self.counts[i][i]).sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.trace() as f64, self.total() as f64)
    }

    pub fn precision(&self, place: Place) -> f64 {
        ratio(self.count(place, place) as f64, self.row_sum(place) as f64)
    }

    pub fn recall(&self, place: Place) -> f64 {
        ratio(self.count(place, place) as f64, self.column_sum(place) as f64)
    }

    pub fn scores(&self) -> ViewScores {
        ViewScores {
            accuracy: self.accuracy(),
            per_label: Place::ALL
                .into_iter()
                .map(|place| (place, LabelScores::new(self.precision(place), self.recall(place))))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewScores {
    pub accuracy: f64,
    pub per_label: BTreeMap<Place, LabelScores>,
}

/// Per-item scoring: an item is correct when its prediction shares any label
/// with its actual labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOutcome {
    pub correct_items: usize,
    pub total_items: usize,
    /// Items whose prediction contains the place and whose labels do too.
    pub hits: BTreeMap<Place, usize>,
    pub predicted: BTreeMap<Place, usize>,
    pub actual: BTreeMap<Place, usize>,
}

impl BinaryOutcome {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a LabelSet, &'a LabelSet)>) -> Self {
        let mut outcome = Self::default();
        for (predicted, actual) in pairs {
            outcome.total_items += 1;
            if !predicted.is_disjoint(actual) {
                outcome.correct_items += 1;
            }
            for place in predicted {
                *outcome.predicted.entry(*place).or_default() += 1;
                if actual.contains(place) {
                    *outcome.hits.entry(*place).or_default() += 1;
                }
            }
            for place in actual {
                *outcome.actual.entry(*place).or_default() += 1;
            }
        }
        outcome
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct_items as f64, self.total_items as f64)
    }

    fn tally(map: &BTreeMap<Place, usize>, place: Place) -> f64 {
        map.get(&place).copied().unwrap_or(0) as f64
    }

    pub fn precision(&self, place: Place) -> f64 {
        ratio(Self::tally(&self.hits, place), Self::tally(&self.predicted, place))
    }

    pub fn recall(&self, place: Place) -> f64 {
        ratio(Self::tally(&self.hits, place), Self::tally(&self.actual, place))
    }

    pub fn scores(&self) -> ViewScores {
        ViewScores {
            accuracy: self.accuracy(),
            per_label: Place::ALL
                .into_iter()
                .map(|place| (place, LabelScores::new(self.precision(place), self.recall(place))))
                .collect(),
        }
    }
}

/// Both scoring views for one classification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub multi_class: ViewScores,
    pub binary: ViewScores,
    /// Test items that received a prediction.
    pub evaluated: usize,
    /// Test items left without a prediction.
    pub unclassified: usize,
}

impl Evaluation {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let pairs: Vec<(&LabelSet, &LabelSet)> = outcomes
            .iter()
            .filter_map(|o| o.predicted.as_ref().map(|p| (p, &o.actual)))
            .collect();

        let confusion = ConfusionMatrix::from_pairs(pairs.iter().copied());
        let binary = BinaryOutcome::from_pairs(pairs.iter().copied());

        Self {
            multi_class: confusion.scores(),
            binary: binary.scores(),
            confusion,
            evaluated: pairs.len(),
            unclassified: outcomes.len() - pairs.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(places: &[Place]) -> LabelSet {
        places.iter().copied().collect()
    }

    fn outcome(id: u32, predicted: &[Place], actual: &[Place]) -> Outcome {
        Outcome {
            item_id: id,
            predicted: Some(set(predicted)),
            actual: set(actual),
        }
    }

    fn usa_uk_perfect() -> Vec<Outcome> {
        (0..10)
            .map(|id| {
                let place = if id < 5 { Place::Usa } else { Place::Uk };
                outcome(id, &[place], &[place])
            })
            .collect()
    }

    #[test]
    fn perfect_two_class_run() {
        let evaluation = Evaluation::from_outcomes(&usa_uk_perfect());
        assert_eq!(evaluation.confusion.total(), 10);
        assert_eq!(evaluation.multi_class.accuracy, 1.0);
        assert_eq!(evaluation.binary.accuracy, 1.0);

        for place in Place::ALL {
            let multi = evaluation.multi_class.per_label[&place];
            let binary = evaluation.binary.per_label[&place];
            let expected = if matches!(place, Place::Usa | Place::Uk) { 1.0 } else { 0.0 };
            assert_eq!(multi.precision, expected);
            assert_eq!(multi.recall, expected);
            assert_eq!(binary.precision, expected);
            assert_eq!(binary.recall, expected);
            assert!(!multi.f1.is_nan());
        }
    }

    #[test]
    fn multi_label_items_count_every_pair() {
        let matrix = ConfusionMatrix::from_pairs([(
            &set(&[Place::Usa, Place::Canada]),
            &set(&[Place::Usa, Place::Japan]),
        )]);
        assert_eq!(matrix.total(), 4);
        assert_eq!(matrix.trace(), 1);
        assert_eq!(matrix.count(Place::Canada, Place::Japan), 1);
        assert_eq!(matrix.row_sum(Place::Usa), 2);
        assert_eq!(matrix.column_sum(Place::Japan), 2);
        assert_eq!(matrix.accuracy(), 0.25);
        assert_eq!(matrix.precision(Place::Usa), 0.5);
        assert_eq!(matrix.recall(Place::Usa), 0.5);
    }

    #[test]
    fn binary_view_ignores_which_label_matched() {
        let outcomes = vec![
            outcome(1, &[Place::Usa, Place::Canada], &[Place::Usa]),
            outcome(2, &[Place::France], &[Place::WestGermany]),
            outcome(3, &[Place::Usa], &[Place::Usa, Place::Uk]),
        ];
        let pairs = outcomes.iter().map(|o| (o.predicted.as_ref().unwrap(), &o.actual));
        let binary = BinaryOutcome::from_pairs(pairs);
        assert_eq!(binary.correct_items, 2);
        assert!((binary.accuracy() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(binary.precision(Place::Usa), 1.0);
        assert_eq!(binary.precision(Place::Canada), 0.0);
        assert_eq!(binary.recall(Place::Uk), 0.0);
        assert_eq!(binary.recall(Place::Usa), 1.0);
    }

    #[test]
    fn unclassified_items_are_counted_apart() {
        let mut outcomes = usa_uk_perfect();
        outcomes.push(Outcome {
            item_id: 99,
            predicted: None,
            actual: set(&[Place::France]),
        });
        let evaluation = Evaluation::from_outcomes(&outcomes);
        assert_eq!(evaluation.evaluated, 10);
        assert_eq!(evaluation.unclassified, 1);
        assert_eq!(evaluation.binary.accuracy, 1.0);
    }

    #[test]
    fn empty_run_scores_zero() {
        let evaluation = Evaluation::from_outcomes(&[]);
        assert_eq!(evaluation.multi_class.accuracy, 0.0);
        assert_eq!(evaluation.binary.accuracy, 0.0);
    }
}
