//! K-nearest-neighbour classification of articles by place
//!
//! The classifier owns a prepared [`Dataset`] and is re-parameterized between
//! runs. Raw features stay untouched; normalized values live in a derived
//! matrix computed once per normalization policy.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::KnnConfig;
use crate::error::{KnnError, Result};
use crate::models::evaluation::{Evaluation, Outcome};
use crate::models::metrics::Metric;
use crate::models::report::{Report, ReportWriter};
use crate::preprocessing::feature_selection::FeatureSelector;
use crate::preprocessing::normalization::{DataNormalizer, NormalizationConfig};
use crate::preprocessing::split::{Dataset, Split};
use crate::types::{LabelSet, FEATURE_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierState {
    Configured,
    Split,
    Normalized,
    Classified,
    Reported,
}

/// Result of one `classify` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRun {
    pub config: KnnConfig,
    pub master_size: usize,
    pub outcomes: Vec<Outcome>,
}

impl ClassificationRun {
    pub fn evaluate(&self) -> Evaluation {
        Evaluation::from_outcomes(&self.outcomes)
    }

    pub fn report(&self) -> Report {
        Report::new(
            self.config.clone(),
            self.master_size,
            self.outcomes.len(),
            self.evaluate(),
        )
    }
}

/// A finished run together with where its report went.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    /// `None` when no writer was given or writing failed.
    pub report_path: Option<PathBuf>,
}

struct NormalizedFeatures {
    normalizer: DataNormalizer,
    values: Array2<f64>,
}

/// Picks the label set that occurs most often among the neighbours, comparing
/// whole sets. Ties go to the smallest set in lexicographic order. Returns
/// `None` with no neighbours or when the winner is empty.
pub fn majority_vote<'a>(neighbours: impl IntoIterator<Item = &'a LabelSet>) -> Option<LabelSet> {
    let mut occurrences: BTreeMap<&LabelSet, usize> = BTreeMap::new();
    for labels in neighbours {
        *occurrences.entry(labels).or_default() += 1;
    }

    let mut winner: Option<(&LabelSet, usize)> = None;
    for (labels, count) in occurrences {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((labels, count));
        }
    }

    winner
        .map(|(labels, _)| labels.clone())
        .filter(|labels| !labels.is_empty())
}

/// Ranks candidates closest-first and keeps at most `k`.
///
/// The sort is stable, so equal values keep candidate order.
pub fn nearest<'a, I>(metric: Metric, query: &[f64], candidates: I, k: usize) -> Result<Vec<usize>>
where
    I: IntoIterator<Item = (usize, &'a [f64])>,
{
    let mut measured = candidates
        .into_iter()
        .map(|(position, values)| -> Result<(usize, f64)> {
            Ok((position, metric.measure(query, values)?))
        })
        .collect::<Result<Vec<_>>>()?;
    measured.sort_by(|a, b| metric.closer_first(a.1, b.1));
    measured.truncate(k);
    Ok(measured.into_iter().map(|(position, _)| position).collect())
}

pub struct KnnClassifier {
    dataset: Dataset,
    config: KnnConfig,
    feature_indices: Vec<usize>,
    split: Split,
    normalized: Option<NormalizedFeatures>,
    state: ClassifierState,
}

impl KnnClassifier {
    /// Takes an already shuffled dataset; its order backs every split.
    pub fn new(dataset: Dataset, config: KnnConfig) -> Result<Self> {
        let mut classifier = Self {
            dataset,
            config: KnnConfig::default(),
            feature_indices: Vec::new(),
            split: Split::default(),
            normalized: None,
            state: ClassifierState::Configured,
        };
        classifier.set_parameters(config)?;
        Ok(classifier)
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    /// Normalized (items × features) matrix, if computed yet.
    pub fn normalized_features(&self) -> Option<&Array2<f64>> {
        self.normalized.as_ref().map(|n| &n.values)
    }

    /// Replaces the run parameters and re-derives the master/test split.
    ///
    /// Normalized values are kept unless the normalization policy changes.
    pub fn set_parameters(&mut self, config: KnnConfig) -> Result<()> {
        config.validate()?;
        self.state = ClassifierState::Configured;

        self.feature_indices = config.feature_indices();
        self.split = self.dataset.split(config.split_ratio)?;
        if self
            .normalized
            .as_ref()
            .map_or(false, |n| n.normalizer.config() != config.normalization)
        {
            self.normalized = None;
        }
        tracing::debug!(
            "Configured k={} metric={} split {}/{} over {} features",
            config.k,
            config.metric,
            self.split.master.len(),
            self.split.test.len(),
            self.feature_indices.len()
        );

        self.config = config;
        self.state = ClassifierState::Split;
        Ok(())
    }

    fn ensure_normalized(&mut self) -> Result<()> {
        if self.normalized.is_none() {
            let policy: NormalizationConfig = self.config.normalization;
            let mut normalizer = DataNormalizer::new(policy);
            let values = normalizer.fit_transform(&self.dataset.feature_matrix()?)?;
            tracing::debug!(
                "Normalized {} items ({:?}, {:?}, {:?}); {} degenerate",
                values.nrows(),
                policy.scope,
                policy.center,
                policy.output,
                normalizer.degenerate().len()
            );
            self.normalized = Some(NormalizedFeatures { normalizer, values });
        }
        if self.state == ClassifierState::Split {
            self.state = ClassifierState::Normalized;
        }
        Ok(())
    }

    /// Selected, normalized features of the item at `position`.
    fn projected(values: &Array2<f64>, position: usize, indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&slot| values[[position, slot]]).collect()
    }

    fn vote(&self, query: &[f64], master: &[(usize, Vec<f64>)]) -> Result<Option<LabelSet>> {
        let candidates = master
            .iter()
            .map(|(position, values)| (*position, values.as_slice()));
        let neighbours = nearest(self.config.metric, query, candidates, self.config.k)?;
        let items = self.dataset.items();
        Ok(majority_vote(
            neighbours.iter().map(|&position| &items[position].labels),
        ))
    }

    /// Classifies every test item against the master set and stores the
    /// winning label set under the active metric.
    pub fn classify(&mut self) -> Result<ClassificationRun> {
        self.ensure_normalized()?;
        let metric = self.config.metric;

        for item in self.dataset.items_mut() {
            item.predictions.remove(&metric);
        }

        let predictions = {
            let normalized = self
                .normalized
                .as_ref()
                .ok_or_else(|| KnnError::invalid("normalizer", "not fitted"))?;
            let indices = &self.feature_indices;
            let master: Vec<(usize, Vec<f64>)> = self
                .split
                .master
                .iter()
                .map(|&position| (position, Self::projected(&normalized.values, position, indices)))
                .collect();

            if master.is_empty() && !self.split.test.is_empty() {
                tracing::warn!(
                    "{}; {} test items left unclassified",
                    KnnError::EmptyMasterSet,
                    self.split.test.len()
                );
            }

            self.split
                .test
                .par_iter()
                .map(|&position| -> Result<(usize, Option<LabelSet>)> {
                    let query = Self::projected(&normalized.values, position, indices);
                    Ok((position, self.vote(&query, &master)?))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let items = self.dataset.items_mut();
        let mut outcomes = Vec::with_capacity(predictions.len());
        for (position, predicted) in predictions {
            let item = &mut items[position];
            match &predicted {
                Some(labels) => {
                    item.predictions.insert(metric, labels.clone());
                }
                None => tracing::warn!("Item {} left unclassified", item.id),
            }
            outcomes.push(Outcome {
                item_id: item.id,
                predicted,
                actual: item.labels.clone(),
            });
        }

        tracing::info!(
            "Classified {} test items against {} master items (k={}, metric={})",
            outcomes.len(),
            self.split.master.len(),
            self.config.k,
            metric
        );
        self.state = ClassifierState::Classified;

        Ok(ClassificationRun {
            config: self.config.clone(),
            master_size: self.split.master.len(),
            outcomes,
        })
    }

    /// Classifies, evaluates and, given a writer, persists the report.
    ///
    /// A failed write is logged; the in-memory report is still returned.
    pub fn run(&mut self, writer: Option<&ReportWriter>) -> Result<RunOutcome> {
        let report = self.classify()?.report();
        let report_path = match writer {
            Some(writer) => match writer.write(&report) {
                Ok(path) => {
                    self.state = ClassifierState::Reported;
                    Some(path)
                }
                Err(e) => {
                    tracing::error!("Failed to write report to {}: {}", writer.dir().display(), e);
                    None
                }
            },
            None => None,
        };
        Ok(RunOutcome { report, report_path })
    }

    /// Runs every configuration in turn over the same shuffled dataset.
    pub fn sweep<I>(&mut self, configs: I, writer: Option<&ReportWriter>) -> Result<Vec<RunOutcome>>
    where
        I: IntoIterator<Item = KnnConfig>,
    {
        configs
            .into_iter()
            .map(|config| {
                self.set_parameters(config)?;
                self.run(writer)
            })
            .collect()
    }

    /// Classifies a raw feature vector against the current master set.
    ///
    /// Fails with [`KnnError::EmptyMasterSet`] when there is nothing to
    /// compare against.
    pub fn predict(&mut self, features: &[f64]) -> Result<Option<LabelSet>> {
        if features.len() != FEATURE_COUNT {
            return Err(KnnError::DimensionMismatch {
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }
        if self.split.master.is_empty() {
            return Err(KnnError::EmptyMasterSet);
        }
        self.ensure_normalized()?;
        let normalized = self
            .normalized
            .as_ref()
            .ok_or_else(|| KnnError::invalid("normalizer", "not fitted"))?;

        let row = normalized
            .normalizer
            .transform_row(ndarray::ArrayView1::from(features))?;
        let query = FeatureSelector::project(&row.to_vec(), &self.feature_indices);
        let master: Vec<(usize, Vec<f64>)> = self
            .split
            .master
            .iter()
            .map(|&position| {
                (
                    position,
                    Self::projected(&normalized.values, position, &self.feature_indices),
                )
            })
            .collect();
        self.vote(&query, &master)
    }
}
