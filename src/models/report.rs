//! Human-readable run reports and their persistence

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::KnnConfig;
use crate::error::{KnnError, Result};
use crate::models::evaluation::{Evaluation, ViewScores};
use crate::preprocessing::feature_selection::FeatureSelector;
use crate::types::Place;

const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub config: KnnConfig,
    pub master_size: usize,
    pub test_size: usize,
    pub evaluation: Evaluation,
}

impl Report {
    pub fn new(
        config: KnnConfig,
        master_size: usize,
        test_size: usize,
        evaluation: Evaluation,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            config,
            master_size,
            test_size,
            evaluation,
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    fn file_stem(&self) -> String {
        format!(
            "knn-report-{}-{}-k{}",
            self.generated_at.format("%Y%m%dT%H%M%S%.6fZ"),
            self.config.metric.name().to_ascii_lowercase(),
            self.config.k
        )
    }
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn write_scores(f: &mut fmt::Formatter<'_>, title: &str, scores: &ViewScores) -> fmt::Result {
    writeln!(f, "{}", title)?;
    writeln!(f, "  accuracy: {}", percent(scores.accuracy))?;
    writeln!(f, "  {:<14}{:>10}{:>10}{:>10}", "label", "precision", "recall", "f1")?;
    for (place, label) in &scores.per_label {
        writeln!(
            f,
            "  {:<14}{:>10}{:>10}{:>10}",
            place.as_str(),
            percent(label.precision),
            percent(label.recall),
            percent(label.f1)
        )?;
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.config;
        let evaluation = &self.evaluation;
        let features: Vec<&str> = FeatureSelector::canonical(&config.features)
            .iter()
            .map(|feature| feature.name())
            .collect();
        let normalization = &config.normalization;

        writeln!(f, "KNN classification report")?;
        writeln!(f, "generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f)?;
        writeln!(f, "Parameters")?;
        writeln!(f, "  k: {}", config.k)?;
        writeln!(
            f,
            "  master/test split: {} / {}",
            percent(config.split_ratio),
            percent(1.0 - config.split_ratio)
        )?;
        writeln!(f, "  metric: {}", config.metric)?;
        writeln!(f, "  features: {}", features.join(", "))?;
        writeln!(
            f,
            "  normalization: {:?}, {:?}, {:?}",
            normalization.scope, normalization.center, normalization.output
        )?;
        writeln!(f, "  master items: {}", self.master_size)?;
        writeln!(f, "  test items: {}", self.test_size)?;
        writeln!(f, "  evaluated: {}", evaluation.evaluated)?;
        writeln!(f, "  unclassified: {}", evaluation.unclassified)?;
        writeln!(f)?;

        writeln!(f, "Confusion matrix (rows: predicted, columns: actual)")?;
        write!(f, "  {:<14}", "")?;
        for actual in Place::ALL {
            write!(f, "{:>14}", actual.as_str())?;
        }
        writeln!(f)?;
        for predicted in Place::ALL {
            write!(f, "  {:<14}", predicted.as_str())?;
            for actual in Place::ALL {
                write!(f, "{:>14}", evaluation.confusion.count(predicted, actual))?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;

        write_scores(f, "Multi-class view", &evaluation.multi_class)?;
        writeln!(f)?;
        write_scores(f, "Binary-outcome view", &evaluation.binary)
    }
}

/// Writes reports into one directory, never overwriting an existing file.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, report: &Report) -> Result<PathBuf> {
        self.persist(report, "txt", |writer| {
            writer.write_all(report.render().as_bytes())?;
            Ok(())
        })
    }

    pub fn write_json(&self, report: &Report) -> Result<PathBuf> {
        self.persist(report, "json", |writer| {
            serde_json::to_writer_pretty(&mut *writer, report)?;
            writer.write_all(b"\n")?;
            Ok(())
        })
    }

    fn persist<F>(&self, report: &Report, extension: &str, body: F) -> Result<PathBuf>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        fs::create_dir_all(&self.dir)?;
        let (path, file) = self.create_unique(&report.file_stem(), extension)?;
        let mut writer = BufWriter::new(file);
        body(&mut writer)?;
        writer.flush()?;
        tracing::info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Opens `<stem>.<ext>`, or `<stem>-N.<ext>` for the first free N.
    fn create_unique(&self, stem: &str, extension: &str) -> Result<(PathBuf, File)> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.{}", stem, extension)
            } else {
                format!("{}-{}.{}", stem, attempt, extension)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(KnnError::Io(e)),
            }
        }
        Err(KnnError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free report name for {} in {}", stem, self.dir.display()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::evaluation::Outcome;
    use crate::types::LabelSet;

    fn report() -> Report {
        let usa: LabelSet = [Place::Usa].into_iter().collect();
        let uk: LabelSet = [Place::Uk].into_iter().collect();
        let outcomes = vec![
            Outcome { item_id: 1, predicted: Some(usa.clone()), actual: usa.clone() },
            Outcome { item_id: 2, predicted: Some(usa), actual: uk },
        ];
        Report::new(KnnConfig::default(), 3, 2, Evaluation::from_outcomes(&outcomes))
    }

    #[test]
    fn render_lists_parameters_and_views() {
        let text = report().render();
        assert!(text.contains("  k: 3"));
        assert!(text.contains("master/test split: 60.00% / 40.00%"));
        assert!(text.contains("metric: Canberra"));
        assert!(text.contains("unique-tokens, short-tokens"));
        assert!(text.contains("Multi-class view\n  accuracy: 50.00%"));
        assert!(text.contains("Binary-outcome view\n  accuracy: 50.00%"));
        assert!(text.contains("west-germany"));
    }

    #[test]
    fn render_draws_matrix_rows() {
        let text = report().render();
        let usa_row = text
            .lines()
            .find(|line| line.trim_start().starts_with("usa ") && !line.contains('%'))
            .unwrap();
        let counts: Vec<&str> = usa_row.split_whitespace().skip(1).collect();
        assert_eq!(counts, vec!["0", "0", "0", "1", "1", "0"]);
    }

    #[test]
    fn writer_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let report = report();
        let first = writer.write(&report).unwrap();
        let second = writer.write(&report).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-1.txt"));
        assert_eq!(fs::read_to_string(&first).unwrap(), report.render());
    }

    #[test]
    fn json_report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        let path = ReportWriter::new(dir.path()).write_json(&report).unwrap();
        let loaded: Report = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.evaluation, report.evaluation);
        assert_eq!(loaded.config, report.config);
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = ReportWriter::new(blocker.join("reports")).write(&report()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
