//! Error type for the classification core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnnError>;

#[derive(Debug, Error)]
pub enum KnnError {
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("zero variance in {context}")]
    DegenerateFeatureVariance { context: String },

    #[error("master set is empty; nothing to compare against")]
    EmptyMasterSet,

    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`KnnError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad names or parameters; the run is aborted before any computation.
    Configuration,
    /// Zero variance or nothing to compare against; skipped with a warning.
    DegenerateInput,
    DimensionMismatch,
    Io,
}

impl KnnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KnnError::UnknownFeature(_)
            | KnnError::UnknownMetric(_)
            | KnnError::UnknownLabel(_)
            | KnnError::InvalidParameter { .. } => ErrorKind::Configuration,
            KnnError::DegenerateFeatureVariance { .. } | KnnError::EmptyMasterSet => {
                ErrorKind::DegenerateInput
            }
            KnnError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            KnnError::Io(_) | KnnError::Json(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        KnnError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            KnnError::UnknownMetric("cosine".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            KnnError::invalid("k", "must be positive").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(KnnError::EmptyMasterSet.kind(), ErrorKind::DegenerateInput);
        assert_eq!(
            KnnError::DimensionMismatch {
                expected: 10,
                actual: 9
            }
            .kind(),
            ErrorKind::DimensionMismatch
        );
    }

    #[test]
    fn messages_name_the_offender() {
        let err = KnnError::invalid("split_ratio", "must lie in [0, 1], got 1.5");
        assert_eq!(
            err.to_string(),
            "invalid parameter `split_ratio`: must lie in [0, 1], got 1.5"
        );
    }
}
