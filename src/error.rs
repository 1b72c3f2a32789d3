use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::MetricId;

/// Input-validation failures raised by the analysis core.
///
/// All of these are deterministic; retrying with the same input fails the
/// same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{metric} series has no samples")]
    EmptySeries { metric: MetricId },

    #[error("invalid threshold configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("{metric} statistics describe {stats_count} samples but the series has {series_len}")]
    MismatchedInputs {
        metric: MetricId,
        stats_count: usize,
        series_len: usize,
    },

    #[error("{metric} sample {index} at {timestamp} is not after the previous sample")]
    NonMonotonicTimestamp {
        metric: MetricId,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("{metric} sample {index} is not a finite number")]
    NonFiniteValue { metric: MetricId, index: usize },
}

impl AnalysisError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        AnalysisError::InvalidConfiguration { reason: reason.into() }
    }
}
