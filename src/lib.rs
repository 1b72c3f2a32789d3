pub mod analyzer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod recommend;
pub mod report;
pub mod stats;

pub use error::AnalysisError;

/// Common types used across modules
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    use crate::error::AnalysisError;

    /// Telemetry dimension carried by the input table
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum MetricId {
        Cpu,
        Memory,
        Network,
        Temperature,
    }

    impl MetricId {
        /// All metrics, in report order
        pub const ALL: [MetricId; 4] = [
            MetricId::Cpu,
            MetricId::Memory,
            MetricId::Network,
            MetricId::Temperature,
        ];

        /// Column header used by the server usage CSV export
        pub fn column(&self) -> &'static str {
            match self {
                MetricId::Cpu => "CPU_Usage",
                MetricId::Memory => "Memory_Usage",
                MetricId::Network => "Network_Usage",
                MetricId::Temperature => "Temperature",
            }
        }

        pub fn from_column(header: &str) -> Option<Self> {
            Self::ALL.into_iter().find(|m| m.column() == header.trim())
        }

        /// Unit suffix used when rendering values
        pub fn unit(&self) -> &'static str {
            match self {
                MetricId::Cpu => "%",
                MetricId::Memory => "GB",
                MetricId::Network => "",
                MetricId::Temperature => "°C",
            }
        }
    }

    impl std::fmt::Display for MetricId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let s = match self {
                MetricId::Cpu => "cpu",
                MetricId::Memory => "memory",
                MetricId::Network => "network",
                MetricId::Temperature => "temperature",
            };
            write!(f, "{}", s)
        }
    }

    /// Classification of a single sample against a threshold pair
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Severity {
        Normal,
        Warning,
        Critical,
    }

    impl std::fmt::Display for Severity {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Severity::Normal => write!(f, "NORMAL"),
                Severity::Warning => write!(f, "WARN"),
                Severity::Critical => write!(f, "CRITICAL"),
            }
        }
    }

    /// Direction of concern for a metric
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Comparator {
        /// Values above the bound are concerning
        #[default]
        GreaterThan,
        /// Values below the bound are concerning (free-capacity style gauges)
        LessThan,
    }

    impl Comparator {
        /// Whether `value` has reached `bound` in the alerting direction.
        /// With `strict` the value must pass the bound rather than touch it.
        pub fn reaches(&self, value: f64, bound: f64, strict: bool) -> bool {
            match (self, strict) {
                (Comparator::GreaterThan, false) => value >= bound,
                (Comparator::GreaterThan, true) => value > bound,
                (Comparator::LessThan, false) => value <= bound,
                (Comparator::LessThan, true) => value < bound,
            }
        }
    }

    impl std::fmt::Display for Comparator {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Comparator::GreaterThan => write!(f, ">="),
                Comparator::LessThan => write!(f, "<="),
            }
        }
    }

    /// A single metric measurement
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct Sample {
        pub timestamp: DateTime<Utc>,
        pub value: f64,
    }

    /// Ordered samples for one metric.
    ///
    /// Timestamps are strictly increasing and every value is finite; both are
    /// checked on construction so downstream analyzers never re-validate.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct MetricSeries {
        metric: MetricId,
        samples: Vec<Sample>,
    }

    impl MetricSeries {
        pub fn new(metric: MetricId, samples: Vec<Sample>) -> Result<Self, AnalysisError> {
            for (index, sample) in samples.iter().enumerate() {
                if !sample.value.is_finite() {
                    return Err(AnalysisError::NonFiniteValue { metric, index });
                }
                if index > 0 && sample.timestamp <= samples[index - 1].timestamp {
                    return Err(AnalysisError::NonMonotonicTimestamp {
                        metric,
                        index,
                        timestamp: sample.timestamp,
                    });
                }
            }
            Ok(Self { metric, samples })
        }

        pub fn from_pairs<I>(metric: MetricId, pairs: I) -> Result<Self, AnalysisError>
        where
            I: IntoIterator<Item = (DateTime<Utc>, f64)>,
        {
            let samples = pairs
                .into_iter()
                .map(|(timestamp, value)| Sample { timestamp, value })
                .collect();
            Self::new(metric, samples)
        }

        pub fn metric(&self) -> MetricId {
            self.metric
        }

        pub fn samples(&self) -> &[Sample] {
            &self.samples
        }

        pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
            self.samples.iter().map(|s| s.value)
        }

        /// Values in ascending order, for order-statistic based methods
        pub fn sorted_values(&self) -> Vec<f64> {
            let mut values: Vec<f64> = self.values().collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values
        }

        pub fn len(&self) -> usize {
            self.samples.len()
        }

        pub fn is_empty(&self) -> bool {
            self.samples.is_empty()
        }
    }

    /// Classification of one sample of one metric
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct AnomalyRecord {
        pub timestamp: DateTime<Utc>,
        pub metric: MetricId,
        pub value: f64,
        pub severity: Severity,
    }
}
