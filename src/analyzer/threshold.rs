use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;
use crate::stats::{percentile, DescriptiveStats};
use crate::types::{Comparator, MetricId, MetricSeries};

/// Statistical rule used to derive a warning/critical bound pair.
///
/// Each variant carries its own parameters; the warning parameter must not
/// exceed the critical one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ThresholdMethod {
    /// Percentile levels in [0, 100]
    Percentile { warning: f64, critical: f64 },
    /// Multiples of the sample standard deviation above the mean
    StdDev { warning_sigma: f64, critical_sigma: f64 },
    /// Multiples of the interquartile range above the third quartile
    Iqr { warning_factor: f64, critical_factor: f64 },
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        ThresholdMethod::Percentile { warning: 90.0, critical: 95.0 }
    }
}

/// Method selector without parameters, as named in config files and on the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    #[default]
    Percentile,
    #[serde(alias = "std")]
    #[value(name = "stddev", alias = "std")]
    StdDev,
    Iqr,
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodKind::Percentile => write!(f, "percentile"),
            MethodKind::StdDev => write!(f, "stddev"),
            MethodKind::Iqr => write!(f, "iqr"),
        }
    }
}

impl ThresholdMethod {
    pub fn kind(&self) -> MethodKind {
        match self {
            ThresholdMethod::Percentile { .. } => MethodKind::Percentile,
            ThresholdMethod::StdDev { .. } => MethodKind::StdDev,
            ThresholdMethod::Iqr { .. } => MethodKind::Iqr,
        }
    }

    /// Reject parameters that are non-finite, out of range, or ordered so
    /// that the warning bound could exceed the critical bound.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let (name, warning, critical) = match *self {
            ThresholdMethod::Percentile { warning, critical } => {
                for level in [warning, critical] {
                    if !(0.0..=100.0).contains(&level) {
                        return Err(AnalysisError::invalid_config(format!(
                            "percentile level {} is outside [0, 100]",
                            level
                        )));
                    }
                }
                ("percentile level", warning, critical)
            }
            ThresholdMethod::StdDev { warning_sigma, critical_sigma } => {
                ("sigma multiplier", warning_sigma, critical_sigma)
            }
            ThresholdMethod::Iqr { warning_factor, critical_factor } => {
                ("IQR factor", warning_factor, critical_factor)
            }
        };

        for value in [warning, critical] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::invalid_config(format!(
                    "{} {} must be a finite non-negative number",
                    name, value
                )));
            }
        }

        if warning > critical {
            return Err(AnalysisError::invalid_config(format!(
                "warning {} {} exceeds critical {} {}",
                name, warning, name, critical
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdMethod::Percentile { warning, critical } => {
                write!(f, "percentile (p{} / p{})", warning, critical)
            }
            ThresholdMethod::StdDev { warning_sigma, critical_sigma } => {
                write!(f, "stddev (mean + {}σ / {}σ)", warning_sigma, critical_sigma)
            }
            ThresholdMethod::Iqr { warning_factor, critical_factor } => {
                write!(f, "iqr (q3 + {} / {} × IQR)", warning_factor, critical_factor)
            }
        }
    }
}

/// Warning and critical bounds for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSpec {
    pub metric: MetricId,
    pub method: ThresholdMethod,
    pub warning_bound: f64,
    pub critical_bound: f64,
    pub comparator: Comparator,
    /// The method's spread measure was zero, so the bounds sit on the data
    /// itself. Samples must strictly pass a collapsed bound to be flagged.
    pub collapsed: bool,
}

/// Derive bounds for a metric that alerts on high values.
pub fn derive_thresholds(
    series: &MetricSeries,
    method: &ThresholdMethod,
    stats: &DescriptiveStats,
) -> Result<ThresholdSpec, AnalysisError> {
    derive_thresholds_with(series, method, stats, Comparator::GreaterThan)
}

/// Derive bounds in the tail selected by `comparator`.
///
/// `LessThan` mirrors every method into the lower tail, so the critical bound
/// is never closer to the bulk of the data than the warning bound.
pub fn derive_thresholds_with(
    series: &MetricSeries,
    method: &ThresholdMethod,
    stats: &DescriptiveStats,
    comparator: Comparator,
) -> Result<ThresholdSpec, AnalysisError> {
    method.validate()?;

    let metric = series.metric();
    if series.is_empty() {
        return Err(AnalysisError::EmptySeries { metric });
    }
    if stats.count != series.len() {
        return Err(AnalysisError::MismatchedInputs {
            metric,
            stats_count: stats.count,
            series_len: series.len(),
        });
    }

    let sign = match comparator {
        Comparator::GreaterThan => 1.0,
        Comparator::LessThan => -1.0,
    };

    let (warning_bound, critical_bound, collapsed) = match *method {
        ThresholdMethod::Percentile { warning, critical } => {
            let sorted = series.sorted_values();
            let (w_level, c_level) = match comparator {
                Comparator::GreaterThan => (warning, critical),
                Comparator::LessThan => (100.0 - warning, 100.0 - critical),
            };
            // tied order statistics in a varying series are ordinary bounds
            (
                percentile(&sorted, w_level),
                percentile(&sorted, c_level),
                stats.min == stats.max,
            )
        }
        ThresholdMethod::StdDev { warning_sigma, critical_sigma } => {
            let sd = stats.std_dev;
            (
                stats.mean + sign * warning_sigma * sd,
                stats.mean + sign * critical_sigma * sd,
                sd == 0.0,
            )
        }
        ThresholdMethod::Iqr { warning_factor, critical_factor } => {
            let iqr = stats.iqr().max(0.0);
            let anchor = match comparator {
                Comparator::GreaterThan => stats.q3,
                Comparator::LessThan => stats.q1,
            };
            (
                anchor + sign * warning_factor * iqr,
                anchor + sign * critical_factor * iqr,
                iqr == 0.0,
            )
        }
    };

    debug!(
        metric = %metric,
        method = %method.kind(),
        warning = warning_bound,
        critical = critical_bound,
        collapsed,
        "Derived thresholds"
    );

    Ok(ThresholdSpec {
        metric,
        method: *method,
        warning_bound,
        critical_bound,
        comparator,
        collapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::summarize;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[f64]) -> MetricSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        MetricSeries::from_pairs(
            MetricId::Temperature,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::minutes(5 * i as i64), *v)),
        )
        .unwrap()
    }

    #[test]
    fn validate_rejects_inverted_sigma() {
        let method = ThresholdMethod::StdDev { warning_sigma: 3.0, critical_sigma: 2.0 };
        assert!(matches!(
            method.validate(),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_percentile() {
        let method = ThresholdMethod::Percentile { warning: 90.0, critical: 101.0 };
        assert!(method.validate().is_err());
        let method = ThresholdMethod::Percentile { warning: -1.0, critical: 95.0 };
        assert!(method.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_and_nan_factors() {
        assert!(ThresholdMethod::Iqr { warning_factor: -0.5, critical_factor: 3.0 }
            .validate()
            .is_err());
        assert!(ThresholdMethod::Iqr { warning_factor: f64::NAN, critical_factor: 3.0 }
            .validate()
            .is_err());
    }

    #[test]
    fn iqr_bounds_follow_tukey_fences() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let stats = summarize(&s).unwrap();
        let spec = derive_thresholds(
            &s,
            &ThresholdMethod::Iqr { warning_factor: 1.5, critical_factor: 3.0 },
            &stats,
        )
        .unwrap();
        // q1 = 3, q3 = 7, IQR = 4
        assert_eq!(spec.warning_bound, 13.0);
        assert_eq!(spec.critical_bound, 19.0);
        assert!(!spec.collapsed);
    }

    #[test]
    fn less_than_mirrors_into_lower_tail() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let stats = summarize(&s).unwrap();
        let spec = derive_thresholds_with(
            &s,
            &ThresholdMethod::Iqr { warning_factor: 1.5, critical_factor: 3.0 },
            &stats,
            Comparator::LessThan,
        )
        .unwrap();
        assert_eq!(spec.warning_bound, -3.0);
        assert_eq!(spec.critical_bound, -9.0);
        assert_eq!(spec.comparator, Comparator::LessThan);
    }

    #[test]
    fn mismatched_stats_are_rejected() {
        let s = series(&[1.0, 2.0, 3.0]);
        let other = summarize(&series(&[1.0, 2.0])).unwrap();
        let err = derive_thresholds(&s, &ThresholdMethod::default(), &other).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::MismatchedInputs {
                metric: MetricId::Temperature,
                stats_count: 2,
                series_len: 3,
            }
        );
    }
}
