use serde::Serialize;

use super::threshold::ThresholdSpec;
use crate::types::{AnomalyRecord, MetricId, MetricSeries, Sample, Severity};

/// Classify a single value. Critical is tested first, so a value that
/// reaches both bounds is only ever counted as critical.
pub fn classify_value(value: f64, spec: &ThresholdSpec) -> Severity {
    let strict = spec.collapsed;
    if spec.comparator.reaches(value, spec.critical_bound, strict) {
        Severity::Critical
    } else if spec.comparator.reaches(value, spec.warning_bound, strict) {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Classify every sample of `series` against `spec`, lazily and in order.
///
/// The returned iterator is `Clone`; cloning it restarts classification from
/// the current position without touching the series.
pub fn classify<'a>(series: &'a MetricSeries, spec: &'a ThresholdSpec) -> Classifications<'a> {
    debug_assert_eq!(series.metric(), spec.metric);
    Classifications {
        metric: series.metric(),
        samples: series.samples().iter(),
        spec,
    }
}

/// Lazy per-sample classification produced by [`classify`]
#[derive(Debug, Clone)]
pub struct Classifications<'a> {
    metric: MetricId,
    samples: std::slice::Iter<'a, Sample>,
    spec: &'a ThresholdSpec,
}

impl Iterator for Classifications<'_> {
    type Item = AnomalyRecord;

    fn next(&mut self) -> Option<AnomalyRecord> {
        let sample = self.samples.next()?;
        Some(AnomalyRecord {
            timestamp: sample.timestamp,
            metric: self.metric,
            value: sample.value,
            severity: classify_value(sample.value, self.spec),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.samples.size_hint()
    }
}

impl ExactSizeIterator for Classifications<'_> {}

/// Per-severity counts for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub metric: MetricId,
    pub total: usize,
    pub normal_count: usize,
    pub warning_count: usize,
    pub critical_count: usize,
}

impl AnomalySummary {
    pub fn from_records<I>(metric: MetricId, records: I) -> Self
    where
        I: IntoIterator<Item = AnomalyRecord>,
    {
        let mut summary = Self {
            metric,
            total: 0,
            normal_count: 0,
            warning_count: 0,
            critical_count: 0,
        };
        for record in records {
            summary.total += 1;
            match record.severity {
                Severity::Normal => summary.normal_count += 1,
                Severity::Warning => summary.warning_count += 1,
                Severity::Critical => summary.critical_count += 1,
            }
        }
        summary
    }

    pub fn warning_pct(&self) -> f64 {
        self.pct(self.warning_count)
    }

    pub fn critical_pct(&self) -> f64 {
        self.pct(self.critical_count)
    }

    /// Share of samples at warning level or above
    pub fn flagged_pct(&self) -> f64 {
        self.pct(self.warning_count + self.critical_count)
    }

    fn pct(&self, count: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * count as f64 / self.total as f64
    }
}
