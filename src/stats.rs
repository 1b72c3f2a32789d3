use serde::Serialize;

use crate::error::AnalysisError;
use crate::types::MetricSeries;

/// Descriptive statistics for one metric series.
///
/// Computed once per analysis run and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator), 0 for a single sample
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub count: usize,
}

impl DescriptiveStats {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Summarize a series. Fails only when the series is empty.
pub fn summarize(series: &MetricSeries) -> Result<DescriptiveStats, AnalysisError> {
    if series.is_empty() {
        return Err(AnalysisError::EmptySeries { metric: series.metric() });
    }

    let sorted = series.sorted_values();
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    // summation can drift off a constant value and fake a tiny spread
    let mean = if min == max { min } else { mean(&sorted) };

    Ok(DescriptiveStats {
        mean,
        median: percentile(&sorted, 50.0),
        std_dev: sample_std_dev(&sorted, mean),
        min,
        max,
        q1: percentile(&sorted, 25.0),
        q3: percentile(&sorted, 75.0),
        count: sorted.len(),
    })
}

/// Percentile by linear interpolation between order statistics.
///
/// `sorted` must be ascending. `p` is clamped to [0, 100]; an empty slice
/// gives NaN. The rank is `p / 100 * (n - 1)` and the result interpolates
/// between the floor and ceil ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => return f64::NAN,
        [only] => return *only,
        _ => {}
    }

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }

    let frac = rank - lo as f64;
    // rounding must not carry the result past the upper order statistic
    (sorted[lo] + frac * (sorted[hi] - sorted[lo])).min(sorted[hi])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation around a precomputed mean
pub fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}
