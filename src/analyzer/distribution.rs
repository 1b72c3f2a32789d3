use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::stats::{mean, sample_std_dev};
use crate::types::MetricSeries;

/// Fewer samples than this make the goodness-of-fit test meaningless
const MIN_SAMPLES_FOR_TEST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkewDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    ApproximatelyNormal,
    NonNormal { skew: Option<SkewDirection> },
    /// Constant or too short to test
    Degenerate,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::ApproximatelyNormal => write!(f, "approximately normal"),
            Shape::NonNormal { skew: Some(SkewDirection::Right) } => write!(f, "non-normal, right-skewed"),
            Shape::NonNormal { skew: Some(SkewDirection::Left) } => write!(f, "non-normal, left-skewed"),
            Shape::NonNormal { skew: None } => write!(f, "non-normal"),
            Shape::Degenerate => write!(f, "degenerate"),
        }
    }
}

/// Kolmogorov–Smirnov fit against a normal with the sample's mean and
/// standard deviation.
///
/// The p-value uses the asymptotic Kolmogorov distribution with Stephens'
/// small-sample correction. Because mean and deviation are estimated from
/// the same data, it is optimistic (no Lilliefors adjustment), so borderline
/// series lean towards "approximately normal".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalityTest {
    pub statistic: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistributionReport {
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution)
    pub kurtosis: f64,
    pub normality: Option<NormalityTest>,
    pub shape: Shape,
}

/// Shape diagnostics for a metric series
#[derive(Debug, Clone)]
pub struct DistributionAnalyzer {
    significance: f64,
    skew_cutoff: f64,
}

impl Default for DistributionAnalyzer {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default())
    }
}

impl DistributionAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            significance: config.normality_significance,
            skew_cutoff: config.skew_cutoff,
        }
    }

    pub fn analyze(&self, series: &MetricSeries) -> Result<DistributionReport, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::EmptySeries { metric: series.metric() });
        }

        let sorted = series.sorted_values();
        if sorted.first() == sorted.last() {
            // moment sums drift off a constant value and fake a spread
            return Ok(DistributionReport {
                skewness: 0.0,
                kurtosis: 0.0,
                normality: None,
                shape: Shape::Degenerate,
            });
        }
        let n = sorted.len() as f64;
        let mu = mean(&sorted);

        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for v in &sorted {
            let d = v - mu;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        m2 /= n;
        m3 /= n;
        m4 /= n;

        let (skewness, kurtosis) = if m2 > 0.0 {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let normality = if sorted.len() >= MIN_SAMPLES_FOR_TEST {
            ks_normal(&sorted, mu, sample_std_dev(&sorted, mu))
        } else {
            None
        };

        let shape = match normality {
            None => Shape::Degenerate,
            Some(test) if test.p_value > self.significance => Shape::ApproximatelyNormal,
            Some(_) => {
                let skew = if skewness.abs() > self.skew_cutoff {
                    Some(if skewness > 0.0 { SkewDirection::Right } else { SkewDirection::Left })
                } else {
                    None
                };
                Shape::NonNormal { skew }
            }
        };

        tracing::debug!(
            metric = %series.metric(),
            skewness,
            kurtosis,
            shape = %shape,
            "Analyzed distribution"
        );

        Ok(DistributionReport { skewness, kurtosis, normality, shape })
    }
}

/// One-sample KS test of ascending `sorted` against Normal(mu, sigma).
/// Returns `None` when sigma is zero.
fn ks_normal(sorted: &[f64], mu: f64, sigma: f64) -> Option<NormalityTest> {
    if sigma <= 0.0 {
        return None;
    }
    let normal = Normal::new(mu, sigma).ok()?;
    let n = sorted.len() as f64;

    let statistic = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| {
            let cdf = normal.cdf(*x);
            let below = cdf - i as f64 / n;
            let above = (i + 1) as f64 / n - cdf;
            below.max(above)
        })
        .fold(0.0, f64::max);

    let sqrt_n = n.sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * statistic;

    Some(NormalityTest {
        statistic,
        p_value: kolmogorov_survival(lambda),
    })
}

/// Survival function of the Kolmogorov distribution,
/// `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut prev_term: f64 = 0.0;

    for j in 1..=100 {
        let j = j as f64;
        let term = sign * (a2 * j * j).exp();
        sum += term;
        if term.abs() <= 0.001 * prev_term || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }

    // series only fails to converge for tiny lambda, where Q -> 1
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricId;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: impl IntoIterator<Item = f64>) -> MetricSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        MetricSeries::from_pairs(
            MetricId::Network,
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::seconds(i as i64), v)),
        )
        .unwrap()
    }

    fn grid(n: usize) -> impl Iterator<Item = f64> {
        (0..n).map(move |i| (i as f64 + 0.5) / n as f64)
    }

    #[test]
    fn normal_quantiles_look_normal() {
        let normal = Normal::new(50.0, 10.0).unwrap();
        let s = series(grid(200).map(|p| normal.inverse_cdf(p)));
        let report = DistributionAnalyzer::default().analyze(&s).unwrap();

        assert_eq!(report.shape, Shape::ApproximatelyNormal);
        assert!(report.skewness.abs() < 1e-6);
        assert!(report.kurtosis.abs() < 0.2);
        assert!(report.normality.unwrap().p_value > 0.9);
    }

    #[test]
    fn exponential_quantiles_are_right_skewed() {
        let s = series(grid(200).map(|p| -(1.0 - p).ln()));
        let report = DistributionAnalyzer::default().analyze(&s).unwrap();

        let test = report.normality.unwrap();
        assert!((test.statistic - 0.1575).abs() < 1e-3);
        assert!(test.p_value < 0.001);
        assert!((report.skewness - 1.845).abs() < 0.01);
        assert_eq!(report.shape, Shape::NonNormal { skew: Some(SkewDirection::Right) });
    }

    #[test]
    fn mirrored_exponential_is_left_skewed() {
        let s = series(grid(200).map(|p| 100.0 + (1.0 - p).ln()));
        let report = DistributionAnalyzer::default().analyze(&s).unwrap();
        assert_eq!(report.shape, Shape::NonNormal { skew: Some(SkewDirection::Left) });
    }

    #[test]
    fn constant_series_is_degenerate() {
        let s = series(std::iter::repeat(42.0).take(50));
        let report = DistributionAnalyzer::default().analyze(&s).unwrap();
        assert_eq!(report.shape, Shape::Degenerate);
        assert_eq!(report.skewness, 0.0);
        assert!(report.normality.is_none());
    }

    #[test]
    fn inexact_constant_is_degenerate() {
        let s = series(std::iter::repeat(0.1).take(10));
        let report = DistributionAnalyzer::default().analyze(&s).unwrap();
        assert_eq!(report.shape, Shape::Degenerate);
        assert_eq!(report.skewness, 0.0);
        assert_eq!(report.kurtosis, 0.0);
        assert!(report.normality.is_none());
    }

    #[test]
    fn kolmogorov_survival_bounds() {
        assert_eq!(kolmogorov_survival(0.0), 1.0);
        assert!(kolmogorov_survival(0.1) > 0.999);
        // Q(1.36) is the classic 5% critical value
        assert!((kolmogorov_survival(1.36) - 0.049).abs() < 0.002);
        assert!(kolmogorov_survival(3.0) < 1e-6);
    }
}
