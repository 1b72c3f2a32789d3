pub mod anomaly;
pub mod distribution;
pub mod threshold;
pub mod time_pattern;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{Config, ThresholdConfig};
use crate::error::AnalysisError;
use crate::ingest::Dataset;
use crate::stats::{summarize, DescriptiveStats};
use crate::types::{AnomalyRecord, MetricId, MetricSeries, Severity};

use anomaly::{classify, AnomalySummary};
use distribution::{DistributionAnalyzer, DistributionReport};
use threshold::{derive_thresholds_with, ThresholdMethod, ThresholdSpec};
use time_pattern::{analyze_time_patterns, TimePatterns};

/// Everything computed for one metric
#[derive(Debug, Clone, Serialize)]
pub struct MetricAnalysis {
    pub metric: MetricId,
    pub stats: DescriptiveStats,
    pub distribution: DistributionReport,
    pub time_patterns: TimePatterns,
    pub thresholds: ThresholdSpec,
    pub summary: AnomalySummary,
    /// One record per sample, in series order
    #[serde(skip)]
    pub records: Vec<AnomalyRecord>,
}

impl MetricAnalysis {
    /// Records classified above normal
    pub fn flagged(&self) -> impl Iterator<Item = &AnomalyRecord> {
        self.records.iter().filter(|r| r.severity > Severity::Normal)
    }
}

/// A metric that could not be analyzed, kept so the report can say why
#[derive(Debug, Clone, Serialize)]
pub struct MetricFailure {
    pub metric: MetricId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub method: ThresholdMethod,
    pub metrics: Vec<MetricAnalysis>,
    pub failures: Vec<MetricFailure>,
}

impl Analysis {
    pub fn get(&self, metric: MetricId) -> Option<&MetricAnalysis> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Runs statistics, distribution, time pattern, threshold and
/// classification steps for each metric of a dataset.
#[derive(Debug, Clone)]
pub struct Pipeline {
    method: ThresholdMethod,
    thresholds: ThresholdConfig,
    distribution: DistributionAnalyzer,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, AnalysisError> {
        let method = config.thresholds.method();
        method.validate()?;
        Ok(Self {
            method,
            thresholds: config.thresholds.clone(),
            distribution: DistributionAnalyzer::new(&config.analyzer),
        })
    }

    pub fn method(&self) -> ThresholdMethod {
        self.method
    }

    pub fn analyze_metric(&self, series: &MetricSeries) -> Result<MetricAnalysis, AnalysisError> {
        let metric = series.metric();
        let stats = summarize(series)?;
        let distribution = self.distribution.analyze(series)?;
        let time_patterns = analyze_time_patterns(series);

        let comparator = self.thresholds.comparator_for(metric);
        let thresholds = derive_thresholds_with(series, &self.method, &stats, comparator)?;

        let records: Vec<AnomalyRecord> = classify(series, &thresholds).collect();
        let summary = AnomalySummary::from_records(metric, records.iter().copied());

        tracing::debug!(
            metric = %metric,
            samples = summary.total,
            warnings = summary.warning_count,
            critical = summary.critical_count,
            "Classified samples"
        );

        Ok(MetricAnalysis {
            metric,
            stats,
            distribution,
            time_patterns,
            thresholds,
            summary,
            records,
        })
    }

    /// Analyze every metric in parallel. A failing metric is reported and
    /// skipped; it never aborts the others.
    pub fn run(&self, dataset: &Dataset) -> Analysis {
        let results: Vec<(MetricId, Result<MetricAnalysis, AnalysisError>)> = dataset
            .series()
            .par_iter()
            .map(|series| (series.metric(), self.analyze_metric(series)))
            .collect();

        let mut metrics = Vec::new();
        let mut failures = Vec::new();
        for (metric, result) in results {
            match result {
                Ok(analysis) => metrics.push(analysis),
                Err(e) => {
                    tracing::warn!(metric = %metric, error = %e, "Metric analysis failed");
                    failures.push(MetricFailure { metric, error: e.to_string() });
                }
            }
        }

        tracing::info!(
            method = %self.method.kind(),
            analyzed = metrics.len(),
            failed = failures.len(),
            "Analysis complete"
        );

        Analysis {
            method: self.method,
            metrics,
            failures,
        }
    }
}
