use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzer::{Analysis, MetricAnalysis};
use crate::analyzer::distribution::Shape;
use crate::recommend::Recommendation;
use crate::types::AnomalyRecord;

/// Most flagged samples listed per metric in the text report
const MAX_LISTED_ANOMALIES: usize = 10;

/// Health report handed to the renderers
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub hostname: String,
    pub rows: usize,
    pub analysis: Analysis,
    pub recommendations: Vec<Recommendation>,
}

/// JSON view: the full analysis plus only the flagged records
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    anomalies: Vec<&'a AnomalyRecord>,
}

impl Report {
    pub fn new(hostname: impl Into<String>, rows: usize, analysis: Analysis, recommendations: Vec<Recommendation>) -> Self {
        Self {
            generated_at: Utc::now(),
            hostname: hostname.into(),
            rows,
            analysis,
            recommendations,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let view = JsonReport {
            report: self,
            anomalies: self.analysis.metrics.iter().flat_map(|m| m.flagged()).collect(),
        };
        Ok(serde_json::to_string_pretty(&view)?)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // fmt::Write into a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Server performance report for {}", self.hostname)?;
        writeln!(out, "Generated {} from {} records", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"), self.rows)?;
        writeln!(out, "Threshold method: {}", self.analysis.method)?;

        writeln!(out, "\n=== DESCRIPTIVE STATISTICS ===")?;
        for m in &self.analysis.metrics {
            let s = &m.stats;
            writeln!(out, "\n{}:", m.metric.column())?;
            writeln!(out, "  Mean: {:.2}", s.mean)?;
            writeln!(out, "  Median: {:.2}", s.median)?;
            writeln!(out, "  Std Dev: {:.2}", s.std_dev)?;
            writeln!(out, "  Min: {:.2}", s.min)?;
            writeln!(out, "  Max: {:.2}", s.max)?;
            writeln!(out, "  Q1: {:.2}", s.q1)?;
            writeln!(out, "  Q3: {:.2}", s.q3)?;
            writeln!(out, "  Count: {}", s.count)?;
        }

        writeln!(out, "\n=== DISTRIBUTION ANALYSIS ===")?;
        for m in &self.analysis.metrics {
            let d = &m.distribution;
            writeln!(out, "\n{}:", m.metric.column())?;
            if let Some(test) = d.normality {
                writeln!(out, "  KS statistic: {:.4} (p-value {:.4})", test.statistic, test.p_value)?;
            }
            writeln!(out, "  Skewness: {:.4}", d.skewness)?;
            writeln!(out, "  Kurtosis: {:.4}", d.kurtosis)?;
            let normal = if d.shape == Shape::ApproximatelyNormal { "Yes" } else { "No" };
            writeln!(out, "  Normal distribution: {} ({})", normal, d.shape)?;
        }

        writeln!(out, "\n=== TIME PATTERN ANALYSIS ===")?;
        for m in &self.analysis.metrics {
            write_hourly(out, m)?;
        }

        writeln!(out, "\n=== ALERTNESS THRESHOLDS ===")?;
        for m in &self.analysis.metrics {
            let t = &m.thresholds;
            writeln!(
                out,
                "{}: Warning {} {:.2}, Critical {} {:.2}",
                m.metric.column(),
                t.comparator,
                t.warning_bound,
                t.comparator,
                t.critical_bound
            )?;
        }

        writeln!(out, "\n=== ANOMALY DETECTION ===")?;
        for m in &self.analysis.metrics {
            let s = &m.summary;
            writeln!(
                out,
                "{}: {} warnings ({:.1}%), {} critical ({:.1}%)",
                m.metric.column(),
                s.warning_count,
                s.warning_pct(),
                s.critical_count,
                s.critical_pct()
            )?;
            for record in m.flagged().take(MAX_LISTED_ANOMALIES) {
                writeln!(
                    out,
                    "  [{}] {} {:.2}{}",
                    record.severity,
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.value,
                    record.metric.unit()
                )?;
            }
            let flagged = s.warning_count + s.critical_count;
            if flagged > MAX_LISTED_ANOMALIES {
                writeln!(out, "  ... {} more", flagged - MAX_LISTED_ANOMALIES)?;
            }
        }

        if !self.analysis.failures.is_empty() {
            writeln!(out, "\n=== SKIPPED METRICS ===")?;
            for f in &self.analysis.failures {
                writeln!(out, "{}: {}", f.metric.column(), f.error)?;
            }
        }

        writeln!(out, "\n=== OPTIMIZATION RECOMMENDATIONS ===")?;
        if self.recommendations.is_empty() {
            writeln!(out, "No recommendations.")?;
        }
        for (i, rec) in self.recommendations.iter().enumerate() {
            writeln!(out, "{}. {}", i + 1, rec.message)?;
        }

        Ok(())
    }
}

fn write_hourly(out: &mut String, m: &MetricAnalysis) -> std::fmt::Result {
    writeln!(out, "\nHourly {} means:", m.metric.column())?;
    for (hour, bucket) in &m.time_patterns.hourly {
        writeln!(out, "  {:02}:00  {:>8.2}  (n={})", hour, bucket.mean, bucket.count)?;
    }
    Ok(())
}
