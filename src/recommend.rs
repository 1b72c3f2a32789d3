use serde::Serialize;

use crate::analyzer::distribution::Shape;
use crate::analyzer::threshold::MethodKind;
use crate::analyzer::{Analysis, MetricAnalysis};
use crate::config::AnalyzerConfig;
use crate::types::MetricId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    HighCpu,
    ModerateCpu,
    CpuSpikes,
    PeakHours,
    MemoryPeak,
    MemoryVariability,
    NetworkSaturation,
    HighNetwork,
    TemperaturePeak,
    OverheatingRisk,
    RobustMethodAdvised,
}

/// Advisory produced by one rule for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub metric: MetricId,
    pub kind: RecommendationKind,
    pub message: String,
}

/// A fixed editorial rule. `check` returns the advisory text when the rule fires.
struct Rule {
    metric: Option<MetricId>,
    kind: RecommendationKind,
    check: fn(&MetricAnalysis, &AnalyzerConfig) -> Option<String>,
}

const RULES: &[Rule] = &[
    Rule {
        metric: Some(MetricId::Cpu),
        kind: RecommendationKind::HighCpu,
        check: |m, _| {
            (m.stats.mean > 75.0).then(|| {
                format!(
                    "HIGH CPU USAGE: average CPU usage is {:.1}%. Consider load balancing, \
                     process optimization, or hardware upgrades.",
                    m.stats.mean
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Cpu),
        kind: RecommendationKind::ModerateCpu,
        check: |m, _| {
            (m.stats.mean > 60.0 && m.stats.mean <= 75.0).then(|| {
                format!(
                    "MODERATE CPU USAGE: average CPU usage is {:.1}%. Monitor peak hours \
                     and consider workload distribution.",
                    m.stats.mean
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Cpu),
        kind: RecommendationKind::CpuSpikes,
        check: |m, _| {
            (m.summary.critical_pct() > 5.0).then(|| {
                format!(
                    "CPU SPIKES: {:.1}% of samples show critical CPU usage. Investigate \
                     resource-intensive processes during peak hours.",
                    m.summary.critical_pct()
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Cpu),
        kind: RecommendationKind::PeakHours,
        check: |m, config| {
            let hours = m.time_patterns.peak_hours(config.peak_hours);
            (!hours.is_empty()).then(|| {
                let list = hours.iter().map(|h| format!("{:02}:00", h)).collect::<Vec<_>>().join(", ");
                format!(
                    "PEAK HOURS IDENTIFIED: highest CPU usage during {}. Schedule intensive \
                     tasks outside these periods and implement auto-scaling.",
                    list
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Memory),
        kind: RecommendationKind::MemoryPeak,
        check: |m, _| {
            (m.stats.max > 15.0).then(|| {
                format!(
                    "MEMORY CONCERN: peak memory usage reaches {:.1}GB. Consider memory \
                     optimization and garbage collection tuning.",
                    m.stats.max
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Memory),
        kind: RecommendationKind::MemoryVariability,
        check: |m, _| {
            (m.stats.std_dev > 2.0).then(|| {
                format!(
                    "MEMORY VARIABILITY: high memory usage variability (std: {:.1}GB). \
                     Implement memory pooling and optimize application memory management.",
                    m.stats.std_dev
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Network),
        kind: RecommendationKind::NetworkSaturation,
        check: |m, _| {
            (m.stats.max >= 200.0).then(|| {
                "NETWORK SATURATION: network usage reaches maximum capacity. Consider \
                 bandwidth optimization, traffic shaping, or network upgrades."
                    .to_string()
            })
        },
    },
    Rule {
        metric: Some(MetricId::Network),
        kind: RecommendationKind::HighNetwork,
        check: |m, _| {
            (m.stats.mean > 150.0).then(|| {
                format!(
                    "HIGH NETWORK USAGE: average network usage is {:.1}. Optimize data \
                     transfer protocols and implement caching strategies.",
                    m.stats.mean
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Temperature),
        kind: RecommendationKind::TemperaturePeak,
        check: |m, _| {
            (m.stats.max > 50.0).then(|| {
                format!(
                    "TEMPERATURE ALERT: peak temperature reaches {:.1}°C. Check cooling \
                     systems and ensure proper ventilation.",
                    m.stats.max
                )
            })
        },
    },
    Rule {
        metric: Some(MetricId::Temperature),
        kind: RecommendationKind::OverheatingRisk,
        check: |m, _| {
            (m.summary.critical_pct() > 3.0).then(|| {
                format!(
                    "OVERHEATING RISK: {:.1}% of samples are at critical temperature. \
                     Review airflow and thermal load before hardware is throttled.",
                    m.summary.critical_pct()
                )
            })
        },
    },
    Rule {
        metric: None,
        kind: RecommendationKind::RobustMethodAdvised,
        check: |m, _| {
            let skewed = matches!(m.distribution.shape, Shape::NonNormal { .. });
            (skewed && m.thresholds.method.kind() == MethodKind::StdDev).then(|| {
                format!(
                    "THRESHOLD METHOD: {} is {} but thresholds assume normality. \
                     The percentile or IQR method gives more reliable bounds here.",
                    m.metric, m.distribution.shape
                )
            })
        },
    },
];

/// Maps analysis results to advisory strings through a fixed rule table
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    config: AnalyzerConfig,
}

impl RecommendationGenerator {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn for_metric(&self, analysis: &MetricAnalysis) -> Vec<Recommendation> {
        RULES
            .iter()
            .filter(|rule| rule.metric.map_or(true, |m| m == analysis.metric))
            .filter_map(|rule| {
                (rule.check)(analysis, &self.config).map(|message| Recommendation {
                    metric: analysis.metric,
                    kind: rule.kind,
                    message,
                })
            })
            .collect()
    }

    pub fn generate(&self, analysis: &Analysis) -> Vec<Recommendation> {
        let recommendations: Vec<Recommendation> = analysis
            .metrics
            .iter()
            .flat_map(|m| self.for_metric(m))
            .collect();
        tracing::debug!(count = recommendations.len(), "Generated recommendations");
        recommendations
    }
}
