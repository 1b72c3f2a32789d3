use anyhow::{Context, Result};
use serde::Deserialize;

use crate::analyzer::threshold::{MethodKind, ThresholdMethod};
use crate::types::{Comparator, MetricId};

/// Top-level configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            log_level: default_log_level(),
            format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub csv_path: Option<String>,
    /// Candidate timestamp headers, first match wins
    #[serde(default = "default_time_columns")]
    pub time_columns: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            time_columns: default_time_columns(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub method: MethodKind,
    #[serde(default = "default_90")]
    pub warning_percentile: f64,
    #[serde(default = "default_95")]
    pub critical_percentile: f64,
    #[serde(default = "default_2")]
    pub warning_sigma: f64,
    #[serde(default = "default_3")]
    pub critical_sigma: f64,
    #[serde(default = "default_1_5")]
    pub warning_iqr_factor: f64,
    #[serde(default = "default_3")]
    pub critical_iqr_factor: f64,
    /// Metrics that alert on low values instead of high ones
    #[serde(default)]
    pub low_side: Vec<MetricId>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            method: MethodKind::Percentile,
            warning_percentile: 90.0,
            critical_percentile: 95.0,
            warning_sigma: 2.0,
            critical_sigma: 3.0,
            warning_iqr_factor: 1.5,
            critical_iqr_factor: 3.0,
            low_side: vec![],
        }
    }
}

impl ThresholdConfig {
    /// Parameterized method for the selected kind
    pub fn method(&self) -> ThresholdMethod {
        match self.method {
            MethodKind::Percentile => ThresholdMethod::Percentile {
                warning: self.warning_percentile,
                critical: self.critical_percentile,
            },
            MethodKind::StdDev => ThresholdMethod::StdDev {
                warning_sigma: self.warning_sigma,
                critical_sigma: self.critical_sigma,
            },
            MethodKind::Iqr => ThresholdMethod::Iqr {
                warning_factor: self.warning_iqr_factor,
                critical_factor: self.critical_iqr_factor,
            },
        }
    }

    pub fn comparator_for(&self, metric: MetricId) -> Comparator {
        if self.low_side.contains(&metric) {
            Comparator::LessThan
        } else {
            Comparator::GreaterThan
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    #[serde(default = "default_significance")]
    pub normality_significance: f64,
    #[serde(default = "default_skew_cutoff")]
    pub skew_cutoff: f64,
    #[serde(default = "default_peak_hours")]
    pub peak_hours: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            normality_significance: 0.05,
            skew_cutoff: 0.5,
            peak_hours: 3,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // Expand environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;

        config
            .thresholds
            .method()
            .validate()
            .with_context(|| "Invalid [thresholds] section")?;

        Ok(config)
    }
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .to_string())
}

// Default value functions
fn default_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
fn default_log_level() -> String { "info".to_string() }
fn default_time_columns() -> Vec<String> { vec!["Time".into(), "dteday".into()] }
fn default_90() -> f64 { 90.0 }
fn default_95() -> f64 { 95.0 }
fn default_2() -> f64 { 2.0 }
fn default_3() -> f64 { 3.0 }
fn default_1_5() -> f64 { 1.5 }
fn default_significance() -> f64 { 0.05 }
fn default_skew_cutoff() -> f64 { 0.5 }
fn default_peak_hours() -> usize { 3 }
