use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::config::InputConfig;
use crate::types::{MetricId, MetricSeries};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Metric series loaded from one telemetry export, in `MetricId` order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    series: Vec<MetricSeries>,
    rows: usize,
}

impl Dataset {
    pub fn new(series: impl IntoIterator<Item = MetricSeries>) -> Self {
        let mut series: Vec<MetricSeries> = series.into_iter().collect();
        series.sort_by_key(|s| s.metric());
        let before = series.len();
        series.dedup_by_key(|s| s.metric());
        if series.len() < before {
            tracing::warn!(
                dropped = before - series.len(),
                "Duplicate metric series, keeping the first of each"
            );
        }
        let rows = series.iter().map(|s| s.len()).max().unwrap_or(0);
        Self { series, rows }
    }

    pub fn series(&self) -> &[MetricSeries] {
        &self.series
    }

    pub fn get(&self, metric: MetricId) -> Option<&MetricSeries> {
        self.series.iter().find(|s| s.metric() == metric)
    }

    /// Number of rows read from the source
    pub fn rows(&self) -> usize {
        self.rows
    }
}

pub fn load_csv(path: impl AsRef<Path>, config: &InputConfig) -> Result<Dataset> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let dataset = read_csv(file, config)
        .with_context(|| format!("Failed to load telemetry from {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        rows = dataset.rows(),
        metrics = dataset.series().len(),
        "Loaded telemetry"
    );
    Ok(dataset)
}

/// Read a server usage table. Rows are ordered by timestamp; empty or NaN
/// cells are dropped per metric; absent metric columns are skipped.
pub fn read_csv<R: Read>(reader: R, config: &InputConfig) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let time_idx = config
        .time_columns
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
        .ok_or_else(|| anyhow!("No timestamp column found (expected one of {:?})", config.time_columns))?;

    let metric_cols: Vec<(usize, MetricId)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| MetricId::from_column(h).map(|m| (i, m)))
        .collect();
    if metric_cols.is_empty() {
        bail!("No metric columns found");
    }
    for (pos, (_, metric)) in metric_cols.iter().enumerate() {
        if metric_cols[..pos].iter().any(|(_, m)| m == metric) {
            bail!("Column {} appears more than once", metric.column());
        }
    }
    for metric in MetricId::ALL {
        if !metric_cols.iter().any(|(_, m)| *m == metric) {
            tracing::warn!(column = metric.column(), "Metric column missing, skipping");
        }
    }

    let mut rows: Vec<(DateTime<Utc>, Vec<Option<f64>>)> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        // header is line 1
        let line = line + 2;
        let record = record.with_context(|| format!("Malformed CSV record at line {}", line))?;

        let raw_time = record.get(time_idx).unwrap_or_default();
        let timestamp = parse_timestamp(raw_time)
            .ok_or_else(|| anyhow!("Unparseable timestamp {:?} at line {}", raw_time, line))?;

        let mut values = Vec::with_capacity(metric_cols.len());
        for (idx, metric) in &metric_cols {
            let cell = record.get(*idx).unwrap_or_default();
            values.push(parse_cell(cell).with_context(|| {
                format!("Invalid {} value {:?} at line {}", metric.column(), cell, line)
            })?);
        }
        rows.push((timestamp, values));
    }

    rows.sort_by_key(|(ts, _)| *ts);

    let mut series = Vec::with_capacity(metric_cols.len());
    for (col, (_, metric)) in metric_cols.iter().enumerate() {
        let pairs = rows
            .iter()
            .filter_map(|(ts, values)| values[col].map(|v| (*ts, v)));
        series.push(MetricSeries::from_pairs(*metric, pairs)?);
    }

    let mut dataset = Dataset::new(series);
    dataset.rows = rows.len();
    Ok(dataset)
}

fn parse_cell(cell: &str) -> Result<Option<f64>> {
    if cell.is_empty() {
        return Ok(None);
    }
    let value: f64 = cell.parse()?;
    Ok(if value.is_nan() { None } else { Some(value) })
}

/// Accepts RFC 3339, common naive date-time layouts and bare dates.
/// Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    const CSV: &str = "\
Time,CPU_Usage,Memory_Usage,Network_Usage,Temperature
2024-01-01 01:00:00,40.5,8.2,120,41.0
2024-01-01 00:00:00,35.0,8.0,,40.2
2024-01-01 02:00:00,NaN,8.4,130,42.5
";

    #[test]
    fn reads_and_orders_rows() {
        let dataset = read_csv(CSV.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(dataset.rows(), 3);
        assert_eq!(dataset.series().len(), 4);

        let cpu = dataset.get(MetricId::Cpu).unwrap();
        assert_eq!(cpu.len(), 2);
        assert_eq!(cpu.samples()[0].value, 35.0);
        assert_eq!(cpu.samples()[0].timestamp.hour(), 0);

        let network = dataset.get(MetricId::Network).unwrap();
        assert_eq!(network.values().collect::<Vec<_>>(), vec![120.0, 130.0]);
        assert_eq!(dataset.get(MetricId::Memory).unwrap().len(), 3);
    }

    #[test]
    fn missing_metric_columns_are_skipped() {
        let csv = "dteday,CPU_Usage\n2024-01-01,10\n2024-01-02,20\n";
        let dataset = read_csv(csv.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(dataset.series().len(), 1);
        assert!(dataset.get(MetricId::Temperature).is_none());
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let csv = "Time,CPU_Usage\n2024-01-01 00:00:00,10\n2024-01-01 00:00:00,20\n";
        let err = read_csv(csv.as_bytes(), &InputConfig::default()).unwrap_err();
        assert!(err.to_string().contains("not after the previous sample"));
    }

    #[test]
    fn repeated_metric_column_is_an_error() {
        let csv = "Time,CPU_Usage,CPU_Usage\n2024-01-01 00:00:00,10,90\n";
        let err = read_csv(csv.as_bytes(), &InputConfig::default()).unwrap_err();
        assert!(err.to_string().contains("CPU_Usage appears more than once"));
    }

    #[test]
    fn missing_time_column_is_an_error() {
        let csv = "When,CPU_Usage\n2024-01-01,10\n";
        assert!(read_csv(csv.as_bytes(), &InputConfig::default()).is_err());
    }

    #[test]
    fn garbage_values_report_line() {
        let csv = "Time,CPU_Usage\n2024-01-01 00:00:00,abc\n";
        let err = read_csv(csv.as_bytes(), &InputConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 0).unwrap();
        assert_eq!(parse_timestamp("2024-02-03 04:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-03T04:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-03 04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-03T05:05:00+01:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-02-03"),
            Some(Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
