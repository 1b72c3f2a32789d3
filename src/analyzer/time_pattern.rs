use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Timelike};
use serde::Serialize;
use smallvec::SmallVec;

use crate::stats::{mean, sample_std_dev};
use crate::types::{MetricId, MetricSeries};

/// Aggregate of the samples that fell into one time bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketStats {
    pub mean: f64,
    pub max: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl BucketStats {
    fn from_values(values: &[f64]) -> Self {
        let mu = mean(values);
        Self {
            mean: mu,
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: sample_std_dev(values, mu),
            count: values.len(),
        }
    }
}

/// Time-of-day and calendar groupings of one metric.
///
/// Weekday keys count from Monday = 0. `weekday` and `daily` are only
/// populated when the series covers more than one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePatterns {
    pub metric: MetricId,
    pub hourly: BTreeMap<u32, BucketStats>,
    pub weekday: Option<BTreeMap<u32, BucketStats>>,
    pub daily: Option<BTreeMap<NaiveDate, BucketStats>>,
}

impl TimePatterns {
    /// Hours with the highest mean, highest first. Ties go to the earlier hour.
    pub fn peak_hours(&self, n: usize) -> SmallVec<[u32; 4]> {
        let mut hours: Vec<(u32, f64)> = self.hourly.iter().map(|(h, b)| (*h, b.mean)).collect();
        hours.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hours.into_iter().take(n).map(|(h, _)| h).collect()
    }

    pub fn spans_multiple_days(&self) -> bool {
        self.daily.is_some()
    }
}

pub fn analyze_time_patterns(series: &MetricSeries) -> TimePatterns {
    let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut by_weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

    for sample in series.samples() {
        let ts = sample.timestamp;
        by_hour.entry(ts.hour()).or_default().push(sample.value);
        by_weekday
            .entry(ts.weekday().num_days_from_monday())
            .or_default()
            .push(sample.value);
        by_date.entry(ts.date_naive()).or_default().push(sample.value);
    }

    let multi_day = by_date.len() > 1;

    TimePatterns {
        metric: series.metric(),
        hourly: aggregate(by_hour),
        weekday: multi_day.then(|| aggregate(by_weekday)),
        daily: multi_day.then(|| aggregate(by_date)),
    }
}

fn aggregate<K: Ord>(buckets: BTreeMap<K, Vec<f64>>) -> BTreeMap<K, BucketStats> {
    buckets
        .into_iter()
        .map(|(k, values)| (k, BucketStats::from_values(&values)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn single_day_has_only_hourly_buckets() {
        // 2024-01-01 is a Monday
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = MetricSeries::from_pairs(
            MetricId::Cpu,
            (0..48i64).map(|i| {
                let value = if i / 2 == 14 { 90.0 } else { 20.0 + (i % 2) as f64 };
                (start + Duration::minutes(30 * i), value)
            }),
        )
        .unwrap();

        let patterns = analyze_time_patterns(&series);
        assert_eq!(patterns.hourly.len(), 24);
        assert!(patterns.weekday.is_none());
        assert!(!patterns.spans_multiple_days());

        let peak = patterns.hourly[&14];
        assert_eq!(peak.count, 2);
        assert_eq!(peak.mean, 90.0);
        assert_eq!(peak.std_dev, 0.0);
        assert_eq!(patterns.peak_hours(1).as_slice(), &[14]);
    }

    #[test]
    fn multi_day_adds_weekday_and_date_buckets() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).unwrap();
        let series = MetricSeries::from_pairs(
            MetricId::Memory,
            (0..4).map(|i| (start + Duration::hours(i), 10.0 * (i + 1) as f64)),
        )
        .unwrap();

        let patterns = analyze_time_patterns(&series);
        let weekday = patterns.weekday.as_ref().unwrap();
        assert_eq!(weekday[&0].count, 2);
        assert_eq!(weekday[&1].count, 2);
        assert_eq!(weekday[&1].mean, 35.0);
        assert_eq!(weekday[&1].max, 40.0);

        let daily = patterns.daily.as_ref().unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[&NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()].mean, 15.0);
    }

    #[test]
    fn peak_hours_breaks_ties_by_hour() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = MetricSeries::from_pairs(
            MetricId::Cpu,
            [(3, 50.0), (5, 70.0), (9, 50.0), (12, 10.0)]
                .into_iter()
                .map(|(h, v)| (start + Duration::hours(h), v)),
        )
        .unwrap();

        let patterns = analyze_time_patterns(&series);
        assert_eq!(patterns.peak_hours(3).as_slice(), &[5, 3, 9]);
    }
}
