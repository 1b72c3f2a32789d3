use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use sysops_report::analyzer::anomaly::{classify, classify_value};
use sysops_report::analyzer::threshold::{derive_thresholds_with, ThresholdMethod};
use sysops_report::stats::summarize;
use sysops_report::types::{Comparator, MetricId, MetricSeries, Severity};

fn make_series(values: &[f64]) -> MetricSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    MetricSeries::from_pairs(
        MetricId::Cpu,
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::seconds(10 * i as i64), *v)),
    )
    .unwrap()
}

/// Valid method configs: warning parameter never above critical
fn arb_method() -> impl Strategy<Value = ThresholdMethod> {
    prop_oneof![
        (0.0f64..=100.0, 0.0f64..=100.0).prop_map(|(a, b)| ThresholdMethod::Percentile {
            warning: a.min(b),
            critical: a.max(b),
        }),
        (0.0f64..10.0, 0.0f64..10.0).prop_map(|(a, b)| ThresholdMethod::StdDev {
            warning_sigma: a.min(b),
            critical_sigma: a.max(b),
        }),
        (0.0f64..10.0, 0.0f64..10.0).prop_map(|(a, b)| ThresholdMethod::Iqr {
            warning_factor: a.min(b),
            critical_factor: a.max(b),
        }),
    ]
}

fn arb_comparator() -> impl Strategy<Value = Comparator> {
    prop_oneof![Just(Comparator::GreaterThan), Just(Comparator::LessThan)]
}

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1_000.0f64..1_000.0, 1..200)
}

proptest! {
    #[test]
    fn critical_never_closer_than_warning(
        values in arb_values(),
        method in arb_method(),
        comparator in arb_comparator(),
    ) {
        let series = make_series(&values);
        let stats = summarize(&series).unwrap();
        let spec = derive_thresholds_with(&series, &method, &stats, comparator).unwrap();

        match comparator {
            Comparator::GreaterThan => prop_assert!(spec.warning_bound <= spec.critical_bound),
            Comparator::LessThan => prop_assert!(spec.critical_bound <= spec.warning_bound),
        }
    }

    #[test]
    fn critical_takes_precedence(
        values in arb_values(),
        method in arb_method(),
        comparator in arb_comparator(),
    ) {
        let series = make_series(&values);
        let stats = summarize(&series).unwrap();
        let spec = derive_thresholds_with(&series, &method, &stats, comparator).unwrap();

        for record in classify(&series, &spec) {
            let hits_critical = comparator.reaches(record.value, spec.critical_bound, spec.collapsed);
            let hits_warning = comparator.reaches(record.value, spec.warning_bound, spec.collapsed);
            let expected = if hits_critical {
                Severity::Critical
            } else if hits_warning {
                Severity::Warning
            } else {
                Severity::Normal
            };
            prop_assert_eq!(record.severity, expected);
            prop_assert_eq!(record.severity, classify_value(record.value, &spec));
        }
    }

    #[test]
    fn classification_preserves_order_and_length(
        values in arb_values(),
        method in arb_method(),
    ) {
        let series = make_series(&values);
        let stats = summarize(&series).unwrap();
        let spec = derive_thresholds_with(&series, &method, &stats, Comparator::GreaterThan).unwrap();

        let records = classify(&series, &spec);
        prop_assert_eq!(records.len(), series.len());

        let replay: Vec<_> = records.clone().collect();
        let first: Vec<_> = records.collect();
        prop_assert_eq!(&first, &replay);

        for (record, sample) in first.iter().zip(series.samples()) {
            prop_assert_eq!(record.timestamp, sample.timestamp);
            prop_assert_eq!(record.value, sample.value);
        }
    }

    #[test]
    fn constant_series_is_never_anomalous(
        value in -500.0f64..500.0,
        len in 1usize..100,
        method in arb_method(),
        comparator in arb_comparator(),
    ) {
        let series = make_series(&vec![value; len]);
        let stats = summarize(&series).unwrap();
        let spec = derive_thresholds_with(&series, &method, &stats, comparator).unwrap();

        prop_assert!(spec.collapsed);
        prop_assert!(classify(&series, &spec).all(|r| r.severity == Severity::Normal));
    }
}
