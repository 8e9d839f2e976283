//! Cross-module properties over randomly generated sources.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

use crate::config::{EmbeddedLayout, RowTableLayout};
use crate::dataset::{CountGrid, Dataset, SourceId};
use crate::ingest::{BoundaryCollection, EmbeddedSource, RowTable, RowTableSource, SourceIngestor};
use crate::metrics::{derive_at, MetricKind};

fn axis(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2020, 3, 28).unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

/// Counts per feature per date; deliberately not monotonic.
fn counts() -> impl Strategy<Value = Vec<Vec<u32>>> {
    (1usize..5, 1usize..7).prop_flat_map(|(features, dates)| {
        prop::collection::vec(prop::collection::vec(0u32..500, dates), features)
    })
}

fn embedded(counts: &[Vec<u32>]) -> Dataset {
    let dates = axis(counts[0].len());
    let features = counts
        .iter()
        .map(|series| {
            let mut props = Map::new();
            for (date, &c) in dates.iter().zip(series) {
                let key = date.format("%Y-%m-%d").to_string();
                props.insert(format!("d{key}"), json!(c % 7));
                props.insert(key, json!(c));
            }
            props
        })
        .collect();
    let source = EmbeddedSource::new(BoundaryCollection::new(features), EmbeddedLayout::default());
    source.ingest(&SourceId::from("embedded")).unwrap().dataset
}

fn row_tables(counts: &[Vec<u32>]) -> Dataset {
    let dates = axis(counts[0].len());
    let mut headers = vec!["countyFIPS".to_string()];
    headers.extend(dates.iter().map(|d| d.format("%-m/%-d/%Y").to_string()));
    let rows: Vec<Vec<String>> = counts
        .iter()
        .enumerate()
        .map(|(i, series)| {
            let mut row = vec![(1000 + i).to_string()];
            row.extend(series.iter().map(|c| c.to_string()));
            row
        })
        .collect();
    let table = RowTable::new(headers, rows);
    let features = (0..counts.len())
        .map(|i| {
            let mut props = Map::new();
            props.insert("GEOID".into(), Value::String(format!("0{}", 1000 + i)));
            props
        })
        .collect();
    let source = RowTableSource::new(BoundaryCollection::new(features), table.clone(), table, RowTableLayout::default());
    source.ingest(&SourceId::from("table")).unwrap().dataset
}

fn assert_non_decreasing(ds: &Dataset) -> Result<(), TestCaseError> {
    for d in 1..ds.dates.len() {
        let prev = derive_at(ds, MetricKind::RawConfirmed, d - 1);
        let cur = derive_at(ds, MetricKind::RawConfirmed, d);
        for (p, c) in prev.iter().zip(&cur) {
            prop_assert!(c >= p, "confirmed fell from {p} to {c} on {}", ds.dates[d]);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn embedded_confirmed_never_decreases(c in counts()) {
        assert_non_decreasing(&embedded(&c))?;
    }

    #[test]
    fn row_table_confirmed_never_decreases(c in counts()) {
        let ds = row_tables(&c);
        prop_assert_eq!(ds.feature_count(), c.len());
        assert_non_decreasing(&ds)?;
    }

    #[test]
    fn daily_new_is_the_day_over_day_difference(c in counts()) {
        let ds = embedded(&c);
        prop_assert_eq!(derive_at(&ds, MetricKind::DailyNewConfirmed, 0), vec![0.0; ds.feature_count()]);
        for d in 1..ds.dates.len() {
            let prev = derive_at(&ds, MetricKind::RawConfirmed, d - 1);
            let cur = derive_at(&ds, MetricKind::RawConfirmed, d);
            let daily = derive_at(&ds, MetricKind::DailyNewConfirmed, d);
            for f in 0..ds.feature_count() {
                prop_assert_eq!(daily[f], cur[f] - prev[f]);
            }
        }
    }

    #[test]
    fn case_fatality_ratio_is_a_fraction(
        pairs in prop::collection::vec((0u32..10_000, 0.0f64..=1.0), 1..20)
    ) {
        let n = pairs.len();
        let mut confirmed = CountGrid::zeros(1, n);
        let mut deaths = CountGrid::zeros(1, n);
        for (f, &(c, frac)) in pairs.iter().enumerate() {
            confirmed.set(0, f, c as f64);
            deaths.set(0, f, (c as f64 * frac).floor());
        }
        let ds = Dataset {
            id: SourceId::from("cfr"),
            dates: axis(1),
            confirmed,
            deaths,
            population: vec![None; n],
            beds: vec![None; n],
            names: vec![None; n],
        };
        let cfr = derive_at(&ds, MetricKind::CaseFatalityRatio, 0);
        for (f, &(c, _)) in pairs.iter().enumerate() {
            if c == 0 {
                prop_assert_eq!(cfr[f], 0.0);
            } else {
                prop_assert!((0.0..=1.0).contains(&cfr[f]));
            }
        }
    }
}
