//! Time series behind the trend chart and the time-slider histogram.

use chrono::NaiveDate;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::MetricError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// New confirmed cases per date, for one feature or summed over all features.
///
/// The first date reports its full cumulative count (there is no earlier
/// date to subtract). Dates after `until` report 0 so a chart can grow as the
/// slider advances without changing its x axis.
pub fn daily_new_series(
    ds: &Dataset,
    feature: Option<usize>,
    until: Option<NaiveDate>,
) -> Result<Vec<TrendPoint>, MetricError> {
    if let Some(f) = feature {
        if f >= ds.feature_count() {
            return Err(MetricError::UnknownFeature { feature: f, count: ds.feature_count() });
        }
    }
    let total = |d: usize| -> f64 {
        match feature {
            Some(f) => ds.confirmed.get(d, f),
            None => ds.confirmed.row(d).iter().sum(),
        }
    };

    Ok(ds
        .dates
        .iter()
        .enumerate()
        .map(|(d, &date)| {
            let visible = until.map_or(true, |u| date <= u);
            let value = match (visible, d.checked_sub(1)) {
                (false, _) => 0.0,
                (true, None) => total(d),
                (true, Some(prev)) => total(d) - total(prev),
            };
            TrendPoint { date, value }
        })
        .collect())
}

/// Running total of [`daily_new_series`].
pub fn cumulative_series(
    ds: &Dataset,
    feature: Option<usize>,
    until: Option<NaiveDate>,
) -> Result<Vec<TrendPoint>, MetricError> {
    let mut running = 0.0;
    Ok(daily_new_series(ds, feature, until)?
        .into_iter()
        .map(|p| {
            running += p.value;
            TrendPoint { date: p.date, value: running }
        })
        .collect())
}
