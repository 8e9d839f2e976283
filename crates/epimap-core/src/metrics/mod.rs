//! Derived epidemiological metrics.
//!
//! Every metric is a pure function of the canonical counts and covariates at
//! one date (and, for daily-new metrics, the date before it). Nothing here is
//! cached: values are recomputed per interaction, and no rounding is applied.

pub mod summary;
pub mod trend;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::MetricError;

pub use summary::FeatureSummary;
pub use trend::{cumulative_series, daily_new_series, TrendPoint};

/// Population denominator for the per-10K metrics.
pub const PER_POPULATION: f64 = 10_000.0;

/// The ten metrics a dashboard can map. The serialized form is the display
/// label, which also names the metric in spatial-statistic cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "Confirmed Count")]
    RawConfirmed,
    #[serde(rename = "Confirmed Count per 10K Population")]
    ConfirmedPer10k,
    #[serde(rename = "Confirmed Count per Licensed Bed")]
    ConfirmedPerBed,
    #[serde(rename = "Death Count")]
    RawDeaths,
    #[serde(rename = "Death Count per 10K Population")]
    DeathsPer10k,
    #[serde(rename = "Death Count/Confirmed Count")]
    CaseFatalityRatio,
    #[serde(rename = "Daily New Confirmed Count")]
    DailyNewConfirmed,
    #[serde(rename = "Daily New Confirmed Count per 10K Pop")]
    DailyNewConfirmedPer10k,
    #[serde(rename = "Daily New Death Count")]
    DailyNewDeaths,
    #[serde(rename = "Daily New Death Count per 10K Pop")]
    DailyNewDeathsPer10k,
}

impl MetricKind {
    pub const ALL: [MetricKind; 10] = [
        MetricKind::RawConfirmed,
        MetricKind::ConfirmedPer10k,
        MetricKind::ConfirmedPerBed,
        MetricKind::RawDeaths,
        MetricKind::DeathsPer10k,
        MetricKind::CaseFatalityRatio,
        MetricKind::DailyNewConfirmed,
        MetricKind::DailyNewConfirmedPer10k,
        MetricKind::DailyNewDeaths,
        MetricKind::DailyNewDeathsPer10k,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::RawConfirmed => "Confirmed Count",
            MetricKind::ConfirmedPer10k => "Confirmed Count per 10K Population",
            MetricKind::ConfirmedPerBed => "Confirmed Count per Licensed Bed",
            MetricKind::RawDeaths => "Death Count",
            MetricKind::DeathsPer10k => "Death Count per 10K Population",
            MetricKind::CaseFatalityRatio => "Death Count/Confirmed Count",
            MetricKind::DailyNewConfirmed => "Daily New Confirmed Count",
            MetricKind::DailyNewConfirmedPer10k => "Daily New Confirmed Count per 10K Pop",
            MetricKind::DailyNewDeaths => "Daily New Death Count",
            MetricKind::DailyNewDeathsPer10k => "Daily New Death Count per 10K Pop",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }

    pub fn is_daily(self) -> bool {
        matches!(
            self,
            MetricKind::DailyNewConfirmed
                | MetricKind::DailyNewConfirmedPer10k
                | MetricKind::DailyNewDeaths
                | MetricKind::DailyNewDeathsPer10k
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `numerator / covariate * scale`, or 0 when the covariate is missing or zero.
#[inline]
fn per_covariate(numerator: f64, covariate: Option<f64>, scale: f64) -> f64 {
    match covariate {
        Some(c) if c != 0.0 && c.is_finite() => numerator / c * scale,
        _ => 0.0,
    }
}

/// Change since the previous date; 0 on the first date.
#[inline]
fn daily(series: &crate::dataset::CountGrid, date_idx: usize, feature: usize) -> f64 {
    match date_idx.checked_sub(1) {
        Some(prev) => series.get(date_idx, feature) - series.get(prev, feature),
        None => 0.0,
    }
}

/// One metric for one feature at an axis position.
pub(crate) fn value_at(ds: &Dataset, kind: MetricKind, date_idx: usize, feature: usize) -> f64 {
    let confirmed = ds.confirmed.get(date_idx, feature);
    let deaths = ds.deaths.get(date_idx, feature);
    let pop = ds.population[feature];
    match kind {
        MetricKind::RawConfirmed => confirmed,
        MetricKind::ConfirmedPer10k => per_covariate(confirmed, pop, PER_POPULATION),
        MetricKind::ConfirmedPerBed => per_covariate(confirmed, ds.beds[feature], 1.0),
        MetricKind::RawDeaths => deaths,
        MetricKind::DeathsPer10k => per_covariate(deaths, pop, PER_POPULATION),
        MetricKind::CaseFatalityRatio => {
            if confirmed > 0.0 {
                deaths / confirmed
            } else {
                0.0
            }
        }
        MetricKind::DailyNewConfirmed => daily(&ds.confirmed, date_idx, feature),
        MetricKind::DailyNewConfirmedPer10k => {
            per_covariate(daily(&ds.confirmed, date_idx, feature), pop, PER_POPULATION)
        }
        MetricKind::DailyNewDeaths => daily(&ds.deaths, date_idx, feature),
        MetricKind::DailyNewDeathsPer10k => per_covariate(daily(&ds.deaths, date_idx, feature), pop, PER_POPULATION),
    }
}

/// Every feature's value of `kind` at an axis position.
pub fn derive_at(ds: &Dataset, kind: MetricKind, date_idx: usize) -> Vec<f64> {
    (0..ds.feature_count()).map(|f| value_at(ds, kind, date_idx, f)).collect()
}

/// Every feature's value of `kind` on `date`, indexed by feature id.
pub fn derive(ds: &Dataset, kind: MetricKind, date: NaiveDate) -> Result<Vec<f64>, MetricError> {
    let date_idx = ds
        .date_index(date)
        .ok_or_else(|| MetricError::UnknownDate { dataset: ds.id.clone(), date })?;
    Ok(derive_at(ds, kind, date_idx))
}
