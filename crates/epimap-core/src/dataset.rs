use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical identity of a raw source, e.g. `county_usfacts.geojson`.
/// The same string is the dataset handle inside the geospatial engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-date, per-feature counts, date-major: row `d` holds every feature's
/// count on date `d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountGrid {
    data: Vec<f64>,
    n_dates: usize,
    n_features: usize,
}

impl CountGrid {
    /// Create a grid filled with zeros.
    pub fn zeros(n_dates: usize, n_features: usize) -> Self {
        Self { data: vec![0.0; n_dates * n_features], n_dates, n_features }
    }

    #[inline]
    pub fn get(&self, date_idx: usize, feature: usize) -> f64 {
        self.data[date_idx * self.n_features + feature]
    }

    #[inline]
    pub fn set(&mut self, date_idx: usize, feature: usize, val: f64) {
        self.data[date_idx * self.n_features + feature] = val;
    }

    /// Every feature's count on one date.
    pub fn row(&self, date_idx: usize) -> &[f64] {
        let start = date_idx * self.n_features;
        &self.data[start..start + self.n_features]
    }

    /// One feature's counts across the whole date axis.
    pub fn series(&self, feature: usize) -> Vec<f64> {
        (0..self.n_dates).map(|d| self.get(d, feature)).collect()
    }

    pub fn n_dates(&self) -> usize {
        self.n_dates
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// The canonical matrix both raw source shapes are normalized into.
///
/// Feature ids are `0..feature_count()`, the order of the boundary collection,
/// which is also the order the geospatial engine indexes features in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: SourceId,
    /// Strictly ascending.
    pub dates: Vec<NaiveDate>,
    /// Cumulative confirmed cases.
    pub confirmed: CountGrid,
    /// Cumulative deaths.
    pub deaths: CountGrid,
    pub population: Vec<Option<f64>>,
    /// Licensed hospital beds.
    pub beds: Vec<Option<f64>>,
    /// Display name per feature (`NAME` property), when the boundary has one.
    pub names: Vec<Option<String>>,
}

impl Dataset {
    pub fn feature_count(&self) -> usize {
        self.population.len()
    }

    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}
