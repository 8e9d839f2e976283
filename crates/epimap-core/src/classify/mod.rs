//! Choropleth classification: breaks in, labeled bins out.
//!
//! Break *computation* belongs to the geospatial engine (natural breaks) or to
//! a previously recorded field. What happens after is owned here:
//!
//!   bin 0        sentinel for value 0 ("no observed cases"), label "0"
//!   bin 1..k-1   closed by break b_i, labeled with b_i
//!   bin k        everything ≥ b_{k-1}, labeled ">b_{k-1}"
//!
//! A value v lands in bin j+1 for the first j with ext[j] <= v < ext[j+1],
//! where ext = [-inf, b_1, ..., b_{k-1}, +inf]. Zero always lands in bin 0.

pub mod palette;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::SourceId;
use crate::engine::{sanitize_values, GeoEngine};
use crate::error::ClassificationError;

/// Where the raw breaks come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreaksMode {
    NaturalBreaks,
    /// Reuse the breaks recorded under this field name.
    ExplicitField(String),
}

/// Precomputed breaks, keyed by (dataset, field name). Breaks recorded for
/// one dataset are never visible to another.
#[derive(Debug, Clone, Default)]
pub struct BreakTable {
    by_field: HashMap<(SourceId, String), Vec<f64>>,
}

impl BreakTable {
    /// Record breaks for `field` of `dataset`, returning whatever was
    /// recorded before.
    pub fn record(&mut self, dataset: &SourceId, field: impl Into<String>, breaks: Vec<f64>) -> Option<Vec<f64>> {
        self.by_field.insert((dataset.clone(), field.into()), breaks)
    }

    pub fn get(&self, dataset: &SourceId, field: &str) -> Option<&[f64]> {
        self.by_field.get(&(dataset.clone(), field.to_owned())).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub k: usize,
    /// The k-1 raw breaks, ascending.
    pub breaks: Vec<f64>,
    /// k+1 legend labels; `labels[0]` is the zero sentinel.
    pub labels: Vec<String>,
    /// k+1 lists of feature ids, parallel to `labels`.
    pub bins: Vec<Vec<usize>>,
    /// Bin per feature id; `None` for values no interval accepts (NaN, +inf).
    pub assignment: Vec<Option<usize>>,
}

impl ClassificationResult {
    pub fn bin_of(&self, feature: usize) -> Option<usize> {
        self.assignment.get(feature).copied().flatten()
    }
}

/// Integral breaks print as integers, others with two decimals.
pub fn format_break(b: f64) -> String {
    if b.fract() == 0.0 && b.abs() < 1e15 {
        format!("{}", b as i64)
    } else {
        format!("{b:.2}")
    }
}

/// Build labeled bins from raw breaks.
pub fn classify_with_breaks(values: &[f64], k: usize, breaks: &[f64]) -> Result<ClassificationResult, ClassificationError> {
    if k < 2 {
        return Err(ClassificationError::InvalidK(k));
    }
    if breaks.len() != k - 1 {
        return Err(ClassificationError::BreakCountMismatch { expected: k - 1, actual: breaks.len() });
    }
    // Equal neighbours are fine; anything descending or NaN is not.
    if !breaks.windows(2).all(|w| w[0] <= w[1]) || breaks.iter().any(|b| b.is_nan()) {
        return Err(ClassificationError::UnsortedBreaks(breaks.to_vec()));
    }

    let mut labels = Vec::with_capacity(k + 1);
    labels.push("0".to_string());
    labels.extend(breaks.iter().map(|&b| format_break(b)));
    labels.push(format!(">{}", format_break(breaks[k - 2])));

    let mut ext = Vec::with_capacity(k + 1);
    ext.push(f64::NEG_INFINITY);
    ext.extend_from_slice(breaks);
    ext.push(f64::INFINITY);

    let mut bins: Vec<Vec<usize>> = vec![Vec::new(); k + 1];
    let assignment: Vec<Option<usize>> = values
        .iter()
        .enumerate()
        .map(|(feature, &v)| {
            let bin = if v == 0.0 {
                Some(0)
            } else {
                ext.windows(2).position(|w| v >= w[0] && v < w[1]).map(|j| j + 1)
            };
            if let Some(b) = bin {
                bins[b].push(feature);
            }
            bin
        })
        .collect();

    Ok(ClassificationResult { k, breaks: breaks.to_vec(), labels, bins, assignment })
}

/// Resolve raw breaks per `mode`, then bin `values`.
pub fn classify<E: GeoEngine + ?Sized>(
    engine: &mut E,
    dataset: &SourceId,
    table: &BreakTable,
    values: &[f64],
    k: usize,
    mode: &BreaksMode,
) -> Result<ClassificationResult, ClassificationError> {
    if k < 2 {
        return Err(ClassificationError::InvalidK(k));
    }
    let breaks = match mode {
        BreaksMode::NaturalBreaks => engine.natural_breaks(dataset, k, &sanitize_values(values))?,
        BreaksMode::ExplicitField(field) => table
            .get(dataset, field)
            .ok_or_else(|| ClassificationError::UnknownField(field.clone()))?
            .to_vec(),
    };
    classify_with_breaks(values, k, &breaks)
}
