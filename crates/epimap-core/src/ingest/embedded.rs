use chrono::NaiveDate;
use serde_json::Value;

use super::boundary::{number_property, BoundaryCollection, Properties};
use super::dates::{parse_property_date, sorted_unique};
use super::quality::{CountSeries, DataQualityWarning, WarningSink};
use super::{assemble, read_covariates, Ingestion, SourceIngestor};
use crate::config::EmbeddedLayout;
use crate::dataset::{CountGrid, SourceId};
use crate::error::IngestionError;

/// Boundary collection carrying its own time series as feature properties.
#[derive(Debug, Clone)]
pub struct EmbeddedSource {
    pub boundary: BoundaryCollection,
    pub layout: EmbeddedLayout,
}

impl EmbeddedSource {
    pub fn new(boundary: BoundaryCollection, layout: EmbeddedLayout) -> Self {
        Self { boundary, layout }
    }

    /// Union of ISO-dated keys over every feature, ascending.
    fn date_axis(&self) -> Vec<NaiveDate> {
        let pairs = self
            .boundary
            .features
            .iter()
            .flat_map(|props| props.keys().filter_map(|k| parse_property_date(k)))
            .map(|d| (d, ()))
            .collect();
        sorted_unique(pairs).into_iter().map(|(d, _)| d).collect()
    }
}

/// Absent reads 0 silently; present but non-numeric reads 0 with a warning.
fn read_count(
    props: &Properties,
    key: &str,
    feature: usize,
    date: NaiveDate,
    series: CountSeries,
    sink: &mut WarningSink,
) -> f64 {
    match props.get(key) {
        None | Some(Value::Null) => 0.0,
        Some(v) => match number_property(props, key).filter(|x| x.is_finite()) {
            Some(x) => x,
            None => {
                sink.push(DataQualityWarning::MalformedCell { feature, date, series, value: v.to_string() });
                0.0
            }
        },
    }
}

impl SourceIngestor for EmbeddedSource {
    fn ingest(&self, id: &SourceId) -> Result<Ingestion, IngestionError> {
        if self.boundary.is_empty() {
            return Err(IngestionError::EmptySource(id.clone()));
        }

        let axis = self.date_axis();
        let n = self.boundary.len();
        let mut confirmed = CountGrid::zeros(axis.len(), n);
        let mut deaths = CountGrid::zeros(axis.len(), n);
        let mut sink = WarningSink::default();

        for (feature, props) in self.boundary.features.iter().enumerate() {
            // Deaths arrive as per-date deltas from an implicit zero baseline.
            let mut cumulative_deaths = 0.0;
            for (d, date) in axis.iter().enumerate() {
                let key = date.format("%Y-%m-%d").to_string();
                let c = read_count(props, &key, feature, *date, CountSeries::Confirmed, &mut sink);
                confirmed.set(d, feature, c);

                let death_key = format!("{}{key}", self.layout.death_prefix);
                cumulative_deaths += read_count(props, &death_key, feature, *date, CountSeries::Deaths, &mut sink);
                deaths.set(d, feature, cumulative_deaths);
            }
        }

        let covariates = read_covariates(&self.boundary, &self.layout.covariates);
        Ok(assemble(id, axis, confirmed, deaths, covariates, sink))
    }
}
