//! Source ingestion: two raw layouts, one canonical [`Dataset`].
//!
//! - *Row tables*: a boundary collection plus confirmed/deaths tables joined on
//!   a numeric identifier, dates as `M/D/YYYY` column headers.
//! - *Embedded properties*: a boundary collection whose features carry
//!   cumulative confirmed counts under ISO date keys and per-date death deltas
//!   under a prefixed key.
//!
//! [`RawSource::detect`] picks the layout once; consumers only ever see the
//! resulting `Dataset`, and cannot tell which layout produced it.

pub mod boundary;
pub mod dates;
pub mod embedded;
pub mod quality;
pub mod row_table;
pub mod table;

use chrono::NaiveDate;

use crate::config::{CovariateKeys, DashboardConfig};
use crate::dataset::{CountGrid, Dataset, SourceId};
use crate::error::IngestionError;

pub use boundary::BoundaryCollection;
pub use embedded::EmbeddedSource;
pub use quality::{CountSeries, DataQualityWarning};
pub use row_table::RowTableSource;
pub use table::RowTable;

use quality::WarningSink;

/// A dataset plus everything ingestion had to repair to build it.
#[derive(Debug, Clone)]
pub struct Ingestion {
    pub dataset: Dataset,
    pub warnings: Vec<DataQualityWarning>,
}

pub trait SourceIngestor {
    fn ingest(&self, id: &SourceId) -> Result<Ingestion, IngestionError>;
}

/// Raw input in one of the two supported layouts.
#[derive(Debug, Clone)]
pub enum RawSource {
    RowTable(RowTableSource),
    Embedded(EmbeddedSource),
}

impl RawSource {
    /// Choose the layout from the shape of the input: tables present means
    /// row tables; otherwise the boundary must carry ISO-dated properties.
    pub fn detect(
        id: &SourceId,
        boundary: BoundaryCollection,
        tables: Option<(RowTable, RowTable)>,
        config: &DashboardConfig,
    ) -> Result<Self, IngestionError> {
        if let Some((confirmed, deaths)) = tables {
            return Ok(RawSource::RowTable(RowTableSource::new(
                boundary,
                confirmed,
                deaths,
                config.row_table.clone(),
            )));
        }
        let has_dates = boundary
            .features
            .iter()
            .any(|props| props.keys().any(|k| dates::parse_property_date(k).is_some()));
        if has_dates || boundary.is_empty() {
            Ok(RawSource::Embedded(EmbeddedSource::new(boundary, config.embedded.clone())))
        } else {
            Err(IngestionError::UnrecognizedShape(id.clone()))
        }
    }
}

impl SourceIngestor for RawSource {
    fn ingest(&self, id: &SourceId) -> Result<Ingestion, IngestionError> {
        match self {
            RawSource::RowTable(src) => src.ingest(id),
            RawSource::Embedded(src) => src.ingest(id),
        }
    }
}

/// Per-feature covariates and display names read from the boundary.
pub(crate) struct Covariates {
    pub population: Vec<Option<f64>>,
    pub beds: Vec<Option<f64>>,
    pub names: Vec<Option<String>>,
}

pub(crate) fn read_covariates(boundary: &BoundaryCollection, keys: &CovariateKeys) -> Covariates {
    let f = &boundary.features;
    Covariates {
        population: f.iter().map(|p| boundary::number_property(p, &keys.population)).collect(),
        beds: f.iter().map(|p| boundary::number_property(p, &keys.beds)).collect(),
        names: f.iter().map(|p| boundary::string_property(p, &keys.name)).collect(),
    }
}

/// Raise any dip in a cumulative series to the running maximum. One warning
/// per feature and series, at the first dip.
pub(crate) fn enforce_cumulative(
    grid: &mut CountGrid,
    dates: &[NaiveDate],
    series: CountSeries,
    sink: &mut WarningSink,
) {
    for feature in 0..grid.n_features() {
        let mut running = f64::NEG_INFINITY;
        let mut warned = false;
        for (d, date) in dates.iter().enumerate() {
            let v = grid.get(d, feature);
            if v < running {
                grid.set(d, feature, running);
                if !warned {
                    sink.push(DataQualityWarning::NonMonotonicCount { feature, date: *date, series });
                    warned = true;
                }
            } else {
                running = v;
            }
        }
    }
}

/// Shared tail of both layouts: enforce cumulative semantics and assemble.
pub(crate) fn assemble(
    id: &SourceId,
    dates: Vec<NaiveDate>,
    mut confirmed: CountGrid,
    mut deaths: CountGrid,
    covariates: Covariates,
    mut sink: WarningSink,
) -> Ingestion {
    enforce_cumulative(&mut confirmed, &dates, CountSeries::Confirmed, &mut sink);
    enforce_cumulative(&mut deaths, &dates, CountSeries::Deaths, &mut sink);
    let warnings = sink.into_inner();
    log::info!(
        "ingested `{id}`: {} features x {} dates, {} data-quality warnings",
        covariates.population.len(),
        dates.len(),
        warnings.len()
    );
    Ingestion {
        dataset: Dataset {
            id: id.clone(),
            dates,
            confirmed,
            deaths,
            population: covariates.population,
            beds: covariates.beds,
            names: covariates.names,
        },
        warnings,
    }
}
