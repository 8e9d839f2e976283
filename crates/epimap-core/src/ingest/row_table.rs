use std::collections::HashMap;

use chrono::NaiveDate;

use super::boundary::{identifier_property, parse_identifier, BoundaryCollection};
use super::dates::{parse_table_date, sorted_unique};
use super::quality::{CountSeries, DataQualityWarning, WarningSink};
use super::table::RowTable;
use super::{assemble, read_covariates, Ingestion, SourceIngestor};
use crate::config::RowTableLayout;
use crate::dataset::{CountGrid, SourceId};
use crate::error::IngestionError;

/// Boundary collection joined to a confirmed table and a deaths table.
#[derive(Debug, Clone)]
pub struct RowTableSource {
    pub boundary: BoundaryCollection,
    pub confirmed: RowTable,
    pub deaths: RowTable,
    pub layout: RowTableLayout,
}

impl RowTableSource {
    pub fn new(boundary: BoundaryCollection, confirmed: RowTable, deaths: RowTable, layout: RowTableLayout) -> Self {
        Self { boundary, confirmed, deaths, layout }
    }
}

/// Identifier → row lookup plus the column holding each axis date.
struct TableJoin<'a> {
    table: &'a RowTable,
    series: CountSeries,
    rows_by_id: HashMap<u64, usize>,
    /// Indexed like the date axis; `None` when the table lacks that date.
    columns: Vec<Option<usize>>,
}

impl<'a> TableJoin<'a> {
    fn build(
        table: &'a RowTable,
        key: &str,
        axis: &[NaiveDate],
        series: CountSeries,
        sink: &mut WarningSink,
    ) -> Result<Self, IngestionError> {
        let key_col = table.column_index(key).ok_or_else(|| IngestionError::Parse {
            what: "row table",
            message: format!("{series} table has no `{key}` column"),
        })?;

        let mut rows_by_id = HashMap::with_capacity(table.rows.len());
        for row in 0..table.rows.len() {
            let Some(id) = parse_identifier(table.cell(row, key_col)) else {
                log::debug!("{series} table row {row}: unreadable identifier, skipped");
                continue;
            };
            if rows_by_id.contains_key(&id) {
                sink.push(DataQualityWarning::DuplicateIdentifier { identifier: id, series });
            } else {
                rows_by_id.insert(id, row);
            }
        }

        let mut by_date: HashMap<NaiveDate, usize> = HashMap::new();
        for (i, h) in table.headers.iter().enumerate() {
            if let Some(d) = parse_table_date(h) {
                by_date.entry(d).or_insert(i);
            }
        }
        let columns = axis
            .iter()
            .map(|d| {
                let col = by_date.get(d).copied();
                if col.is_none() {
                    sink.push(DataQualityWarning::MissingDateColumn { date: *d, series });
                }
                col
            })
            .collect();

        Ok(Self { table, series, rows_by_id, columns })
    }

    /// Copy one feature's row into `grid`; returns false on an identifier miss
    /// (the grid stays zero for that feature).
    fn fill(
        &self,
        feature: usize,
        identifier: Option<u64>,
        axis: &[NaiveDate],
        grid: &mut CountGrid,
        sink: &mut WarningSink,
    ) -> bool {
        let Some(row) = identifier.and_then(|id| self.rows_by_id.get(&id).copied()) else {
            sink.push(DataQualityWarning::IdentifierMismatch { feature, identifier, series: self.series });
            return false;
        };
        for (d, col) in self.columns.iter().enumerate() {
            let Some(col) = *col else { continue };
            let text = self.table.cell(row, col).trim();
            let value = if text.is_empty() {
                0.0
            } else {
                match text.parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    _ => {
                        sink.push(DataQualityWarning::MalformedCell {
                            feature,
                            date: axis[d],
                            series: self.series,
                            value: text.to_string(),
                        });
                        0.0
                    }
                }
            };
            grid.set(d, feature, value);
        }
        true
    }
}

impl SourceIngestor for RowTableSource {
    fn ingest(&self, id: &SourceId) -> Result<Ingestion, IngestionError> {
        if self.boundary.is_empty() || self.confirmed.is_empty() || self.deaths.is_empty() {
            return Err(IngestionError::EmptySource(id.clone()));
        }

        // The confirmed table defines the date axis.
        let axis: Vec<NaiveDate> = sorted_unique(
            self.confirmed
                .headers
                .iter()
                .filter_map(|h| parse_table_date(h).map(|d| (d, ())))
                .collect(),
        )
        .into_iter()
        .map(|(d, _)| d)
        .collect();

        let mut sink = WarningSink::default();
        let key = &self.layout.table_key;
        let confirmed_join = TableJoin::build(&self.confirmed, key, &axis, CountSeries::Confirmed, &mut sink)?;
        let deaths_join = TableJoin::build(&self.deaths, key, &axis, CountSeries::Deaths, &mut sink)?;

        let n = self.boundary.len();
        let mut confirmed = CountGrid::zeros(axis.len(), n);
        let mut deaths = CountGrid::zeros(axis.len(), n);
        let mut matched = 0usize;

        for (feature, props) in self.boundary.features.iter().enumerate() {
            let identifier = identifier_property(props, &self.layout.feature_key);
            let c = confirmed_join.fill(feature, identifier, &axis, &mut confirmed, &mut sink);
            let d = deaths_join.fill(feature, identifier, &axis, &mut deaths, &mut sink);
            if c && d {
                matched += 1;
            }
        }
        log::debug!("`{id}`: {matched}/{n} features matched both tables");

        let covariates = read_covariates(&self.boundary, &self.layout.covariates);
        Ok(assemble(id, axis, confirmed, deaths, covariates, sink))
    }
}
