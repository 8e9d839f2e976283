use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Which of the two count series a warning concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSeries {
    Confirmed,
    Deaths,
}

impl fmt::Display for CountSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CountSeries::Confirmed => "confirmed",
            CountSeries::Deaths => "deaths",
        })
    }
}

/// A problem ingestion recovered from. None of these abort the ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// The feature's identifier is absent from a table (or the feature has no
    /// identifier at all); that series was zero-filled.
    IdentifierMismatch { feature: usize, identifier: Option<u64>, series: CountSeries },
    DuplicateIdentifier { identifier: u64, series: CountSeries },
    MalformedCell { feature: usize, date: NaiveDate, series: CountSeries, value: String },
    MissingDateColumn { date: NaiveDate, series: CountSeries },
    /// A cumulative count dropped; it was raised to the running maximum.
    NonMonotonicCount { feature: usize, date: NaiveDate, series: CountSeries },
}

impl DataQualityWarning {
    /// Same name as the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            DataQualityWarning::IdentifierMismatch { .. } => "identifier_mismatch",
            DataQualityWarning::DuplicateIdentifier { .. } => "duplicate_identifier",
            DataQualityWarning::MalformedCell { .. } => "malformed_cell",
            DataQualityWarning::MissingDateColumn { .. } => "missing_date_column",
            DataQualityWarning::NonMonotonicCount { .. } => "non_monotonic_count",
        }
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::IdentifierMismatch { feature, identifier: Some(id), series } => {
                write!(f, "feature {feature}: identifier {id} missing from {series} table, zero-filled")
            }
            DataQualityWarning::IdentifierMismatch { feature, identifier: None, series } => {
                write!(f, "feature {feature}: no identifier, {series} zero-filled")
            }
            DataQualityWarning::DuplicateIdentifier { identifier, series } => {
                write!(f, "identifier {identifier} repeated in {series} table, first row kept")
            }
            DataQualityWarning::MalformedCell { feature, date, series, value } => {
                write!(f, "feature {feature}: unreadable {series} value {value:?} on {date}, read as 0")
            }
            DataQualityWarning::MissingDateColumn { date, series } => {
                write!(f, "{series} table has no column for {date}, read as 0")
            }
            DataQualityWarning::NonMonotonicCount { feature, date, series } => {
                write!(f, "feature {feature}: cumulative {series} decreases on {date}, carried forward")
            }
        }
    }
}

/// Collects warnings and mirrors each one to the log as it is raised.
#[derive(Debug, Default)]
pub(crate) struct WarningSink {
    warnings: Vec<DataQualityWarning>,
}

impl WarningSink {
    pub fn push(&mut self, w: DataQualityWarning) {
        log::warn!("{w}");
        self.warnings.push(w);
    }

    pub fn into_inner(self) -> Vec<DataQualityWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serialized_tag() {
        let date = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        let warnings = [
            DataQualityWarning::IdentifierMismatch { feature: 0, identifier: None, series: CountSeries::Confirmed },
            DataQualityWarning::DuplicateIdentifier { identifier: 1001, series: CountSeries::Deaths },
            DataQualityWarning::MalformedCell { feature: 1, date, series: CountSeries::Deaths, value: "x".into() },
            DataQualityWarning::MissingDateColumn { date, series: CountSeries::Deaths },
            DataQualityWarning::NonMonotonicCount { feature: 2, date, series: CountSeries::Confirmed },
        ];
        for w in &warnings {
            let json = serde_json::to_value(w).unwrap();
            assert_eq!(json["kind"], w.kind());
        }
    }

    #[test]
    fn display_names_the_series() {
        let w = DataQualityWarning::IdentifierMismatch { feature: 3, identifier: Some(1001), series: CountSeries::Deaths };
        assert_eq!(w.to_string(), "feature 3: identifier 1001 missing from deaths table, zero-filled");
    }
}
