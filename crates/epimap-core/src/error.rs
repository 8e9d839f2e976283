//! Error taxonomy for the dashboard engine.
//!
//! Each stage owns a small enum; `DashboardError` is the umbrella the session
//! returns. Data-quality problems that ingestion recovers from are *not* here:
//! they are reported as [`crate::ingest::DataQualityWarning`]s.

use chrono::NaiveDate;
use thiserror::Error;

use crate::dataset::SourceId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestionError {
    #[error("source `{0}` has no rows or features")]
    EmptySource(SourceId),

    #[error("source `{0}` matches neither the row-table nor the embedded-properties layout")]
    UnrecognizedShape(SourceId),

    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("date {date} is not on the axis of dataset `{dataset}`")]
    UnknownDate { dataset: SourceId, date: NaiveDate },

    #[error("feature {feature} is out of range (dataset has {count} features)")]
    UnknownFeature { feature: usize, count: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("breaks are not in ascending order: {0:?}")]
    UnsortedBreaks(Vec<f64>),

    #[error("classification needs at least 2 classes, got {0}")]
    InvalidK(usize),

    #[error("expected {expected} breaks for the requested classes, got {actual}")]
    BreakCountMismatch { expected: usize, actual: usize },

    #[error("no precomputed breaks recorded for field `{0}`")]
    UnknownField(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("cartogram layout is empty")]
    EmptyInput,

    #[error("cartogram layout has {positions} positions but {radii} radii")]
    LengthMismatch { positions: usize, radii: usize },
}

/// Failure reported by the external geospatial engine. The diagnostic is kept
/// verbatim; nothing in this crate interprets or retries it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("geospatial engine `{operation}` failed: {diagnostic}")]
pub struct EngineError {
    pub operation: &'static str,
    pub diagnostic: String,
}

impl EngineError {
    pub fn new(operation: &'static str, diagnostic: impl Into<String>) -> Self {
        Self { operation, diagnostic: diagnostic.into() }
    }
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("dataset `{0}` is not registered")]
    NotRegistered(SourceId),

    #[error("engine reports {engine} features for `{dataset}` but ingestion produced {ingested}")]
    FeatureCountMismatch { dataset: SourceId, engine: usize, ingested: usize },

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("no source has been opened")]
    NoSource,

    #[error("dataset `{0}` has an empty date axis")]
    NoDates(SourceId),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
