//! Core of an epidemiological map dashboard.
//!
//! Raw case/death sources are normalized into a [`Dataset`], metrics are
//! derived per date, classified into legend bins or annotated with a cached
//! local spatial statistic, and optionally laid out as a cartogram. The
//! spatial computations themselves live behind [`GeoEngine`].

pub mod cartogram;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod metrics;
pub mod registry;
pub mod spatial_cache;

#[cfg(test)]
mod properties;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, Frame, Layer, MapMethod, Selection};
pub use dataset::{CountGrid, Dataset, SourceId};
pub use engine::{GeoEngine, WeightId, WeightSpec};
pub use error::{DashboardError, EngineError};
pub use metrics::MetricKind;
