use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::{LocalStatKind, WeightSpec};
use crate::error::ConfigError;

/// Boundary property names shared by both source layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CovariateKeys {
    pub population: String,
    pub beds: String,
    pub name: String,
}

impl Default for CovariateKeys {
    fn default() -> Self {
        Self {
            population: "population".into(),
            beds: "beds".into(),
            name: "NAME".into(),
        }
    }
}

/// How a boundary collection joins its two count tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowTableLayout {
    /// Boundary property carrying the numeric identifier.
    pub feature_key: String,
    /// Table column carrying the same identifier.
    pub table_key: String,
    pub covariates: CovariateKeys,
}

impl Default for RowTableLayout {
    fn default() -> Self {
        Self {
            feature_key: "GEOID".into(),
            table_key: "countyFIPS".into(),
            covariates: CovariateKeys::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedLayout {
    /// Prefix marking per-date death deltas, e.g. `d2020-04-01`.
    pub death_prefix: String,
    pub covariates: CovariateKeys,
}

impl Default for EmbeddedLayout {
    fn default() -> Self {
        Self { death_prefix: "d".into(), covariates: CovariateKeys::default() }
    }
}

/// Session-wide settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Number of choropleth classes passed to natural breaks.
    pub classes: usize,
    pub weights: WeightSpec,
    pub local_stat: LocalStatKind,
    pub row_table: RowTableLayout,
    pub embedded: EmbeddedLayout,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            classes: 8,
            weights: WeightSpec::default(),
            local_stat: LocalStatKind::LocalMoran,
            row_table: RowTableLayout::default(),
            embedded: EmbeddedLayout::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
