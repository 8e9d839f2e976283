//! Boundary to the external geospatial-analysis engine.
//!
//! Spatial weights, local statistics, natural breaks and cartogram layouts are
//! computed by the engine; this crate only decides *when* to ask and what to
//! do with the answer. Every call is synchronous and assumed bounded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::SourceId;
use crate::error::EngineError;
use crate::geometry::Point;

/// Opaque handle for a weights structure created by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeightId(String);

impl WeightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WeightId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Neighbour relation to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightSpec {
    Queen { order: u32, include_lower_order: bool, precision_threshold: f64 },
    Rook { order: u32, include_lower_order: bool, precision_threshold: f64 },
    Knn { k: u32, power: f64, inverse: bool, arc_distance: bool, miles: bool },
    Distance { threshold: f64, power: f64, inverse: bool, arc_distance: bool, miles: bool },
}

impl Default for WeightSpec {
    fn default() -> Self {
        WeightSpec::Queen { order: 1, include_lower_order: false, precision_threshold: 0.0 }
    }
}

impl WeightSpec {
    /// Stable, human-readable name, e.g. `queen-1` or `knn-6`. Several specs
    /// can share one name; use [`WeightSpec::identity`] to tell them apart.
    pub fn cache_id(&self) -> String {
        match self {
            WeightSpec::Queen { order, include_lower_order, .. } => {
                format!("queen-{order}{}", if *include_lower_order { "+" } else { "" })
            }
            WeightSpec::Rook { order, include_lower_order, .. } => {
                format!("rook-{order}{}", if *include_lower_order { "+" } else { "" })
            }
            WeightSpec::Knn { k, .. } => format!("knn-{k}"),
            WeightSpec::Distance { threshold, .. } => format!("dist-{threshold}"),
        }
    }

    /// Key covering every field: equal identities mean the engine would build
    /// the same weights.
    pub fn identity(&self) -> String {
        match self {
            WeightSpec::Queen { order, include_lower_order, precision_threshold } => {
                format!("queen:{order}:{include_lower_order}:{precision_threshold:?}")
            }
            WeightSpec::Rook { order, include_lower_order, precision_threshold } => {
                format!("rook:{order}:{include_lower_order}:{precision_threshold:?}")
            }
            WeightSpec::Knn { k, power, inverse, arc_distance, miles } => {
                format!("knn:{k}:{power:?}:{inverse}:{arc_distance}:{miles}")
            }
            WeightSpec::Distance { threshold, power, inverse, arc_distance, miles } => {
                format!("dist:{threshold:?}:{power:?}:{inverse}:{arc_distance}:{miles}")
            }
        }
    }
}

/// Local spatial-autocorrelation statistics the engine offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocalStatKind {
    #[default]
    LocalMoran,
    LocalG,
    LocalGStar,
    LocalGeary,
    LocalJoinCount,
}

/// Per-feature output of a local statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalStatResult {
    pub cluster_labels: Vec<u8>,
    pub p_values: Vec<f64>,
}

/// Raw cartogram layout in engine units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartogramLayout {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub radius: Vec<f64>,
}

impl CartogramLayout {
    pub fn positions(&self) -> Vec<Point> {
        self.x.iter().zip(&self.y).map(|(&x, &y)| Point::new(x, y)).collect()
    }
}

pub trait GeoEngine {
    /// Must precede any other call that names `id`.
    fn load_dataset(&mut self, id: &SourceId, bytes: &[u8]) -> Result<(), EngineError>;

    fn feature_count(&self, id: &SourceId) -> Result<usize, EngineError>;

    fn centroids(&self, id: &SourceId) -> Result<Vec<Point>, EngineError>;

    fn compute_weights(&mut self, id: &SourceId, spec: &WeightSpec) -> Result<WeightId, EngineError>;

    /// Permutation-based, and by far the most expensive call.
    fn local_statistic(
        &mut self,
        kind: LocalStatKind,
        id: &SourceId,
        weight: &WeightId,
        values: &[f64],
    ) -> Result<LocalStatResult, EngineError>;

    /// Returns `k - 1` ascending breaks.
    fn natural_breaks(&mut self, id: &SourceId, k: usize, values: &[f64]) -> Result<Vec<f64>, EngineError>;

    fn cartogram_layout(&mut self, id: &SourceId, values: &[f64]) -> Result<CartogramLayout, EngineError>;
}

/// The engine rejects NaN and infinities; they are sent as 0.
pub fn sanitize_values(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| if v.is_finite() { v } else { 0.0 }).collect()
}

#[cfg(test)]
pub(crate) mod mock {
    //! Call-counting engine used across the crate's tests.
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    pub struct MockEngine {
        pub feature_counts: HashMap<SourceId, usize>,
        pub loads: usize,
        pub weight_calls: usize,
        pub local_stat_calls: usize,
        pub breaks_calls: usize,
        pub layout_calls: usize,
        /// When set, `natural_breaks` returns this verbatim.
        pub fixed_breaks: Option<Vec<f64>>,
        pub fail_breaks: bool,
    }

    impl GeoEngine for MockEngine {
        fn load_dataset(&mut self, id: &SourceId, bytes: &[u8]) -> Result<(), EngineError> {
            self.loads += 1;
            let parsed: serde_json::Value =
                serde_json::from_slice(bytes).map_err(|e| EngineError::new("load_dataset", e.to_string()))?;
            let n = parsed["features"].as_array().map(|a| a.len()).unwrap_or(0);
            self.feature_counts.insert(id.clone(), n);
            Ok(())
        }

        fn feature_count(&self, id: &SourceId) -> Result<usize, EngineError> {
            self.feature_counts
                .get(id)
                .copied()
                .ok_or_else(|| EngineError::new("feature_count", format!("unknown map {id}")))
        }

        fn centroids(&self, id: &SourceId) -> Result<Vec<Point>, EngineError> {
            let n = self.feature_count(id)?;
            Ok((0..n).map(|i| Point::new(i as f64, -(i as f64))).collect())
        }

        fn compute_weights(&mut self, id: &SourceId, spec: &WeightSpec) -> Result<WeightId, EngineError> {
            self.weight_calls += 1;
            Ok(WeightId::new(format!("{id}:{}", spec.identity())))
        }

        fn local_statistic(
            &mut self,
            _kind: LocalStatKind,
            _id: &SourceId,
            _weight: &WeightId,
            values: &[f64],
        ) -> Result<LocalStatResult, EngineError> {
            self.local_stat_calls += 1;
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            Ok(LocalStatResult {
                cluster_labels: values.iter().map(|&v| if v > mean { 1 } else { 0 }).collect(),
                p_values: values.iter().map(|_| 0.01).collect(),
            })
        }

        fn natural_breaks(&mut self, _id: &SourceId, k: usize, values: &[f64]) -> Result<Vec<f64>, EngineError> {
            self.breaks_calls += 1;
            if self.fail_breaks {
                return Err(EngineError::new("natural_breaks", "out of memory"));
            }
            if let Some(b) = &self.fixed_breaks {
                return Ok(b.clone());
            }
            // Equal-interval stand-in.
            let max = values.iter().cloned().fold(0.0f64, f64::max);
            Ok((1..k).map(|i| max * i as f64 / k as f64).collect())
        }

        fn cartogram_layout(&mut self, _id: &SourceId, values: &[f64]) -> Result<CartogramLayout, EngineError> {
            self.layout_calls += 1;
            Ok(CartogramLayout {
                x: (0..values.len()).map(|i| 1000.0 + i as f64 * 10.0).collect(),
                y: (0..values.len()).map(|i| 500.0 - i as f64 * 5.0).collect(),
                radius: values.iter().map(|v| v.sqrt()).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_ids_are_readable() {
        assert_eq!(WeightSpec::default().cache_id(), "queen-1");
        let rook = WeightSpec::Rook { order: 2, include_lower_order: true, precision_threshold: 0.0 };
        assert_eq!(rook.cache_id(), "rook-2+");
    }

    #[test]
    fn identity_covers_every_field() {
        let base = WeightSpec::Distance { threshold: 1.5, power: 1.0, inverse: false, arc_distance: false, miles: false };
        assert_eq!(base.identity(), "dist:1.5:1.0:false:false:false");
        let miles = WeightSpec::Distance { threshold: 1.5, power: 1.0, inverse: false, arc_distance: false, miles: true };
        assert_eq!(base.cache_id(), miles.cache_id());
        assert_ne!(base.identity(), miles.identity());
        assert_eq!(WeightSpec::default().identity(), "queen:1:false:0.0");
    }

    #[test]
    fn sanitize_replaces_non_finite() {
        assert_eq!(sanitize_values(&[1.0, f64::NAN, f64::INFINITY, -2.0]), vec![1.0, 0.0, 0.0, -2.0]);
    }

    #[test]
    fn weight_spec_round_trips_through_config_json() {
        let spec: WeightSpec = serde_json::from_str(r#"{"kind":"knn","k":6,"power":1.0,"inverse":false,"arc_distance":true,"miles":false}"#).unwrap();
        assert_eq!(spec.cache_id(), "knn-6");
    }
}
