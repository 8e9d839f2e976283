//! Datasets opened in this session, keyed by source.
//!
//! Opening a source is the expensive path: ingest, load the boundary into the
//! geospatial engine, cross-check feature counts, fetch centroids.
//! It runs once per source; re-opening returns the registered entry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dataset::{Dataset, SourceId};
use crate::engine::{GeoEngine, WeightId, WeightSpec};
use crate::error::{IngestionError, RegistryError};
use crate::geometry::Point;
use crate::ingest::{DataQualityWarning, RawSource, SourceIngestor};

#[derive(Debug, Clone)]
pub struct RegisteredDataset {
    pub dataset: Arc<Dataset>,
    /// Per-feature centroid, in the engine's coordinate space.
    pub centroids: Vec<Point>,
    pub warnings: Vec<DataQualityWarning>,
    /// Weight handles by `WeightSpec::identity`.
    weights: HashMap<String, WeightId>,
}

impl RegisteredDataset {
    /// The handle for `spec`, if one was already created.
    pub fn weight(&self, spec: &WeightSpec) -> Option<&WeightId> {
        self.weights.get(&spec.identity())
    }
}

#[derive(Debug, Default)]
pub struct DatasetRegistry {
    entries: HashMap<SourceId, RegisteredDataset>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &SourceId) -> Result<&RegisteredDataset, RegistryError> {
        self.entries.get(id).ok_or_else(|| RegistryError::NotRegistered(id.clone()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.entries.keys()
    }

    /// The registered entry for `id`, opening it with `load` on first use.
    /// `load` returns the raw boundary bytes for the engine and the parsed
    /// raw source for ingestion.
    pub fn get_or_open<E, F>(&mut self, id: &SourceId, engine: &mut E, load: F) -> Result<&RegisteredDataset, RegistryError>
    where
        E: GeoEngine + ?Sized,
        F: FnOnce() -> Result<(Vec<u8>, RawSource), IngestionError>,
    {
        if !self.entries.contains_key(id) {
            let entry = Self::open(id, engine, load)?;
            self.entries.insert(id.clone(), entry);
        }
        self.get(id)
    }

    fn open<E, F>(id: &SourceId, engine: &mut E, load: F) -> Result<RegisteredDataset, RegistryError>
    where
        E: GeoEngine + ?Sized,
        F: FnOnce() -> Result<(Vec<u8>, RawSource), IngestionError>,
    {
        let (bytes, raw) = load()?;
        let ingestion = raw.ingest(id)?;
        engine.load_dataset(id, &bytes)?;

        let engine_count = engine.feature_count(id)?;
        let ingested = ingestion.dataset.feature_count();
        if engine_count != ingested {
            return Err(RegistryError::FeatureCountMismatch { dataset: id.clone(), engine: engine_count, ingested });
        }
        let centroids = engine.centroids(id)?;

        log::info!(
            "registered `{id}`: {ingested} features, {} dates, {} warnings",
            ingestion.dataset.dates.len(),
            ingestion.warnings.len()
        );
        Ok(RegisteredDataset {
            dataset: Arc::new(ingestion.dataset),
            centroids,
            warnings: ingestion.warnings,
            weights: HashMap::new(),
        })
    }

    /// Weight handle for (`id`, `spec`), created on first request.
    pub fn weight_for<E: GeoEngine + ?Sized>(
        &mut self,
        id: &SourceId,
        spec: &WeightSpec,
        engine: &mut E,
    ) -> Result<WeightId, RegistryError> {
        let entry = self.entries.get_mut(id).ok_or_else(|| RegistryError::NotRegistered(id.clone()))?;
        let key = spec.identity();
        if let Some(w) = entry.weights.get(&key) {
            return Ok(w.clone());
        }
        let w = engine.compute_weights(id, spec)?;
        log::debug!("created {} weights {w} for `{id}`", spec.cache_id());
        entry.weights.insert(key, w.clone());
        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::DashboardConfig;
    use crate::engine::mock::MockEngine;
    use crate::config::EmbeddedLayout;
    use crate::ingest::{BoundaryCollection, EmbeddedSource};

    const BOUNDARY: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"2020-05-01":3,"d2020-05-01":0,"population":1000}},
        {"type":"Feature","properties":{"2020-05-01":7,"d2020-05-01":1,"population":2000}}
    ]}"#;

    fn load() -> Result<(Vec<u8>, RawSource), IngestionError> {
        let id = SourceId::from("state");
        let boundary = BoundaryCollection::from_geojson_slice(BOUNDARY.as_bytes())?;
        let raw = RawSource::detect(&id, boundary, None, &DashboardConfig::default())?;
        Ok((BOUNDARY.as_bytes().to_vec(), raw))
    }

    #[test]
    fn reopening_skips_loader_and_engine() {
        let mut engine = MockEngine::default();
        let mut registry = DatasetRegistry::new();
        let id = SourceId::from("state");
        let loads = Cell::new(0);

        let first = registry
            .get_or_open(&id, &mut engine, || {
                loads.set(loads.get() + 1);
                load()
            })
            .unwrap()
            .dataset
            .clone();
        assert_eq!(first.feature_count(), 2);
        assert_eq!(registry.get(&id).unwrap().centroids.len(), 2);

        let again = registry
            .get_or_open(&id, &mut engine, || {
                loads.set(loads.get() + 1);
                load()
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again.dataset));
        assert_eq!(loads.get(), 1);
        assert_eq!(engine.loads, 1);
    }

    #[test]
    fn feature_count_mismatch_is_an_error() {
        let mut engine = MockEngine::default();
        let mut registry = DatasetRegistry::new();
        let id = SourceId::from("state");
        // Engine sees a single feature, ingestion two.
        let err = registry
            .get_or_open(&id, &mut engine, || {
                let (_, raw) = load()?;
                Ok((br#"{"features":[{}]}"#.to_vec(), raw))
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::FeatureCountMismatch { engine: 1, ingested: 2, .. }));
        assert!(!registry.contains(&id));
    }

    #[test]
    fn loader_failure_registers_nothing() {
        let mut engine = MockEngine::default();
        let mut registry = DatasetRegistry::new();
        let id = SourceId::from("state");
        let err = registry
            .get_or_open(&id, &mut engine, || Err(IngestionError::EmptySource(SourceId::from("state"))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Ingestion(IngestionError::EmptySource(_))));
        assert_eq!(engine.loads, 0);
        assert!(matches!(registry.get(&id), Err(RegistryError::NotRegistered(_))));
    }

    #[test]
    fn failed_ingestion_never_reaches_the_engine() {
        let mut engine = MockEngine::default();
        let mut registry = DatasetRegistry::new();
        let id = SourceId::from("state");
        let err = registry
            .get_or_open(&id, &mut engine, || {
                let empty = EmbeddedSource::new(BoundaryCollection::new(Vec::new()), EmbeddedLayout::default());
                Ok((BOUNDARY.as_bytes().to_vec(), RawSource::Embedded(empty)))
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::Ingestion(IngestionError::EmptySource(_))));
        assert_eq!(engine.loads, 0);

        registry.get_or_open(&id, &mut engine, load).unwrap();
        assert_eq!(engine.loads, 1);
    }

    #[test]
    fn weights_are_created_once_per_spec() {
        let mut engine = MockEngine::default();
        let mut registry = DatasetRegistry::new();
        let id = SourceId::from("state");
        registry.get_or_open(&id, &mut engine, load).unwrap();

        let spec = WeightSpec::default();
        let a = registry.weight_for(&id, &spec, &mut engine).unwrap();
        let b = registry.weight_for(&id, &spec, &mut engine).unwrap();
        assert_eq!(a, b);
        assert_eq!(engine.weight_calls, 1);

        let knn = WeightSpec::Knn { k: 4, power: 1.0, inverse: false, arc_distance: false, miles: false };
        registry.weight_for(&id, &knn, &mut engine).unwrap();
        assert_eq!(engine.weight_calls, 2);
    }

    #[test]
    fn specs_sharing_a_name_get_their_own_weights() {
        let mut engine = MockEngine::default();
        let mut registry = DatasetRegistry::new();
        let id = SourceId::from("state");
        registry.get_or_open(&id, &mut engine, load).unwrap();

        let plain = WeightSpec::Knn { k: 4, power: 1.0, inverse: false, arc_distance: false, miles: false };
        let inverse = WeightSpec::Knn { k: 4, power: 2.0, inverse: true, arc_distance: true, miles: true };
        assert_eq!(plain.cache_id(), inverse.cache_id());

        let a = registry.weight_for(&id, &plain, &mut engine).unwrap();
        let b = registry.weight_for(&id, &inverse, &mut engine).unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.weight_calls, 2);
        assert_eq!(registry.get(&id).unwrap().weight(&inverse), Some(&b));

        let queen = WeightSpec::Queen { order: 1, include_lower_order: false, precision_threshold: 0.0 };
        let snapped = WeightSpec::Queen { order: 1, include_lower_order: false, precision_threshold: 0.001 };
        let q1 = registry.weight_for(&id, &queen, &mut engine).unwrap();
        let q2 = registry.weight_for(&id, &snapped, &mut engine).unwrap();
        assert_ne!(q1, q2);
        assert_eq!(engine.weight_calls, 4);
    }
}
