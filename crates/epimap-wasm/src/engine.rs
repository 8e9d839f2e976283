//! [`GeoEngine`] backed by a JavaScript object.
//!
//! The object is expected to expose `loadDataset`, `featureCount`,
//! `centroids`, `computeWeights`, `localStatistic`, `naturalBreaks` and
//! `cartogramLayout`. Whatever it throws comes back as the diagnostic of an
//! [`EngineError`].

use epimap_core::dataset::SourceId;
use epimap_core::engine::{CartogramLayout, GeoEngine, LocalStatKind, LocalStatResult, WeightId, WeightSpec};
use epimap_core::error::EngineError;
use epimap_core::geometry::Point;
use js_sys::{Array, Float64Array, Function, Reflect, Uint8Array};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use wasm_bindgen::{JsCast, JsValue};

pub struct JsEngine {
    inner: JsValue,
}

/// Shape of a local statistic as returned by JS.
#[derive(Deserialize)]
struct JsLocalStat {
    clusters: Vec<u8>,
    pvalues: Vec<f64>,
}

fn diagnostic(operation: &'static str, e: JsValue) -> EngineError {
    let text = e
        .as_string()
        .or_else(|| e.dyn_ref::<js_sys::Error>().map(|err| String::from(err.message())))
        .unwrap_or_else(|| format!("{e:?}"));
    EngineError::new(operation, text)
}

impl JsEngine {
    pub fn new(inner: JsValue) -> Self {
        Self { inner }
    }

    fn call(&self, operation: &'static str, method: &str, args: &[JsValue]) -> Result<JsValue, EngineError> {
        let f = Reflect::get(&self.inner, &JsValue::from_str(method)).map_err(|e| diagnostic(operation, e))?;
        let f: Function = f
            .dyn_into()
            .map_err(|_| EngineError::new(operation, format!("engine object has no `{method}` function")))?;
        let argv: Array = args.iter().collect();
        f.apply(&self.inner, &argv).map_err(|e| diagnostic(operation, e))
    }

    fn call_as<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: &str,
        args: &[JsValue],
    ) -> Result<T, EngineError> {
        let value = self.call(operation, method, args)?;
        serde_wasm_bindgen::from_value(value).map_err(|e| EngineError::new(operation, e.to_string()))
    }
}

fn values_array(values: &[f64]) -> JsValue {
    Float64Array::from(values).into()
}

fn id_value(id: &SourceId) -> JsValue {
    JsValue::from_str(id.as_str())
}

impl GeoEngine for JsEngine {
    fn load_dataset(&mut self, id: &SourceId, bytes: &[u8]) -> Result<(), EngineError> {
        self.call("load_dataset", "loadDataset", &[id_value(id), Uint8Array::from(bytes).into()])?;
        Ok(())
    }

    fn feature_count(&self, id: &SourceId) -> Result<usize, EngineError> {
        self.call_as("feature_count", "featureCount", &[id_value(id)])
    }

    fn centroids(&self, id: &SourceId) -> Result<Vec<Point>, EngineError> {
        let raw: Vec<[f64; 2]> = self.call_as("centroids", "centroids", &[id_value(id)])?;
        Ok(raw.into_iter().map(|[x, y]| Point::new(x, y)).collect())
    }

    fn compute_weights(&mut self, id: &SourceId, spec: &WeightSpec) -> Result<WeightId, EngineError> {
        let spec = serde_json::to_string(spec).map_err(|e| EngineError::new("compute_weights", e.to_string()))?;
        let handle: String = self.call_as("compute_weights", "computeWeights", &[id_value(id), JsValue::from_str(&spec)])?;
        Ok(WeightId::new(handle))
    }

    fn local_statistic(
        &mut self,
        kind: LocalStatKind,
        id: &SourceId,
        weight: &WeightId,
        values: &[f64],
    ) -> Result<LocalStatResult, EngineError> {
        let kind = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let raw: JsLocalStat = self.call_as(
            "local_statistic",
            "localStatistic",
            &[JsValue::from_str(&kind), id_value(id), JsValue::from_str(weight.as_str()), values_array(values)],
        )?;
        Ok(LocalStatResult { cluster_labels: raw.clusters, p_values: raw.pvalues })
    }

    fn natural_breaks(&mut self, id: &SourceId, k: usize, values: &[f64]) -> Result<Vec<f64>, EngineError> {
        self.call_as("natural_breaks", "naturalBreaks", &[id_value(id), JsValue::from(k as u32), values_array(values)])
    }

    fn cartogram_layout(&mut self, id: &SourceId, values: &[f64]) -> Result<CartogramLayout, EngineError> {
        self.call_as("cartogram_layout", "cartogramLayout", &[id_value(id), values_array(values)])
    }
}
