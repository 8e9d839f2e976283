//! Browser bindings: one `Dashboard` handle per page, driven by JS events.
//!
//! All values cross the boundary as plain JSON-compatible objects. Errors
//! surface as rejected calls carrying the error chain as a string.

mod engine;

use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use epimap_core::dashboard::{Dashboard, MapMethod};
use epimap_core::metrics::MetricKind;
use epimap_core::spatial_cache::snapshot::MemorySnapshotStore;
use epimap_core::{DashboardConfig, SourceId};
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use engine::JsEngine;

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_err(e: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{e:#}"))
}

fn parse_metric(label: &str) -> anyhow::Result<MetricKind> {
    MetricKind::from_label(label).ok_or_else(|| anyhow!("unknown metric `{label}`"))
}

fn parse_method(method: &str) -> anyhow::Result<MapMethod> {
    match method.to_ascii_lowercase().as_str() {
        "choropleth" => Ok(MapMethod::Choropleth),
        "lisa" => Ok(MapMethod::Lisa),
        other => Err(anyhow!("unknown map method `{other}`")),
    }
}

fn parse_date(iso: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(iso, "%Y-%m-%d").with_context(|| format!("invalid date `{iso}`"))
}

fn parse_config(json: &str) -> anyhow::Result<DashboardConfig> {
    if json.trim().is_empty() {
        return Ok(DashboardConfig::default());
    }
    DashboardConfig::from_json_str(json).context("invalid dashboard config")
}

#[wasm_bindgen(js_name = Dashboard)]
pub struct DashboardHandle {
    inner: Dashboard<JsEngine>,
}

impl DashboardHandle {
    /// Ingestion warnings for `id`, rendered as text.
    fn warnings(&self, id: &SourceId) -> Result<JsValue, JsValue> {
        let warnings: Vec<String> = self
            .inner
            .registered(id)
            .map(|r| r.warnings.iter().map(ToString::to_string).collect())
            .unwrap_or_default();
        to_js(&warnings)
    }
}

#[wasm_bindgen(js_class = Dashboard)]
impl DashboardHandle {
    /// `engine` is the JS geospatial engine object; `config_json` may be empty.
    #[wasm_bindgen(constructor)]
    pub fn new(engine: JsValue, config_json: &str) -> Result<DashboardHandle, JsValue> {
        let config = parse_config(config_json).map_err(js_err)?;
        Ok(Self { inner: Dashboard::new(JsEngine::new(engine), config) })
    }

    /// Open a boundary collection joined to confirmed/death CSV tables.
    /// Resolves to the ingestion warnings.
    #[wasm_bindgen(js_name = openRowTableSource)]
    pub fn open_row_table_source(
        &mut self,
        id: &str,
        boundary: Vec<u8>,
        confirmed_csv: &str,
        deaths_csv: &str,
    ) -> Result<JsValue, JsValue> {
        let id = SourceId::from(id);
        self.inner
            .open_row_tables(id.clone(), boundary, confirmed_csv, deaths_csv)
            .with_context(|| format!("opening `{id}`"))
            .map_err(js_err)?;
        self.warnings(&id)
    }

    /// Open a boundary collection carrying dated properties.
    #[wasm_bindgen(js_name = openEmbeddedSource)]
    pub fn open_embedded_source(&mut self, id: &str, boundary: Vec<u8>) -> Result<JsValue, JsValue> {
        let id = SourceId::from(id);
        self.inner
            .open_embedded(id.clone(), boundary)
            .with_context(|| format!("opening `{id}`"))
            .map_err(js_err)?;
        self.warnings(&id)
    }

    #[wasm_bindgen(js_name = selectMetric)]
    pub fn select_metric(&mut self, label: &str) -> Result<(), JsValue> {
        self.inner.select_metric(parse_metric(label).map_err(js_err)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = selectDate)]
    pub fn select_date(&mut self, iso: &str) -> Result<(), JsValue> {
        let date = parse_date(iso).map_err(js_err)?;
        self.inner.select_date(date).map_err(|e| js_err(e.into()))
    }

    #[wasm_bindgen(js_name = setMethod)]
    pub fn set_method(&mut self, method: &str) -> Result<(), JsValue> {
        self.inner.set_method(parse_method(method).map_err(js_err)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = setCartogram)]
    pub fn set_cartogram(&mut self, on: bool) {
        self.inner.set_cartogram(on);
    }

    /// Render the current selection. A rejected call leaves the last frame
    /// in place on the Rust side.
    pub fn render(&mut self) -> Result<JsValue, JsValue> {
        let frame = self.inner.render().map_err(|e| js_err(e.into()))?;
        to_js(frame)
    }

    #[wasm_bindgen(js_name = featureSummary)]
    pub fn feature_summary(&self, feature: u32) -> Result<JsValue, JsValue> {
        let summary = self.inner.feature_summary(feature as usize).map_err(|e| js_err(e.into()))?;
        to_js(&summary)
    }

    /// Daily new confirmed series; `feature` absent means all features.
    pub fn trend(&self, feature: Option<u32>) -> Result<JsValue, JsValue> {
        let points = self.inner.trend(feature.map(|f| f as usize)).map_err(|e| js_err(e.into()))?;
        to_js(&points)
    }

    /// Load a snapshot given as `{ fileName: contents }`.
    #[wasm_bindgen(js_name = hydrateLisa)]
    pub fn hydrate_lisa(&mut self, files: JsValue) -> Result<JsValue, JsValue> {
        let files: BTreeMap<String, String> = serde_wasm_bindgen::from_value(files)?;
        let store = MemorySnapshotStore { files };
        let report = self.inner.hydrate_snapshot(&store).map_err(|e| js_err(e.into()))?;
        to_js(&report)
    }

    /// Snapshot files for the statistics computed this session, as
    /// `{ fileName: contents }`.
    #[wasm_bindgen(js_name = exportLisa)]
    pub fn export_lisa(&mut self) -> Result<JsValue, JsValue> {
        let mut store = MemorySnapshotStore::default();
        self.inner.save_snapshot(&mut store).map_err(|e| js_err(e.into()))?;
        to_js(&store.files)
    }

    pub fn dates(&self) -> Result<JsValue, JsValue> {
        let dates = self.inner.dates().map_err(|e| js_err(e.into()))?;
        to_js(&dates)
    }

    #[wasm_bindgen(js_name = metricLabels)]
    pub fn metric_labels() -> Result<JsValue, JsValue> {
        let labels: Vec<&str> = MetricKind::ALL.iter().map(|k| k.label()).collect();
        to_js(&labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!(parse_method("LISA").unwrap(), MapMethod::Lisa);
        assert_eq!(parse_method("choropleth").unwrap(), MapMethod::Choropleth);
        assert!(parse_method("hexbin").is_err());
    }

    #[test]
    fn metric_labels_resolve() {
        assert_eq!(parse_metric("Death Count/Confirmed Count").unwrap(), MetricKind::CaseFatalityRatio);
        let err = parse_metric("Recovered").unwrap_err();
        assert!(err.to_string().contains("Recovered"));
    }

    #[test]
    fn dates_and_config_parse() {
        assert_eq!(parse_date("2020-05-01").unwrap(), NaiveDate::from_ymd_opt(2020, 5, 1).unwrap());
        assert!(format!("{:#}", parse_date("5/1/2020").unwrap_err()).contains("5/1/2020"));
        assert_eq!(parse_config("").unwrap().classes, 8);
        assert_eq!(parse_config(r#"{"classes": 5}"#).unwrap().classes, 5);
        assert!(parse_config("{").is_err());
    }
}
