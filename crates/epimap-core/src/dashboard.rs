//! Interactive session: owns every store and turns the current selection
//! into a renderable frame.
//!
//! Stages run in order on each `render`:
//!   1. Resolve the selection against the registered dataset
//!   2. Derive the selected metric on the selected date
//!   3. Classify (choropleth) or fetch the cached local statistic (LISA)
//!   4. Optionally project a cartogram
//!
//! The frame is swapped only once every stage succeeded.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cartogram::{project_layout, CartogramNode};
use crate::classify::palette::{bin_color, LisaCluster, Rgba, BLANK};
use crate::classify::{classify, BreakTable, BreaksMode, ClassificationResult};
use crate::config::DashboardConfig;
use crate::dataset::{Dataset, SourceId};
use crate::engine::{sanitize_values, GeoEngine, WeightId};
use crate::error::{DashboardError, EngineError, IngestionError, MetricError};
use crate::ingest::{BoundaryCollection, RawSource, RowTable};
use crate::metrics::summary::LisaNote;
use crate::metrics::{daily_new_series, derive, FeatureSummary, MetricKind, TrendPoint};
use crate::registry::{DatasetRegistry, RegisteredDataset};
use crate::spatial_cache::snapshot::SnapshotStore;
use crate::spatial_cache::{CacheKey, CachedStat, HydrateReport, SpatialStatCache};

// ── Selection ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMethod {
    #[default]
    Choropleth,
    Lisa,
}

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub source: Option<SourceId>,
    pub metric: MetricKind,
    pub date: Option<NaiveDate>,
    pub method: MapMethod,
    pub breaks: BreaksMode,
    pub cartogram: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            source: None,
            metric: MetricKind::RawConfirmed,
            date: None,
            method: MapMethod::Choropleth,
            breaks: BreaksMode::NaturalBreaks,
            cartogram: false,
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Layer {
    Choropleth { classification: ClassificationResult, colors: Vec<Rgba> },
    Lisa { stat: Arc<CachedStat>, colors: Vec<Rgba> },
}

impl Layer {
    /// Fill per feature id.
    pub fn colors(&self) -> &[Rgba] {
        match self {
            Layer::Choropleth { colors, .. } | Layer::Lisa { colors, .. } => colors,
        }
    }
}

/// Everything needed to draw one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub source: SourceId,
    pub metric: MetricKind,
    pub date: NaiveDate,
    pub values: Vec<f64>,
    pub layer: Layer,
    pub cartogram: Option<Vec<CartogramNode>>,
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Dashboard<E: GeoEngine> {
    engine: E,
    config: DashboardConfig,
    registry: DatasetRegistry,
    cache: SpatialStatCache,
    breaks: BreakTable,
    selection: Selection,
    frame: Option<Frame>,
}

impl<E: GeoEngine> Dashboard<E> {
    pub fn new(engine: E, config: DashboardConfig) -> Self {
        Self {
            engine,
            config,
            registry: DatasetRegistry::new(),
            cache: SpatialStatCache::new(),
            breaks: BreakTable::default(),
            selection: Selection::default(),
            frame: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The last successfully rendered frame.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn cache(&self) -> &SpatialStatCache {
        &self.cache
    }

    pub fn breaks_mut(&mut self) -> &mut BreakTable {
        &mut self.breaks
    }

    pub fn registered(&self, id: &SourceId) -> Option<&RegisteredDataset> {
        self.registry.get(id).ok()
    }

    fn current(&self) -> Result<(SourceId, Arc<Dataset>), DashboardError> {
        let source = self.selection.source.clone().ok_or(DashboardError::NoSource)?;
        let dataset = Arc::clone(&self.registry.get(&source)?.dataset);
        Ok((source, dataset))
    }

    fn current_date(&self, source: &SourceId) -> Result<NaiveDate, DashboardError> {
        self.selection.date.ok_or_else(|| DashboardError::NoDates(source.clone()))
    }

    // ── Opening sources ─────────────────────────────────────────────────────

    /// Register `id` (if new) and make it the current source. A selected date
    /// missing from the new axis is replaced with the latest date.
    pub fn open_source<F>(&mut self, id: SourceId, load: F) -> Result<Arc<Dataset>, DashboardError>
    where
        F: FnOnce() -> Result<(Vec<u8>, RawSource), IngestionError>,
    {
        let dataset = Arc::clone(&self.registry.get_or_open(&id, &mut self.engine, load)?.dataset);
        let latest = dataset.latest_date().ok_or_else(|| DashboardError::NoDates(id.clone()))?;
        let keep = self.selection.date.is_some_and(|d| dataset.date_index(d).is_some());
        if !keep {
            self.selection.date = Some(latest);
        }
        self.selection.source = Some(id);
        Ok(dataset)
    }

    /// Open a boundary collection whose features carry their own counts.
    pub fn open_embedded(&mut self, id: SourceId, boundary: Vec<u8>) -> Result<Arc<Dataset>, DashboardError> {
        let config = self.config.clone();
        let sid = id.clone();
        self.open_source(id, move || {
            let collection = BoundaryCollection::from_geojson_slice(&boundary)?;
            let raw = RawSource::detect(&sid, collection, None, &config)?;
            Ok((boundary, raw))
        })
    }

    /// Open a boundary collection joined to confirmed and death CSV tables.
    pub fn open_row_tables(
        &mut self,
        id: SourceId,
        boundary: Vec<u8>,
        confirmed_csv: &str,
        deaths_csv: &str,
    ) -> Result<Arc<Dataset>, DashboardError> {
        let config = self.config.clone();
        let sid = id.clone();
        self.open_source(id, move || {
            let collection = BoundaryCollection::from_geojson_slice(&boundary)?;
            let tables = (RowTable::from_csv_str(confirmed_csv)?, RowTable::from_csv_str(deaths_csv)?);
            let raw = RawSource::detect(&sid, collection, Some(tables), &config)?;
            Ok((boundary, raw))
        })
    }

    // ── Selection changes ───────────────────────────────────────────────────

    pub fn select_metric(&mut self, metric: MetricKind) {
        self.selection.metric = metric;
    }

    /// Rejects dates not on the current source's axis.
    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), DashboardError> {
        let (source, dataset) = self.current()?;
        if dataset.date_index(date).is_none() {
            return Err(MetricError::UnknownDate { dataset: source, date }.into());
        }
        self.selection.date = Some(date);
        Ok(())
    }

    pub fn set_method(&mut self, method: MapMethod) {
        self.selection.method = method;
    }

    pub fn set_breaks_mode(&mut self, mode: BreaksMode) {
        self.selection.breaks = mode;
    }

    pub fn set_cartogram(&mut self, on: bool) {
        self.selection.cartogram = on;
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    /// Build a frame for the current selection. On failure the previous
    /// frame stays in place and the error is returned.
    pub fn render(&mut self) -> Result<&Frame, DashboardError> {
        match self.build_frame() {
            Ok(frame) => Ok(self.frame.insert(frame)),
            Err(e) => {
                log::warn!("render failed, keeping previous frame: {e}");
                Err(e)
            }
        }
    }

    fn build_frame(&mut self) -> Result<Frame, DashboardError> {
        let (source, dataset) = self.current()?;
        let date = self.current_date(&source)?;
        let metric = self.selection.metric;
        let values = derive(&dataset, metric, date)?;

        let layer = match self.selection.method {
            MapMethod::Choropleth => {
                let classification = classify(
                    &mut self.engine,
                    &source,
                    &self.breaks,
                    &values,
                    self.config.classes,
                    &self.selection.breaks,
                )?;
                if self.selection.breaks == BreaksMode::NaturalBreaks {
                    self.breaks.record(&source, metric.label(), classification.breaks.clone());
                }
                let colors = classification.assignment.iter().map(|b| b.map_or(BLANK, bin_color)).collect();
                Layer::Choropleth { classification, colors }
            }
            MapMethod::Lisa => {
                let stat = self.local_stat(&source, &dataset, date, metric, &values)?;
                let colors = stat.cluster_labels.iter().map(|&c| LisaCluster::from_code(c).color()).collect();
                Layer::Lisa { stat, colors }
            }
        };

        let cartogram = if self.selection.cartogram {
            let layout = self.engine.cartogram_layout(&source, &sanitize_values(&values))?;
            Some(project_layout(&layout)?)
        } else {
            None
        };

        Ok(Frame { source, metric, date, values, layer, cartogram })
    }

    fn weight(&mut self, source: &SourceId) -> Result<WeightId, DashboardError> {
        Ok(self.registry.weight_for(source, &self.config.weights, &mut self.engine)?)
    }

    /// Local statistic for (source, weight, date, metric), computed at most
    /// once per session.
    fn local_stat(
        &mut self,
        source: &SourceId,
        dataset: &Dataset,
        date: NaiveDate,
        metric: MetricKind,
        values: &[f64],
    ) -> Result<Arc<CachedStat>, DashboardError> {
        let weight = self.weight(source)?;
        let key = CacheKey::new(source.clone(), weight.clone(), date, metric.label());
        let kind = self.config.local_stat;
        let n = dataset.feature_count();
        let engine = &mut self.engine;
        let stat = self.cache.get_or_compute(key, || {
            let result = engine.local_statistic(kind, source, &weight, &sanitize_values(values))?;
            if result.cluster_labels.len() != n || result.p_values.len() != n {
                return Err(EngineError::new(
                    "local_statistic",
                    format!(
                        "returned {} labels and {} p-values for {n} features",
                        result.cluster_labels.len(),
                        result.p_values.len()
                    ),
                ));
            }
            Ok(CachedStat::from(result))
        })?;
        Ok(stat)
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    /// Hover card for `feature` on the selected date. Carries the local
    /// statistic only when it is already cached; this never computes one.
    pub fn feature_summary(&self, feature: usize) -> Result<FeatureSummary, DashboardError> {
        let (source, dataset) = self.current()?;
        let date = self.current_date(&source)?;
        let mut summary = FeatureSummary::at(&dataset, feature, date)?;
        let weight = self.registry.get(&source)?.weight(&self.config.weights).cloned();
        if let Some(weight) = weight {
            let key = CacheKey::new(source, weight, date, self.selection.metric.label());
            summary.lisa = self.cache.get(&key).and_then(|stat| {
                Some(LisaNote {
                    cluster: LisaCluster::from_code(*stat.cluster_labels.get(feature)?),
                    p_value: *stat.p_values.get(feature)?,
                })
            });
        }
        Ok(summary)
    }

    /// Daily new confirmed cases for one feature (or all), zero after the
    /// selected date.
    pub fn trend(&self, feature: Option<usize>) -> Result<Vec<TrendPoint>, DashboardError> {
        let (source, dataset) = self.current()?;
        let date = self.current_date(&source)?;
        Ok(daily_new_series(&dataset, feature, Some(date))?)
    }

    /// Dates of the current source.
    pub fn dates(&self) -> Result<Vec<NaiveDate>, DashboardError> {
        Ok(self.current()?.1.dates.clone())
    }

    // ── Snapshots ───────────────────────────────────────────────────────────

    /// Load persisted local statistics for the current source and weights.
    pub fn hydrate_snapshot(&mut self, store: &dyn SnapshotStore) -> Result<HydrateReport, DashboardError> {
        let (source, dataset) = self.current()?;
        let weight = self.weight(&source)?;
        Ok(self.cache.hydrate(store, &source, &weight, Some(dataset.feature_count())))
    }

    /// Persist the local statistics computed this session for the current
    /// source and weights. Returns the number of records written.
    pub fn save_snapshot(&mut self, store: &mut dyn SnapshotStore) -> Result<usize, DashboardError> {
        let (source, _) = self.current()?;
        let weight = self.weight(&source)?;
        Ok(self.cache.flush(store, &source, &weight)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::error::ClassificationError;
    use crate::spatial_cache::snapshot::MemorySnapshotStore;

    fn ymd(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    const STATES: &str = r#"{"type":"FeatureCollection","features":[
        {"properties":{"NAME":"A","population":10000,"2020-05-01":0,"2020-05-02":4,"d2020-05-01":0,"d2020-05-02":1}},
        {"properties":{"NAME":"B","population":20000,"2020-05-01":10,"2020-05-02":30,"d2020-05-01":1,"d2020-05-02":2}},
        {"properties":{"NAME":"C","population":5000,"2020-05-01":50,"2020-05-02":90,"d2020-05-01":5,"d2020-05-02":0}}
    ]}"#;

    const LATER: &str = r#"{"type":"FeatureCollection","features":[
        {"properties":{"2020-05-02":1,"2020-05-03":2}},
        {"properties":{"2020-05-02":3,"2020-05-03":5}}
    ]}"#;

    fn session() -> Dashboard<MockEngine> {
        let mut dash = Dashboard::new(MockEngine::default(), DashboardConfig { classes: 3, ..Default::default() });
        dash.open_embedded(SourceId::from("state"), STATES.as_bytes().to_vec()).unwrap();
        dash
    }

    #[test]
    fn opening_selects_latest_date() {
        let dash = session();
        assert_eq!(dash.selection().date, Some(ymd(5, 2)));
        assert_eq!(dash.dates().unwrap(), vec![ymd(5, 1), ymd(5, 2)]);
    }

    #[test]
    fn switching_source_keeps_date_only_when_present() {
        let mut dash = session();
        dash.open_embedded(SourceId::from("later"), LATER.as_bytes().to_vec()).unwrap();
        assert_eq!(dash.selection().date, Some(ymd(5, 2)), "5/2 exists on both axes");

        dash.open_embedded(SourceId::from("state"), STATES.as_bytes().to_vec()).unwrap();
        dash.select_date(ymd(5, 1)).unwrap();
        dash.open_embedded(SourceId::from("later"), LATER.as_bytes().to_vec()).unwrap();
        assert_eq!(dash.selection().date, Some(ymd(5, 3)));
        assert_eq!(dash.engine().loads, 2, "re-opening must not reload");
    }

    #[test]
    fn choropleth_frame_blanks_zero_values() {
        let mut dash = session();
        dash.select_date(ymd(5, 1)).unwrap();
        let frame = dash.render().unwrap();
        assert_eq!(frame.values, vec![0.0, 10.0, 50.0]);
        let Layer::Choropleth { classification, colors } = &frame.layer else {
            panic!("expected choropleth layer");
        };
        assert_eq!(classification.bin_of(0), Some(0));
        assert_eq!(colors[0], BLANK);
        assert_ne!(colors[2], BLANK);
        assert!(frame.cartogram.is_none());
    }

    #[test]
    fn recorded_breaks_can_be_reused() {
        let mut dash = session();
        dash.render().unwrap();
        dash.set_breaks_mode(BreaksMode::ExplicitField("Confirmed Count".into()));
        dash.render().unwrap();
        assert_eq!(dash.engine().breaks_calls, 1);

        dash.set_breaks_mode(BreaksMode::ExplicitField("Death Count".into()));
        let err = dash.render().unwrap_err();
        assert!(matches!(err, DashboardError::Classification(ClassificationError::UnknownField(_))));
    }

    #[test]
    fn recorded_breaks_stay_with_their_source() {
        let mut dash = session();
        dash.render().unwrap();
        dash.open_embedded(SourceId::from("later"), LATER.as_bytes().to_vec()).unwrap();
        dash.set_breaks_mode(BreaksMode::ExplicitField("Confirmed Count".into()));
        let err = dash.render().unwrap_err();
        assert!(matches!(err, DashboardError::Classification(ClassificationError::UnknownField(_))));

        dash.set_breaks_mode(BreaksMode::NaturalBreaks);
        dash.render().unwrap();
        dash.set_breaks_mode(BreaksMode::ExplicitField("Confirmed Count".into()));
        let frame = dash.render().unwrap();
        assert_eq!(frame.source, SourceId::from("later"));
        assert_eq!(dash.engine().breaks_calls, 2);
    }

    #[test]
    fn revisiting_a_view_never_recomputes_the_local_statistic() {
        let mut dash = session();
        dash.set_method(MapMethod::Lisa);
        dash.render().unwrap();
        dash.select_metric(MetricKind::RawDeaths);
        dash.render().unwrap();
        dash.select_date(ymd(5, 1)).unwrap();
        dash.render().unwrap();
        assert_eq!(dash.engine().local_stat_calls, 3);

        dash.select_date(ymd(5, 2)).unwrap();
        dash.select_metric(MetricKind::RawConfirmed);
        dash.set_method(MapMethod::Choropleth);
        dash.render().unwrap();
        dash.set_method(MapMethod::Lisa);
        let frame = dash.render().unwrap();
        assert!(matches!(frame.layer, Layer::Lisa { .. }));
        assert_eq!(dash.engine().local_stat_calls, 3);
        assert_eq!(dash.engine().weight_calls, 1);
    }

    #[test]
    fn failed_render_keeps_previous_frame() {
        let mut dash = session();
        dash.render().unwrap();
        dash.engine_mut().fail_breaks = true;
        dash.select_metric(MetricKind::RawDeaths);
        assert!(matches!(dash.render(), Err(DashboardError::Classification(ClassificationError::Engine(_)))));
        let frame = dash.frame().unwrap();
        assert_eq!(frame.metric, MetricKind::RawConfirmed);
    }

    #[test]
    fn render_without_source_fails() {
        let mut dash = Dashboard::new(MockEngine::default(), DashboardConfig::default());
        assert!(matches!(dash.render(), Err(DashboardError::NoSource)));
        assert!(dash.frame().is_none());
    }

    #[test]
    fn unknown_date_is_rejected_without_changing_selection() {
        let mut dash = session();
        assert!(matches!(dash.select_date(ymd(6, 1)), Err(DashboardError::Metric(MetricError::UnknownDate { .. }))));
        assert_eq!(dash.selection().date, Some(ymd(5, 2)));
    }

    #[test]
    fn cartogram_nodes_fit_render_space() {
        let mut dash = session();
        dash.set_cartogram(true);
        let frame = dash.render().unwrap();
        let nodes = frame.cartogram.as_ref().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].position.x, 0.0);
        assert_eq!(nodes[2].position.x, 100.0);
        assert!(nodes.iter().all(|n| (0.0..=45.0).contains(&n.position.y)));
    }

    #[test]
    fn summary_carries_cached_cluster_only() {
        let mut dash = session();
        assert!(dash.feature_summary(2).unwrap().lisa.is_none());
        dash.set_method(MapMethod::Lisa);
        dash.render().unwrap();
        let s = dash.feature_summary(2).unwrap();
        assert_eq!(s.name.as_deref(), Some("C"));
        let note = s.lisa.unwrap();
        assert_eq!(note.cluster, LisaCluster::HighHigh);
        assert_eq!(note.p_value, 0.01);
    }

    #[test]
    fn trend_stops_at_selected_date() {
        let mut dash = session();
        dash.select_date(ymd(5, 1)).unwrap();
        let t = dash.trend(None).unwrap();
        assert_eq!(t.iter().map(|p| p.value).collect::<Vec<_>>(), vec![60.0, 0.0]);
    }

    #[test]
    fn snapshot_carries_statistics_across_sessions() {
        let mut store = MemorySnapshotStore::default();
        {
            let mut dash = session();
            dash.set_method(MapMethod::Lisa);
            dash.render().unwrap();
            assert_eq!(dash.save_snapshot(&mut store).unwrap(), 1);
        }

        let mut dash = session();
        let report = dash.hydrate_snapshot(&store).unwrap();
        assert_eq!(report.entries, 1);
        dash.set_method(MapMethod::Lisa);
        dash.render().unwrap();
        assert_eq!(dash.engine().local_stat_calls, 0);
    }
}
