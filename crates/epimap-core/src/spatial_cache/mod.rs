//! Write-once memo of permutation-based local statistics.
//!
//! A key is (dataset, weight, date, field). Whatever interaction produced a
//! request (metric switch, date slider, source switch), the same key returns
//! the same `Arc` and the compute closure runs at most once per key for the
//! life of the cache.

pub mod snapshot;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dataset::SourceId;
use crate::engine::{LocalStatResult, WeightId};
use crate::error::SnapshotError;
use snapshot::{parse_index, record_name, render_index, SnapshotRecord, SnapshotStore, INDEX_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub dataset: SourceId,
    pub weight: WeightId,
    pub date: NaiveDate,
    pub field: String,
}

impl CacheKey {
    pub fn new(dataset: SourceId, weight: WeightId, date: NaiveDate, field: impl Into<String>) -> Self {
        Self { dataset, weight, date, field: field.into() }
    }
}

/// Per-feature cluster code and pseudo p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStat {
    #[serde(rename = "clusters")]
    pub cluster_labels: Vec<u8>,
    #[serde(rename = "pvalues")]
    pub p_values: Vec<f64>,
}

impl CachedStat {
    pub fn len(&self) -> usize {
        self.cluster_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cluster_labels.is_empty()
    }
}

impl From<LocalStatResult> for CachedStat {
    fn from(r: LocalStatResult) -> Self {
        Self { cluster_labels: r.cluster_labels, p_values: r.p_values }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HydrateReport {
    pub records: usize,
    pub entries: usize,
    /// Records or entries that were missing, unreadable or the wrong length.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct SpatialStatCache {
    entries: HashMap<CacheKey, Arc<CachedStat>>,
    /// Keys computed in this session (as opposed to hydrated).
    computed: BTreeSet<CacheKey>,
}

impl SpatialStatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedStat>> {
        self.entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached value for `key`, or the result of `compute` stored under it.
    /// A failed compute stores nothing, so a later call may retry.
    pub fn get_or_compute<F, E>(&mut self, key: CacheKey, compute: F) -> Result<Arc<CachedStat>, E>
    where
        F: FnOnce() -> Result<CachedStat, E>,
    {
        if let Some(hit) = self.entries.get(&key) {
            log::debug!("spatial stat cache hit: {} {} {} {}", key.dataset, key.weight, key.date, key.field);
            return Ok(Arc::clone(hit));
        }
        log::debug!("spatial stat cache miss: {} {} {} {}", key.dataset, key.weight, key.date, key.field);
        let stat = Arc::new(compute()?);
        self.computed.insert(key.clone());
        self.entries.insert(key, Arc::clone(&stat));
        Ok(stat)
    }

    /// Insert a persisted value unless the key is already known.
    fn insert_loaded(&mut self, key: CacheKey, stat: CachedStat) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, Arc::new(stat));
        true
    }

    /// Best-effort load of every record listed in the store's index. Missing
    /// or malformed records are misses, never errors.
    pub fn hydrate(
        &mut self,
        store: &dyn SnapshotStore,
        dataset: &SourceId,
        weight: &WeightId,
        expected_len: Option<usize>,
    ) -> HydrateReport {
        let mut report = HydrateReport::default();
        let dates = match store.read(INDEX_NAME).map(|t| t.map(|t| parse_index(&t))) {
            Ok(Some(Ok(dates))) => dates,
            Ok(None) => return report,
            Ok(Some(Err(e))) | Err(e) => {
                log::warn!("snapshot index for `{dataset}` unreadable, starting cold: {e}");
                return report;
            }
        };

        for date in dates {
            let record: SnapshotRecord = match store.read(&record_name(date)) {
                Ok(Some(text)) => match serde_json::from_str(&text) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("snapshot record {date} for `{dataset}` malformed, skipped: {e}");
                        report.skipped += 1;
                        continue;
                    }
                },
                Ok(None) => {
                    log::warn!("snapshot record {date} for `{dataset}` listed but missing");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log::warn!("snapshot record {date} for `{dataset}` unreadable, skipped: {e}");
                    report.skipped += 1;
                    continue;
                }
            };
            report.records += 1;
            for (field, stat) in record {
                let consistent = stat.cluster_labels.len() == stat.p_values.len()
                    && expected_len.map_or(true, |n| n == stat.len());
                if !consistent {
                    log::warn!("snapshot entry {date}/{field} for `{dataset}` has the wrong length, skipped");
                    report.skipped += 1;
                    continue;
                }
                let key = CacheKey::new(dataset.clone(), weight.clone(), date, field);
                if self.insert_loaded(key, stat) {
                    report.entries += 1;
                }
            }
        }
        log::info!(
            "hydrated `{dataset}`/{weight}: {} records, {} entries, {} skipped",
            report.records,
            report.entries,
            report.skipped
        );
        report
    }

    /// Write a record for every date that gained an entry this session, then
    /// extend the index. Fields already stored for a date are kept unless this
    /// cache holds the same field. Returns the number of records written.
    pub fn flush(
        &self,
        store: &mut dyn SnapshotStore,
        dataset: &SourceId,
        weight: &WeightId,
    ) -> Result<usize, SnapshotError> {
        let dirty: BTreeSet<NaiveDate> = self
            .computed
            .iter()
            .filter(|k| &k.dataset == dataset && &k.weight == weight)
            .map(|k| k.date)
            .collect();
        if dirty.is_empty() {
            return Ok(0);
        }

        let mut records: BTreeMap<NaiveDate, SnapshotRecord> =
            dirty.iter().map(|&date| (date, existing_record(&*store, dataset, date))).collect();
        for (key, stat) in &self.entries {
            if &key.dataset == dataset && &key.weight == weight && dirty.contains(&key.date) {
                records.entry(key.date).or_default().insert(key.field.clone(), (**stat).clone());
            }
        }
        for (date, record) in &records {
            store.write(&record_name(*date), &serde_json::to_string(record)?)?;
        }

        let mut index = match store.read(INDEX_NAME)? {
            Some(text) => parse_index(&text).unwrap_or_else(|e| {
                log::warn!("existing snapshot index unreadable, rewriting: {e}");
                BTreeSet::new()
            }),
            None => BTreeSet::new(),
        };
        index.extend(dirty.iter().copied());
        store.write(INDEX_NAME, &render_index(&index)?)?;

        log::info!("flushed {} snapshot records for `{dataset}`/{weight}", records.len());
        Ok(records.len())
    }
}

/// Stored record for `date`, or an empty one when it is absent or unreadable.
fn existing_record(store: &dyn SnapshotStore, dataset: &SourceId, date: NaiveDate) -> SnapshotRecord {
    match store.read(&record_name(date)) {
        Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!("snapshot record {date} for `{dataset}` malformed, overwriting: {e}");
            SnapshotRecord::new()
        }),
        Ok(None) => SnapshotRecord::new(),
        Err(e) => {
            log::warn!("snapshot record {date} for `{dataset}` unreadable, overwriting: {e}");
            SnapshotRecord::new()
        }
    }
}
