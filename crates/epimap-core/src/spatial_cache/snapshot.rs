//! Persisted form of the spatial-statistic cache.
//!
//! One snapshot holds one (dataset, weight) pair:
//!   lisa_dates.json          ["2020-04-01", "2020-04-02", ...]
//!   lisa<YYYY-MM-DD>.json    { "<field>": { "clusters": [..], "pvalues": [..] }, ... }

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::CachedStat;
use crate::error::SnapshotError;
use crate::ingest::dates::parse_property_date;

pub const INDEX_NAME: &str = "lisa_dates.json";

/// Field name → statistic, for one date.
pub type SnapshotRecord = BTreeMap<String, CachedStat>;

pub fn record_name(date: NaiveDate) -> String {
    format!("lisa{}.json", date.format("%Y-%m-%d"))
}

/// Named text blobs. `read` returns `Ok(None)` for a name never written.
pub trait SnapshotStore {
    fn read(&self, name: &str) -> Result<Option<String>, SnapshotError>;
    fn write(&mut self, name: &str, contents: &str) -> Result<(), SnapshotError>;
}

/// Snapshot files in one directory.
#[derive(Debug, Clone)]
pub struct DirSnapshotStore {
    root: PathBuf,
}

impl DirSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SnapshotStore for DirSnapshotStore {
    fn read(&self, name: &str) -> Result<Option<String>, SnapshotError> {
        match fs::read_to_string(self.root.join(name)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, name: &str, contents: &str) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// In-memory store; the browser build hands its contents to JS for download.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    pub files: BTreeMap<String, String>,
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self, name: &str) -> Result<Option<String>, SnapshotError> {
        Ok(self.files.get(name).cloned())
    }

    fn write(&mut self, name: &str, contents: &str) -> Result<(), SnapshotError> {
        self.files.insert(name.to_string(), contents.to_string());
        Ok(())
    }
}

/// Dates listed in the index; unreadable entries are dropped.
pub fn parse_index(text: &str) -> Result<BTreeSet<NaiveDate>, SnapshotError> {
    let raw: Vec<String> = serde_json::from_str(text)?;
    Ok(raw.iter().filter_map(|s| parse_property_date(s)).collect())
}

pub fn render_index(dates: &BTreeSet<NaiveDate>) -> Result<String, SnapshotError> {
    let raw: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
    Ok(serde_json::to_string(&raw)?)
}
