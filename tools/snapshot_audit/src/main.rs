//! Audit a local-statistic snapshot directory: which dates are indexed,
//! which records load, and what each record holds.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use epimap_core::classify::palette::LisaCluster;
use epimap_core::ingest::dates::parse_property_date;
use epimap_core::spatial_cache::snapshot::{
    parse_index, record_name, DirSnapshotStore, SnapshotRecord, SnapshotStore, INDEX_NAME,
};
use serde::Serialize;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "snapshot_audit", about = "Check a LISA snapshot directory for missing or malformed records")]
struct Args {
    /// Snapshot directory (one dataset and weight).
    dir: PathBuf,

    /// Expected number of features per entry.
    #[arg(short, long)]
    features: Option<usize>,

    /// p-value below which a cluster counts as significant.
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// Exit with an error if any problem is found.
    #[arg(long)]
    strict: bool,
}

// ── Audit ─────────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug, PartialEq)]
struct FieldAudit {
    field: String,
    features: usize,
    significant: usize,
    high_high: usize,
    low_low: usize,
    /// Label and p-value counts disagree, or differ from `--features`.
    bad_length: bool,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RecordAudit {
    Ok { date: NaiveDate, fields: Vec<FieldAudit> },
    Missing { date: NaiveDate },
    Malformed { date: NaiveDate, error: String },
}

#[derive(Serialize, Debug)]
struct Audit {
    indexed: usize,
    records: Vec<RecordAudit>,
    /// Record files present on disk but absent from the index.
    unlisted: Vec<NaiveDate>,
}

impl Audit {
    fn problems(&self) -> usize {
        let bad_records = self
            .records
            .iter()
            .filter(|r| match r {
                RecordAudit::Ok { fields, .. } => fields.iter().any(|f| f.bad_length),
                _ => true,
            })
            .count();
        bad_records + self.unlisted.len()
    }
}

fn audit_field(field: String, clusters: &[u8], pvalues: &[f64], expected: Option<usize>, alpha: f64) -> FieldAudit {
    let bad_length = clusters.len() != pvalues.len() || expected.is_some_and(|n| n != clusters.len());
    let count = |c: LisaCluster| clusters.iter().filter(|&&code| LisaCluster::from_code(code) == c).count();
    FieldAudit {
        field,
        features: clusters.len(),
        significant: pvalues.iter().filter(|&&p| p < alpha).count(),
        high_high: count(LisaCluster::HighHigh),
        low_low: count(LisaCluster::LowLow),
        bad_length,
    }
}

fn audit_record(store: &dyn SnapshotStore, date: NaiveDate, expected: Option<usize>, alpha: f64) -> Result<RecordAudit> {
    let Some(text) = store.read(&record_name(date))? else {
        return Ok(RecordAudit::Missing { date });
    };
    let record: SnapshotRecord = match serde_json::from_str(&text) {
        Ok(r) => r,
        Err(e) => return Ok(RecordAudit::Malformed { date, error: e.to_string() }),
    };
    let fields = record
        .into_iter()
        .map(|(field, stat)| audit_field(field, &stat.cluster_labels, &stat.p_values, expected, alpha))
        .collect();
    Ok(RecordAudit::Ok { date, fields })
}

/// Dates of `lisa<YYYY-MM-DD>.json` files in `dir`.
fn record_dates_on_disk(dir: &Path) -> Result<BTreeSet<NaiveDate>> {
    let mut dates = BTreeSet::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(date) = name.strip_prefix("lisa").and_then(|s| s.strip_suffix(".json")).and_then(parse_property_date) {
            dates.insert(date);
        }
    }
    Ok(dates)
}

fn audit(dir: &Path, expected: Option<usize>, alpha: f64) -> Result<Audit> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let store = DirSnapshotStore::new(dir);
    let indexed: BTreeSet<NaiveDate> = match store.read(INDEX_NAME)? {
        Some(text) => parse_index(&text).with_context(|| format!("parsing {INDEX_NAME}"))?,
        None => {
            log::warn!("{} has no {INDEX_NAME}", dir.display());
            BTreeSet::new()
        }
    };

    let records = indexed
        .iter()
        .map(|&date| audit_record(&store, date, expected, alpha))
        .collect::<Result<Vec<_>>>()?;
    let unlisted = record_dates_on_disk(dir)?.difference(&indexed).copied().collect();

    Ok(Audit { indexed: indexed.len(), records, unlisted })
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let report = audit(&args.dir, args.features, args.alpha)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let problems = report.problems();
    if problems > 0 {
        log::warn!("{problems} problem(s) in {}", args.dir.display());
        if args.strict {
            bail!("snapshot audit failed");
        }
    } else {
        log::info!("{} records OK", report.records.len());
    }
    Ok(())
}
