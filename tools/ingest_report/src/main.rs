//! Ingest one raw source and report what the dashboard would see: axis,
//! per-date totals and every data-quality repair.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use epimap_core::dataset::{Dataset, SourceId};
use epimap_core::ingest::{BoundaryCollection, DataQualityWarning, Ingestion, RawSource, RowTable, SourceIngestor};
use epimap_core::DashboardConfig;
use serde::Serialize;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ingest_report", about = "Normalize a case/death source and report data-quality warnings")]
struct Args {
    /// Boundary GeoJSON FeatureCollection.
    #[arg(short, long)]
    boundary: PathBuf,

    /// Confirmed-count CSV (row-table layout). Requires --deaths.
    #[arg(short, long, requires = "deaths")]
    confirmed: Option<PathBuf>,

    /// Death-count CSV (row-table layout). Requires --confirmed.
    #[arg(short, long, requires = "confirmed")]
    deaths: Option<PathBuf>,

    /// Source id; defaults to the boundary file name.
    #[arg(long)]
    id: Option<String>,

    /// Dashboard config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DateTotal {
    date: NaiveDate,
    confirmed: f64,
    deaths: f64,
}

#[derive(Serialize)]
struct Report {
    source: SourceId,
    layout: &'static str,
    features: usize,
    dates: usize,
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
    /// Features with no population covariate.
    missing_population: usize,
    warning_counts: BTreeMap<&'static str, usize>,
    warnings: Vec<DataQualityWarning>,
    totals: Vec<DateTotal>,
}

fn totals(ds: &Dataset) -> Vec<DateTotal> {
    ds.dates
        .iter()
        .enumerate()
        .map(|(d, &date)| DateTotal {
            date,
            confirmed: ds.confirmed.row(d).iter().sum(),
            deaths: ds.deaths.row(d).iter().sum(),
        })
        .collect()
}

fn build_report(layout: &'static str, ingestion: Ingestion) -> Report {
    let Ingestion { dataset, warnings } = ingestion;
    let mut warning_counts = BTreeMap::new();
    for w in &warnings {
        *warning_counts.entry(w.kind()).or_insert(0) += 1;
    }
    Report {
        source: dataset.id.clone(),
        layout,
        features: dataset.feature_count(),
        dates: dataset.dates.len(),
        first_date: dataset.dates.first().copied(),
        last_date: dataset.latest_date(),
        missing_population: dataset.population.iter().filter(|p| p.is_none()).count(),
        warning_counts,
        totals: totals(&dataset),
        warnings,
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn read_table(path: &Path) -> Result<RowTable> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    RowTable::from_csv_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn run(args: &Args) -> Result<Report> {
    let config = match &args.config {
        Some(p) => DashboardConfig::from_path(p).with_context(|| format!("loading config {}", p.display()))?,
        None => DashboardConfig::default(),
    };
    let id = match &args.id {
        Some(id) => SourceId::from(id.as_str()),
        None => match args.boundary.file_name().and_then(|n| n.to_str()) {
            Some(name) => SourceId::from(name),
            None => bail!("cannot derive a source id from {}; pass --id", args.boundary.display()),
        },
    };

    let bytes = fs::read(&args.boundary).with_context(|| format!("reading {}", args.boundary.display()))?;
    let boundary = BoundaryCollection::from_geojson_slice(&bytes)?;
    let tables = match (&args.confirmed, &args.deaths) {
        (Some(c), Some(d)) => Some((read_table(c)?, read_table(d)?)),
        _ => None,
    };

    let raw = RawSource::detect(&id, boundary, tables, &config)?;
    let layout = match raw {
        RawSource::RowTable(_) => "row_table",
        RawSource::Embedded(_) => "embedded",
    };
    let ingestion = raw.ingest(&id).with_context(|| format!("ingesting `{id}`"))?;
    Ok(build_report(layout, ingestion))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let report = run(&args)?;
    log::info!(
        "`{}`: {} features, {} dates, {} warnings",
        report.source,
        report.features,
        report.dates,
        report.warnings.len()
    );
    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
