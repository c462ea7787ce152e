//! Ingest pipeline and store seeding

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::cleaning::{clean_zscore, CleaningStats};
use super::csv_io::{read_table, write_cleaned};
use super::normalizer::{normalize, NormalizeReport};
use super::IngestError;
use crate::config::IngestConfig;
use crate::store::{Filter, ObservationStore};
use crate::types::Observation;

/// Result of running a raw file through normalize + clean.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub normalize: NormalizeReport,
    pub cleaning: CleaningStats,
    pub rows: Vec<Observation>,
}

/// Read, normalize and z-score clean a raw instrument export.
pub fn ingest_raw(path: &Path, z_threshold: f64) -> Result<IngestOutcome, IngestError> {
    let raw = read_table(path)?;
    let (table, report) = normalize(&raw);
    let (table, cleaning) = clean_zscore(table, z_threshold);
    Ok(IngestOutcome {
        normalize: report,
        cleaning,
        rows: table.rows,
    })
}

/// Load a previously written cleaned artifact. No cleaning is re-applied.
pub fn load_cleaned(path: &Path) -> Result<Vec<Observation>, IngestError> {
    let raw = read_table(path)?;
    let (table, report) = normalize(&raw);
    if report.dropped_rows > 0 {
        warn!(
            file = %path.display(),
            dropped = report.dropped_rows,
            "Cleaned CSV contained rows without timestamp/latitude/longitude"
        );
    }
    Ok(table.rows)
}

/// Where seeded rows came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedReport {
    /// The store already held data; nothing was loaded.
    AlreadyPopulated { rows: usize },
    Cleaned { path: PathBuf, rows: usize },
    Raw { path: PathBuf, rows: usize },
    /// Neither the cleaned artifact nor the raw file exists.
    NoSource,
}

impl SeedReport {
    pub fn rows(&self) -> usize {
        match self {
            SeedReport::AlreadyPopulated { rows }
            | SeedReport::Cleaned { rows, .. }
            | SeedReport::Raw { rows, .. } => *rows,
            SeedReport::NoSource => 0,
        }
    }
}

type Loaded = Option<(SeedReport, Vec<Observation>)>;

fn from_cleaned(cfg: &IngestConfig) -> Result<Loaded, IngestError> {
    if !cfg.cleaned_path.exists() {
        return Ok(None);
    }
    let rows = load_cleaned(&cfg.cleaned_path)?;
    let report = SeedReport::Cleaned {
        path: cfg.cleaned_path.clone(),
        rows: rows.len(),
    };
    Ok(Some((report, rows)))
}

/// Full pipeline over the raw export, writing the artifact if configured.
fn from_raw(cfg: &IngestConfig) -> Result<Loaded, IngestError> {
    let Some(raw_path) = cfg.raw_path.as_ref().filter(|p| p.exists()) else {
        return Ok(None);
    };

    let outcome = ingest_raw(raw_path, cfg.z_threshold)?;
    if cfg.write_cleaned {
        write_cleaned(&cfg.cleaned_path, &outcome.rows)?;
    }
    let report = SeedReport::Raw {
        path: raw_path.clone(),
        rows: outcome.rows.len(),
    };
    Ok(Some((report, outcome.rows)))
}

/// Populate an empty store. A non-empty store is left untouched.
pub fn seed_if_empty(
    store: &dyn ObservationStore,
    cfg: &IngestConfig,
) -> Result<SeedReport, IngestError> {
    let existing = store.count_documents(&Filter::all())?;
    if existing > 0 {
        info!(rows = existing, "Store already populated, skipping seed");
        return Ok(SeedReport::AlreadyPopulated { rows: existing });
    }

    let loaded = match from_cleaned(cfg)? {
        Some(found) => Some(found),
        None => from_raw(cfg)?,
    };
    let Some((report, rows)) = loaded else {
        warn!(
            cleaned = %cfg.cleaned_path.display(),
            raw = ?cfg.raw_path,
            "No data source found; starting with an empty store"
        );
        return Ok(SeedReport::NoSource);
    };

    if !rows.is_empty() {
        store.insert_many(rows)?;
    }
    info!(?report, "Store seeded");
    Ok(report)
}

/// Rebuild the collection and swap it in atomically.
///
/// The raw export is re-run through normalize + clean so edits to it are
/// picked up; the cleaned artifact is only used when there is no raw file.
pub fn refresh(
    store: &dyn ObservationStore,
    cfg: &IngestConfig,
) -> Result<SeedReport, IngestError> {
    let loaded = match from_raw(cfg)? {
        Some(found) => Some(found),
        None => from_cleaned(cfg)?,
    };
    let Some((report, rows)) = loaded else {
        warn!("Refresh requested but no data source exists; store left unchanged");
        return Ok(SeedReport::NoSource);
    };
    store.replace_all(rows)?;
    info!(?report, "Store refreshed");
    Ok(report)
}
