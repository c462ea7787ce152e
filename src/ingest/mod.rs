//! Ingestion: raw CSV to a populated observation store
//!
//! ## Pipeline
//!
//! ```text
//! raw.csv → csv_io::read_table → normalizer::normalize → cleaning::clean_zscore
//!         → store.insert_many            (and optionally csv_io::write_cleaned)
//! ```
//!
//! On startup the store is seeded from the cleaned artifact when it exists,
//! otherwise from the raw file through the full pipeline.

pub mod cleaning;
pub mod csv_io;
pub mod normalizer;
pub mod pipeline;

pub use cleaning::{clean_zscore, CleaningStats};
pub use normalizer::{normalize, NormalizeReport, ObservationTable, RawTable};
pub use pipeline::{ingest_raw, load_cleaned, refresh, seed_if_empty, IngestOutcome, SeedReport};

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no header row")]
    MissingHeader(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
