//! CSV reading and the cleaned artifact writer

use csv::{ReaderBuilder, Trim, Writer};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use super::normalizer::RawTable;
use super::IngestError;
use crate::types::{Observation, CSV_TIMESTAMP_FORMAT};

/// One row of the cleaned artifact. Field order is the canonical column order;
/// `None` serializes as an empty cell.
#[derive(Serialize)]
struct CleanedRow {
    timestamp: String,
    latitude: f64,
    longitude: f64,
    temperature_c: Option<f64>,
    salinity_ppt: Option<f64>,
    odo_mg_l: Option<f64>,
}

impl From<&Observation> for CleanedRow {
    fn from(o: &Observation) -> Self {
        Self {
            timestamp: o.timestamp.format(CSV_TIMESTAMP_FORMAT).to_string(),
            latitude: o.latitude,
            longitude: o.longitude,
            temperature_c: o.temperature_c,
            salinity_ppt: o.salinity_ppt,
            odo_mg_l: o.odo_mg_l,
        }
    }
}

/// Read a CSV file into a [`RawTable`].
pub fn read_table(path: &Path) -> Result<RawTable, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_table_from(file, path)
}

/// Read CSV from any reader. `origin` only labels errors.
///
/// Ragged rows are accepted; blank lines are skipped.
pub fn read_table_from<R: Read>(reader: R, origin: &Path) -> Result<RawTable, IngestError> {
    let csv_err = |source| IngestError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers().map_err(csv_err)?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::MissingHeader(origin.display().to_string()));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    info!(file = %origin.display(), columns = headers.len(), rows = rows.len(), "Read CSV");
    Ok(RawTable { headers, rows })
}

/// Write the cleaned artifact, creating parent directories as needed.
pub fn write_cleaned(path: &Path, rows: &[Observation]) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| IngestError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_cleaned_to(file, rows, path)?;
    info!(file = %path.display(), rows = rows.len(), "Cleaned CSV written");
    Ok(())
}

/// Write cleaned rows to any writer with the canonical header.
pub fn write_cleaned_to<W: Write>(
    writer: W,
    rows: &[Observation],
    origin: &Path,
) -> Result<(), IngestError> {
    let csv_err = |source| IngestError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut wtr = Writer::from_writer(writer);
    if rows.is_empty() {
        // serialize() only emits the header alongside the first record
        wtr.write_record(crate::types::CANONICAL_COLUMNS).map_err(csv_err)?;
    }
    for obs in rows {
        wtr.serialize(CleanedRow::from(obs)).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| IngestError::Io {
        path: origin.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(temp: Option<f64>) -> Observation {
        Observation {
            timestamp: NaiveDate::from_ymd_opt(2021, 12, 16)
                .and_then(|d| d.and_hms_opt(10, 30, 5))
                .unwrap(),
            latitude: 25.5,
            longitude: -80.25,
            temperature_c: temp,
            salinity_ppt: Some(35.0),
            odo_mg_l: None,
        }
    }

    fn render(rows: &[Observation]) -> String {
        let mut buf = Vec::new();
        write_cleaned_to(&mut buf, rows, Path::new("mem")).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_cleaned_header_and_cells() {
        let text = render(&[obs(Some(24.5)), obs(None)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,latitude,longitude,temperature_c,salinity_ppt,odo_mg_l"
        );
        assert_eq!(lines[1], "2021-12-16 10:30:05,25.5,-80.25,24.5,35.0,");
        assert_eq!(lines[2], "2021-12-16 10:30:05,25.5,-80.25,,35.0,");
    }

    #[test]
    fn test_empty_artifact_still_has_header() {
        let text = render(&[]);
        assert_eq!(
            text.trim_end(),
            "timestamp,latitude,longitude,temperature_c,salinity_ppt,odo_mg_l"
        );
    }

    #[test]
    fn test_read_ragged_rows() {
        let data = "a, b ,c\n1,2,3\n4,5\n\n6,7,8,9\n";
        let table = read_table_from(data.as_bytes(), Path::new("mem")).unwrap();
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec!["4", "5"]);
    }

    #[test]
    fn test_read_empty_input_is_missing_header() {
        let err = read_table_from("".as_bytes(), Path::new("empty.csv")).unwrap_err();
        assert!(matches!(err, IngestError::MissingHeader(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_table(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
