//! Schema Normalizer - heterogeneous raw headers to the canonical schema
//!
//! Raw exports from different instruments name the same quantity differently
//! ("Temp °C", "temperature", "Temperature (c)"). Headers are first reduced to
//! a normalized key (lowercase, runs of punctuation/whitespace collapsed to
//! `_`), then resolved against a static alias table per canonical field.
//!
//! Timestamps come from the first fully present source: a
//! `Date (m/d/y)` + `Time (hh:mm:ss)` pair, a plain `date` + `time` pair,
//! or a single `timestamp` / `datetime` column.
//!
//! Rows with no usable timestamp, latitude or longitude are dropped. Sensor
//! cells that fail to parse become `None`.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::types::{parse_instant, parse_number, Column, Observation};

// ============================================================================
// Alias Table
// ============================================================================

/// Accepted normalized header names per canonical column, in priority order.
const COLUMN_ALIASES: &[(Column, &[&str])] = &[
    (Column::Latitude, &["latitude", "lat"]),
    (Column::Longitude, &["longitude", "lon", "lng"]),
    (Column::TemperatureC, &["temperature_c", "temperature", "temp_c"]),
    (Column::SalinityPpt, &["salinity_ppt", "sal_ppt", "salinity"]),
    (Column::OdoMgL, &["odo_mg_l", "odo_mgl", "odo"]),
];

/// Timestamp sources in priority order.
const TIMESTAMP_PAIRS: &[(&str, &str)] = &[("date_m_d_y", "time_hh_mm_ss"), ("date", "time")];
const TIMESTAMP_SINGLES: &[&str] = &["timestamp", "datetime"];

fn separator_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is a valid regex"))
}

/// Normalize a raw header: `" ODO mg/L "` → `"odo_mg_l"`.
pub fn normalize_header(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    separator_run()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

// ============================================================================
// Tables
// ============================================================================

/// Raw tabular input: a header row plus string cells. Rows may be ragged;
/// missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }
}

/// Canonical observations plus the numeric columns the source actually carried.
///
/// `columns` always holds latitude and longitude; sensor columns appear only
/// when a matching header was found. The cleaning filter tests exactly these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What the normalizer resolved and how many rows it lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub input_rows: usize,
    pub dropped_rows: usize,
    /// Canonical field name → raw header it was read from.
    pub sources: BTreeMap<String, String>,
}

// ============================================================================
// Resolution
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimestampSource {
    Pair { date: usize, time: usize },
    Single(usize),
}

#[derive(Debug, Default)]
struct HeaderMap {
    columns: BTreeMap<Column, usize>,
    timestamp: Option<TimestampSource>,
}

impl HeaderMap {
    fn resolve(headers: &[String]) -> Self {
        let keys: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let find = |alias: &str| keys.iter().position(|k| k == alias);

        let mut map = Self::default();
        for (column, aliases) in COLUMN_ALIASES {
            if let Some(idx) = aliases.iter().find_map(|a| find(*a)) {
                map.columns.insert(*column, idx);
            }
        }

        map.timestamp = TIMESTAMP_PAIRS
            .iter()
            .find_map(|(d, t)| Some(TimestampSource::Pair { date: find(*d)?, time: find(*t)? }))
            .or_else(|| {
                TIMESTAMP_SINGLES
                    .iter()
                    .find_map(|s| find(*s).map(TimestampSource::Single))
            });

        map
    }

    fn sources(&self, headers: &[String]) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = self
            .columns
            .iter()
            .map(|(c, idx)| (c.name().to_string(), headers[*idx].clone()))
            .collect();
        match self.timestamp {
            Some(TimestampSource::Pair { date, time }) => {
                out.insert(
                    "timestamp".to_string(),
                    format!("{} + {}", headers[date], headers[time]),
                );
            }
            Some(TimestampSource::Single(idx)) => {
                out.insert("timestamp".to_string(), headers[idx].clone());
            }
            None => {}
        }
        out
    }
}

/// Map a raw table onto the canonical schema.
pub fn normalize(table: &RawTable) -> (ObservationTable, NormalizeReport) {
    let map = HeaderMap::resolve(&table.headers);

    let mut columns = vec![Column::Latitude, Column::Longitude];
    columns.extend(
        map.columns
            .keys()
            .copied()
            .filter(|c| !matches!(c, Column::Latitude | Column::Longitude)),
    );

    let number = |row: usize, column: Column| {
        map.columns
            .get(&column)
            .and_then(|idx| parse_number(table.cell(row, *idx)))
    };

    let mut rows = Vec::with_capacity(table.rows.len());
    for i in 0..table.rows.len() {
        let timestamp = match map.timestamp {
            Some(TimestampSource::Pair { date, time }) => {
                let joined = format!(
                    "{} {}",
                    table.cell(i, date).trim(),
                    table.cell(i, time).trim()
                );
                parse_instant(&joined)
            }
            Some(TimestampSource::Single(idx)) => parse_instant(table.cell(i, idx)),
            None => None,
        };

        let (Some(timestamp), Some(latitude), Some(longitude)) = (
            timestamp,
            number(i, Column::Latitude),
            number(i, Column::Longitude),
        ) else {
            continue;
        };

        rows.push(Observation {
            timestamp,
            latitude,
            longitude,
            temperature_c: number(i, Column::TemperatureC),
            salinity_ppt: number(i, Column::SalinityPpt),
            odo_mg_l: number(i, Column::OdoMgL),
        });
    }

    let report = NormalizeReport {
        input_rows: table.rows.len(),
        dropped_rows: table.rows.len() - rows.len(),
        sources: map.sources(&table.headers),
    };

    for (field, header) in &report.sources {
        debug!(field = %field, header = %header, "Resolved column");
    }
    info!(
        input = report.input_rows,
        kept = rows.len(),
        dropped = report.dropped_rows,
        columns = columns.len(),
        "Normalized raw table"
    );

    (ObservationTable { columns, rows }, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" ODO mg/L "), "odo_mg_l");
        assert_eq!(normalize_header("Date (MM/DD/YYYY)"), "date_mm_dd_yyyy");
        assert_eq!(normalize_header("Date (m/d/y)"), "date_m_d_y");
        assert_eq!(normalize_header("Time (hh:mm:ss)"), "time_hh_mm_ss");
        assert_eq!(normalize_header("Temp °C"), "temp_c");
        assert_eq!(normalize_header("Salinity (ppt)"), "salinity_ppt");
        assert_eq!(normalize_header("__Latitude__"), "latitude");
    }

    #[test]
    fn test_instrument_export_headers() {
        let raw = table(
            &[
                "Date (m/d/y)",
                "Time (hh:mm:ss)",
                "Latitude",
                "Longitude",
                "Temp °C",
                "Salinity (ppt)",
                "ODO mg/L",
            ],
            &[&["12/16/21", "10:30:05", "25.91", "-80.14", "24.5", "35.1", "6.2"]],
        );
        let (out, report) = normalize(&raw);

        assert_eq!(report.input_rows, 1);
        assert_eq!(report.dropped_rows, 0);
        assert_eq!(
            out.columns,
            vec![
                Column::Latitude,
                Column::Longitude,
                Column::TemperatureC,
                Column::SalinityPpt,
                Column::OdoMgL
            ]
        );

        let obs = &out.rows[0];
        let expected = NaiveDate::from_ymd_opt(2021, 12, 16)
            .and_then(|d| d.and_hms_opt(10, 30, 5))
            .unwrap();
        assert_eq!(obs.timestamp, expected);
        assert_eq!(obs.temperature_c, Some(24.5));
        assert_eq!(obs.salinity_ppt, Some(35.1));
        assert_eq!(obs.odo_mg_l, Some(6.2));
        assert_eq!(report.sources["timestamp"], "Date (m/d/y) + Time (hh:mm:ss)");
        assert_eq!(report.sources["odo_mg_l"], "ODO mg/L");
    }

    #[test]
    fn test_short_aliases_and_single_timestamp() {
        let raw = table(
            &["timestamp", "lat", "lng", "temperature"],
            &[&["2021-12-16 10:30:05", "25.9", "-80.1", "24.0"]],
        );
        let (out, _) = normalize(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows[0].longitude, -80.1);
        assert_eq!(
            out.columns,
            vec![Column::Latitude, Column::Longitude, Column::TemperatureC]
        );
        assert_eq!(out.rows[0].salinity_ppt, None);
    }

    #[test]
    fn test_first_alias_wins() {
        let raw = table(
            &["date", "time", "latitude", "longitude", "temperature", "temperature_c"],
            &[&["2021-12-16", "10:00:00", "1", "2", "99", "20"]],
        );
        let (out, report) = normalize(&raw);
        assert_eq!(out.rows[0].temperature_c, Some(20.0));
        assert_eq!(report.sources["temperature_c"], "temperature_c");
    }

    #[test]
    fn test_rows_without_required_fields_are_dropped() {
        let raw = table(
            &["date", "time", "latitude", "longitude", "odo"],
            &[
                &["2021-12-16", "10:00:00", "25.9", "-80.1", "6.0"],
                &["not a date", "10:00:01", "25.9", "-80.1", "6.0"],
                &["2021-12-16", "10:00:02", "", "-80.1", "6.0"],
                &["2021-12-16", "10:00:03", "25.9"],
            ],
        );
        let (out, report) = normalize(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(report.input_rows, 4);
        assert_eq!(report.dropped_rows, 3);
        for obs in &out.rows {
            assert!(obs.latitude.is_finite() && obs.longitude.is_finite());
        }
    }

    #[test]
    fn test_unparsable_sensor_values_become_absent() {
        let raw = table(
            &["date", "time", "latitude", "longitude", "salinity"],
            &[
                &["2021-12-16", "10:00:00", "25.9", "-80.1", "n/a"],
                &["2021-12-16", "10:00:01", "25.9", "-80.1", "NaN"],
            ],
        );
        let (out, _) = normalize(&raw);
        assert_eq!(out.len(), 2);
        assert!(out.rows.iter().all(|o| o.salinity_ppt.is_none()));
    }

    #[test]
    fn test_no_timestamp_source_drops_everything() {
        let raw = table(&["latitude", "longitude"], &[&["1", "2"]]);
        let (out, report) = normalize(&raw);
        assert!(out.is_empty());
        assert_eq!(report.dropped_rows, 1);
        assert!(!report.sources.contains_key("timestamp"));
    }
}
