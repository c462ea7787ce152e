//! Canonical observation schema
//!
//! Every component downstream of the normalizer works on [`Observation`]:
//! one timestamped, positioned reading with up to three sensor measurements.
//! Absent sensor values are `None` and never take part in statistics.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;

/// Wire format for timestamps in API responses (second precision ISO-8601).
pub const ISO_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp format used in the cleaned CSV artifact.
pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical column order of the cleaned artifact.
pub const CANONICAL_COLUMNS: [&str; 6] = [
    "timestamp",
    "latitude",
    "longitude",
    "temperature_c",
    "salinity_ppt",
    "odo_mg_l",
];

// ============================================================================
// Observation
// ============================================================================

/// One normalized sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(with = "iso_seconds")]
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature_c: Option<f64>,
    pub salinity_ppt: Option<f64>,
    pub odo_mg_l: Option<f64>,
}

impl Observation {
    /// Value of a numeric column, `None` when the reading is absent.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Latitude => Some(self.latitude),
            Column::Longitude => Some(self.longitude),
            Column::TemperatureC => self.temperature_c,
            Column::SalinityPpt => self.salinity_ppt,
            Column::OdoMgL => self.odo_mg_l,
        }
    }
}

mod iso_seconds {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(ISO_SECONDS_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_instant(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unparsable timestamp '{raw}'")))
    }
}

// ============================================================================
// Columns & Measurements
// ============================================================================

/// Numeric columns of the canonical schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Latitude,
    Longitude,
    TemperatureC,
    SalinityPpt,
    OdoMgL,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Latitude,
        Column::Longitude,
        Column::TemperatureC,
        Column::SalinityPpt,
        Column::OdoMgL,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::TemperatureC => "temperature_c",
            Column::SalinityPpt => "salinity_ppt",
            Column::OdoMgL => "odo_mg_l",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sensor measurements supported by statistics and outlier detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    TemperatureC,
    SalinityPpt,
    OdoMgL,
}

impl Measurement {
    pub const ALL: [Measurement; 3] = [
        Measurement::TemperatureC,
        Measurement::SalinityPpt,
        Measurement::OdoMgL,
    ];

    pub fn column(self) -> Column {
        match self {
            Measurement::TemperatureC => Column::TemperatureC,
            Measurement::SalinityPpt => Column::SalinityPpt,
            Measurement::OdoMgL => Column::OdoMgL,
        }
    }

    pub fn name(self) -> &'static str {
        self.column().name()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measurement {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Measurement::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Measurement::ALL.iter().map(|m| m.name()).collect();
                AnalyticsError::Validation(format!("field must be one of {names:?}"))
            })
    }
}

// ============================================================================
// Lenient value parsing
// ============================================================================

/// Date-time layouts accepted on ingest and in query bounds, tried in order.
/// Two-digit years come first: `%Y` would happily read "21" as year 21.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

/// Parse a date-time string, returning `None` instead of an error.
///
/// Offset-qualified RFC 3339 values are converted to UTC wall-clock time.
pub fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a numeric cell, mapping blanks, junk and non-finite values to `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
