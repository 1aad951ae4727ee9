//! Reader for delimited weather-station exports.
//!
//! Each line looks like `station;timestamp;quality;...;value;...;eor`. One
//! numeric column is extracted per file; which one depends on the source kind.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::error::{Error, FormatError};

/// Station timestamp layout, e.g. `202107011350`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Column of the measurement timestamp in every station export.
const TIMESTAMP_COLUMN: usize = 1;

/// Column layout of one station export.
#[derive(Debug, Clone)]
pub struct StationFormat {
    /// Zero-based column holding the value of interest.
    pub value_column: usize,
    /// Single-byte field delimiter.
    pub delimiter: u8,
    /// Sentinel written by the station when nothing was measured.
    pub missing_value: f64,
}

impl StationFormat {
    pub fn new(value_column: usize, delimiter: u8, missing_value: f64) -> Self {
        Self {
            value_column,
            delimiter,
            missing_value,
        }
    }
}

/// Per-file load counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Records turned into observations.
    pub accepted: usize,
    /// Records dropped with a [`FormatError`].
    pub rejected: usize,
    /// Records carrying the missing-value sentinel.
    pub missing: usize,
    /// Records outside the requested prefix.
    pub filtered: usize,
    /// Accepted records that overwrote an earlier one with the same timestamp.
    pub duplicates: usize,
}

/// Observations from one file, ordered by timestamp.
#[derive(Debug, Default, Clone)]
pub struct StationSeries {
    pub observations: BTreeMap<NaiveDateTime, f64>,
    pub stats: LoadStats,
}

/// Outcome of parsing a single record that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Observation(NaiveDateTime, f64),
    Missing(NaiveDateTime),
}

/// Parses one already-split record.
///
/// # Errors
///
/// Returns a [`FormatError`] if the record is too short, the timestamp is not
/// `YYYYMMDDHHMM`, or the value column is not a number.
pub fn parse_record(
    fields: &[&str],
    line: usize,
    format: &StationFormat,
) -> Result<Record, FormatError> {
    let needed = format.value_column.max(TIMESTAMP_COLUMN) + 1;
    if fields.len() < needed {
        return Err(FormatError::MissingField {
            line,
            expected: needed,
            found: fields.len(),
        });
    }

    let raw_ts = fields[TIMESTAMP_COLUMN].trim();
    let timestamp = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).map_err(|_| {
        FormatError::Timestamp {
            line,
            value: raw_ts.to_string(),
        }
    })?;

    let raw_value = fields[format.value_column].trim();
    let value: f64 = raw_value.parse().map_err(|_| FormatError::Numeric {
        line,
        value: raw_value.to_string(),
    })?;
    if !value.is_finite() {
        return Err(FormatError::Numeric {
            line,
            value: raw_value.to_string(),
        });
    }

    if value == format.missing_value {
        return Ok(Record::Missing(timestamp));
    }
    Ok(Record::Observation(timestamp, value))
}

/// Reads station records from any reader.
///
/// Only records whose timestamp starts with `prefix` are considered. Bad
/// records are logged and dropped; they never abort the load. When a
/// timestamp repeats, the later record wins.
pub fn read_records<R: Read>(reader: R, format: &StationFormat, prefix: &str) -> StationSeries {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut series = StationSeries::default();
    let mut first = true;

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line() as usize);
                warn!(line, error = %e, "dropping unreadable station record");
                series.stats.rejected += 1;
                first = false;
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line() as usize);
        let fields: Vec<&str> = record.iter().collect();

        let raw_ts = fields.get(TIMESTAMP_COLUMN).map_or("", |f| f.trim());
        if first && !raw_ts.is_empty() && !raw_ts.bytes().all(|b| b.is_ascii_digit()) {
            debug!(line, "skipping header");
            first = false;
            continue;
        }
        first = false;

        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if !raw_ts.starts_with(prefix) {
            series.stats.filtered += 1;
            continue;
        }

        match parse_record(&fields, line, format) {
            Ok(Record::Observation(ts, value)) => {
                if series.observations.insert(ts, value).is_some() {
                    series.stats.duplicates += 1;
                }
                series.stats.accepted += 1;
            }
            Ok(Record::Missing(_)) => series.stats.missing += 1,
            Err(e) => {
                warn!(error = %e, "dropping station record");
                series.stats.rejected += 1;
            }
        }
    }

    series
}

/// Opens and reads a station file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened. Individual bad records
/// are not errors.
pub fn read_station_file(path: &Path, format: &StationFormat, prefix: &str) -> Result<StationSeries, Error> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_records(file, format, prefix);
    let s = series.stats;
    info!(
        path = %path.display(),
        accepted = s.accepted,
        rejected = s.rejected,
        missing = s.missing,
        filtered = s.filtered,
        duplicates = s.duplicates,
        "station file loaded"
    );
    Ok(series)
}
