//! CSV measurement parser.
//!
//! Turns the text of an uploaded CSV file into measurement candidates for one
//! reservoir. Row-level problems are collected as [`LineError`]s so a single
//! dirty line never discards the rest of the batch; only an empty file or a
//! wrong header aborts parsing.
//!
//! Expected format:
//!
//! ```text
//! measuredAt;ph;ec;waterTemp
//! 2024-11-20T10:30:00;6.5;1.8;22.5
//! 2024-11-20 14:00:00;6,8;;23.0
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::ImportError;
use crate::models::{MeasurementSource, NewMeasurement};

// ---

/// Column names, in order, that the header line must match exactly.
pub const EXPECTED_HEADER: [&str; 4] = ["measuredAt", "ph", "ec", "waterTemp"];

const DELIMITER: u8 = b';';

/// Zone-less layouts accepted for `measuredAt`, tried after RFC 3339.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A rejected data line. `line` is the 1-based line number in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    pub line: u64,
    pub reason: String,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.reason)
    }
}

/// Result of parsing a file whose header was valid.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub candidates: Vec<NewMeasurement>,
    pub errors: Vec<LineError>,
}

impl ParseOutcome {
    // ---
    /// Rendered error messages, in file order.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Parse `content` into measurement candidates for `reservoir_id`.
///
/// Returns `Err` only for structural problems (no non-blank line, wrong
/// header). Every other problem is reported per line in the outcome.
pub fn parse(content: &str, reservoir_id: i64) -> Result<ParseOutcome, ImportError> {
    // ---
    let content = content.trim_start_matches('\u{feff}');

    let mut outcome = ParseOutcome::default();
    let mut header_seen = false;

    // Each physical line is read on its own so an unbalanced quote stays
    // confined to the line it appears on
    for (index, text) in content.lines().enumerate() {
        let line = index as u64 + 1;
        if text.trim().is_empty() {
            continue;
        }

        let record = match read_line(text) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) if !header_seen => return Err(ImportError::Unreadable(e.to_string())),
            Err(e) => {
                outcome.errors.push(LineError {
                    line,
                    reason: format!("Unreadable line ({e})"),
                });
                continue;
            }
        };

        if !header_seen {
            check_header(&record)?;
            header_seen = true;
            continue;
        }

        match parse_row(&record, reservoir_id) {
            Ok(candidate) => outcome.candidates.push(candidate),
            Err(reason) => outcome.errors.push(LineError { line, reason }),
        }
    }

    if !header_seen {
        return Err(ImportError::Empty);
    }

    tracing::debug!(
        reservoir_id,
        candidates = outcome.candidates.len(),
        errors = outcome.errors.len(),
        "Parsed CSV measurements"
    );
    Ok(outcome)
}

// ---

fn read_line(text: &str) -> Result<Option<csv::StringRecord>, csv::Error> {
    // ---
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let record = reader.records().next().transpose();
    record
}

fn check_header(record: &csv::StringRecord) -> Result<(), ImportError> {
    // ---
    if record.iter().eq(EXPECTED_HEADER.iter().copied()) {
        return Ok(());
    }

    let got: Vec<&str> = record.iter().collect();
    Err(ImportError::InvalidHeader(format!(
        "Invalid CSV header. Expected: {}, Got: {}",
        EXPECTED_HEADER.join(";"),
        got.join(";")
    )))
}

fn parse_row(record: &csv::StringRecord, reservoir_id: i64) -> Result<NewMeasurement, String> {
    // ---
    if record.len() != EXPECTED_HEADER.len() {
        return Err(format!(
            "Invalid number of columns (expected {}, got {})",
            EXPECTED_HEADER.len(),
            record.len()
        ));
    }

    let measured_at_raw = &record[0];
    let measured_at = parse_measured_at(measured_at_raw).ok_or_else(|| {
        format!(
            "Invalid date format for measuredAt: \"{measured_at_raw}\" (expected ISO 8601 format)"
        )
    })?;

    let mut readings = [None; 3];
    for (slot, (raw, name)) in readings
        .iter_mut()
        .zip(record.iter().skip(1).zip(EXPECTED_HEADER.iter().skip(1)))
    {
        *slot = parse_reading(raw)
            .map_err(|_| format!("Invalid numeric value for {name}: \"{raw}\""))?;
    }

    let [ph, ec, water_temp] = readings;
    let candidate = NewMeasurement::new(reservoir_id, measured_at, MeasurementSource::CsvImport)
        .with_readings(ph, ec, water_temp);

    if !candidate.has_any_value() {
        return Err(
            "At least one measurement value (ph, ec, waterTemp) must be provided".to_string(),
        );
    }
    Ok(candidate)
}

/// Parse a timestamp in any accepted layout. Zone-less values are taken as
/// UTC; a bare date means midnight.
pub fn parse_measured_at(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A non-empty numeric field that is not a finite number.
#[derive(Debug)]
struct InvalidNumber;

/// Empty means "not measured"; a comma is accepted as decimal separator.
fn parse_reading(raw: &str) -> Result<Option<f64>, InvalidNumber> {
    // ---
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.replace(',', ".").parse::<f64>() {
        // "NaN" and "inf" parse as floats but are not readings
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(InvalidNumber),
    }
}
