//! # Date Handling Utilities
//!
//! Survey exports carry timestamps in whatever format the form tool and the
//! list service happened to emit: RFC 3339 from the API, day-first
//! `dd/mm/yyyy hh:mm:ss` from spreadsheet imports, bare dates from manual
//! edits. This module parses those tolerantly and buckets them into academic
//! terms (half years).
//!
//! Unparseable values become absent; nothing here guesses a default.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use intake_types::CanonicalRow;
use intake_types::columns::{ACADEMIC_TERM_COLUMN, TIMESTAMP_COLUMN};
use serde_json::Value;
use tracing::debug;

/// Canonical textual form written back into the timestamp column.
const CANONICAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Date-time layouts tried in order. Day-first layouts precede month-first
/// ambiguity: `05/02/2024` is the 5th of February.
const DATE_TIME_FORMATS: &[&str] = &[
    CANONICAL_TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%y"];

/// Parses a timestamp value, tolerating day-first layouts.
///
/// Returns `None` for absent values, non-string values and strings that match
/// no known layout. An explicit offset is kept: the wall-clock time as written
/// is returned, not its UTC equivalent.
///
/// # Example
/// ```rust
/// use intake_util::parse_timestamp;
/// use serde_json::json;
///
/// let parsed = parse_timestamp(&json!("05/02/2024 10:15:00")).unwrap();
/// assert_eq!(parsed.to_string(), "2024-02-05 10:15:00");
///
/// assert!(parse_timestamp(&json!("2024-07-01T12:00:00Z")).is_some());
/// assert!(parse_timestamp(&json!("not a date")).is_none());
/// assert!(parse_timestamp(&json!(null)).is_none());
/// ```
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.naive_local());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Half-year bucket of a response timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcademicTerm {
    pub year: i32,
    /// `1` for January through June, `2` for July through December.
    pub half: u8,
}

impl AcademicTerm {
    pub fn from_date(date: impl Datelike) -> Self {
        Self {
            year: date.year(),
            half: if date.month() <= 6 { 1 } else { 2 },
        }
    }
}

impl fmt::Display for AcademicTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.half)
    }
}

impl FromStr for AcademicTerm {
    type Err = String;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let (year, half) = label
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| format!("'{label}' is not a term label (expected YEAR-HALF)"))?;
        let year = year.parse::<i32>().map_err(|error| format!("invalid term year in '{label}': {error}"))?;
        match half {
            "1" => Ok(Self { year, half: 1 }),
            "2" => Ok(Self { year, half: 2 }),
            other => Err(format!("invalid term half '{other}' in '{label}' (expected 1 or 2)")),
        }
    }
}

/// Derives the academic term of a timestamp; absent in, absent out.
pub fn derive_term(timestamp: Option<NaiveDateTime>) -> Option<AcademicTerm> {
    timestamp.map(AcademicTerm::from_date)
}

/// Adds the academic-term column to canonical rows.
///
/// The raw timestamp column is coerced in place: parseable values are
/// rewritten in canonical ISO-8601 form, unparseable ones become absent.
/// Running the enricher twice yields the same rows.
#[derive(Debug, Clone)]
pub struct TemporalEnricher {
    timestamp_column: String,
    term_column: String,
}

impl Default for TemporalEnricher {
    fn default() -> Self {
        Self::new(TIMESTAMP_COLUMN, ACADEMIC_TERM_COLUMN)
    }
}

impl TemporalEnricher {
    pub fn new(timestamp_column: impl Into<String>, term_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            term_column: term_column.into(),
        }
    }

    pub fn term_column(&self) -> &str {
        &self.term_column
    }

    pub fn enrich(&self, rows: Vec<CanonicalRow>) -> Vec<CanonicalRow> {
        let mut unparseable = 0usize;
        let enriched: Vec<CanonicalRow> = rows
            .into_iter()
            .map(|mut row| {
                let raw = row.get(&self.timestamp_column).cloned();
                let parsed = raw.as_ref().and_then(parse_timestamp);
                if parsed.is_none() && raw.as_ref().is_some_and(|value| !value.is_null()) {
                    unparseable += 1;
                }
                if raw.is_some() {
                    let coerced = parsed
                        .map(|timestamp| Value::String(timestamp.format(CANONICAL_TIMESTAMP_FORMAT).to_string()))
                        .unwrap_or(Value::Null);
                    row.insert(self.timestamp_column.clone(), coerced);
                }
                let term = derive_term(parsed)
                    .map(|term| Value::String(term.to_string()))
                    .unwrap_or(Value::Null);
                row.insert(self.term_column.clone(), term);
                row
            })
            .collect();
        debug!(
            row_count = enriched.len(),
            unparseable_timestamps = unparseable,
            "academic terms derived"
        );
        enriched
    }
}
