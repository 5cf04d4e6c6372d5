//! Canonical column names shared by the pipeline and its consumers.

/// Raw response timestamp ("start time" of the survey form).
pub const TIMESTAMP_COLUMN: &str = "Hora de início";

/// Course the respondent enrolled in.
pub const COURSE_COLUMN: &str = "Qual o seu Curso?";

/// Shift (morning/evening) the respondent attends.
pub const SHIFT_COLUMN: &str = "Qual é o seu período?";

/// Derived half-year bucket, e.g. `2024-1`.
pub const ACADEMIC_TERM_COLUMN: &str = "Semestre";

/// Columns every canonical row carries, present or not in the remote list.
pub const DEFAULT_EXPECTED_COLUMNS: &[&str] = &[TIMESTAMP_COLUMN, COURSE_COLUMN, SHIFT_COLUMN];

/// Returns the default expected columns as owned strings.
pub fn default_expected_columns() -> Vec<String> {
    DEFAULT_EXPECTED_COLUMNS.iter().map(|column| column.to_string()).collect()
}
