//! Course, shift and academic-term filtering of a dataset.

use indexmap::IndexSet;
use intake_types::columns::{ACADEMIC_TERM_COLUMN, COURSE_COLUMN, SHIFT_COLUMN};
use intake_types::{CanonicalRow, Dataset};
use intake_util::AcademicTerm;
use serde::Serialize;

/// Choice label that disables a filter.
pub const ALL_CHOICE: &str = "Todos";

/// Which rows to keep. `None` disables that filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub course: Option<String>,
    pub shift: Option<String>,
    pub term: Option<String>,
}

fn choice(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != ALL_CHOICE)
        .map(str::to_string)
}

fn matches(row: &CanonicalRow, column: &str, wanted: Option<&str>) -> bool {
    match wanted {
        Some(wanted) => row.get_str(column) == Some(wanted),
        None => true,
    }
}

impl FilterSelection {
    /// Builds a selection; blank values and [`ALL_CHOICE`] mean "no filter".
    pub fn new(course: Option<&str>, shift: Option<&str>, term: Option<&str>) -> Self {
        Self {
            course: choice(course),
            shift: choice(shift),
            term: choice(term),
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.course.is_none() && self.shift.is_none() && self.term.is_none()
    }

    /// Rows whose course, shift and term equal the selection exactly.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        if self.is_unfiltered() {
            return dataset.clone();
        }
        dataset.retain(|row| {
            matches(row, COURSE_COLUMN, self.course.as_deref())
                && matches(row, SHIFT_COLUMN, self.shift.as_deref())
                && matches(row, ACADEMIC_TERM_COLUMN, self.term.as_deref())
        })
    }
}

/// Values a selection can choose from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Distinct courses in first-seen order.
    pub courses: Vec<String>,
    /// Distinct shifts in first-seen order.
    pub shifts: Vec<String>,
    /// Distinct academic terms, newest first.
    pub terms: Vec<String>,
}

fn distinct(dataset: &Dataset, column: &str) -> Vec<String> {
    let values: IndexSet<&str> = dataset.iter().filter_map(|row| row.get_str(column)).collect();
    values.into_iter().map(str::to_string).collect()
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut terms: Vec<AcademicTerm> = dataset
            .iter()
            .filter_map(|row| row.get_str(ACADEMIC_TERM_COLUMN))
            .filter_map(|label| label.parse::<AcademicTerm>().ok())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        terms.sort_unstable_by(|left, right| right.cmp(left));

        Self {
            courses: distinct(dataset, COURSE_COLUMN),
            shifts: distinct(dataset, SHIFT_COLUMN),
            terms: terms.iter().map(ToString::to_string).collect(),
        }
    }
}
