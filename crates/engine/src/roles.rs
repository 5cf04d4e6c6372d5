//! Declarative lookup of the columns that report sections read.
//!
//! Survey questions are long free-text labels that drift between form
//! revisions, so report sections locate their column by role. The table is
//! resolved once per dataset into [`ResolvedColumns`]; lookups afterwards
//! never rescan the schema.

use std::collections::HashMap;
use std::fmt;

use intake_types::Dataset;
use intake_types::columns::{ACADEMIC_TERM_COLUMN, COURSE_COLUMN, SHIFT_COLUMN, TIMESTAMP_COLUMN};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Timestamp,
    Course,
    Shift,
    AcademicTerm,
    IndividualIncome,
    FamilyIncome,
    JobLevel,
    FirstExperience,
    DiscoveryChannels,
    InfluenceFactor,
    InfluenceRating,
    OtherApplications,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Timestamp => "timestamp",
            ColumnRole::Course => "course",
            ColumnRole::Shift => "shift",
            ColumnRole::AcademicTerm => "academic term",
            ColumnRole::IndividualIncome => "individual income",
            ColumnRole::FamilyIncome => "family income",
            ColumnRole::JobLevel => "job level",
            ColumnRole::FirstExperience => "first experience",
            ColumnRole::DiscoveryChannels => "discovery channels",
            ColumnRole::InfluenceFactor => "influence factor",
            ColumnRole::InfluenceRating => "influence rating",
            ColumnRole::OtherApplications => "other applications",
        };
        f.write_str(name)
    }
}

/// How a role recognizes its column name.
#[derive(Debug, Clone, Copy)]
pub enum ColumnMatcher {
    /// The canonical name, exactly.
    Exact(&'static str),
    /// Any of the needles, case-insensitively, anywhere in the name.
    Contains(&'static [&'static str]),
}

impl ColumnMatcher {
    pub fn matches(&self, column: &str) -> bool {
        match self {
            ColumnMatcher::Exact(name) => column == *name,
            ColumnMatcher::Contains(needles) => {
                let column = column.to_lowercase();
                needles.iter().any(|needle| column.contains(&needle.to_lowercase()))
            }
        }
    }
}

/// Role table, in resolution order.
pub const COLUMN_ROLES: &[(ColumnRole, ColumnMatcher)] = &[
    (ColumnRole::Timestamp, ColumnMatcher::Exact(TIMESTAMP_COLUMN)),
    (ColumnRole::Course, ColumnMatcher::Exact(COURSE_COLUMN)),
    (ColumnRole::Shift, ColumnMatcher::Exact(SHIFT_COLUMN)),
    (ColumnRole::AcademicTerm, ColumnMatcher::Exact(ACADEMIC_TERM_COLUMN)),
    (ColumnRole::IndividualIncome, ColumnMatcher::Contains(&["renda individual"])),
    (ColumnRole::FamilyIncome, ColumnMatcher::Contains(&["renda familiar"])),
    (ColumnRole::JobLevel, ColumnMatcher::Contains(&["nível hierárquico"])),
    (ColumnRole::FirstExperience, ColumnMatcher::Contains(&["primeira experiência"])),
    (ColumnRole::DiscoveryChannels, ColumnMatcher::Contains(&["quais meios"])),
    (ColumnRole::InfluenceFactor, ColumnMatcher::Contains(&["fecap", "fator"])),
    (ColumnRole::InfluenceRating, ColumnMatcher::Contains(&["influ"])),
    (
        ColumnRole::OtherApplications,
        ColumnMatcher::Contains(&["processo seletivo em quais instituições"]),
    ),
];

/// Column name bound to each role found in a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    columns: HashMap<ColumnRole, String>,
}

impl ResolvedColumns {
    /// Binds every role of [`COLUMN_ROLES`] to the first matching column.
    ///
    /// A column already bound to an earlier role is skipped, so a question
    /// mentioning "influência" and "fator" feeds one section only.
    pub fn resolve<'a, I>(column_names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = column_names.into_iter().collect();
        let mut columns: HashMap<ColumnRole, String> = HashMap::new();
        for (role, matcher) in COLUMN_ROLES {
            let found = names
                .iter()
                .find(|name| matcher.matches(name) && !columns.values().any(|bound| bound.as_str() == **name));
            if let Some(name) = found {
                columns.insert(*role, name.to_string());
            }
        }
        debug!(resolved = columns.len(), total = COLUMN_ROLES.len(), "column roles resolved");
        Self { columns }
    }

    pub fn for_dataset(dataset: &Dataset) -> Self {
        Self::resolve(dataset.column_names())
    }

    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        self.columns.get(&role).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILY_INCOME: &str = "Qual a sua Renda Familiar mensal?";
    const FACTOR: &str = "Qual fator mais influenciou a escolha da FECAP?";
    const RATING: &str = "Quanto a indicação influenciou sua decisão?";

    #[test]
    fn exact_roles_do_not_match_substrings() {
        let resolved = ResolvedColumns::resolve(["Qual o seu Curso? (outro)", SHIFT_COLUMN]);
        assert_eq!(resolved.get(ColumnRole::Course), None);
        assert_eq!(resolved.get(ColumnRole::Shift), Some(SHIFT_COLUMN));
    }

    #[test]
    fn contains_roles_ignore_case() {
        let resolved = ResolvedColumns::resolve([TIMESTAMP_COLUMN, FAMILY_INCOME]);
        assert_eq!(resolved.get(ColumnRole::FamilyIncome), Some(FAMILY_INCOME));
        assert_eq!(resolved.get(ColumnRole::IndividualIncome), None);
    }

    #[test]
    fn a_column_feeds_a_single_role() {
        let resolved = ResolvedColumns::resolve([FACTOR, RATING]);
        assert_eq!(resolved.get(ColumnRole::InfluenceFactor), Some(FACTOR));
        assert_eq!(resolved.get(ColumnRole::InfluenceRating), Some(RATING));
    }

    #[test]
    fn empty_schema_resolves_nothing() {
        assert!(ResolvedColumns::for_dataset(&Dataset::empty()).is_empty());
    }
}
