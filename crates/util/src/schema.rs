//! # Schema Normalization
//!
//! Remote list items arrive keyed by internal field identifiers. Those
//! identifiers are unstable: the list service encodes spaces, accents and
//! punctuation (`_x0020_`, `_x00ed_`, ...) and truncates long names, and new
//! encodings appear whenever an operator edits the survey form.
//!
//! Normalization applies two independent tolerances, in order:
//!
//! 1. **Key decoding** through a [`FieldNameMap`]. Only keys present in the
//!    map are renamed; everything else passes through unchanged. The map is
//!    data (built-in defaults extended by configuration), not code.
//! 2. **Completeness backfill**: every expected column missing from a row is
//!    added with the absent marker (`null`).
//!
//! Column *names* are cleaned before and after decoding: surrounding
//! whitespace trimmed and embedded line breaks collapsed to a single space.
//! Values are never touched.
//! Normalization is total: it never drops rows and never fails.

use indexmap::{IndexMap, IndexSet};
use intake_types::columns::{COURSE_COLUMN, SHIFT_COLUMN, TIMESTAMP_COLUMN, default_expected_columns};
use intake_types::{CanonicalRow, RawRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[\r\n]+\s*").expect("line break pattern is valid"));

/// Encoded identifiers the intake survey is known to produce.
const BUILTIN_FIELD_NAMES: &[(&str, &str)] = &[
    ("Hora_x0020_de_x0020_in_x00ed_cio", TIMESTAMP_COLUMN),
    ("HoradeIn_x00ed_cio", TIMESTAMP_COLUMN),
    ("Qual_x0020_o_x0020_seu_x0020_Cur", COURSE_COLUMN),
    ("Qual_x0020_o_x0020_seu_x0020_Curso_x003f_", COURSE_COLUMN),
    ("Qual_x0020__x00e9__x0020_o_x0020", SHIFT_COLUMN),
    ("Qual_x0020__x00e9__x0020_o_x0020_seu_x0020_per_x00ed_odo_x003f_", SHIFT_COLUMN),
    ("Hora_x0020_de_x0020_conclus_x00e", "Hora de conclusão"),
    ("Nome_x0020_do_x0020_curso", "Nome do curso"),
];

/// Mapping from encoded field identifiers to canonical column names.
///
/// Keys and names are stored cleaned (see [`normalize_column_name`]). A name
/// that is itself a key is followed to the end of the chain when decoding.
/// The map never holds a cycle: an entry that would close one replaces the
/// link that led back to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, String>", into = "IndexMap<String, String>")]
pub struct FieldNameMap {
    entries: IndexMap<String, String>,
}

impl FieldNameMap {
    /// Map with no entries; every key passes through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Map seeded with the identifiers known for the intake survey.
    pub fn builtin() -> Self {
        BUILTIN_FIELD_NAMES
            .iter()
            .map(|(encoded, canonical)| (encoded.to_string(), canonical.to_string()))
            .collect()
    }

    pub fn insert(&mut self, encoded: impl Into<String>, canonical: impl Into<String>) {
        let encoded = normalize_column_name(&encoded.into());
        let canonical = normalize_column_name(&canonical.into());
        if encoded.is_empty() || canonical.is_empty() {
            return;
        }
        if encoded != canonical
            && let Some(link) = self.link_back_to(&canonical, &encoded)
        {
            warn!(encoded = %encoded, canonical = %canonical, replaced = %link, "field name entry would close a cycle");
            self.entries.shift_remove(&link);
        }
        self.entries.insert(encoded, canonical);
    }

    /// Merges `other` into this map; entries in `other` win.
    pub fn extend(&mut self, other: FieldNameMap) {
        for (encoded, canonical) in other.entries {
            self.insert(encoded, canonical);
        }
    }

    /// Returns the canonical name for `key`, or the cleaned `key` when
    /// unmapped. Decoding a decoded name returns it unchanged.
    pub fn decode(&self, key: &str) -> String {
        let mut current = normalize_column_name(key);
        for _ in 0..=self.entries.len() {
            match self.entries.get(&current) {
                Some(next) if *next != current => current = next.clone(),
                _ => break,
            }
        }
        current
    }

    /// The key whose entry points at `target` on the chain starting at `start`.
    fn link_back_to(&self, start: &str, target: &str) -> Option<String> {
        let mut current = start;
        for _ in 0..self.entries.len() {
            let next = self.entries.get(current)?;
            if next == target {
                return Some(current.to_string());
            }
            if next == current {
                return None;
            }
            current = next;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for FieldNameMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (encoded, canonical) in iter {
            map.insert(encoded, canonical);
        }
        map
    }
}

impl From<IndexMap<String, String>> for FieldNameMap {
    fn from(entries: IndexMap<String, String>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<FieldNameMap> for IndexMap<String, String> {
    fn from(map: FieldNameMap) -> Self {
        map.entries
    }
}

/// Trims a column name and collapses embedded line breaks to one space.
///
/// ```rust
/// use intake_util::normalize_column_name;
///
/// assert_eq!(normalize_column_name("  Qual o seu\r\nCurso? "), "Qual o seu Curso?");
/// assert_eq!(normalize_column_name("Turno"), "Turno");
/// ```
pub fn normalize_column_name(name: &str) -> String {
    LINE_BREAKS.replace_all(name.trim(), " ").into_owned()
}

/// Applies key decoding and completeness backfill to raw records.
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    field_names: FieldNameMap,
    expected_columns: IndexSet<String>,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(FieldNameMap::builtin(), default_expected_columns())
    }
}

impl SchemaNormalizer {
    pub fn new<I, S>(field_names: FieldNameMap, expected_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expected_columns = expected_columns
            .into_iter()
            .map(|column| normalize_column_name(column.as_ref()))
            .filter(|column| !column.is_empty())
            .collect();
        Self {
            field_names,
            expected_columns,
        }
    }

    pub fn field_names(&self) -> &FieldNameMap {
        &self.field_names
    }

    pub fn expected_columns(&self) -> impl Iterator<Item = &str> {
        self.expected_columns.iter().map(String::as_str)
    }

    /// Normalizes every record; the output has exactly one row per input record.
    pub fn normalize(&self, rows: Vec<RawRecord>) -> Vec<CanonicalRow> {
        let normalized: Vec<CanonicalRow> = rows.into_iter().map(|record| self.normalize_record(record)).collect();
        debug!(
            row_count = normalized.len(),
            expected_columns = self.expected_columns.len(),
            "records normalized"
        );
        normalized
    }

    /// Normalizes a single record.
    ///
    /// When two source keys land on the same canonical name, the first
    /// non-absent value wins.
    pub fn normalize_record(&self, record: RawRecord) -> CanonicalRow {
        let mut row = CanonicalRow::new();
        for (key, value) in record {
            let column = self.field_names.decode(&key);
            if row.is_absent(&column) {
                if value.is_null() && row.contains(&column) {
                    continue;
                }
                row.insert(column, value);
            }
        }
        for column in &self.expected_columns {
            row.backfill(column);
        }
        row
    }
}

/// Normalizes `rows` with the given expected columns and field-name map.
pub fn normalize<I, S>(rows: Vec<RawRecord>, expected_columns: I, field_names: &FieldNameMap) -> Vec<CanonicalRow>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    SchemaNormalizer::new(field_names.clone(), expected_columns).normalize(rows)
}

/// Converts a canonical row back into record form, e.g. to renormalize it.
pub fn row_to_record(row: CanonicalRow) -> RawRecord {
    row.into_inner().into_iter().collect::<serde_json::Map<String, Value>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn mapped_keys_are_renamed_and_unknown_keys_pass_through() {
        let normalizer = SchemaNormalizer::default();
        let rows = normalizer.normalize(vec![record(json!({
            "Hora_x0020_de_x0020_in_x00ed_cio": "05/02/2024 10:15:00",
            "Some_x0020_New_x0020_Field": "kept",
            "id": "17"
        }))]);

        let row = &rows[0];
        assert_eq!(row.get_str(TIMESTAMP_COLUMN), Some("05/02/2024 10:15:00"));
        assert_eq!(row.get_str("Some_x0020_New_x0020_Field"), Some("kept"));
        assert_eq!(row.get_str("id"), Some("17"));
    }

    #[test]
    fn missing_expected_columns_are_backfilled_with_absent_marker() {
        let rows = normalize(vec![record(json!({ "Title": "" }))], ["Curso", "Turno"], &FieldNameMap::empty());

        let row = &rows[0];
        assert_eq!(row.get("Curso"), Some(&Value::Null));
        assert_eq!(row.get("Turno"), Some(&Value::Null));
        assert_eq!(row.get("Title"), Some(&json!("")), "empty strings are values, not absences");
    }

    #[test]
    fn column_names_are_trimmed_and_line_breaks_collapsed() {
        let rows = normalize(
            vec![record(json!({ " Qual o seu\nCurso? ": "ADM", "Turno\r\n": "Noite" }))],
            Vec::<String>::new(),
            &FieldNameMap::empty(),
        );
        let names: Vec<&str> = rows[0].column_names().collect();
        assert_eq!(names, vec!["Qual o seu Curso?", "Turno"]);
    }

    #[test]
    fn normalization_is_idempotent() {
        let normalizer = SchemaNormalizer::default();
        let once = normalizer.normalize(vec![record(json!({
            "Qual_x0020_o_x0020_seu_x0020_Cur": "Direito",
            "Comentário\n": "ok"
        }))]);
        let twice = normalizer.normalize(once.clone().into_iter().map(row_to_record).collect());
        assert_eq!(once, twice);
    }

    #[test]
    fn decoding_sees_cleaned_keys_so_a_second_pass_is_stable() {
        let mut field_names = FieldNameMap::empty();
        field_names.insert("Turno", "Qual é o seu período?");
        let normalizer = SchemaNormalizer::new(field_names, Vec::<String>::new());

        let once = normalizer.normalize(vec![record(json!({ "Turno\r\n": "Noite" }))]);
        let names: Vec<&str> = once[0].column_names().collect();
        assert_eq!(names, vec!["Qual é o seu período?"]);

        let twice = normalizer.normalize(once.clone().into_iter().map(row_to_record).collect());
        assert_eq!(once, twice);
    }

    #[test]
    fn chained_entries_decode_to_the_end_of_the_chain() {
        let mut field_names = FieldNameMap::empty();
        field_names.insert("Curso_x0020_antigo", "Curso antigo");
        field_names.insert("Curso antigo", "Curso");
        assert_eq!(field_names.decode("Curso_x0020_antigo"), "Curso");

        let normalizer = SchemaNormalizer::new(field_names, ["Curso"]);
        let once = normalizer.normalize(vec![record(json!({ "Curso_x0020_antigo": "ADM" }))]);
        assert_eq!(once[0].get_str("Curso"), Some("ADM"));
        assert!(!once[0].contains("Curso antigo"));

        let twice = normalizer.normalize(once.clone().into_iter().map(row_to_record).collect());
        assert_eq!(once, twice);
    }

    #[test]
    fn entry_closing_a_cycle_replaces_the_link_back() {
        let mut field_names = FieldNameMap::empty();
        field_names.insert("A", "B");
        let mut configured = FieldNameMap::empty();
        configured.insert("B", "A");
        field_names.extend(configured);

        assert_eq!(field_names.len(), 1);
        assert_eq!(field_names.decode("A"), "A");
        assert_eq!(field_names.decode("B"), "A");
    }

    #[test]
    fn deserialized_maps_are_cleaned() {
        let field_names: FieldNameMap = serde_json::from_value(json!({ " Turno\n": "Período " })).expect("map deserializes");
        assert_eq!(field_names.decode("Turno"), "Período");
    }

    #[test]
    fn first_non_absent_value_wins_on_collision() {
        let mut field_names = FieldNameMap::empty();
        field_names.insert("Curso_old", "Curso");
        field_names.insert("Curso_new", "Curso");

        let rows = normalize(
            vec![
                record(json!({ "Curso_old": null, "Curso_new": "ADM" })),
                record(json!({ "Curso_old": "ECO", "Curso_new": "ADM" })),
            ],
            ["Curso"],
            &field_names,
        );

        assert_eq!(rows[0].get_str("Curso"), Some("ADM"));
        assert_eq!(rows[1].get_str("Curso"), Some("ECO"));
    }

    #[test]
    fn never_drops_rows() {
        let rows = normalize(vec![RawRecord::new(), RawRecord::new()], ["Curso"], &FieldNameMap::builtin());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.is_absent("Curso") && row.contains("Curso")));
    }

    #[test]
    fn configured_entries_override_builtin_ones() {
        let mut field_names = FieldNameMap::builtin();
        let mut overrides = FieldNameMap::empty();
        overrides.insert("Qual_x0020_o_x0020_seu_x0020_Cur", "Curso");
        field_names.extend(overrides);

        assert_eq!(field_names.decode("Qual_x0020_o_x0020_seu_x0020_Cur"), "Curso");
        assert_eq!(field_names.decode("Hora_x0020_de_x0020_in_x00ed_cio"), TIMESTAMP_COLUMN);
    }
}
