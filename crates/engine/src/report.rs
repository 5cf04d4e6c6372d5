//! Text report over a dataset.
//!
//! Every section is built independently and yields
//! `Result<Section, RenderError>`. [`build_report`] keeps the sections that
//! succeed, records the ones that fail, and logs each failure; one broken
//! section never aborts the report.

use indexmap::IndexMap;
use intake_types::Dataset;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;

use crate::roles::{ColumnRole, ResolvedColumns};

/// Separator between answers of a multi-choice question.
pub const MULTI_CHOICE_SEPARATOR: char = ';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// One answer per response.
    Frequency,
    /// Several answers per response, separated by [`MULTI_CHOICE_SEPARATOR`].
    MultiChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub title: &'static str,
    pub role: ColumnRole,
    pub kind: SectionKind,
}

const fn section(title: &'static str, role: ColumnRole, kind: SectionKind) -> SectionSpec {
    SectionSpec { title, role, kind }
}

pub const DEFAULT_SECTIONS: &[SectionSpec] = &[
    section("Respostas por curso", ColumnRole::Course, SectionKind::Frequency),
    section("Respostas por período", ColumnRole::Shift, SectionKind::Frequency),
    section("Respostas por semestre", ColumnRole::AcademicTerm, SectionKind::Frequency),
    section("Renda individual", ColumnRole::IndividualIncome, SectionKind::Frequency),
    section("Renda familiar", ColumnRole::FamilyIncome, SectionKind::Frequency),
    section("Nível hierárquico", ColumnRole::JobLevel, SectionKind::Frequency),
    section("Primeira experiência profissional", ColumnRole::FirstExperience, SectionKind::Frequency),
    section("Como conheceu a instituição", ColumnRole::DiscoveryChannels, SectionKind::MultiChoice),
    section("Fator de escolha", ColumnRole::InfluenceFactor, SectionKind::Frequency),
    section("Influência na decisão", ColumnRole::InfluenceRating, SectionKind::Frequency),
    section("Outros processos seletivos", ColumnRole::OtherApplications, SectionKind::MultiChoice),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no column found for role '{role}'")]
    MissingColumn { role: ColumnRole },

    #[error("column '{column}' has no answers")]
    NoAnswers { column: String },
}

/// Answer counts for one question, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub column: String,
    /// Responses with at least one answer.
    pub answered: usize,
    pub counts: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFailure {
    pub title: &'static str,
    pub error: RenderError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub total_responses: usize,
    pub sections: Vec<Section>,
    pub failures: Vec<SectionFailure>,
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn answers(value: &Value, kind: SectionKind) -> Vec<String> {
    match (value, kind) {
        (Value::Array(items), _) => items.iter().filter_map(scalar_text).collect(),
        (Value::String(text), SectionKind::MultiChoice) => text
            .split(MULTI_CHOICE_SEPARATOR)
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
            .map(str::to_string)
            .collect(),
        _ => scalar_text(value).into_iter().collect(),
    }
}

/// Counts the answers of the column bound to `spec.role`.
pub fn build_section(dataset: &Dataset, columns: &ResolvedColumns, spec: &SectionSpec) -> Result<Section, RenderError> {
    let column = columns
        .get(spec.role)
        .ok_or(RenderError::MissingColumn { role: spec.role })?;

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    let mut answered = 0usize;
    for row in dataset {
        let Some(value) = row.get(column) else { continue };
        let row_answers = answers(value, spec.kind);
        if row_answers.is_empty() {
            continue;
        }
        answered += 1;
        for answer in row_answers {
            *counts.entry(answer).or_default() += 1;
        }
    }
    if answered == 0 {
        return Err(RenderError::NoAnswers {
            column: column.to_string(),
        });
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|left, right| right.1.cmp(&left.1));
    Ok(Section {
        title: spec.title.to_string(),
        column: column.to_string(),
        answered,
        counts,
    })
}

/// Builds every section of `specs`, resolving column roles once.
pub fn build_report(dataset: &Dataset, specs: &[SectionSpec]) -> Report {
    let columns = ResolvedColumns::for_dataset(dataset);
    let mut report = Report {
        total_responses: dataset.len(),
        ..Report::default()
    };

    for spec in specs {
        match build_section(dataset, &columns, spec) {
            Ok(section) => {
                debug!(section = spec.title, answers = section.counts.len(), "report section built");
                report.sections.push(section);
            }
            Err(error) => {
                warn!(section = spec.title, error = %error, "report section skipped");
                report.failures.push(SectionFailure {
                    title: spec.title,
                    error,
                });
            }
        }
    }
    report
}

impl Section {
    /// Aligned text table: answer, count and share of answered responses.
    pub fn render(&self) -> String {
        let label_width = self.counts.iter().map(|(label, _)| label.width()).max().unwrap_or(0);
        let count_width = self
            .counts
            .iter()
            .map(|(_, count)| count.to_string().len())
            .max()
            .unwrap_or(1);

        let mut out = format!("{} ({} respostas)\n", self.title, self.answered);
        for (label, count) in &self.counts {
            let padding = " ".repeat(label_width - label.width());
            let share = *count as f64 * 100.0 / self.answered as f64;
            out.push_str(&format!("  {label}{padding}  {count:>count_width$}  {share:>5.1}%\n"));
        }
        out
    }
}

impl Report {
    pub fn render(&self) -> String {
        let mut out = format!("Total de respostas: {}\n", self.total_responses);
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.render());
        }
        if !self.failures.is_empty() {
            out.push_str("\nSeções omitidas:\n");
            for failure in &self.failures {
                out.push_str(&format!("  {}: {}\n", failure.title, failure.error));
            }
        }
        out
    }
}
