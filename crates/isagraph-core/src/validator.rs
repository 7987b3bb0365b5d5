//! # Constraint Validator
//!
//! Checks the cardinality and ordering constraints a grammar section declares
//! against the actual column layout of a parsed section instance.
//!
//! The validator only reads: it produces a `ValidationReport` and never
//! touches the graph. Mandatory violations are errors (mapping of the section
//! is aborted by the caller); advisory ones are warnings.

use crate::grammar::{Constraint, Level, OrderTarget, SectionDef};
use crate::tabular::SectionInstance;
use crate::{IsaError, Location};
use serde::{Deserialize, Serialize};

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// What kind of rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Cardinality,
    Ordering,
    /// A column no grammar field recognizes.
    UnmatchedHeader,
    /// A property or qualifier column with nothing to attach to.
    Layout,
    /// An error that aborted mapping of a section or row.
    Mapping,
}

/// One entry of the structural report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub kind: ViolationKind,
    pub location: Location,
    pub message: String,
}

/// Errors and warnings collected over a run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn warn(&mut self, kind: ViolationKind, location: Location, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%location, "{}", message);
        self.push(Violation {
            severity: Severity::Warning,
            kind,
            location,
            message,
        });
    }

    pub fn error(&mut self, kind: ViolationKind, location: Location, message: impl Into<String>) {
        self.push(Violation {
            severity: Severity::Error,
            kind,
            location,
            message: message.into(),
        });
    }

    /// Record an error that aborted mapping.
    pub fn record_failure(&mut self, error: &IsaError) {
        let location = error.location().cloned().unwrap_or_default();
        self.error(ViolationKind::Mapping, location, error.to_string());
    }

    /// No errors were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
    }

    /// Append another report.
    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// The first error as an `IsaError::Structural`, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<IsaError> {
        self.errors()
            .next()
            .map(|v| IsaError::structural(v.location.clone(), v.message.clone()))
    }
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Validates one section instance against its grammar section.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintValidator<'g> {
    section: &'g SectionDef,
    /// Escalate advisory violations to errors.
    strict: bool,
    /// Report columns no grammar field recognizes.
    report_unmatched: bool,
}

/// One recognized mapper column, as the validator sees it.
struct Slot<'a> {
    key: &'a str,
    column: usize,
}

impl<'g> ConstraintValidator<'g> {
    #[must_use]
    pub fn new(section: &'g SectionDef) -> Self {
        Self {
            section,
            strict: false,
            report_unmatched: true,
        }
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn report_unmatched(mut self, report: bool) -> Self {
        self.report_unmatched = report;
        self
    }

    /// Check every constraint of the section.
    #[must_use]
    pub fn validate(&self, file_id: &str, instance: &SectionInstance) -> ValidationReport {
        let mut report = ValidationReport::new();
        let base = Location::section(file_id, &instance.section_id);

        let sequence: Vec<Slot<'_>> = instance
            .mapper_fields()
            .filter_map(|f| {
                f.field_key.as_deref().map(|key| Slot {
                    key,
                    column: f.column,
                })
            })
            .collect();

        for field in self.section.fields() {
            for constraint in &field.constraints {
                let severity = self.severity(constraint.level());
                match constraint {
                    Constraint::Cardinality { min, max, .. } => {
                        let count = sequence.iter().filter(|s| s.key == field.key).count();
                        let too_many = max.is_some_and(|max| count > max);
                        if count < *min || too_many {
                            let bound = match max {
                                Some(max) => format!("between {} and {}", min, max),
                                None => format!("at least {}", min),
                            };
                            self.emit(
                                &mut report,
                                severity,
                                ViolationKind::Cardinality,
                                base.clone(),
                                format!(
                                    "field '{}' occurs {} times, expected {}",
                                    field.id, count, bound
                                ),
                            );
                        }
                    }
                    Constraint::Follows { target, .. } => {
                        for (i, slot) in sequence.iter().enumerate() {
                            if slot.key != field.key {
                                continue;
                            }
                            let satisfied = match target {
                                OrderTarget::Nothing => i == 0,
                                OrderTarget::Field(x) => sequence[..i].iter().any(|s| s.key == x.as_str()),
                            };
                            if !satisfied {
                                self.emit(
                                    &mut report,
                                    severity,
                                    ViolationKind::Ordering,
                                    base.clone().with_field(&field.id, slot.column),
                                    match target {
                                        OrderTarget::Nothing => {
                                            format!("field '{}' must be the first column", field.id)
                                        }
                                        OrderTarget::Field(x) => format!(
                                            "field '{}' must follow '{}'",
                                            field.id,
                                            self.display_name(x)
                                        ),
                                    },
                                );
                            }
                        }
                    }
                    Constraint::Precedes { target, .. } => {
                        for (i, slot) in sequence.iter().enumerate() {
                            if slot.key != field.key {
                                continue;
                            }
                            let satisfied = match target {
                                OrderTarget::Nothing => i + 1 == sequence.len(),
                                OrderTarget::Field(x) => {
                                    sequence[i + 1..].iter().any(|s| s.key == x.as_str())
                                }
                            };
                            if !satisfied {
                                self.emit(
                                    &mut report,
                                    severity,
                                    ViolationKind::Ordering,
                                    base.clone().with_field(&field.id, slot.column),
                                    match target {
                                        OrderTarget::Nothing => {
                                            format!("field '{}' must be the last column", field.id)
                                        }
                                        OrderTarget::Field(x) => format!(
                                            "field '{}' must precede '{}'",
                                            field.id,
                                            self.display_name(x)
                                        ),
                                    },
                                );
                            }
                        }
                    }
                }
            }
        }

        if self.report_unmatched {
            for field in instance.unrecognized() {
                report.warn(
                    ViolationKind::UnmatchedHeader,
                    base.clone().with_field(&field.header.raw, field.column),
                    format!("column '{}' matches no field of the section", field.header.raw),
                );
            }
        }

        report
    }

    fn severity(&self, level: Level) -> Severity {
        match level {
            Level::Mandatory => Severity::Error,
            Level::Advisory if self.strict => Severity::Error,
            Level::Advisory => Severity::Warning,
        }
    }

    fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.section.field(key).map(|f| f.id.as_str()).unwrap_or(key)
    }

    fn emit(
        &self,
        report: &mut ValidationReport,
        severity: Severity,
        kind: ViolationKind,
        location: Location,
        message: String,
    ) {
        match severity {
            Severity::Error => report.error(kind, location, message),
            Severity::Warning => report.warn(kind, location, message),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn grammar(sample_level: &str) -> Grammar {
        Grammar::from_json_str(&format!(
            r#"{{"formats":[{{"id":"a","role":"assay","sections":[{{"id":"s","fields":[
            {{"id":"Sample Name","type":"sample","constraints":[
                {{"kind":"cardinality","min":1,"max":1}},
                {{"kind":"follows","target":"nothing"}}]}},
            {{"id":"Protocol REF","type":"protocol_ref"}},
            {{"id":"Extract Name","type":"extract","constraints":[
                {{"kind":"follows","target":"Sample Name","level":"advisory"}}]}},
            {{"id":"Raw Data File","type":"raw_data","constraints":[
                {{"kind":"precedes","target":"nothing","level":"{}"}}]}}]}}]}}]}}"#,
            sample_level
        ))
        .expect("grammar")
    }

    fn section(g: &Grammar, headers: &[&str]) -> SectionInstance {
        let def = g.format("a").and_then(|f| f.section("s")).expect("section");
        SectionInstance::from_rows("a_file", def, headers, Vec::new()).expect("parse")
    }

    fn validator(g: &Grammar) -> ConstraintValidator<'_> {
        ConstraintValidator::new(g.format("a").and_then(|f| f.section("s")).expect("section"))
    }

    #[test]
    fn well_formed_layout_is_valid() {
        let g = grammar("mandatory");
        let s = section(
            &g,
            &["Sample Name", "Protocol REF", "Extract Name", "Raw Data File"],
        );
        let report = validator(&g).validate("a_file", &s);
        assert!(report.is_valid());
        assert!(report.is_empty());
    }

    #[test]
    fn cardinality_violation_is_error() {
        let g = grammar("mandatory");
        let s = section(&g, &["Sample Name", "Sample Name", "Raw Data File"]);
        let report = validator(&g).validate("a_file", &s);
        assert!(!report.is_valid());
        assert!(
            report
                .errors()
                .any(|v| v.kind == ViolationKind::Cardinality)
        );
    }

    #[test]
    fn must_be_last_violation_mandatory_vs_advisory() {
        let headers = ["Sample Name", "Raw Data File", "Protocol REF", "Extract Name"];

        let g = grammar("mandatory");
        let report = validator(&g).validate("a_file", &section(&g, &headers));
        let error = report.errors().next().expect("error");
        assert_eq!(error.kind, ViolationKind::Ordering);
        assert_eq!(error.location.column, Some(1));

        let g = grammar("advisory");
        let report = validator(&g).validate("a_file", &section(&g, &headers));
        assert!(report.is_valid());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn strict_mode_escalates_advisory() {
        let g = grammar("advisory");
        let headers = ["Sample Name", "Raw Data File", "Extract Name"];
        let report = validator(&g)
            .strict(true)
            .validate("a_file", &section(&g, &headers));
        assert!(!report.is_valid());
    }

    #[test]
    fn follows_field_requires_earlier_occurrence() {
        let g = grammar("mandatory");
        let s = section(&g, &["Extract Name", "Sample Name", "Raw Data File"]);
        let report = validator(&g).validate("a_file", &s);
        // "Sample Name must be first" is mandatory, "Extract after Sample" advisory.
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn unmatched_headers_are_warnings_unless_disabled() {
        let g = grammar("mandatory");
        let s = section(&g, &["Sample Name", "Colour", "Raw Data File"]);

        let report = validator(&g).validate("a_file", &s);
        assert!(report.is_valid());
        let warning = report.warnings().next().expect("warning");
        assert_eq!(warning.kind, ViolationKind::UnmatchedHeader);
        assert_eq!(warning.location.field.as_deref(), Some("Colour"));

        let quiet = validator(&g).report_unmatched(false).validate("a_file", &s);
        assert!(quiet.is_empty());
    }

    #[test]
    fn first_error_converts_to_structural() {
        let mut report = ValidationReport::new();
        report.error(
            ViolationKind::Ordering,
            Location::section("f", "s"),
            "bad order",
        );
        assert!(matches!(
            report.first_error(),
            Some(IsaError::Structural { .. })
        ));
    }
}
