//! # Mapping Session
//!
//! The run-scoped context of one mapping run: grammar, study, configuration,
//! Object Store, graph, term resolver and the structural report.
//!
//! Nothing here is global. Two sessions in one process never share state.
//!
//! Failure scopes:
//! - A mandatory constraint violation or a split error aborts its section
//! - A structural or missing-value error in a row aborts that row only
//! - Internal errors abort the run

use crate::config::MappingConfig;
use crate::consolidation::consolidate;
use crate::export::{DialectSerializer, ExportTable, FileContext, TableBuilder, WrapperFactory};
use crate::grammar::{FormatDef, Grammar};
use crate::graph::Graph;
use crate::mapper::{
    DeclaredSources, FieldSplitter, RowMapper, SectionContext, SectionLayout, TermResolver,
};
use crate::model::Study;
use crate::store::{ObjectStore, StoredObject};
use crate::tabular::{FormatInstance, FormatSetInstance, SectionInstance};
use crate::validator::{ConstraintValidator, ValidationReport};
use crate::{EntityKind, IsaError, Location};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counters of a mapping call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MappingSummary {
    pub sections: usize,
    pub failed_sections: usize,
    pub rows: usize,
    pub failed_rows: usize,
    pub created_nodes: usize,
    pub created_processings: usize,
}

impl MappingSummary {
    fn absorb(&mut self, other: MappingSummary) {
        self.sections += other.sections;
        self.failed_sections += other.failed_sections;
        self.rows += other.rows;
        self.failed_rows += other.failed_rows;
        self.created_nodes += other.created_nodes;
        self.created_processings += other.created_processings;
    }
}

/// What a finished session hands back.
#[derive(Debug)]
pub struct SessionParts {
    pub graph: Graph,
    pub store: ObjectStore,
    pub report: ValidationReport,
}

/// One mapping run.
pub struct MappingSession<'g> {
    grammar: &'g Grammar,
    study: Study,
    config: MappingConfig,
    store: ObjectStore,
    graph: Graph,
    resolver: Box<dyn TermResolver>,
    report: ValidationReport,
    /// Split layouts, keyed by (file id, section id).
    layouts: BTreeMap<(String, String), SectionLayout>,
}

impl<'g> MappingSession<'g> {
    /// Start a session. Declared protocols and reference sources are
    /// registered in the Object Store.
    pub fn new(grammar: &'g Grammar, study: Study, config: MappingConfig) -> Result<Self, IsaError> {
        let mut store = ObjectStore::new();
        store.declare_study(&study)?;
        let resolver = Box::new(DeclaredSources::from_store(&store));

        tracing::debug!(
            protocols = store.count(EntityKind::Protocol),
            sources = store.count(EntityKind::ReferenceSource),
            "session started"
        );

        Ok(Self {
            grammar,
            study,
            config,
            store,
            graph: Graph::new(),
            resolver,
            report: ValidationReport::new(),
            layouts: BTreeMap::new(),
        })
    }

    /// Replace the ontology term resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Box<dyn TermResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Namespace of accession keys: the study accession or the fallback.
    pub fn namespace(&self) -> &str {
        namespace(&self.study, &self.config)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Validate one section without mapping it.
    pub fn validate_section(
        &self,
        format: &FormatInstance,
        section: &SectionInstance,
    ) -> Result<ValidationReport, IsaError> {
        let def = self
            .format_def(format)?
            .section(&section.section_id)
            .ok_or_else(|| {
                IsaError::Grammar(format!(
                    "format '{}' declares no section '{}'",
                    format.format_id, section.section_id
                ))
            })?;
        Ok(ConstraintValidator::new(def)
            .strict(self.config.strict)
            .report_unmatched(self.config.report_unmatched_headers)
            .validate(&format.file_id, section))
    }

    /// Validate every section of a submission without mapping it.
    pub fn validate_format_set(
        &self,
        set: &FormatSetInstance,
    ) -> Result<ValidationReport, IsaError> {
        let mut report = ValidationReport::new();
        for format in set.in_mapping_order() {
            for section in format.sections() {
                report.merge(self.validate_section(format, section)?);
            }
        }
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Mapping
    // -------------------------------------------------------------------------

    /// Map a whole submission: sample files first, then assay files.
    ///
    /// Failed sections are recorded in the report and skipped.
    pub fn map_format_set(&mut self, set: &FormatSetInstance) -> Result<MappingSummary, IsaError> {
        let mut summary = MappingSummary::default();
        for format in set.in_mapping_order() {
            summary.absorb(self.map_format(format)?);
        }
        tracing::info!(
            sections = summary.sections,
            failed_sections = summary.failed_sections,
            rows = summary.rows,
            failed_rows = summary.failed_rows,
            nodes = self.graph.node_count(),
            processings = self.graph.processing_count(),
            "mapped submission"
        );
        Ok(summary)
    }

    /// Map every section of one file.
    pub fn map_format(&mut self, format: &FormatInstance) -> Result<MappingSummary, IsaError> {
        let mut summary = MappingSummary::default();
        for section in format.sections() {
            match self.map_section(format, section) {
                Ok(mapped) => summary.absorb(mapped),
                Err(e) if is_recoverable(&e) => {
                    tracing::warn!(
                        file = %format.file_id,
                        section = %section.section_id,
                        error = %e,
                        "section not mapped"
                    );
                    summary.sections += 1;
                    summary.failed_sections += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    /// Validate, split and map one section, row by row in file order.
    ///
    /// A section is validated and split once per (file, section); mapping
    /// it again reuses the cached layout and reports nothing new.
    ///
    /// # Errors
    /// - `IsaError::Structural` if a mandatory constraint fails or the layout
    ///   cannot be split; nothing of the section is mapped and the failure is
    ///   recorded in the report
    /// - `IsaError::Grammar` if the grammar does not know the section
    /// - `IsaError::Internal` on a broken store/graph invariant
    pub fn map_section(
        &mut self,
        format: &FormatInstance,
        section: &SectionInstance,
    ) -> Result<MappingSummary, IsaError> {
        let key = (format.file_id.clone(), section.section_id.clone());
        if !self.layouts.contains_key(&key) {
            let validation = self.validate_section(format, section)?;
            let first_error = validation.first_error();
            self.report.merge(validation);
            if let Some(error) = first_error {
                return Err(error);
            }

            let layout = match FieldSplitter::split(&format.file_id, section, &mut self.report) {
                Ok(layout) => layout,
                Err(e) => {
                    self.report.record_failure(&e);
                    return Err(e);
                }
            };
            self.layouts.insert(key.clone(), layout);
        }
        let Some(layout) = self.layouts.get(&key) else {
            return Err(IsaError::Internal(format!(
                "layout of {}/{} missing after split",
                key.0, key.1
            )));
        };

        let mapper = RowMapper::new(
            SectionContext {
                namespace: namespace(&self.study, &self.config),
                file_id: &format.file_id,
                file_role: format.role,
                section_id: &section.section_id,
                study: &self.study,
            },
            layout,
            self.resolver.as_ref(),
        );

        let mut summary = MappingSummary {
            sections: 1,
            ..MappingSummary::default()
        };
        for (row, record) in section.records().iter().enumerate() {
            summary.rows += 1;
            match mapper.map_row(row, record, &mut self.store, &mut self.graph) {
                Ok(outcome) => {
                    summary.created_nodes += outcome.created_nodes;
                    summary.created_processings += outcome.created_processings;
                }
                Err(e) if is_recoverable(&e) => {
                    tracing::warn!(error = %e, "row not mapped");
                    self.report.record_failure(&e);
                    summary.failed_rows += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            file = %format.file_id,
            section = %section.section_id,
            rows = summary.rows,
            failed_rows = summary.failed_rows,
            created_nodes = summary.created_nodes,
            "mapped section"
        );
        Ok(summary)
    }

    /// Fold pooled processings together. Returns how many were removed.
    pub fn consolidate(&mut self) -> Result<usize, IsaError> {
        let merged = consolidate(&mut self.graph)?;
        for m in &merged {
            self.store.rebind(
                EntityKind::Processing,
                &m.accession,
                StoredObject::Processing(m.survivor),
            )?;
        }
        Ok(merged.len())
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Render the part of the graph visible in one file as a table.
    pub fn export_table(&self, context: &FileContext) -> Result<ExportTable, IsaError> {
        TableBuilder::new(WrapperFactory::new(&self.graph, context)).build()
    }

    /// Render one file through a dialect.
    ///
    /// # Errors
    /// Returns `IsaError::Structural` if the dialect cannot express pooling
    /// and a visible processing has several inputs.
    pub fn export_file(
        &self,
        context: &FileContext,
        dialect: &dyn DialectSerializer,
    ) -> Result<Vec<u8>, IsaError> {
        let builder = TableBuilder::new(WrapperFactory::new(&self.graph, context));
        if !dialect.allows_pooling() {
            let pooled = builder.pooled_processings()?;
            if let Some(first) = pooled.first() {
                return Err(IsaError::structural(
                    Location::section(context.file_id(), dialect.name()),
                    format!(
                        "dialect cannot express pooling; processing '{}' has several inputs",
                        first
                    ),
                ));
            }
        }
        let table = builder.build()?;
        let bytes = dialect.serialize(&table)?;
        tracing::info!(
            file = context.file_id(),
            dialect = dialect.name(),
            rows = table.rows.len(),
            bytes = bytes.len(),
            "exported file"
        );
        Ok(bytes)
    }

    /// Finish the run.
    pub fn into_parts(self) -> SessionParts {
        SessionParts {
            graph: self.graph,
            store: self.store,
            report: self.report,
        }
    }

    fn format_def(&self, format: &FormatInstance) -> Result<&'g FormatDef, IsaError> {
        self.grammar.format(&format.format_id).ok_or_else(|| {
            IsaError::Grammar(format!("grammar declares no format '{}'", format.format_id))
        })
    }
}

/// Namespace of accession keys: the study accession or the configured
/// fallback when the accession is blank.
fn namespace<'a>(study: &'a Study, config: &'a MappingConfig) -> &'a str {
    study
        .accession
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(&config.namespace_fallback)
}

fn is_recoverable(error: &IsaError) -> bool {
    matches!(
        error,
        IsaError::Structural { .. } | IsaError::MissingValue { .. }
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::TabDialect;
    use crate::model::Protocol;

    const GRAMMAR: &str = r#"{"formats":[
        {"id":"samples","role":"sample","sections":[{"id":"main","fields":[
            {"id":"Source Name","type":"source"},
            {"id":"Protocol REF","type":"protocol_ref"},
            {"id":"Sample Name","type":"sample","constraints":[
                {"kind":"precedes","target":"nothing","level":"advisory"}]},
            {"id":"Factor Value","type":"factor_value"}]}]},
        {"id":"assay","role":"assay","sections":[{"id":"main","fields":[
            {"id":"Sample Name","type":"sample","constraints":[
                {"kind":"follows","target":"nothing"}]},
            {"id":"Protocol REF","type":"protocol_ref"},
            {"id":"Extract Name","type":"extract"}]}]}]}"#;

    fn grammar() -> Grammar {
        Grammar::from_json_str(GRAMMAR).expect("grammar")
    }

    fn study() -> Study {
        Study::new("S-9")
            .with_protocol(Protocol::new("collection"))
            .with_protocol(Protocol::new("extraction"))
    }

    fn format(
        g: &Grammar,
        format_id: &str,
        file_id: &str,
        headers: &[&str],
        rows: &[&[&str]],
    ) -> FormatInstance {
        let def = g.format(format_id).expect("format");
        let mut instance = FormatInstance::new(def, file_id);
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        instance.push_section(
            SectionInstance::from_rows(
                file_id,
                def.section("main").expect("section"),
                headers,
                rows,
            )
            .expect("parse"),
        );
        instance
    }

    #[test]
    fn protocols_and_sources_are_registered() {
        let g = grammar();
        let session = MappingSession::new(
            &g,
            study().with_term_source("OBI"),
            MappingConfig::default(),
        )
        .expect("session");
        assert!(session.store().is_declared(EntityKind::Protocol, "collection"));
        assert!(session.store().is_declared(EntityKind::ReferenceSource, "OBI"));
        assert_eq!(session.namespace(), "S-9");
    }

    #[test]
    fn namespace_falls_back_to_config() {
        let g = grammar();
        let session =
            MappingSession::new(&g, Study::anonymous(), MappingConfig::default()).expect("session");
        assert_eq!(session.namespace(), "isagraph");
    }

    #[test]
    fn sample_and_assay_files_share_samples() {
        let g = grammar();
        let mut set = FormatSetInstance::new();
        set.push_format(format(
            &g,
            "assay",
            "a_x",
            &["Sample Name", "Protocol REF", "Extract Name"],
            &[&["s1", "extraction", "e1"]],
        ));
        set.push_format(format(
            &g,
            "samples",
            "s_main",
            &["Source Name", "Protocol REF", "Sample Name"],
            &[&["src", "collection", "s1"]],
        ));

        let mut session =
            MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        let summary = session.map_format_set(&set).expect("map");
        assert_eq!(summary.sections, 2);
        assert_eq!(summary.failed_rows, 0);
        assert_eq!(session.graph().node_count(), 3);

        let sample = session
            .graph()
            .node_by_accession("S-9:smp:s_main.2.0")
            .expect("sample keeps the accession of first sight");
        assert!(sample.tags.in_sample_file());
        assert!(sample.tags.in_assay_file("a_x"));
    }

    #[test]
    fn mandatory_violation_aborts_section_and_is_reported() {
        let g = grammar();
        let f = format(
            &g,
            "assay",
            "a_x",
            &["Extract Name", "Sample Name"],
            &[&["e1", "s1"]],
        );
        let mut session =
            MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        let summary = session.map_format(&f).expect("map");
        assert_eq!(summary.failed_sections, 1);
        assert_eq!(session.graph().node_count(), 0);
        assert!(!session.report().is_valid());
    }

    #[test]
    fn advisory_violation_maps_with_warning() {
        let g = grammar();
        let f = format(
            &g,
            "samples",
            "s_main",
            &["Sample Name", "Protocol REF", "Sample Name"],
            &[&["s0", "collection", "s1"]],
        );
        let mut session =
            MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        session.map_format(&f).expect("map");
        assert!(session.report().is_valid());
        assert_eq!(session.graph().node_count(), 2);

        let mut strict =
            MappingSession::new(&g, study(), MappingConfig::default().with_strict(true))
                .expect("session");
        let summary = strict.map_format(&f).expect("map");
        assert_eq!(summary.failed_sections, 1);
    }

    #[test]
    fn remapping_a_section_reports_its_warnings_once() {
        let g = grammar();
        let f = format(
            &g,
            "samples",
            "s_main",
            &["Sample Name", "Protocol REF", "Sample Name"],
            &[&["s0", "collection", "s1"]],
        );
        let mut session =
            MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        session.map_format(&f).expect("first");
        let warnings = session.report().len();
        assert!(warnings > 0);

        let again = session.map_format(&f).expect("second");
        assert_eq!(session.report().len(), warnings);
        assert_eq!(again.created_nodes, 0);
    }

    #[test]
    fn failing_row_is_skipped_and_reported() {
        let g = grammar();
        let f = format(
            &g,
            "assay",
            "a_x",
            &["Sample Name", "Protocol REF", "Extract Name"],
            &[&["s1", "lysis", "e1"], &["s2", "extraction", "e2"]],
        );
        let mut session =
            MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        let summary = session.map_format(&f).expect("map");
        assert_eq!(summary.failed_rows, 1);
        assert_eq!(session.graph().node_count(), 2);
        let failure = session.report().errors().next().expect("error");
        assert_eq!(failure.location.row, Some(0));
    }

    #[test]
    fn consolidation_keeps_remapping_idempotent() {
        let g = grammar();
        let f = format(
            &g,
            "samples",
            "s_main",
            &["Source Name", "Protocol REF", "Sample Name"],
            &[&["a", "collection", "pool"], &["b", "collection", "pool"]],
        );
        let mut session =
            MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        session.map_format(&f).expect("map");
        assert_eq!(session.consolidate().expect("consolidate"), 1);
        session.map_format(&f).expect("remap");
        assert_eq!(session.graph().processing_count(), 1);

        let pooled = TabDialect::new().without_pooling();
        let result = session.export_file(&FileContext::Sample("s_main".into()), &pooled);
        assert!(matches!(result, Err(IsaError::Structural { .. })));
        let bytes = session
            .export_file(&FileContext::Sample("s_main".into()), &TabDialect::new())
            .expect("export");
        assert_eq!(String::from_utf8_lossy(&bytes).lines().count(), 3);
    }

    #[test]
    fn into_parts_hands_back_the_graph() {
        let g = grammar();
        let session = MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        let parts = session.into_parts();
        assert_eq!(parts.graph.node_count(), 0);
        assert!(parts.report.is_empty());
        assert_eq!(parts.store.count(EntityKind::Protocol), 2);
    }
}
