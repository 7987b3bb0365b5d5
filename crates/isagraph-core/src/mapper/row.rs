//! # Row Mapping
//!
//! Maps one record of a split section into graph structure: one processing
//! per adjacent node pair, chained left to right, so the output node of one
//! step is the input node of the next.
//!
//! A row is mapped in two passes. The planning pass reads every cell,
//! resolves protocols and terms and checks endpoint kinds without touching
//! the graph. Only a fully planned row is applied, so a failing row leaves
//! the store and the graph unchanged.

use super::split::{PropertyColumn, SectionLayout, ValueShape};
use super::terms::{TermRequest, TermResolver};
use super::{node_accession, node_identity_key, processing_accession, processing_column_id};
use crate::grammar::{FileRole, NodeType, PropertyRole};
use crate::graph::Graph;
use crate::model::{
    Entity, OntologyTerm, Property, PropertyValue, ProtocolApplication, Study, UnitValue,
};
use crate::store::{ObjectStore, StoredObject};
use crate::tabular::Record;
use crate::{EntityKind, IsaError, Location, NodeId, ProcessingId, ProcessingKind, TermId};

// =============================================================================
// CONTEXT
// =============================================================================

/// Where the rows being mapped come from.
#[derive(Debug, Clone, Copy)]
pub struct SectionContext<'a> {
    /// Study accession or the configured fallback.
    pub namespace: &'a str,
    pub file_id: &'a str,
    pub file_role: FileRole,
    pub section_id: &'a str,
    pub study: &'a Study,
}

impl SectionContext<'_> {
    fn location(&self, row: usize) -> Location {
        Location::section(self.file_id, self.section_id).with_row(row)
    }
}

/// What one mapped row produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowOutcome {
    /// Endpoint nodes in layout order.
    pub nodes: Vec<NodeId>,
    /// Processings in layout order.
    pub processings: Vec<ProcessingId>,
    pub created_nodes: usize,
    pub created_processings: usize,
}

// =============================================================================
// PLAN
// =============================================================================

enum PlannedUnit {
    Plain(String),
    Term(OntologyTerm),
}

enum PlannedValue {
    Plain(String),
    Term(OntologyTerm),
    Quantity { value: String, unit: PlannedUnit },
}

struct PlannedProperty {
    role: PropertyRole,
    label: Option<String>,
    order: usize,
    value: PlannedValue,
}

struct PlannedNode {
    node_type: NodeType,
    column: usize,
    name: String,
    properties: Vec<PlannedProperty>,
}

struct PlannedApplication {
    protocol: String,
    properties: Vec<PlannedProperty>,
}

struct PlannedStep {
    kind: ProcessingKind,
    input_column: usize,
    output_column: usize,
    protocols: Vec<PlannedApplication>,
}

struct RowPlan {
    nodes: Vec<PlannedNode>,
    steps: Vec<PlannedStep>,
}

// =============================================================================
// ROW MAPPER
// =============================================================================

/// Maps the records of one section.
pub struct RowMapper<'a> {
    context: SectionContext<'a>,
    layout: &'a SectionLayout,
    resolver: &'a dyn TermResolver,
}

impl<'a> RowMapper<'a> {
    #[must_use]
    pub fn new(
        context: SectionContext<'a>,
        layout: &'a SectionLayout,
        resolver: &'a dyn TermResolver,
    ) -> Self {
        Self {
            context,
            layout,
            resolver,
        }
    }

    /// Map one record.
    ///
    /// # Errors
    /// - `IsaError::MissingValue` for an undeclared protocol or term source
    /// - `IsaError::Structural` for a data node feeding a material node
    /// - `IsaError::Internal` if the store and the graph disagree
    pub fn map_row(
        &self,
        row: usize,
        record: &Record,
        store: &mut ObjectStore,
        graph: &mut Graph,
    ) -> Result<RowOutcome, IsaError> {
        let plan = self.plan(row, record, store)?;
        let outcome = self.apply(row, plan, store, graph)?;
        tracing::debug!(
            file = self.context.file_id,
            row,
            nodes = outcome.nodes.len(),
            processings = outcome.processings.len(),
            created_nodes = outcome.created_nodes,
            "mapped row"
        );
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Planning
    // -------------------------------------------------------------------------

    fn plan(&self, row: usize, record: &Record, store: &ObjectStore) -> Result<RowPlan, IsaError> {
        let location = self.context.location(row);

        let mut nodes = Vec::with_capacity(self.layout.boundaries().len());
        for mapper in self.layout.nodes() {
            let node_type = mapper.node_type().ok_or_else(|| {
                IsaError::Internal(format!("boundary at column {} is not a node", mapper.column))
            })?;
            nodes.push(PlannedNode {
                node_type,
                column: mapper.column,
                name: record.get(mapper.column).trim().to_string(),
                properties: self.plan_properties(&mapper.properties, record, &location)?,
            });
        }

        let mut steps = Vec::with_capacity(nodes.len().saturating_sub(1));
        for step in self.layout.steps() {
            let (Some(input), Some(output)) = (step.input.node_type(), step.output.node_type())
            else {
                return Err(IsaError::structural(
                    location.clone().with_field(&step.input.header, step.input.column),
                    "mapper run must start and end with a node column",
                ));
            };
            let kind = ProcessingKind::from_endpoints(input.kind(), output.kind()).ok_or_else(
                || {
                    IsaError::structural(
                        location
                            .clone()
                            .with_field(&step.output.header, step.output.column),
                        format!(
                            "'{}' is a data node and cannot produce material '{}'",
                            step.input.header, step.output.header
                        ),
                    )
                },
            )?;

            let mut protocols = Vec::with_capacity(step.protocols.len());
            for column in step.protocols {
                let name = record.get(column.column).trim();
                if name.is_empty() {
                    continue;
                }
                if !store.is_declared(EntityKind::Protocol, name) {
                    return Err(IsaError::missing(
                        location.clone().with_field(&column.header, column.column),
                        format!("protocol '{}' is not declared by the study", name),
                    ));
                }
                let protocol = self.context.study.protocol(name).ok_or_else(|| {
                    IsaError::Internal(format!(
                        "protocol '{}' is declared in the store but not in the study",
                        name
                    ))
                })?;

                let mut properties = self.plan_properties(&column.properties, record, &location)?;
                for property in &mut properties {
                    if property.role == PropertyRole::ParameterValue {
                        property.order = property
                            .label
                            .as_deref()
                            .and_then(|label| protocol.parameter_index(label))
                            .unwrap_or(protocol.parameters.len() + property.order);
                    }
                }
                properties.sort_by_key(|p| p.order);

                protocols.push(PlannedApplication {
                    protocol: protocol.name.clone(),
                    properties,
                });
            }

            steps.push(PlannedStep {
                kind,
                input_column: step.input.column,
                output_column: step.output.column,
                protocols,
            });
        }

        Ok(RowPlan { nodes, steps })
    }

    fn plan_properties(
        &self,
        columns: &[PropertyColumn],
        record: &Record,
        location: &Location,
    ) -> Result<Vec<PlannedProperty>, IsaError> {
        let mut properties = Vec::with_capacity(columns.len());
        for column in columns {
            let value = record.get(column.column).trim();
            if value.is_empty() {
                continue;
            }
            let at = location.clone().with_field(
                column.label.as_deref().unwrap_or(column.role.header_family()),
                column.column,
            );
            let cell = |c: Option<usize>| c.map(|c| record.get(c).trim()).filter(|v| !v.is_empty());

            let value = match column.shape {
                ValueShape::Plain => PlannedValue::Plain(value.to_string()),
                ValueShape::Term { source, accession } => {
                    PlannedValue::Term(self.resolver.resolve_term(&TermRequest {
                        label: value,
                        source: cell(source),
                        accession: cell(accession),
                        location: &at,
                    })?)
                }
                ValueShape::Quantity {
                    unit,
                    unit_source,
                    unit_accession,
                } => match cell(Some(unit)) {
                    None => PlannedValue::Plain(value.to_string()),
                    Some(label) if unit_source.is_none() && unit_accession.is_none() => {
                        PlannedValue::Quantity {
                            value: value.to_string(),
                            unit: PlannedUnit::Plain(label.to_string()),
                        }
                    }
                    Some(label) => PlannedValue::Quantity {
                        value: value.to_string(),
                        unit: PlannedUnit::Term(self.resolver.resolve_term(&TermRequest {
                            label,
                            source: cell(unit_source),
                            accession: cell(unit_accession),
                            location: &at,
                        })?),
                    },
                },
            };

            properties.push(PlannedProperty {
                role: column.role,
                label: column.label.clone(),
                order: column.column,
                value,
            });
        }
        Ok(properties)
    }

    // -------------------------------------------------------------------------
    // Applying
    // -------------------------------------------------------------------------

    fn apply(
        &self,
        row: usize,
        plan: RowPlan,
        store: &mut ObjectStore,
        graph: &mut Graph,
    ) -> Result<RowOutcome, IsaError> {
        let ctx = &self.context;
        let mut outcome = RowOutcome::default();

        for planned in plan.nodes {
            let accession =
                node_accession(ctx.namespace, planned.node_type, ctx.file_id, planned.column, row);
            let key = node_identity_key(ctx.namespace, planned.node_type, &planned.name, &accession);
            let kind = EntityKind::from(planned.node_type.kind());
            let entity = Entity::new(planned.name, planned.node_type);

            let (object, created) = store.lookup_or_insert_with(kind, &key, || {
                Ok(StoredObject::Node(graph.add_node(accession, entity)))
            })?;
            let StoredObject::Node(id) = object else {
                return Err(IsaError::Internal(format!(
                    "store key '{}' is not bound to a node",
                    key
                )));
            };

            let properties = intern_properties(planned.properties, store, graph)?;
            let node = graph
                .node_mut(id)
                .ok_or_else(|| IsaError::Internal(format!("node {:?} missing from graph", id)))?;
            let added = node.entity.merge_properties(properties);
            match ctx.file_role {
                FileRole::Sample => node.tags.sample_files.insert(ctx.file_id.to_string()),
                FileRole::Assay => node.tags.assay_files.insert(ctx.file_id.to_string()),
            };

            if created {
                outcome.created_nodes += 1;
            } else {
                tracing::debug!(key = %key, added, "reused node");
            }
            outcome.nodes.push(id);
        }

        for (i, step) in plan.steps.into_iter().enumerate() {
            let (Some(&input), Some(&output)) = (outcome.nodes.get(i), outcome.nodes.get(i + 1))
            else {
                return Err(IsaError::Internal(format!(
                    "step {} of row {} has no endpoint nodes",
                    i, row
                )));
            };

            let accession = processing_accession(
                ctx.namespace,
                ctx.file_id,
                step.input_column,
                step.output_column,
                row,
            );
            let column_id =
                processing_column_id(ctx.namespace, ctx.file_id, step.input_column, step.output_column);

            let mut protocols = Vec::with_capacity(step.protocols.len());
            for application in step.protocols {
                protocols.push(ProtocolApplication {
                    protocol: application.protocol,
                    properties: intern_properties(application.properties, store, graph)?,
                });
            }

            let (object, created) =
                store.lookup_or_insert_with(EntityKind::Processing, &accession, || {
                    Ok(StoredObject::Processing(graph.add_processing(
                        accession.clone(),
                        step.kind,
                        column_id,
                        row,
                        protocols,
                    )))
                })?;
            let StoredObject::Processing(id) = object else {
                return Err(IsaError::Internal(format!(
                    "store key '{}' is not bound to a processing",
                    accession
                )));
            };

            graph.link_input(id, input)?;
            graph.link_output(id, output)?;
            if created {
                outcome.created_processings += 1;
            }
            outcome.processings.push(id);
        }

        Ok(outcome)
    }
}

// =============================================================================
// TERM INTERNING
// =============================================================================

fn intern_term(
    term: OntologyTerm,
    store: &mut ObjectStore,
    graph: &mut Graph,
) -> Result<TermId, IsaError> {
    let key = term.store_key();
    let (object, _) = store.lookup_or_insert_with(EntityKind::OntologyTerm, &key, || {
        Ok(StoredObject::Term(graph.add_term(term)))
    })?;
    match object {
        StoredObject::Term(id) => Ok(id),
        other => Err(IsaError::Internal(format!(
            "term key '{}' bound to {:?}",
            key, other
        ))),
    }
}

fn intern_properties(
    planned: Vec<PlannedProperty>,
    store: &mut ObjectStore,
    graph: &mut Graph,
) -> Result<Vec<Property>, IsaError> {
    let mut properties = Vec::with_capacity(planned.len());
    for p in planned {
        let value = match p.value {
            PlannedValue::Plain(text) => PropertyValue::Plain(text),
            PlannedValue::Term(term) => PropertyValue::Term(intern_term(term, store, graph)?),
            PlannedValue::Quantity { value, unit } => PropertyValue::Quantity {
                value,
                unit: match unit {
                    PlannedUnit::Plain(text) => UnitValue::Plain(text),
                    PlannedUnit::Term(term) => UnitValue::Term(intern_term(term, store, graph)?),
                },
            },
        };
        properties.push(Property {
            role: p.role,
            label: p.label,
            value,
            order: p.order,
        });
    }
    Ok(properties)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::mapper::split::FieldSplitter;
    use crate::mapper::terms::DeclaredSources;
    use crate::model::Protocol;
    use crate::tabular::SectionInstance;
    use crate::validator::ValidationReport;
    use crate::{NodeKind, VertexRef};

    const GRAMMAR: &str = r#"{"formats":[{"id":"a","role":"assay","sections":[{"id":"s","fields":[
        {"id":"Sample Name","type":"sample"},
        {"id":"Extract Name","type":"extract"},
        {"id":"Raw Data File","type":"raw_data"},
        {"id":"Derived Data File","type":"derived_data"},
        {"id":"Characteristics","type":"characteristic"},
        {"id":"Protocol REF","type":"protocol_ref"},
        {"id":"Parameter Value","type":"parameter_value"},
        {"id":"Unit","type":"unit"},
        {"id":"Term Source REF","type":"term_source_ref"},
        {"id":"Term Accession Number","type":"term_accession"}]}]}]}"#;

    struct Fixture {
        section: SectionInstance,
        layout: SectionLayout,
        study: Study,
    }

    fn fixture(headers: &[&str], rows: &[&[&str]]) -> Fixture {
        let grammar = Grammar::from_json_str(GRAMMAR).expect("grammar");
        let def = grammar.format("a").and_then(|f| f.section("s")).expect("def");
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        let section = SectionInstance::from_rows("a_f", def, headers, rows).expect("parse");
        let layout =
            FieldSplitter::split("a_f", &section, &mut ValidationReport::new()).expect("split");
        let study = Study::new("S-1")
            .with_protocol(Protocol::new("extraction").with_parameters(["kit", "temperature"]))
            .with_protocol(Protocol::new("sequencing"))
            .with_term_source("OBI");
        Fixture {
            section,
            layout,
            study,
        }
    }

    fn map_all(
        f: &Fixture,
        store: &mut ObjectStore,
        graph: &mut Graph,
    ) -> Result<Vec<RowOutcome>, IsaError> {
        store.declare_study(&f.study)?;
        let resolver = DeclaredSources::from_store(store);
        let mapper = RowMapper::new(
            SectionContext {
                namespace: "S-1",
                file_id: "a_f",
                file_role: FileRole::Assay,
                section_id: "s",
                study: &f.study,
            },
            &f.layout,
            &resolver,
        );
        f.section
            .records()
            .iter()
            .enumerate()
            .map(|(row, record)| mapper.map_row(row, record, store, graph))
            .collect()
    }

    #[test]
    fn chained_steps_share_the_middle_node() {
        let f = fixture(
            &[
                "Sample Name",
                "Protocol REF",
                "Extract Name",
                "Protocol REF",
                "Raw Data File",
            ],
            &[&["s1", "extraction", "e1", "sequencing", "r1.fq"]],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        let outcome = map_all(&f, &mut store, &mut graph).expect("map").remove(0);

        assert_eq!(outcome.nodes.len(), 3);
        assert_eq!(outcome.processings.len(), 2);
        let first = graph.processing(outcome.processings[0]).expect("first");
        let second = graph.processing(outcome.processings[1]).expect("second");
        assert_eq!(first.outputs(), second.inputs());
        assert_eq!(first.kind, ProcessingKind::Transformation);
        assert_eq!(second.kind, ProcessingKind::Acquisition);
        assert_eq!(first.accession, "S-1:proc:a_f.0.2.0");
        assert_eq!(first.column_id, "S-1:proc:a_f.0.2");
        assert_eq!(first.protocols[0].protocol, "extraction");
    }

    #[test]
    fn same_name_across_rows_is_one_node() {
        let f = fixture(
            &["Sample Name", "Protocol REF", "Extract Name"],
            &[&["s1", "extraction", "e1"], &["s1", "extraction", "e2"]],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        let outcomes = map_all(&f, &mut store, &mut graph).expect("map");

        assert_eq!(outcomes[0].nodes[0], outcomes[1].nodes[0]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.processing_count(), 2);
        let sample = graph.node(outcomes[0].nodes[0]).expect("sample");
        assert_eq!(sample.downstream().len(), 2);
        assert!(sample.tags.in_assay_file("a_f"));
        assert_eq!(sample.kind, NodeKind::Material);
    }

    #[test]
    fn empty_names_never_merge() {
        let f = fixture(
            &["Sample Name", "Extract Name"],
            &[&["s1", ""], &["s1", ""]],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        map_all(&f, &mut store, &mut graph).expect("map");
        assert_eq!(graph.node_count(), 3);
        assert!(graph.node_by_accession("S-1:ext:a_f.1.0").is_some());
        assert!(graph.node_by_accession("S-1:ext:a_f.1.1").is_some());
    }

    #[test]
    fn undeclared_protocol_is_missing_value_and_leaves_graph_untouched() {
        let f = fixture(
            &["Sample Name", "Protocol REF", "Extract Name"],
            &[&["s1", "centrifugation", "e1"]],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        let result = map_all(&f, &mut store, &mut graph);
        match result {
            Err(IsaError::MissingValue { location, .. }) => {
                assert_eq!(location.row, Some(0));
                assert_eq!(location.column, Some(1));
            }
            other => assert!(matches!(other, Err(IsaError::MissingValue { .. }))),
        }
        assert_eq!(graph.node_count(), 0);
        assert_eq!(store.count(EntityKind::Material), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn protocol_must_be_registered_in_the_store() {
        let f = fixture(
            &["Sample Name", "Protocol REF", "Extract Name"],
            &[&["s1", "extraction", "e1"]],
        );
        let mut store = ObjectStore::new();
        let resolver = DeclaredSources::default();
        let mapper = RowMapper::new(
            SectionContext {
                namespace: "S-1",
                file_id: "a_f",
                file_role: FileRole::Assay,
                section_id: "s",
                study: &f.study,
            },
            &f.layout,
            &resolver,
        );
        let result = mapper.map_row(0, &f.section.records()[0], &mut store, &mut Graph::new());
        assert!(matches!(result, Err(IsaError::MissingValue { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn data_feeding_material_is_structural() {
        let f = fixture(&["Raw Data File", "Sample Name"], &[&["r.fq", "s1"]]);
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        assert!(matches!(
            map_all(&f, &mut store, &mut graph),
            Err(IsaError::Structural { .. })
        ));
    }

    #[test]
    fn parameters_follow_declaration_order_and_terms_are_shared() {
        let f = fixture(
            &[
                "Sample Name",
                "Characteristics[organism part]",
                "Term Source REF",
                "Protocol REF",
                "Parameter Value[temperature]",
                "Unit",
                "Parameter Value[kit]",
                "Extract Name",
            ],
            &[
                &["s1", "liver", "OBI", "extraction", "4", "celsius", "K-9", "e1"],
                &["s2", "liver", "OBI", "extraction", "4", "celsius", "K-9", "e2"],
            ],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        let outcomes = map_all(&f, &mut store, &mut graph).expect("map");

        assert_eq!(graph.term_count(), 1);
        let p = graph.processing(outcomes[0].processings[0]).expect("p");
        let labels: Vec<_> = p.protocols[0]
            .properties
            .iter()
            .map(|p| p.label.as_deref())
            .collect();
        assert_eq!(labels, vec![Some("kit"), Some("temperature")]);
        assert_eq!(
            p.protocols[0].properties[1].value,
            PropertyValue::Quantity {
                value: "4".into(),
                unit: UnitValue::Plain("celsius".into())
            }
        );
    }

    #[test]
    fn undeclared_term_source_is_missing_value() {
        let f = fixture(
            &["Sample Name", "Characteristics[organism]", "Term Source REF", "Extract Name"],
            &[&["s1", "human", "NCBITaxon", "e1"]],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        assert!(matches!(
            map_all(&f, &mut store, &mut graph),
            Err(IsaError::MissingValue { .. })
        ));
    }

    #[test]
    fn mapping_the_same_rows_twice_is_idempotent() {
        let f = fixture(
            &["Sample Name", "Protocol REF", "Extract Name", "Raw Data File"],
            &[&["s1", "extraction", "e1", "r1"], &["s2", "extraction", "e2", "r2"]],
        );
        let mut store = ObjectStore::new();
        let mut graph = Graph::new();
        map_all(&f, &mut store, &mut graph).expect("first");
        let (nodes, processings) = (graph.node_count(), graph.processing_count());
        let second = map_all(&f, &mut store, &mut graph).expect("second");

        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.processing_count(), processings);
        assert!(second.iter().all(|o| o.created_nodes == 0 && o.created_processings == 0));
        let sample = graph
            .node(second[0].nodes[0])
            .expect("sample");
        assert_eq!(
            graph.outputs(VertexRef::Node(sample.id)).len(),
            1
        );
    }
}
