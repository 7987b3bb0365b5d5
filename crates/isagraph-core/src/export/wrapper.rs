//! # Export Wrappers
//!
//! Read-only, per-export decorators over graph vertices. A wrapper knows its
//! role in the current file context and renders its payload into ordered
//! column groups.
//!
//! Roles bound traversal:
//! - `Regular`: inputs and outputs
//! - `Start`: outputs only (its upstream belongs to another file)
//! - `End`: inputs only (its downstream belongs to another file)
//! - `Clone`: neither (a vertex already visited on the current path)

use crate::graph::{Graph, Node, Processing};
use crate::grammar::PropertyRole;
use crate::model::{Property, PropertyValue, UnitValue};
use crate::primitives::{PROTOCOL_REF_HEADER, TERM_ACCESSION_HEADER, TERM_SOURCE_HEADER, UNIT_HEADER};
use crate::{IsaError, NodeKind, ProcessingId, TermId, VertexRef};

// =============================================================================
// CONTEXT & ROLE
// =============================================================================

/// The file being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContext {
    /// A study sample file.
    Sample(String),
    /// An assay file.
    Assay(String),
}

impl FileContext {
    pub fn file_id(&self) -> &str {
        match self {
            Self::Sample(file) | Self::Assay(file) => file,
        }
    }

    /// Whether a node belongs to the file being rendered.
    #[must_use]
    pub fn contains(&self, node: &Node) -> bool {
        match self {
            Self::Sample(file) => node.tags.sample_files.contains(file),
            Self::Assay(file) => node.tags.in_assay_file(file),
        }
    }

    /// Whether a processing produces at least one node of this file.
    fn receives(&self, graph: &Graph, processing: ProcessingId) -> bool {
        graph.processing(processing).is_some_and(|p| {
            p.outputs()
                .iter()
                .filter_map(|o| graph.node(*o))
                .any(|n| self.contains(n))
        })
    }

    /// A sample-file node continued by an assay is an end point only when
    /// none of its downstream processings stays in the sample file.
    fn role_of(&self, graph: &Graph, node: &Node) -> WrapperRole {
        match self {
            Self::Sample(_)
                if !node.tags.assay_files.is_empty()
                    && !node.downstream().iter().any(|p| self.receives(graph, *p)) =>
            {
                WrapperRole::End
            }
            Self::Assay(file) if node.tags.in_sample_file() && node.tags.in_assay_file(file) => {
                WrapperRole::Start
            }
            _ => WrapperRole::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WrapperRole {
    Regular,
    Clone,
    Start,
    End,
}

impl WrapperRole {
    #[must_use]
    pub fn follows_inputs(&self) -> bool {
        matches!(self, Self::Regular | Self::End)
    }

    #[must_use]
    pub fn follows_outputs(&self) -> bool {
        matches!(self, Self::Regular | Self::Start)
    }
}

// =============================================================================
// COLUMN GROUPS
// =============================================================================

/// An ontology reference rendered after a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCells {
    pub source: String,
    pub accession: String,
}

/// A unit rendered after a quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCells {
    pub label: String,
    pub term: Option<TermCells>,
}

/// One header with its value and optional unit and term columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroup {
    pub header: String,
    pub value: String,
    pub unit: Option<UnitCells>,
    pub term: Option<TermCells>,
}

impl ColumnGroup {
    fn plain(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
            unit: None,
            term: None,
        }
    }

    /// Flatten into (header, value) columns.
    #[must_use]
    pub fn columns(&self) -> Vec<(String, String)> {
        fn push_term(columns: &mut Vec<(String, String)>, term: &TermCells) {
            columns.push((TERM_SOURCE_HEADER.to_string(), term.source.clone()));
            columns.push((TERM_ACCESSION_HEADER.to_string(), term.accession.clone()));
        }

        let mut columns = vec![(self.header.clone(), self.value.clone())];
        if let Some(unit) = &self.unit {
            columns.push((UNIT_HEADER.to_string(), unit.label.clone()));
            if let Some(term) = &unit.term {
                push_term(&mut columns, term);
            }
        }
        if let Some(term) = &self.term {
            push_term(&mut columns, term);
        }
        columns
    }
}

// =============================================================================
// EXPORT VERTEX
// =============================================================================

/// A wrapped node or processing.
#[derive(Debug, Clone)]
pub struct ExportVertex<'g> {
    pub vertex: VertexRef,
    pub role: WrapperRole,
    /// `Material`, `Data` or `Processing`.
    pub discriminator: &'static str,
    pub groups: Vec<ColumnGroup>,
    graph: &'g Graph,
    context: &'g FileContext,
}

impl<'g> ExportVertex<'g> {
    /// Accession of the wrapped vertex.
    pub fn accession(&self) -> &'g str {
        self.graph.accession(self.vertex).unwrap_or_default()
    }

    /// The same vertex as a clone: rendered, never traversed.
    #[must_use]
    pub fn detached(mut self) -> Self {
        self.role = WrapperRole::Clone;
        self
    }

    /// Upstream neighbours visible in this context, by accession.
    #[must_use]
    pub fn inputs(&self) -> Vec<VertexRef> {
        if !self.role.follows_inputs() {
            return Vec::new();
        }
        self.graph
            .inputs(self.vertex)
            .into_iter()
            .filter(|v| self.in_scope(*v))
            .collect()
    }

    /// Downstream neighbours visible in this context, by accession.
    ///
    /// A processing is only followed if one of its outputs belongs to the
    /// file being rendered.
    #[must_use]
    pub fn outputs(&self) -> Vec<VertexRef> {
        if !self.role.follows_outputs() {
            return Vec::new();
        }
        self.graph
            .outputs(self.vertex)
            .into_iter()
            .filter(|v| self.in_scope(*v))
            .collect()
    }

    fn in_scope(&self, vertex: VertexRef) -> bool {
        match vertex {
            VertexRef::Node(id) => self
                .graph
                .node(id)
                .is_some_and(|n| self.context.contains(n)),
            VertexRef::Processing(id) => self.context.receives(self.graph, id),
        }
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Builds wrappers for one export run.
#[derive(Debug, Clone, Copy)]
pub struct WrapperFactory<'g> {
    graph: &'g Graph,
    context: &'g FileContext,
}

impl<'g> WrapperFactory<'g> {
    #[must_use]
    pub fn new(graph: &'g Graph, context: &'g FileContext) -> Self {
        Self { graph, context }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn context(&self) -> &'g FileContext {
        self.context
    }

    /// Wrap a vertex.
    ///
    /// # Errors
    /// Returns `IsaError::Internal` for a vertex that is not in the graph.
    pub fn wrap(&self, vertex: VertexRef) -> Result<ExportVertex<'g>, IsaError> {
        match vertex {
            VertexRef::Node(id) => {
                let node = self
                    .graph
                    .node(id)
                    .ok_or_else(|| IsaError::Internal(format!("node {:?} not in graph", id)))?;
                Ok(self.vertex(
                    vertex,
                    self.context.role_of(self.graph, node),
                    match node.kind {
                        NodeKind::Material => "Material",
                        NodeKind::Data => "Data",
                    },
                    self.node_groups(node),
                ))
            }
            VertexRef::Processing(id) => {
                let processing = self.graph.processing(id).ok_or_else(|| {
                    IsaError::Internal(format!("processing {:?} not in graph", id))
                })?;
                Ok(self.vertex(
                    vertex,
                    WrapperRole::Regular,
                    "Processing",
                    self.processing_groups(processing),
                ))
            }
        }
    }

    fn vertex(
        &self,
        vertex: VertexRef,
        role: WrapperRole,
        discriminator: &'static str,
        groups: Vec<ColumnGroup>,
    ) -> ExportVertex<'g> {
        ExportVertex {
            vertex,
            role,
            discriminator,
            groups,
            graph: self.graph,
            context: self.context,
        }
    }

    fn node_groups(&self, node: &Node) -> Vec<ColumnGroup> {
        let drop_factors =
            matches!(self.context, FileContext::Assay(_)) && node.tags.in_sample_file();
        let properties = node
            .entity
            .properties
            .iter()
            .filter(|p| !(drop_factors && p.role == PropertyRole::FactorValue));

        let mut groups = vec![ColumnGroup::plain(
            node.entity.node_type.header(),
            node.entity.name.clone(),
        )];
        groups.extend(self.property_groups(properties));
        groups
    }

    fn processing_groups(&self, processing: &Processing) -> Vec<ColumnGroup> {
        let mut groups = Vec::new();
        for application in &processing.protocols {
            groups.push(ColumnGroup::plain(
                PROTOCOL_REF_HEADER,
                application.protocol.clone(),
            ));
            groups.extend(self.property_groups(application.properties.iter()));
        }
        groups
    }

    /// Properties ordered by role, then display order, then label.
    fn property_groups<'p>(&self, properties: impl Iterator<Item = &'p Property>) -> Vec<ColumnGroup> {
        let mut sorted: Vec<&Property> = properties.collect();
        sorted.sort_by(|a, b| {
            a.role
                .rank()
                .cmp(&b.role.rank())
                .then(a.order.cmp(&b.order))
                .then_with(|| a.label.cmp(&b.label))
        });
        sorted.into_iter().map(|p| self.property_group(p)).collect()
    }

    fn property_group(&self, property: &Property) -> ColumnGroup {
        let header = match (property.role, &property.label) {
            (role, Some(label)) if role.is_qualified() => {
                format!("{}[{}]", role.header_family(), label)
            }
            (PropertyRole::Annotation, Some(label)) => label.clone(),
            (role, _) => role.header_family().to_string(),
        };
        match &property.value {
            PropertyValue::Plain(value) => ColumnGroup::plain(header, value.clone()),
            PropertyValue::Term(id) => {
                let (label, term) = self.term_cells(*id);
                ColumnGroup {
                    header,
                    value: label,
                    unit: None,
                    term: Some(term),
                }
            }
            PropertyValue::Quantity { value, unit } => {
                let unit = match unit {
                    UnitValue::Plain(label) => UnitCells {
                        label: label.clone(),
                        term: None,
                    },
                    UnitValue::Term(id) => {
                        let (label, term) = self.term_cells(*id);
                        UnitCells {
                            label,
                            term: Some(term),
                        }
                    }
                };
                ColumnGroup {
                    header,
                    value: value.clone(),
                    unit: Some(unit),
                    term: None,
                }
            }
        }
    }

    fn term_cells(&self, id: TermId) -> (String, TermCells) {
        match self.graph.term(id) {
            Some(term) => (
                term.label.clone(),
                TermCells {
                    source: term.source.clone().unwrap_or_default(),
                    accession: term.accession.clone().unwrap_or_default(),
                },
            ),
            None => (
                String::new(),
                TermCells {
                    source: String::new(),
                    accession: String::new(),
                },
            ),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
