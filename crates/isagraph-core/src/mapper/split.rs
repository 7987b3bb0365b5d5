//! # Field Splitting
//!
//! Decides, from the column layout alone, where one pipeline node ends and
//! the next begins, and which columns in between describe protocol steps.
//!
//! - Node and protocol columns are mappers
//! - Every other recognized column is owned by the mapper before it
//! - Boundaries index the node mappers; everything between two boundaries is
//!   a protocol mapper

use crate::grammar::{FieldRole, NodeType, Owner, PropertyRole, QualifierRole};
use crate::tabular::{FieldInstance, SectionInstance};
use crate::validator::{ValidationReport, ViolationKind};
use crate::{IsaError, Location};

// =============================================================================
// LAYOUT TYPES
// =============================================================================

/// How the value of a property column is built, decided once per layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// Free text.
    Plain,
    /// Ontology term, with optional source and accession columns.
    Term {
        source: Option<usize>,
        accession: Option<usize>,
    },
    /// Value with a unit column, the unit optionally itself a term.
    Quantity {
        unit: usize,
        unit_source: Option<usize>,
        unit_accession: Option<usize>,
    },
}

/// A property column and the qualifier columns that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyColumn {
    pub role: PropertyRole,
    pub label: Option<String>,
    pub column: usize,
    pub shape: ValueShape,
}

/// What a mapper column starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperKind {
    Node(NodeType),
    Protocol,
}

/// A node or protocol column with the property columns it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperColumn {
    pub kind: MapperKind,
    pub column: usize,
    pub header: String,
    pub properties: Vec<PropertyColumn>,
}

impl MapperColumn {
    #[must_use]
    pub fn node_type(&self) -> Option<NodeType> {
        match self.kind {
            MapperKind::Node(node_type) => Some(node_type),
            MapperKind::Protocol => None,
        }
    }

    fn accepts(&self, role: PropertyRole) -> bool {
        match (role.owner(), self.kind) {
            (Owner::Any, _) => true,
            (Owner::Node, MapperKind::Node(_)) => true,
            (Owner::Protocol, MapperKind::Protocol) => true,
            _ => false,
        }
    }
}

/// One node-to-node step of the layout.
#[derive(Debug, Clone, Copy)]
pub struct Step<'l> {
    pub input: &'l MapperColumn,
    pub output: &'l MapperColumn,
    /// Protocol mappers between the two nodes, in column order.
    pub protocols: &'l [MapperColumn],
}

/// The split layout of one section instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    mappers: Vec<MapperColumn>,
    boundaries: Vec<usize>,
}

impl SectionLayout {
    /// Mapper columns in layout order.
    pub fn mappers(&self) -> &[MapperColumn] {
        &self.mappers
    }

    /// Indices into `mappers()` of the node mappers.
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Node mappers in layout order.
    pub fn nodes(&self) -> impl Iterator<Item = &MapperColumn> {
        self.boundaries.iter().map(|&b| &self.mappers[b])
    }

    /// One step per adjacent boundary pair, left to right.
    pub fn steps(&self) -> impl Iterator<Item = Step<'_>> {
        self.boundaries.windows(2).map(|pair| Step {
            input: &self.mappers[pair[0]],
            output: &self.mappers[pair[1]],
            protocols: &self.mappers[pair[0] + 1..pair[1]],
        })
    }
}

// =============================================================================
// SPLITTER
// =============================================================================

/// Splits a section's columns into alternating node and protocol runs.
pub struct FieldSplitter;

impl FieldSplitter {
    /// Split a section instance.
    ///
    /// Misplaced property columns and orphan qualifiers are recorded as
    /// layout warnings and skipped.
    ///
    /// # Errors
    /// Returns `IsaError::Structural` if the section has no node column, or
    /// its first or last mapper column is a protocol column.
    pub fn split(
        file_id: &str,
        section: &SectionInstance,
        report: &mut ValidationReport,
    ) -> Result<SectionLayout, IsaError> {
        let base = Location::section(file_id, &section.section_id);
        let mut mappers: Vec<MapperColumn> = Vec::new();
        // Property of the last mapper that qualifier columns attach to.
        let mut open_property: Option<usize> = None;

        for field in section.fields() {
            let Some(role) = field.role else {
                tracing::trace!(
                    file = file_id,
                    column = field.column,
                    header = %field.header.raw,
                    "skipping unrecognized column"
                );
                continue;
            };

            match role {
                FieldRole::Node(node_type) => {
                    mappers.push(Self::mapper(field, MapperKind::Node(node_type)));
                    open_property = None;
                }
                FieldRole::Protocol => {
                    mappers.push(Self::mapper(field, MapperKind::Protocol));
                    open_property = None;
                }
                FieldRole::Property(property) => {
                    open_property = None;
                    let Some(owner) = mappers.last_mut() else {
                        report.warn(
                            ViolationKind::Layout,
                            base.clone().with_field(&field.header.raw, field.column),
                            "property column precedes every node column",
                        );
                        continue;
                    };
                    if !owner.accepts(property) {
                        report.warn(
                            ViolationKind::Layout,
                            base.clone().with_field(&field.header.raw, field.column),
                            format!(
                                "property column cannot describe '{}'",
                                owner.header
                            ),
                        );
                        continue;
                    }
                    owner.properties.push(PropertyColumn {
                        role: property,
                        label: Self::label(field, property),
                        column: field.column,
                        shape: ValueShape::Plain,
                    });
                    open_property = Some(owner.properties.len() - 1);
                }
                FieldRole::Qualifier(qualifier) => {
                    let target = open_property.and_then(|i| {
                        mappers
                            .last_mut()
                            .and_then(|m| m.properties.get_mut(i))
                    });
                    let attached = match target {
                        Some(property) => Self::qualify(property, qualifier, field.column),
                        None => false,
                    };
                    if !attached {
                        report.warn(
                            ViolationKind::Layout,
                            base.clone().with_field(&field.header.raw, field.column),
                            "qualifier column has no property to qualify",
                        );
                    }
                }
            }
        }

        let boundaries: Vec<usize> = mappers
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m.kind, MapperKind::Node(_)))
            .map(|(i, _)| i)
            .collect();

        if boundaries.is_empty() {
            return Err(IsaError::structural(
                base,
                "section has no node column",
            ));
        }
        for edge in [mappers.first(), mappers.last()].into_iter().flatten() {
            if edge.kind == MapperKind::Protocol {
                return Err(IsaError::structural(
                    base.with_field(&edge.header, edge.column),
                    "protocol column must sit between two node columns",
                ));
            }
        }

        tracing::debug!(
            file = file_id,
            section = %section.section_id,
            nodes = boundaries.len(),
            protocols = mappers.len() - boundaries.len(),
            "split section layout"
        );

        Ok(SectionLayout {
            mappers,
            boundaries,
        })
    }

    fn mapper(field: &FieldInstance, kind: MapperKind) -> MapperColumn {
        MapperColumn {
            kind,
            column: field.column,
            header: field.header.raw.trim().to_string(),
            properties: Vec::new(),
        }
    }

    fn label(field: &FieldInstance, role: PropertyRole) -> Option<String> {
        match (&field.header.qualifier, role) {
            (Some(qualifier), _) => Some(qualifier.clone()),
            (None, PropertyRole::Annotation) => Some(field.header.name.clone()),
            (None, _) => None,
        }
    }

    /// Attach a qualifier column; false if the slot is taken or illegal.
    fn qualify(property: &mut PropertyColumn, qualifier: QualifierRole, column: usize) -> bool {
        if property.shape == ValueShape::Plain {
            property.shape = match qualifier {
                QualifierRole::Unit => ValueShape::Quantity {
                    unit: column,
                    unit_source: None,
                    unit_accession: None,
                },
                QualifierRole::TermSource => ValueShape::Term {
                    source: Some(column),
                    accession: None,
                },
                QualifierRole::TermAccession => ValueShape::Term {
                    source: None,
                    accession: Some(column),
                },
            };
            return true;
        }
        let slot = match (&mut property.shape, qualifier) {
            (ValueShape::Term { source, .. }, QualifierRole::TermSource) => source,
            (ValueShape::Term { accession, .. }, QualifierRole::TermAccession) => accession,
            (ValueShape::Quantity { unit_source, .. }, QualifierRole::TermSource) => unit_source,
            (ValueShape::Quantity { unit_accession, .. }, QualifierRole::TermAccession) => {
                unit_accession
            }
            _ => return false,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(column);
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
