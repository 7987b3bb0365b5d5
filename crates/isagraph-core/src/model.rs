//! # Domain Payloads
//!
//! The entities carried by graph vertices and hyperedges: materials and data
//! artifacts with their properties, protocol applications, and the study
//! context (declared protocols and ontology sources) that mapping resolves
//! references against.

use crate::TermId;
use crate::grammar::{NodeType, PropertyRole};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ONTOLOGY TERMS
// =============================================================================

/// A resolved ontology term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub label: String,
    /// Declared reference source (e.g. `NCBITaxon`).
    pub source: Option<String>,
    /// Accession within the source.
    pub accession: Option<String>,
}

impl OntologyTerm {
    /// Object Store key: `{source}:{accession}:{label}`.
    #[must_use]
    pub fn store_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.source.as_deref().unwrap_or_default(),
            self.accession.as_deref().unwrap_or_default(),
            self.label
        )
    }
}

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// Unit of a quantity: free text or an ontology term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitValue {
    Plain(String),
    Term(TermId),
}

/// The value of a property column, decided once per column layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Free text.
    Plain(String),
    /// A value backed by an ontology term.
    Term(TermId),
    /// A value with a unit.
    Quantity { value: String, unit: UnitValue },
}

/// A property attached to an entity or a protocol application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub role: PropertyRole,
    /// Bracketed qualifier (e.g. `organism`) or, for annotations, the header.
    /// `None` for a qualified column written without brackets.
    pub label: Option<String>,
    pub value: PropertyValue,
    /// Display order; ties are broken on `label` at export.
    pub order: usize,
}

impl Property {
    /// Whether two properties describe the same slot.
    #[must_use]
    pub fn same_slot(&self, other: &Property) -> bool {
        self.role == other.role && self.label == other.label
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Payload of a node: a material or data artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Cell value of the node column (material name or file name).
    pub name: String,
    pub node_type: NodeType,
    pub properties: Vec<Property>,
}

impl Entity {
    #[must_use]
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            properties: Vec::new(),
        }
    }

    /// Append properties whose slot is not filled yet.
    ///
    /// Returns how many were added.
    pub fn merge_properties(&mut self, properties: Vec<Property>) -> usize {
        let mut added = 0;
        for property in properties {
            if !self.properties.iter().any(|p| p.same_slot(&property)) {
                self.properties.push(property);
                added += 1;
            }
        }
        added
    }
}

/// One use of a protocol inside a processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolApplication {
    /// Name of the declared protocol.
    pub protocol: String,
    /// Parameter values, performer, date and comments.
    pub properties: Vec<Property>,
}

// =============================================================================
// STUDY CONTEXT
// =============================================================================

/// A protocol declared by the study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    #[serde(default, rename = "type")]
    pub protocol_type: Option<String>,
    /// Parameter names in declaration order.
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl Protocol {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol_type: None,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, protocol_type: impl Into<String>) -> Self {
        self.protocol_type = Some(protocol_type.into());
        self
    }

    #[must_use]
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Declaration index of a parameter, if declared.
    #[must_use]
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters
            .iter()
            .position(|p| p.eq_ignore_ascii_case(name))
    }
}

/// The study a submission belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    /// Study accession; the configured namespace is used when absent.
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    protocols: BTreeMap<String, Protocol>,
    #[serde(default)]
    term_sources: BTreeSet<String>,
}

impl Study {
    #[must_use]
    pub fn new(accession: impl Into<String>) -> Self {
        Self {
            accession: Some(accession.into()),
            ..Self::default()
        }
    }

    /// A study without an accession.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.declare_protocol(protocol);
        self
    }

    #[must_use]
    pub fn with_term_source(mut self, source: impl Into<String>) -> Self {
        self.term_sources.insert(source.into());
        self
    }

    pub fn declare_protocol(&mut self, protocol: Protocol) {
        self.protocols.insert(protocol.name.clone(), protocol);
    }

    pub fn declare_term_source(&mut self, source: impl Into<String>) {
        self.term_sources.insert(source.into());
    }

    #[must_use]
    pub fn protocol(&self, name: &str) -> Option<&Protocol> {
        self.protocols.get(name)
    }

    pub fn protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    pub fn term_sources(&self) -> impl Iterator<Item = &str> {
        self.term_sources.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_term_source(&self, source: &str) -> bool {
        self.term_sources.contains(source)
    }
}

// =============================================================================
// TESTS
// =============================================================================
