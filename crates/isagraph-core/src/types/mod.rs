//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the transform:
//! - Arena identifiers (`NodeId`, `ProcessingId`, `TermId`)
//! - Vertex and hyperedge kinds (`NodeKind`, `ProcessingKind`)
//! - Object Store entity kinds (`EntityKind`)
//! - Error types (`IsaError`, `Location`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! collections. Identifiers are handed out sequentially within one run and are
//! never reused.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA IDENTIFIERS
// =============================================================================

/// Identifier of a node (Material or Data vertex) in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of a processing hyperedge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessingId(pub u64);

/// Identifier of a resolved ontology term in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u64);

/// A reference to either kind of graph element.
///
/// Ordering puts every node before every processing, which is only used to
/// key maps; traversal order is always by accession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VertexRef {
    Node(NodeId),
    Processing(ProcessingId),
}

// =============================================================================
// KINDS
// =============================================================================

/// The two kinds of pipeline vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A biological material (source, sample, extract, ...).
    Material,
    /// A data artifact (raw data file, derived data file, ...).
    Data,
}

/// Processing subtype, determined by the kinds of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessingKind {
    /// material -> material
    Transformation,
    /// material -> data
    Acquisition,
    /// data -> data
    DataProcessing,
}

impl ProcessingKind {
    /// Resolve the subtype from the endpoint kinds.
    ///
    /// Returns `None` for data -> material, which no protocol can produce.
    #[must_use]
    pub fn from_endpoints(input: NodeKind, output: NodeKind) -> Option<Self> {
        match (input, output) {
            (NodeKind::Material, NodeKind::Material) => Some(Self::Transformation),
            (NodeKind::Material, NodeKind::Data) => Some(Self::Acquisition),
            (NodeKind::Data, NodeKind::Data) => Some(Self::DataProcessing),
            (NodeKind::Data, NodeKind::Material) => None,
        }
    }
}

/// Entity kinds under which canonical objects are kept in the Object Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Material,
    Data,
    Processing,
    Protocol,
    OntologyTerm,
    ReferenceSource,
}

impl From<NodeKind> for EntityKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Material => Self::Material,
            NodeKind::Data => Self::Data,
        }
    }
}

// =============================================================================
// ERROR CONTEXT
// =============================================================================

/// Where in a submission an error or violation was found.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// File-local identifier of the format instance.
    pub file: String,
    /// Section identifier.
    pub section: String,
    /// Field identifier or raw header, if the problem is tied to a column.
    pub field: Option<String>,
    /// Zero-based column index.
    pub column: Option<usize>,
    /// Zero-based record index.
    pub row: Option<usize>,
}

impl Location {
    /// Create a section-level location.
    #[must_use]
    pub fn section(file: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            section: section.into(),
            ..Self::default()
        }
    }

    /// Attach a field and its column.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, column: usize) -> Self {
        self.field = Some(field.into());
        self.column = Some(column);
        self
    }

    /// Attach a record index.
    #[must_use]
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file, self.section)?;
        let mut parts = Vec::new();
        if let Some(field) = &self.field {
            parts.push(format!("field '{}'", field));
        }
        if let Some(column) = self.column {
            parts.push(format!("column {}", column));
        }
        if let Some(row) = self.row {
            parts.push(format!("row {}", row));
        }
        if !parts.is_empty() {
            write!(f, " [{}]", parts.join(", "))?;
        }
        Ok(())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while loading, validating, mapping or exporting.
///
/// - Structural and missing-value errors abort the current section or row.
/// - Internal errors signal a defect in the transform and abort the run.
#[derive(Debug, Error)]
pub enum IsaError {
    /// The column layout violates a mandatory grammar constraint.
    #[error("Structural error in {location}: {message}")]
    Structural { location: Location, message: String },

    /// A required reference (protocol, study, ontology source) cannot be resolved.
    #[error("Missing value in {location}: {message}")]
    MissingValue { location: Location, message: String },

    /// An invariant of the transform itself was violated.
    #[error("Internal consistency error: {0}")]
    Internal(String),

    /// The grammar definition is malformed.
    #[error("Grammar error: {0}")]
    Grammar(String),

    /// The mapping configuration is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred (only raised by callers of the core).
    #[error("I/O error: {0}")]
    IoError(String),
}

impl IsaError {
    /// Shorthand for a structural error.
    pub fn structural(location: Location, message: impl Into<String>) -> Self {
        Self::Structural {
            location,
            message: message.into(),
        }
    }

    /// Shorthand for a missing-value error.
    pub fn missing(location: Location, message: impl Into<String>) -> Self {
        Self::MissingValue {
            location,
            message: message.into(),
        }
    }

    /// Location of the error, when it is tied to the submission.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Structural { location, .. } | Self::MissingValue { location, .. } => {
                Some(location)
            }
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_kind_from_endpoints() {
        assert_eq!(
            ProcessingKind::from_endpoints(NodeKind::Material, NodeKind::Material),
            Some(ProcessingKind::Transformation)
        );
        assert_eq!(
            ProcessingKind::from_endpoints(NodeKind::Material, NodeKind::Data),
            Some(ProcessingKind::Acquisition)
        );
        assert_eq!(
            ProcessingKind::from_endpoints(NodeKind::Data, NodeKind::Data),
            Some(ProcessingKind::DataProcessing)
        );
        assert_eq!(
            ProcessingKind::from_endpoints(NodeKind::Data, NodeKind::Material),
            None
        );
    }

    #[test]
    fn location_display_includes_context() {
        let loc = Location::section("s_study", "samples")
            .with_field("Protocol REF", 2)
            .with_row(7);
        assert_eq!(
            loc.to_string(),
            "s_study/samples [field 'Protocol REF', column 2, row 7]"
        );

        let bare = Location::section("a_tx", "assay");
        assert_eq!(bare.to_string(), "a_tx/assay");
    }

    #[test]
    fn error_exposes_location() {
        let err = IsaError::structural(Location::section("f", "s"), "bad");
        assert_eq!(err.location().map(|l| l.file.as_str()), Some("f"));
        assert!(IsaError::Internal("x".into()).location().is_none());
    }
}
