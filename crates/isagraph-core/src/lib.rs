//! # isagraph-core
//!
//! The deterministic table <-> graph transform for experimental metadata
//! submissions.
//!
//! A grammar describes the files of a submission (sample file, assay files),
//! their sections and the fields a section may carry. Section instances are
//! validated against the grammar, split into node and protocol runs, and
//! mapped row by row into a graph of material and data nodes joined by
//! processings. The reverse direction re-renders the part of the graph a
//! given file describes.
//!
//! ## Architectural Constraints
//!
//! - No async, no network, no file I/O (callers hand in parsed tables)
//! - Deterministic: `BTreeMap`/`BTreeSet` only, no floats, no randomness
//! - Run-scoped: all mutable state lives in a [`MappingSession`]
//! - Closed: node, processing and property kinds are fixed variant sets

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod consolidation;
pub mod export;
pub mod formats;
pub mod grammar;
pub mod graph;
pub mod mapper;
pub mod model;
pub mod primitives;
pub mod session;
pub mod store;
pub mod tabular;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EntityKind, IsaError, Location, NodeId, NodeKind, ProcessingId, ProcessingKind, TermId,
    VertexRef,
};

// =============================================================================
// RE-EXPORTS: Grammar and Instances
// =============================================================================

pub use grammar::{FieldRole, FileRole, Grammar, Level, NodeType, PropertyRole};
pub use tabular::{FormatInstance, FormatSetInstance, Record, SectionInstance};

// =============================================================================
// RE-EXPORTS: Transform
// =============================================================================

pub use config::MappingConfig;
pub use graph::{Graph, Node, Processing};
pub use model::{Entity, OntologyTerm, Property, PropertyValue, Protocol, Study};
pub use session::{MappingSession, MappingSummary, SessionParts};
pub use store::{ObjectStore, StoredObject};
pub use validator::{Severity, ValidationReport, Violation, ViolationKind};

// =============================================================================
// RE-EXPORTS: Export and Formats
// =============================================================================

pub use export::{DialectSerializer, ExportTable, FileContext, TabDialect, WrapperRole};
pub use formats::{GraphSnapshot, SnapshotHeader, graph_from_bytes, graph_to_bytes};
