//! # Forward Mapper
//!
//! Turns validated section instances into graph structure:
//! - `split`: column layout -> node/protocol runs
//! - `row`: one record -> chained processings
//! - `terms`: the ontology term seam the row mapper calls out through
//!
//! Accession keys are built here and nowhere else.

pub mod row;
pub mod split;
pub mod terms;

pub use row::{RowMapper, RowOutcome, SectionContext};
pub use split::{FieldSplitter, MapperColumn, MapperKind, PropertyColumn, SectionLayout, ValueShape};
pub use terms::{DeclaredSources, TermRequest, TermResolver};

use crate::grammar::NodeType;
use crate::primitives::{NAMESPACE_SEPARATOR, PROCESSING_TAG, SEGMENT_SEPARATOR};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// `{ns}:{tag}:{file}.{column}.{row}`
#[must_use]
pub fn node_accession(
    namespace: &str,
    node_type: NodeType,
    file_id: &str,
    column: usize,
    row: usize,
) -> String {
    format!(
        "{ns}{n}{tag}{n}{file}{s}{column}{s}{row}",
        ns = namespace,
        tag = node_type.tag(),
        file = file_id,
        n = NAMESPACE_SEPARATOR,
        s = SEGMENT_SEPARATOR,
    )
}

/// Object Store key of a node: `{ns}:{tag}:{name}`.
///
/// An empty name falls back to the node's accession, so unnamed nodes never
/// merge with each other.
#[must_use]
pub fn node_identity_key(
    namespace: &str,
    node_type: NodeType,
    name: &str,
    accession: &str,
) -> String {
    if name.is_empty() {
        return accession.to_string();
    }
    format!(
        "{ns}{n}{tag}{n}{name}",
        ns = namespace,
        tag = node_type.tag(),
        n = NAMESPACE_SEPARATOR,
    )
}

/// Row-independent identifier of a column pair: `{ns}:proc:{file}.{in}.{out}`.
#[must_use]
pub fn processing_column_id(
    namespace: &str,
    file_id: &str,
    input_column: usize,
    output_column: usize,
) -> String {
    format!(
        "{ns}{n}{tag}{n}{file}{s}{input_column}{s}{output_column}",
        ns = namespace,
        tag = PROCESSING_TAG,
        file = file_id,
        n = NAMESPACE_SEPARATOR,
        s = SEGMENT_SEPARATOR,
    )
}

/// `{ns}:proc:{file}.{in}.{out}.{row}`
#[must_use]
pub fn processing_accession(
    namespace: &str,
    file_id: &str,
    input_column: usize,
    output_column: usize,
    row: usize,
) -> String {
    format!(
        "{}{}{}",
        processing_column_id(namespace, file_id, input_column, output_column),
        SEGMENT_SEPARATOR,
        row
    )
}
