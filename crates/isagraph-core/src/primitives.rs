//! # Fixed Primitives
//!
//! Hardcoded constants of the transform: identifier separators, the
//! processing namespace tag, the fixed qualifier headers and snapshot
//! format markers. These are compiled in and immutable at runtime.

/// Separator between namespace segments of an identifier.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Separator between parts within one identifier segment.
pub const SEGMENT_SEPARATOR: char = '.';

/// Role tag of processing accessions.
pub const PROCESSING_TAG: &str = "proc";

/// Namespace used when the study declares no accession.
pub const DEFAULT_NAMESPACE: &str = "isagraph";

/// Ordering-constraint sentinel meaning "no field" (first / last position).
pub const NOTHING_SENTINEL: &str = "nothing";

// =============================================================================
// QUALIFIER HEADERS
// =============================================================================

/// Header of the unit column following a quantity.
pub const UNIT_HEADER: &str = "Unit";

/// Header of the ontology reference-source column.
pub const TERM_SOURCE_HEADER: &str = "Term Source REF";

/// Header of the ontology accession column.
pub const TERM_ACCESSION_HEADER: &str = "Term Accession Number";

/// Header of protocol reference columns.
pub const PROTOCOL_REF_HEADER: &str = "Protocol REF";

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the graph snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"ISAG";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Maximum number of columns accepted in one section.
pub const MAX_SECTION_COLUMNS: usize = 4096;

/// Maximum length of a single cell value.
pub const MAX_CELL_LENGTH: usize = 65536;

/// Maximum depth of an export path, bounding malformed (cyclic) graphs.
pub const MAX_EXPORT_PATH_LENGTH: usize = 512;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"ISAG");
    }

    #[test]
    fn separators_are_distinct() {
        assert_ne!(NAMESPACE_SEPARATOR, SEGMENT_SEPARATOR);
    }
}
