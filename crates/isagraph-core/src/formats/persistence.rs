//! # Graph Snapshot Format
//!
//! Binary snapshot of a mapped graph for the persistence collaborator.
//!
//! Format: Header (5 bytes) + postcard-serialized `GraphSnapshot`.
//! - 4 bytes: Magic ("ISAG")
//! - 1 byte: Version
//!
//! The snapshot is canonical: nodes and processings are ordered by accession
//! and refer to each other by accession, never by arena id, so
//! save -> load -> save is bit-exact.
//!
//! Size and header are validated before the payload is decoded.

use crate::graph::{FileTags, Graph};
use crate::model::{Entity, OntologyTerm, Property, PropertyValue, ProtocolApplication, UnitValue};
use crate::{IsaError, NodeId, ProcessingKind, TermId, primitives};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size, checked before decoding.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The snapshot header precedes all graph data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), IsaError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(IsaError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(IsaError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IsaError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(IsaError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CANONICAL SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub accession: String,
    pub entity: Entity,
    pub tags: FileTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub accession: String,
    pub kind: ProcessingKind,
    pub protocols: Vec<ProtocolApplication>,
    pub column_id: String,
    pub row_order: usize,
    /// Input node accessions, sorted.
    pub inputs: Vec<String>,
    /// Output node accessions, sorted.
    pub outputs: Vec<String>,
}

/// Accession-ordered view of a graph. Term ids index `terms`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub terms: Vec<OntologyTerm>,
    pub nodes: Vec<NodeRecord>,
    pub processings: Vec<ProcessingRecord>,
}

impl GraphSnapshot {
    /// Capture a graph.
    #[must_use]
    pub fn capture(graph: &Graph) -> Self {
        // Term ids are renumbered densely in id order.
        let term_index: BTreeMap<TermId, TermId> = graph
            .terms()
            .enumerate()
            .map(|(i, (id, _))| (id, TermId(i as u64)))
            .collect();
        let terms = graph.terms().map(|(_, t)| t.clone()).collect();

        let accession_of = |id: &NodeId| {
            graph
                .node(*id)
                .map(|n| n.accession.clone())
                .unwrap_or_default()
        };

        let mut nodes: Vec<NodeRecord> = graph
            .nodes()
            .map(|n| {
                let mut entity = n.entity.clone();
                renumber_terms(&mut entity.properties, &term_index);
                NodeRecord {
                    accession: n.accession.clone(),
                    entity,
                    tags: n.tags.clone(),
                }
            })
            .collect();
        nodes.sort_by(|a, b| a.accession.cmp(&b.accession));

        let mut processings: Vec<ProcessingRecord> = graph
            .processings()
            .map(|p| {
                let mut protocols = p.protocols.clone();
                for application in &mut protocols {
                    renumber_terms(&mut application.properties, &term_index);
                }
                let mut inputs: Vec<String> = p.inputs().iter().map(accession_of).collect();
                let mut outputs: Vec<String> = p.outputs().iter().map(accession_of).collect();
                inputs.sort();
                outputs.sort();
                ProcessingRecord {
                    accession: p.accession.clone(),
                    kind: p.kind,
                    protocols,
                    column_id: p.column_id.clone(),
                    row_order: p.row_order,
                    inputs,
                    outputs,
                }
            })
            .collect();
        processings.sort_by(|a, b| a.accession.cmp(&b.accession));

        Self {
            terms,
            nodes,
            processings,
        }
    }

    /// Rebuild a graph.
    ///
    /// # Errors
    /// Returns `IsaError::DeserializationError` for dangling accessions or
    /// term references.
    pub fn restore(self) -> Result<Graph, IsaError> {
        let mut graph = Graph::new();

        let mut term_index = BTreeMap::new();
        for (i, term) in self.terms.into_iter().enumerate() {
            term_index.insert(TermId(i as u64), graph.add_term(term));
        }

        let mut by_accession = BTreeMap::new();
        for record in self.nodes {
            let mut entity = record.entity;
            check_terms(&entity.properties, &term_index)?;
            renumber_terms(&mut entity.properties, &term_index);
            let id = graph.add_node(record.accession.clone(), entity);
            if let Some(node) = graph.node_mut(id) {
                node.tags = record.tags;
            }
            if by_accession.insert(record.accession.clone(), id).is_some() {
                return Err(IsaError::DeserializationError(format!(
                    "duplicate node accession '{}'",
                    record.accession
                )));
            }
        }

        let resolve = |accession: &str| {
            by_accession.get(accession).copied().ok_or_else(|| {
                IsaError::DeserializationError(format!(
                    "processing refers to unknown node '{}'",
                    accession
                ))
            })
        };

        for record in self.processings {
            let mut protocols = record.protocols;
            for application in &mut protocols {
                check_terms(&application.properties, &term_index)?;
                renumber_terms(&mut application.properties, &term_index);
            }
            let id = graph.add_processing(
                record.accession,
                record.kind,
                record.column_id,
                record.row_order,
                protocols,
            );
            for input in &record.inputs {
                graph.link_input(id, resolve(input)?)?;
            }
            for output in &record.outputs {
                graph.link_output(id, resolve(output)?)?;
            }
        }

        Ok(graph)
    }
}

fn term_refs(properties: &[Property]) -> impl Iterator<Item = TermId> + '_ {
    properties.iter().filter_map(|p| match &p.value {
        PropertyValue::Term(id)
        | PropertyValue::Quantity {
            unit: UnitValue::Term(id),
            ..
        } => Some(*id),
        _ => None,
    })
}

fn check_terms(properties: &[Property], index: &BTreeMap<TermId, TermId>) -> Result<(), IsaError> {
    match term_refs(properties).find(|id| !index.contains_key(id)) {
        Some(id) => Err(IsaError::DeserializationError(format!(
            "property refers to unknown term {}",
            id.0
        ))),
        None => Ok(()),
    }
}

fn renumber_terms(properties: &mut [Property], index: &BTreeMap<TermId, TermId>) {
    for property in properties {
        match &mut property.value {
            PropertyValue::Term(id)
            | PropertyValue::Quantity {
                unit: UnitValue::Term(id),
                ..
            } => {
                if let Some(new) = index.get(id) {
                    *id = *new;
                }
            }
            _ => {}
        }
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, IsaError> {
    let header = SnapshotHeader::new();
    let payload = postcard::to_stdvec(&GraphSnapshot::capture(graph))
        .map_err(|e| IsaError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a graph from bytes.
///
/// Validates, in order, before decoding the payload:
/// 1. Minimum size (header present)
/// 2. Maximum size
/// 3. Magic bytes and version
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, IsaError> {
    if bytes.len() < HEADER_SIZE {
        return Err(IsaError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(IsaError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    let snapshot: GraphSnapshot = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        IsaError::DeserializationError(format!("Failed to decode graph snapshot: {}", e))
    })?;
    snapshot.restore()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{NodeType, PropertyRole};

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        let organism = graph.add_term(OntologyTerm {
            label: "Mus musculus".into(),
            source: Some("NCBITaxon".into()),
            accession: Some("10090".into()),
        });
        let mut source = Entity::new("mouse-1", NodeType::Source);
        source.properties.push(Property {
            role: PropertyRole::Characteristic,
            label: Some("organism".into()),
            value: PropertyValue::Term(organism),
            order: 1,
        });
        // Inserted out of accession order on purpose.
        let sample = graph.add_node("S:smp:s.3.0".into(), Entity::new("liver-1", NodeType::Sample));
        let src = graph.add_node("S:src:s.0.0".into(), source);
        if let Some(n) = graph.node_mut(sample) {
            n.tags.sample_files.insert("s".into());
        }
        let p = graph.add_processing(
            "S:proc:s.0.3.0".into(),
            ProcessingKind::Transformation,
            "S:proc:s.0.3".into(),
            0,
            vec![ProtocolApplication {
                protocol: "dissection".into(),
                properties: Vec::new(),
            }],
        );
        graph.link_input(p, src).expect("link");
        graph.link_output(p, sample).expect("link");
        graph
    }

    #[test]
    fn header_roundtrip() {
        let bytes = SnapshotHeader::new().to_bytes();
        let restored = SnapshotHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored, SnapshotHeader::new());
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = sample_graph();
        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");
        assert_eq!(bytes1, bytes2, "save -> load -> save must be bit-exact");

        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.processing_count(), 1);
        let sample = restored.node_by_accession("S:smp:s.3.0").expect("sample");
        assert!(sample.tags.in_sample_file());
        assert_eq!(sample.upstream().len(), 1);
        let source = restored.node_by_accession("S:src:s.0.0").expect("source");
        let term = match &source.entity.properties[0].value {
            PropertyValue::Term(id) => restored.term(*id),
            _ => None,
        };
        assert_eq!(term.map(|t| t.label.as_str()), Some("Mus musculus"));
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(IsaError::DeserializationError(_))
        ));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(graph_from_bytes(b"ISA").is_err());
        let mut bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        bytes.truncate(bytes.len() - 3);
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn dangling_accession_rejected() {
        let mut snapshot = GraphSnapshot::capture(&sample_graph());
        snapshot.processings[0].inputs = vec!["S:src:nowhere".into()];
        assert!(matches!(
            snapshot.restore(),
            Err(IsaError::DeserializationError(_))
        ));
    }
}
