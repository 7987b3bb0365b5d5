//! # Graph Model
//!
//! Arena of typed vertices (nodes) and hyperedges (processings).
//!
//! All collections are `BTreeMap`/`BTreeSet` keyed by arena id, so iteration
//! is deterministic. Adjacency is maintained in both directions at link time;
//! there is no lazily discovered state. Traversal accessors return neighbours
//! sorted by accession key, a strict total order because accessions are
//! unique within a run.

use crate::model::{Entity, OntologyTerm, ProtocolApplication};
use crate::{
    IsaError, NodeId, NodeKind, ProcessingId, ProcessingKind, TermId, VertexRef,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// VERTICES & HYPEREDGES
// =============================================================================

/// Which files a node was seen in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTags {
    pub sample_files: BTreeSet<String>,
    pub assay_files: BTreeSet<String>,
}

impl FileTags {
    #[must_use]
    pub fn in_sample_file(&self) -> bool {
        !self.sample_files.is_empty()
    }

    #[must_use]
    pub fn in_assay_file(&self, file: &str) -> bool {
        self.assay_files.contains(file)
    }
}

/// A Material or Data vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Deterministic accession key.
    pub accession: String,
    pub kind: NodeKind,
    pub entity: Entity,
    pub tags: FileTags,
    /// Processings producing this node.
    upstream: BTreeSet<ProcessingId>,
    /// Processings consuming this node.
    downstream: BTreeSet<ProcessingId>,
}

impl Node {
    pub fn upstream(&self) -> &BTreeSet<ProcessingId> {
        &self.upstream
    }

    pub fn downstream(&self) -> &BTreeSet<ProcessingId> {
        &self.downstream
    }
}

/// A protocol step between input and output nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processing {
    pub id: ProcessingId,
    /// Deterministic accession key.
    pub accession: String,
    pub kind: ProcessingKind,
    /// Protocol applications in column order.
    pub protocols: Vec<ProtocolApplication>,
    /// Row-independent identifier of the column pair this step came from.
    pub column_id: String,
    /// Row the step was instantiated for.
    pub row_order: usize,
    inputs: BTreeSet<NodeId>,
    outputs: BTreeSet<NodeId>,
}

impl Processing {
    pub fn inputs(&self) -> &BTreeSet<NodeId> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeSet<NodeId> {
        &self.outputs
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The node/processing arena.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    processings: BTreeMap<ProcessingId, Processing>,
    terms: BTreeMap<TermId, OntologyTerm>,
    next_node_id: u64,
    next_processing_id: u64,
    next_term_id: u64,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Identity is the caller's concern (see `ObjectStore`).
    pub fn add_node(&mut self, accession: String, entity: Entity) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);
        self.nodes.insert(
            id,
            Node {
                id,
                accession,
                kind: entity.node_type.kind(),
                entity,
                tags: FileTags::default(),
                upstream: BTreeSet::new(),
                downstream: BTreeSet::new(),
            },
        );
        id
    }

    /// Add an unlinked processing.
    pub fn add_processing(
        &mut self,
        accession: String,
        kind: ProcessingKind,
        column_id: String,
        row_order: usize,
        protocols: Vec<ProtocolApplication>,
    ) -> ProcessingId {
        let id = ProcessingId(self.next_processing_id);
        self.next_processing_id = self.next_processing_id.saturating_add(1);
        self.processings.insert(
            id,
            Processing {
                id,
                accession,
                kind,
                protocols,
                column_id,
                row_order,
                inputs: BTreeSet::new(),
                outputs: BTreeSet::new(),
            },
        );
        id
    }

    /// Add a resolved term.
    pub fn add_term(&mut self, term: OntologyTerm) -> TermId {
        let id = TermId(self.next_term_id);
        self.next_term_id = self.next_term_id.saturating_add(1);
        self.terms.insert(id, term);
        id
    }

    /// Connect `node` as an input of `processing`. Idempotent.
    pub fn link_input(&mut self, processing: ProcessingId, node: NodeId) -> Result<(), IsaError> {
        self.check_endpoints(processing, node)?;
        if let Some(p) = self.processings.get_mut(&processing) {
            p.inputs.insert(node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.downstream.insert(processing);
        }
        Ok(())
    }

    /// Connect `node` as an output of `processing`. Idempotent.
    pub fn link_output(&mut self, processing: ProcessingId, node: NodeId) -> Result<(), IsaError> {
        self.check_endpoints(processing, node)?;
        if let Some(p) = self.processings.get_mut(&processing) {
            p.outputs.insert(node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.upstream.insert(processing);
        }
        Ok(())
    }

    fn check_endpoints(&self, processing: ProcessingId, node: NodeId) -> Result<(), IsaError> {
        if !self.processings.contains_key(&processing) {
            return Err(IsaError::Internal(format!(
                "processing {:?} is not in the graph",
                processing
            )));
        }
        if !self.nodes.contains_key(&node) {
            return Err(IsaError::Internal(format!(
                "node {:?} is not in the graph",
                node
            )));
        }
        Ok(())
    }

    /// Detach and drop a processing, returning it.
    pub fn remove_processing(&mut self, id: ProcessingId) -> Option<Processing> {
        let removed = self.processings.remove(&id)?;
        for node in &removed.inputs {
            if let Some(n) = self.nodes.get_mut(node) {
                n.downstream.remove(&id);
            }
        }
        for node in &removed.outputs {
            if let Some(n) = self.nodes.get_mut(node) {
                n.upstream.remove(&id);
            }
        }
        Some(removed)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    #[must_use]
    pub fn processing(&self, id: ProcessingId) -> Option<&Processing> {
        self.processings.get(&id)
    }

    #[must_use]
    pub fn term(&self, id: TermId) -> Option<&OntologyTerm> {
        self.terms.get(&id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All processings in id order.
    pub fn processings(&self) -> impl Iterator<Item = &Processing> {
        self.processings.values()
    }

    /// All terms in id order.
    pub fn terms(&self) -> impl Iterator<Item = (TermId, &OntologyTerm)> {
        self.terms.iter().map(|(id, t)| (*id, t))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn processing_count(&self) -> usize {
        self.processings.len()
    }

    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Accession of any vertex.
    #[must_use]
    pub fn accession(&self, vertex: VertexRef) -> Option<&str> {
        match vertex {
            VertexRef::Node(id) => self.node(id).map(|n| n.accession.as_str()),
            VertexRef::Processing(id) => self.processing(id).map(|p| p.accession.as_str()),
        }
    }

    /// Look up a node by accession.
    #[must_use]
    pub fn node_by_accession(&self, accession: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.accession == accession)
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Unfiltered upstream neighbours, sorted by accession.
    #[must_use]
    pub fn inputs(&self, vertex: VertexRef) -> Vec<VertexRef> {
        let neighbours = match vertex {
            VertexRef::Node(id) => self
                .node(id)
                .map(|n| n.upstream.iter().map(|p| VertexRef::Processing(*p)).collect())
                .unwrap_or_default(),
            VertexRef::Processing(id) => self
                .processing(id)
                .map(|p| p.inputs.iter().map(|n| VertexRef::Node(*n)).collect())
                .unwrap_or_default(),
        };
        self.sorted_by_accession(neighbours)
    }

    /// Unfiltered downstream neighbours, sorted by accession.
    #[must_use]
    pub fn outputs(&self, vertex: VertexRef) -> Vec<VertexRef> {
        let neighbours = match vertex {
            VertexRef::Node(id) => self
                .node(id)
                .map(|n| {
                    n.downstream
                        .iter()
                        .map(|p| VertexRef::Processing(*p))
                        .collect()
                })
                .unwrap_or_default(),
            VertexRef::Processing(id) => self
                .processing(id)
                .map(|p| p.outputs.iter().map(|n| VertexRef::Node(*n)).collect())
                .unwrap_or_default(),
        };
        self.sorted_by_accession(neighbours)
    }

    /// Sort vertices by accession key.
    #[must_use]
    pub fn sorted_by_accession(&self, mut vertices: Vec<VertexRef>) -> Vec<VertexRef> {
        vertices.sort_by(|a, b| self.accession(*a).cmp(&self.accession(*b)));
        vertices
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::NodeType;

    fn chain() -> (Graph, NodeId, ProcessingId, NodeId) {
        let mut graph = Graph::new();
        let a = graph.add_node("S:src:f.0.0".into(), Entity::new("a", NodeType::Source));
        let b = graph.add_node("S:smp:f.2.0".into(), Entity::new("b", NodeType::Sample));
        let p = graph.add_processing(
            "S:proc:f.0.2.0".into(),
            ProcessingKind::Transformation,
            "S:proc:f.0.2".into(),
            0,
            Vec::new(),
        );
        graph.link_input(p, a).expect("input");
        graph.link_output(p, b).expect("output");
        (graph, a, p, b)
    }

    #[test]
    fn linking_maintains_both_directions() {
        let (graph, a, p, b) = chain();
        assert!(graph.node(a).expect("a").downstream().contains(&p));
        assert!(graph.node(b).expect("b").upstream().contains(&p));
        assert_eq!(
            graph.outputs(VertexRef::Node(a)),
            vec![VertexRef::Processing(p)]
        );
        assert_eq!(
            graph.inputs(VertexRef::Processing(p)),
            vec![VertexRef::Node(a)]
        );
    }

    #[test]
    fn linking_is_idempotent() {
        let (mut graph, a, p, _) = chain();
        graph.link_input(p, a).expect("again");
        assert_eq!(graph.processing(p).expect("p").inputs().len(), 1);
    }

    #[test]
    fn linking_unknown_ids_is_internal_error() {
        let (mut graph, _, p, _) = chain();
        assert!(matches!(
            graph.link_input(p, NodeId(99)),
            Err(IsaError::Internal(_))
        ));
        assert!(matches!(
            graph.link_output(ProcessingId(99), NodeId(0)),
            Err(IsaError::Internal(_))
        ));
    }

    #[test]
    fn neighbours_sorted_by_accession_not_id() {
        let mut graph = Graph::new();
        let hub = graph.add_node("S:src:f.0.0".into(), Entity::new("hub", NodeType::Source));
        let late = graph.add_processing(
            "S:proc:f.0.2.9".into(),
            ProcessingKind::Transformation,
            "c".into(),
            9,
            Vec::new(),
        );
        let early = graph.add_processing(
            "S:proc:f.0.2.1".into(),
            ProcessingKind::Transformation,
            "c".into(),
            1,
            Vec::new(),
        );
        graph.link_input(late, hub).expect("link");
        graph.link_input(early, hub).expect("link");

        assert_eq!(
            graph.outputs(VertexRef::Node(hub)),
            vec![VertexRef::Processing(early), VertexRef::Processing(late)]
        );
    }

    #[test]
    fn remove_processing_unlinks_nodes() {
        let (mut graph, a, p, b) = chain();
        let removed = graph.remove_processing(p).expect("removed");
        assert_eq!(removed.accession, "S:proc:f.0.2.0");
        assert!(graph.node(a).expect("a").downstream().is_empty());
        assert!(graph.node(b).expect("b").upstream().is_empty());
        assert_eq!(graph.processing_count(), 0);
    }

    #[test]
    fn node_kind_follows_entity_type() {
        let mut graph = Graph::new();
        let d = graph.add_node("x".into(), Entity::new("f.cel", NodeType::RawData));
        assert_eq!(graph.node(d).expect("d").kind, NodeKind::Data);
        assert!(graph.node_by_accession("x").is_some());
    }
}
