//! # Processing Consolidation
//!
//! Row mapping creates one processing per row. When several rows pool
//! different inputs into the same output through the same protocol
//! applications, those processings describe one step. Consolidation merges
//! them into the processing with the lowest row order, which receives the
//! union of their inputs.
//!
//! Two processings merge when they share:
//! - the column identifier
//! - equal protocol applications (same protocols, same parameter values)
//! - the same output node set

use crate::graph::Graph;
use crate::{IsaError, NodeId, ProcessingId};
use std::collections::{BTreeMap, BTreeSet};

/// A processing folded into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    /// Accession of the removed processing.
    pub accession: String,
    pub removed: ProcessingId,
    pub survivor: ProcessingId,
}

/// Merge equivalent processings. Returns what was folded into what.
///
/// # Errors
/// Returns `IsaError::Internal` if relinking fails.
pub fn consolidate(graph: &mut Graph) -> Result<Vec<Merged>, IsaError> {
    // (column id, outputs) -> candidate groups; protocols compared within.
    let mut groups: BTreeMap<(String, BTreeSet<NodeId>), Vec<Vec<ProcessingId>>> =
        BTreeMap::new();

    let mut ordered: Vec<_> = graph.processings().collect();
    ordered.sort_by(|a, b| {
        a.row_order
            .cmp(&b.row_order)
            .then_with(|| a.accession.cmp(&b.accession))
    });

    for processing in ordered {
        let key = (processing.column_id.clone(), processing.outputs().clone());
        let candidates = groups.entry(key).or_default();
        let same_protocols = |group: &Vec<ProcessingId>| {
            group
                .first()
                .and_then(|first| graph.processing(*first))
                .is_some_and(|first| first.protocols == processing.protocols)
        };
        match candidates.iter_mut().find(|g| same_protocols(g)) {
            Some(group) => group.push(processing.id),
            None => candidates.push(vec![processing.id]),
        }
    }

    let mut merged = Vec::new();
    for group in groups.into_values().flatten() {
        let Some((&survivor, duplicates)) = group.split_first() else {
            continue;
        };
        for &duplicate in duplicates {
            let Some(gone) = graph.remove_processing(duplicate) else {
                return Err(IsaError::Internal(format!(
                    "processing {:?} vanished during consolidation",
                    duplicate
                )));
            };
            for &input in gone.inputs() {
                graph.link_input(survivor, input)?;
            }
            tracing::debug!(
                survivor = ?survivor,
                merged = %gone.accession,
                "consolidated processing"
            );
            merged.push(Merged {
                accession: gone.accession,
                removed: duplicate,
                survivor,
            });
        }
    }

    if !merged.is_empty() {
        tracing::info!(removed = merged.len(), "consolidated pooled processings");
    }
    Ok(merged)
}
