//! # Table Building
//!
//! Re-renders the part of the graph visible in one file context as rows.
//!
//! Every root-to-leaf path of wrappers becomes one row. Paths are enumerated
//! depth-first with neighbours in accession order, so the same graph always
//! yields the same table.

use super::wrapper::{ExportVertex, WrapperFactory};
use crate::primitives::MAX_EXPORT_PATH_LENGTH;
use crate::{IsaError, VertexRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Headers and rows of one rendered file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// (header, value) pairs of one row, in column order.
    #[must_use]
    pub fn pairs(&self, row: usize) -> Vec<(&str, &str)> {
        self.rows
            .get(row)
            .map(|cells| {
                self.headers
                    .iter()
                    .map(String::as_str)
                    .zip(cells.iter().map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Enumerates export paths for one file context.
pub struct TableBuilder<'g> {
    factory: WrapperFactory<'g>,
}

type Path<'g> = Vec<ExportVertex<'g>>;

impl<'g> TableBuilder<'g> {
    #[must_use]
    pub fn new(factory: WrapperFactory<'g>) -> Self {
        Self { factory }
    }

    /// In-scope nodes with no visible inputs, by accession.
    pub fn roots(&self) -> Result<Vec<ExportVertex<'g>>, IsaError> {
        let graph = self.factory.graph();
        let context = self.factory.context();
        let candidates = graph.sorted_by_accession(
            graph
                .nodes()
                .filter(|n| context.contains(n))
                .map(|n| VertexRef::Node(n.id))
                .collect(),
        );

        let mut roots = Vec::new();
        for vertex in candidates {
            let wrapped = self.factory.wrap(vertex)?;
            if wrapped.inputs().is_empty() {
                roots.push(wrapped);
            }
        }
        Ok(roots)
    }

    /// Every root-to-leaf path.
    ///
    /// A vertex met again on the same path is emitted as a clone and not
    /// traversed further.
    ///
    /// # Errors
    /// Returns `IsaError::Internal` if a path exceeds the depth limit.
    pub fn paths(&self) -> Result<Vec<Path<'g>>, IsaError> {
        let mut paths = Vec::new();
        for root in self.roots()? {
            let mut path = Vec::new();
            let mut on_path = BTreeSet::new();
            self.walk(root, &mut path, &mut on_path, &mut paths)?;
        }
        Ok(paths)
    }

    fn walk(
        &self,
        vertex: ExportVertex<'g>,
        path: &mut Path<'g>,
        on_path: &mut BTreeSet<VertexRef>,
        paths: &mut Vec<Path<'g>>,
    ) -> Result<(), IsaError> {
        if path.len() >= MAX_EXPORT_PATH_LENGTH {
            return Err(IsaError::Internal(format!(
                "export path from '{}' exceeds {} vertices",
                path.first().map(ExportVertex::accession).unwrap_or_default(),
                MAX_EXPORT_PATH_LENGTH
            )));
        }

        let outputs = vertex.outputs();
        on_path.insert(vertex.vertex);
        path.push(vertex);

        if outputs.is_empty() {
            paths.push(path.clone());
        }
        for next in outputs {
            let wrapped = self.factory.wrap(next)?;
            if on_path.contains(&next) {
                path.push(wrapped.detached());
                paths.push(path.clone());
                path.pop();
            } else {
                self.walk(wrapped, path, on_path, paths)?;
            }
        }

        if let Some(done) = path.pop() {
            on_path.remove(&done.vertex);
        }
        Ok(())
    }

    /// Accessions of visible processings with more than one visible input.
    pub fn pooled_processings(&self) -> Result<Vec<String>, IsaError> {
        let mut pooled = BTreeSet::new();
        for path in self.paths()? {
            for vertex in path {
                if matches!(vertex.vertex, VertexRef::Processing(_)) && vertex.inputs().len() > 1 {
                    pooled.insert(vertex.accession().to_string());
                }
            }
        }
        Ok(pooled.into_iter().collect())
    }

    /// Render the table: paths aligned layer by layer.
    pub fn build(&self) -> Result<ExportTable, IsaError> {
        let paths = self.paths()?;

        // Each path layer as (header, occurrence) keyed columns.
        let keyed: Vec<Vec<Vec<((String, usize), String)>>> = paths
            .iter()
            .map(|path| path.iter().map(keyed_columns).collect())
            .collect();

        let depth = keyed.iter().map(Vec::len).max().unwrap_or(0);
        let mut layout: Vec<Vec<(String, usize)>> = vec![Vec::new(); depth];
        for path in &keyed {
            for (layer, columns) in path.iter().enumerate() {
                for (key, _) in columns {
                    if !layout[layer].contains(key) {
                        layout[layer].push(key.clone());
                    }
                }
            }
        }

        let mut position = BTreeMap::new();
        let mut headers = Vec::new();
        for (layer, keys) in layout.iter().enumerate() {
            for key in keys {
                position.insert((layer, key.clone()), headers.len());
                headers.push(key.0.clone());
            }
        }

        let mut rows = Vec::with_capacity(keyed.len());
        let mut seen = BTreeSet::new();
        for path in keyed {
            let mut cells = vec![String::new(); headers.len()];
            for (layer, columns) in path.into_iter().enumerate() {
                for (key, value) in columns {
                    if let Some(&at) = position.get(&(layer, key)) {
                        cells[at] = value;
                    }
                }
            }
            if seen.insert(cells.clone()) {
                rows.push(cells);
            }
        }

        tracing::debug!(
            file = self.factory.context().file_id(),
            columns = headers.len(),
            rows = rows.len(),
            "built export table"
        );
        Ok(ExportTable { headers, rows })
    }
}

fn keyed_columns(vertex: &ExportVertex<'_>) -> Vec<((String, usize), String)> {
    let mut occurrences: BTreeMap<String, usize> = BTreeMap::new();
    vertex
        .groups
        .iter()
        .flat_map(|g| g.columns())
        .map(|(header, value)| {
            let n = occurrences.entry(header.clone()).or_insert(0);
            let key = (header, *n);
            *n += 1;
            (key, value)
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
