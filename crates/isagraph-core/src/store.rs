//! # Keyed Object Store
//!
//! Run-scoped identity map: at most one canonical object per
//! (entity-kind, key). This is how a material named in two rows, or in a
//! sample file and an assay file, resolves to one shared vertex.
//!
//! The store is owned by one `MappingSession`; it is never global, so
//! independent runs in the same process never see each other's objects.

use crate::model::Study;
use crate::{EntityKind, IsaError, NodeId, ProcessingId, TermId};
use std::collections::BTreeMap;

/// A canonical object reference held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoredObject {
    Node(NodeId),
    Processing(ProcessingId),
    Term(TermId),
    /// A declaration with no arena object (protocols, reference sources).
    Declared,
}

/// The identity map.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    entries: BTreeMap<(EntityKind, String), StoredObject>,
}

impl ObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the canonical object for (kind, key).
    #[must_use]
    pub fn lookup(&self, kind: EntityKind, key: &str) -> Option<StoredObject> {
        self.entries.get(&(kind, key.to_string())).copied()
    }

    /// Return the canonical object, creating it with `create` on first sight.
    ///
    /// The boolean is `true` when the object was created by this call.
    pub fn lookup_or_insert_with<F>(
        &mut self,
        kind: EntityKind,
        key: &str,
        create: F,
    ) -> Result<(StoredObject, bool), IsaError>
    where
        F: FnOnce() -> Result<StoredObject, IsaError>,
    {
        if let Some(existing) = self.lookup(kind, key) {
            return Ok((existing, false));
        }
        let object = create()?;
        self.entries.insert((kind, key.to_string()), object);
        Ok((object, true))
    }

    /// Register an object under a key that must be new.
    pub fn insert(
        &mut self,
        kind: EntityKind,
        key: &str,
        object: StoredObject,
    ) -> Result<(), IsaError> {
        match self.lookup(kind, key) {
            Some(existing) if existing != object => Err(IsaError::Internal(format!(
                "store key {:?}/'{}' already bound to {:?}",
                kind, key, existing
            ))),
            _ => {
                self.entries.insert((kind, key.to_string()), object);
                Ok(())
            }
        }
    }

    /// Point an existing key at a different object.
    ///
    /// Used when consolidation folds one processing into another.
    pub fn rebind(
        &mut self,
        kind: EntityKind,
        key: &str,
        object: StoredObject,
    ) -> Result<StoredObject, IsaError> {
        match self.entries.get_mut(&(kind, key.to_string())) {
            Some(slot) => Ok(std::mem::replace(slot, object)),
            None => Err(IsaError::Internal(format!(
                "cannot rebind unknown store key {:?}/'{}'",
                kind, key
            ))),
        }
    }

    /// Typed lookup of a node.
    #[must_use]
    pub fn node(&self, kind: EntityKind, key: &str) -> Option<NodeId> {
        match self.lookup(kind, key) {
            Some(StoredObject::Node(id)) => Some(id),
            _ => None,
        }
    }

    /// Register the protocols and reference sources a study declares.
    pub fn declare_study(&mut self, study: &Study) -> Result<(), IsaError> {
        for protocol in study.protocols() {
            self.insert(EntityKind::Protocol, &protocol.name, StoredObject::Declared)?;
        }
        for source in study.term_sources() {
            self.insert(EntityKind::ReferenceSource, source, StoredObject::Declared)?;
        }
        Ok(())
    }

    /// Keys registered as declarations of one kind, in key order.
    pub fn declared(&self, kind: EntityKind) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |((k, _), object)| *k == kind && **object == StoredObject::Declared)
            .map(|((_, key), _)| key.as_str())
    }

    /// Whether a declaration is registered.
    #[must_use]
    pub fn is_declared(&self, kind: EntityKind, key: &str) -> bool {
        self.lookup(kind, key).is_some()
    }

    /// Number of entries of one kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entries.keys().filter(|(k, _)| *k == kind).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
