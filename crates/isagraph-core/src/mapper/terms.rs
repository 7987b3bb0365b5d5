//! # Ontology Term Resolution
//!
//! The core asks a `TermResolver` to turn a (label, source, accession) triple
//! into an `OntologyTerm`; it does not own term bookkeeping itself. Resolved
//! terms are deduplicated by the session through the Object Store.

use crate::model::OntologyTerm;
use crate::store::ObjectStore;
use crate::{EntityKind, IsaError, Location};
use std::collections::BTreeSet;

/// A request for one ontology term, as read from a row.
#[derive(Debug, Clone, Copy)]
pub struct TermRequest<'a> {
    pub label: &'a str,
    pub source: Option<&'a str>,
    pub accession: Option<&'a str>,
    /// Where the request was read, for error reporting.
    pub location: &'a Location,
}

/// Lookup-or-create of ontology terms.
pub trait TermResolver {
    /// Resolve a term.
    ///
    /// # Errors
    /// Returns `IsaError::MissingValue` if the reference source is unknown.
    fn resolve_term(&self, request: &TermRequest<'_>) -> Result<OntologyTerm, IsaError>;
}

/// Accepts terms from the reference sources declared in the Object Store.
///
/// Terms without a source are accepted as bare labels.
#[derive(Debug, Clone, Default)]
pub struct DeclaredSources {
    sources: BTreeSet<String>,
}

impl DeclaredSources {
    #[must_use]
    pub fn from_store(store: &ObjectStore) -> Self {
        Self {
            sources: store
                .declared(EntityKind::ReferenceSource)
                .map(str::to_string)
                .collect(),
        }
    }
}

impl TermResolver for DeclaredSources {
    fn resolve_term(&self, request: &TermRequest<'_>) -> Result<OntologyTerm, IsaError> {
        if let Some(source) = request.source
            && !self.sources.contains(source)
        {
            return Err(IsaError::missing(
                request.location.clone(),
                format!("term source '{}' is not declared by the study", source),
            ));
        }
        Ok(OntologyTerm {
            label: request.label.to_string(),
            source: request.source.map(str::to_string),
            accession: request.accession.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Study;

    fn resolver(study: &Study) -> DeclaredSources {
        let mut store = ObjectStore::new();
        store.declare_study(study).expect("declare");
        DeclaredSources::from_store(&store)
    }

    #[test]
    fn declared_source_resolves() {
        let resolver = resolver(&Study::new("S").with_term_source("NCBITaxon"));
        let location = Location::section("f", "s");
        let term = resolver
            .resolve_term(&TermRequest {
                label: "Homo sapiens",
                source: Some("NCBITaxon"),
                accession: Some("9606"),
                location: &location,
            })
            .expect("resolve");
        assert_eq!(term.store_key(), "NCBITaxon:9606:Homo sapiens");
    }

    #[test]
    fn undeclared_source_is_missing_value() {
        let resolver = resolver(&Study::new("S"));
        let location = Location::section("f", "s").with_row(3);
        let result = resolver.resolve_term(&TermRequest {
            label: "liver",
            source: Some("UBERON"),
            accession: None,
            location: &location,
        });
        assert!(matches!(result, Err(IsaError::MissingValue { .. })));
    }

    #[test]
    fn sourceless_term_is_a_bare_label() {
        let resolver = DeclaredSources::default();
        let location = Location::section("f", "s");
        let term = resolver
            .resolve_term(&TermRequest {
                label: "liver",
                source: None,
                accession: None,
                location: &location,
            })
            .expect("resolve");
        assert_eq!(term.source, None);
    }
}
