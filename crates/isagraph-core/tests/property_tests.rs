//! # Property-Based Tests
//!
//! Determinism and identity invariants of row mapping, checked with proptest
//! over generated sample tables.

use isagraph_core::{
    FormatInstance, Grammar, MappingConfig, MappingSession, NodeType, Protocol, SectionInstance,
    Study, graph_from_bytes, graph_to_bytes,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

const GRAMMAR: &str = r#"{"formats":[{"id":"samples","role":"sample","sections":[
    {"id":"main","fields":[
        {"id":"Source Name","type":"source"},
        {"id":"Characteristics","type":"characteristic"},
        {"id":"Protocol REF","type":"protocol_ref"},
        {"id":"Sample Name","type":"sample"}]}]}]}"#;

const HEADERS: [&str; 4] = [
    "Source Name",
    "Characteristics[organism]",
    "Protocol REF",
    "Sample Name",
];

fn grammar() -> Grammar {
    Grammar::from_json_str(GRAMMAR).expect("grammar")
}

fn study() -> Study {
    Study::new("P").with_protocol(Protocol::new("collection"))
}

fn instance(grammar: &Grammar, rows: &[(String, String, String)]) -> FormatInstance {
    let def = grammar.format("samples").expect("format");
    let rows = rows
        .iter()
        .map(|(source, organism, sample)| {
            vec![
                source.clone(),
                organism.clone(),
                "collection".to_string(),
                sample.clone(),
            ]
        })
        .collect();
    let section = SectionInstance::from_rows(
        "s_main",
        def.section("main").expect("section"),
        &HEADERS,
        rows,
    )
    .expect("section");
    let mut format = FormatInstance::new(def, "s_main");
    format.push_section(section);
    format
}

fn row() -> impl Strategy<Value = (String, String, String)> {
    ("[a-d]{1,2}", "(mouse|rat|)", "[a-f][0-9]")
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Mapping the same table twice leaves the graph byte-identical.
    #[test]
    fn remapping_is_idempotent(rows in vec(row(), 1..20)) {
        let g = grammar();
        let format = instance(&g, &rows);
        let mut session = MappingSession::new(&g, study(), MappingConfig::default()).expect("session");

        session.map_format(&format).expect("first");
        let first = graph_to_bytes(session.graph()).expect("snapshot");
        session.map_format(&format).expect("second");
        let second = graph_to_bytes(session.graph()).expect("snapshot");

        prop_assert_eq!(first, second);
    }

    /// Two independent sessions over the same table build the same graph.
    #[test]
    fn separate_sessions_agree(rows in vec(row(), 1..20)) {
        let g = grammar();
        let format = instance(&g, &rows);

        let mut a = MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        let mut b = MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        a.map_format(&format).expect("map");
        b.map_format(&format).expect("map");

        prop_assert_eq!(
            graph_to_bytes(a.graph()).expect("snapshot"),
            graph_to_bytes(b.graph()).expect("snapshot")
        );
    }

    /// One source node per distinct source name.
    #[test]
    fn equal_names_share_a_node(rows in vec(row(), 1..20)) {
        let g = grammar();
        let format = instance(&g, &rows);
        let mut session = MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        session.map_format(&format).expect("map");

        let names: BTreeSet<&str> = rows.iter().map(|(s, _, _)| s.as_str()).collect();
        let sources = session
            .graph()
            .nodes()
            .filter(|n| n.entity.node_type == NodeType::Source)
            .count();
        prop_assert_eq!(sources, names.len());
    }

    /// Snapshots restore to a graph that encodes to the same bytes.
    #[test]
    fn snapshot_round_trip_is_exact(rows in vec(row(), 1..20)) {
        let g = grammar();
        let format = instance(&g, &rows);
        let mut session = MappingSession::new(&g, study(), MappingConfig::default()).expect("session");
        session.map_format(&format).expect("map");

        let bytes = graph_to_bytes(session.graph()).expect("encode");
        let restored = graph_from_bytes(&bytes).expect("decode");
        prop_assert_eq!(restored.node_count(), session.graph().node_count());
        prop_assert_eq!(graph_to_bytes(&restored).expect("re-encode"), bytes);
    }
}
