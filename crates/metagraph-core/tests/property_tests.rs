//! # Property-Based Tests
//!
//! Structural invariants of the store and the query engine, checked over
//! randomly generated schemas and graphs.

use metagraph_core::{
    ElementId, MetaAssociation, MetaAssociationEnd, MetaClass, MetaProperty, SchemaRegistry,
    Store, Value, parse_query,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const CLASSES: [&str; 3] = ["Node", "L1", "L2"];

/// `Node <|-- L1`, `Node <|-- L2`, plain `R: Node -> Node`, composite `Own: Node -> Node`.
fn graph_schema() -> Arc<SchemaRegistry> {
    let mut schema = SchemaRegistry::new();
    schema
        .register_class(
            MetaClass::new("Node")
                .with_attribute(MetaProperty::new("weight", "Integer"))
                .with_attribute(MetaProperty::new("name", "String")),
        )
        .expect("register");
    schema
        .register_class(MetaClass::new("L1").with_superclass("Node"))
        .expect("register");
    schema
        .register_class(MetaClass::new("L2").with_superclass("Node"))
        .expect("register");
    schema
        .register_association(MetaAssociation::new(
            "R",
            MetaAssociationEnd::new("from", "Node"),
            MetaAssociationEnd::new("to", "Node"),
        ))
        .expect("register");
    schema
        .register_association(MetaAssociation::new(
            "Own",
            MetaAssociationEnd::new("owner", "Node").single(),
            MetaAssociationEnd::new("owned", "Node").composite(),
        ))
        .expect("register");
    Arc::new(schema)
}

/// Elements as `(class index, weight)`; links as index pairs into the element list.
fn build(elements: &[(usize, i64)], links: &[(usize, usize)]) -> (Store, Vec<ElementId>) {
    let mut store = Store::new(graph_schema());
    let ids: Vec<ElementId> = elements
        .iter()
        .enumerate()
        .map(|(i, (class, weight))| {
            let id = store
                .create_element(CLASSES[class % CLASSES.len()])
                .expect("create");
            store
                .set_property(id, "weight", Value::Int(*weight))
                .expect("weight");
            store
                .set_property(id, "name", Value::Str(format!("n{i}")))
                .expect("name");
            id
        })
        .collect();
    for (s, t) in links {
        store
            .create_link("R", ids[s % ids.len()], ids[t % ids.len()])
            .expect("link");
    }
    (store, ids)
}

fn elements() -> impl Strategy<Value = Vec<(usize, i64)>> {
    vec((0usize..3, 0i64..10), 1..20)
}

fn links() -> impl Strategy<Value = Vec<(usize, usize)>> {
    vec((0usize..64, 0usize..64), 0..40)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// An instance of the deepest class in a chain is an instance of every ancestor.
    #[test]
    fn instance_of_every_ancestor(depth in 1usize..12) {
        let mut schema = SchemaRegistry::new();
        schema.register_class(MetaClass::new("C0")).expect("register");
        for i in 1..=depth {
            schema
                .register_class(MetaClass::new(format!("C{i}")).with_superclass(format!("C{}", i - 1)))
                .expect("register");
        }
        let mut store = Store::new(Arc::new(schema));
        let id = store.create_element(&format!("C{depth}")).expect("create");

        for i in 0..=depth {
            let class_name = format!("C{i}");
            prop_assert!(store.is_instance_of(id, &class_name));
        }
    }

    /// A created link is immediately visible from both ends.
    #[test]
    fn links_visible_both_ways(elements in elements(), links in links()) {
        let (store, ids) = build(&elements, &links);
        for (s, t) in &links {
            let source = ids[s % ids.len()];
            let target = ids[t % ids.len()];
            prop_assert!(store.get_linked_targets("R", source).contains(&target));
            prop_assert!(store.get_linked_sources("R", target).contains(&source));
        }
    }

    /// After any sequence of composite links to one element, only the last owner remains.
    #[test]
    fn composite_owner_is_last_writer(owners in vec(0usize..8, 1..10)) {
        let (mut store, ids) = build(&[(0, 0); 9], &[]);
        let owned = ids[8];
        for owner in &owners {
            store.create_link("Own", ids[*owner], owned).expect("link");
        }
        let last = owners.last().map(|o| ids[*o]);
        prop_assert_eq!(store.get_linked_sources("Own", owned), last.into_iter().collect::<Vec<_>>());
    }

    /// `MATCH (n) RETURN n` yields each visible instance exactly once.
    #[test]
    fn match_all_once(elements in elements(), links in links()) {
        let (store, ids) = build(&elements, &links);
        let table = store.query("MATCH (n) RETURN n").expect("query");

        prop_assert_eq!(table.len(), ids.len());
        let seen: HashSet<ElementId> = table
            .column("n")
            .iter()
            .filter_map(Value::as_ref_id)
            .collect();
        prop_assert_eq!(seen.len(), ids.len());
    }

    /// Typed edge matches equal the number of R-links between L1 and L2 instances.
    #[test]
    fn typed_edge_count(elements in elements(), links in links()) {
        let (store, _) = build(&elements, &links);
        let table = store
            .query("MATCH (a:L1)-[:R]->(b:L2) RETURN a.name, b.name")
            .expect("query");

        let expected = store
            .get_local_links()
            .iter()
            .filter(|l| l.association == "R")
            .filter(|l| store.is_instance_of(l.source, "L1") && store.is_instance_of(l.target, "L2"))
            .count();
        prop_assert_eq!(table.len(), expected);
    }

    /// FILTER never adds rows and every survivor satisfies the predicate.
    #[test]
    fn filter_shrinks_and_holds(elements in elements(), threshold in 0i64..10) {
        let (store, _) = build(&elements, &[]);
        let all = store.query("MATCH (n) RETURN n.weight AS w").expect("query");
        let filtered = store
            .query(&format!("MATCH (n) FILTER WHERE n.weight >= {threshold} RETURN n.weight AS w"))
            .expect("query");

        prop_assert!(filtered.len() <= all.len());
        for w in filtered.column("w") {
            prop_assert!(matches!(w, Value::Int(v) if v >= threshold));
        }
    }

    /// OPTIONAL MATCH never drops rows; unmatched rows carry nulls.
    #[test]
    fn optional_match_keeps_rows(elements in elements(), links in links()) {
        let (store, _) = build(&elements, &links);
        let base = store.query("MATCH (a:L1) RETURN a").expect("query");
        let table = store
            .query("MATCH (a:L1) OPTIONAL MATCH (a)-[:R]->(b:L2) RETURN a, b")
            .expect("query");

        prop_assert!(table.len() >= base.len());
        for row in table.rows() {
            let a = row.get("a").and_then(Value::as_ref_id);
            prop_assert!(a.is_some());
            let unmatched = row.get("b").is_none_or(Value::is_null);
            if let (Some(a), true) = (a, unmatched) {
                let matched = store
                    .get_linked_targets("R", a)
                    .into_iter()
                    .any(|t| store.is_instance_of(t, "L2"));
                prop_assert!(!matched);
            }
        }
    }

    /// DISTINCT output holds no two identical tuples.
    #[test]
    fn distinct_has_no_duplicates(elements in elements()) {
        let (store, _) = build(&elements, &[]);
        let table = store
            .query("MATCH (n) RETURN DISTINCT className(n) AS c, n.weight AS w")
            .expect("query");

        let tuples: Vec<String> = table.tuples().map(|t| format!("{t:?}")).collect();
        let unique: HashSet<&String> = tuples.iter().collect();
        prop_assert_eq!(unique.len(), tuples.len());
    }

    /// The parser returns a result for any input and never panics.
    #[test]
    fn parser_total(text in ".{0,80}") {
        let _ = parse_query(&text);
    }
}
