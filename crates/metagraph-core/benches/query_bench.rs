//! # Query Benchmarks
//!
//! Performance benchmarks for metagraph-core store and query operations.
//!
//! Run with: `cargo bench -p metagraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use metagraph_core::{
    ElementId, MetaAssociation, MetaAssociationEnd, MetaClass, MetaProperty, SchemaRegistry,
    Store, Value, parse_query,
};
use std::hint::black_box;
use std::sync::Arc;

fn schema() -> Arc<SchemaRegistry> {
    let mut schema = SchemaRegistry::new();
    schema
        .register_class(MetaClass::new("Element").with_attribute(MetaProperty::new("name", "String")))
        .expect("register");
    schema
        .register_class(MetaClass::new("Namespace").with_superclass("Element"))
        .expect("register");
    schema
        .register_class(MetaClass::new("Classifier").with_superclass("Element"))
        .expect("register");
    schema
        .register_class(MetaClass::new("Feature").with_superclass("Classifier"))
        .expect("register");
    schema
        .register_association(MetaAssociation::new(
            "Membership",
            MetaAssociationEnd::new("namespace", "Namespace").single(),
            MetaAssociationEnd::new("member", "Element").composite(),
        ))
        .expect("register");
    schema
        .register_association(MetaAssociation::new(
            "FeatureTyping",
            MetaAssociationEnd::new("typedFeature", "Feature"),
            MetaAssociationEnd::new("type", "Classifier").single(),
        ))
        .expect("register");
    Arc::new(schema)
}

/// One namespace owning `size` classifiers, each typing one feature.
fn create_package(size: usize) -> Store {
    let mut store = Store::new(schema());
    let ns = store.create_element("Namespace").expect("create");
    for i in 0..size {
        let c = store.create_element("Classifier").expect("create");
        store
            .set_property(c, "name", Value::Str(format!("C{i}")))
            .expect("name");
        store.create_link("Membership", ns, c).expect("link");

        let f = store.create_element("Feature").expect("create");
        store
            .set_property(f, "name", Value::Str(format!("F{i}")))
            .expect("name");
        store.create_link("FeatureTyping", f, c).expect("link");
    }
    store
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_link_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_creation");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_package(size)));
        });
    }

    group.finish();
}

fn bench_linked_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("linked_targets");

    for size in [100, 1000, 10000].iter() {
        let store = create_package(*size);
        let ns: ElementId = store
            .get_local_elements()
            .next()
            .map(|i| i.id)
            .expect("namespace should exist");

        group.bench_with_input(BenchmarkId::from_parameter(size), &ns, |b, &ns| {
            b.iter(|| black_box(store.get_linked_targets("Membership", ns)));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let text = "MATCH (n:Namespace)-[:Membership]->(c:Classifier) \
                OPTIONAL MATCH (f:Feature)-[:FeatureTyping]->(c) \
                FILTER WHERE c.name <> 'C0' AND NOT f.name IS NULL \
                RETURN DISTINCT upper(c.name) AS name, f.name";

    c.bench_function("parse_query", |b| {
        b.iter(|| black_box(parse_query(black_box(text))));
    });
}

fn bench_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_typed_edge");

    for size in [100, 500, 1000].iter() {
        let store = create_package(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(store.query(
                    "MATCH (f:Feature)-[:FeatureTyping]->(t:Classifier) RETURN f.name, t.name",
                ))
            });
        });
    }

    group.finish();
}

fn bench_optional_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("optional_match");

    for size in [100, 500, 1000].iter() {
        let store = create_package(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(store.query(
                    "MATCH (n:Namespace)-[:Membership]->(c:Classifier) \
                     OPTIONAL MATCH (f:Feature)-[:FeatureTyping]->(c) \
                     RETURN c.name, f.name",
                ))
            });
        });
    }

    group.finish();
}

fn bench_distinct(c: &mut Criterion) {
    let mut group = c.benchmark_group("distinct");

    for size in [100, 500, 1000].iter() {
        let store = create_package(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(store.query("MATCH (n) RETURN DISTINCT className(n)")));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_link_creation,
    bench_linked_targets,
    bench_parse,
    bench_match,
    bench_optional_match,
    bench_distinct
);
criterion_main!(benches);
