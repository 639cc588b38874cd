// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Resolution benchmarks over layered graphs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resdeps::prelude::*;
use resdeps::store::StorePolicy;

/// `layers` layers of `width` resources; each version requires every resource
/// in the next layer
fn layered(layers: usize, width: usize) -> (DependencyStore, String) {
    let store = DependencyStore::default().with_policy(StorePolicy {
        require_editable_version: false,
    });

    let root = Resource::new("root", ResourceKind::Modpack);
    let root_id = root.id.clone();
    store.register_resource(root).unwrap();
    let root_version = store
        .register_version(ResourceVersion::draft(&root_id, "1.0.0"))
        .unwrap()
        .id;
    store.publish_version(&root_version).unwrap();

    let mut previous = vec![root_version.clone()];
    for layer in 0..layers {
        let mut current = Vec::with_capacity(width);
        for i in 0..width {
            let resource = Resource::new(&format!("l{layer}-r{i}"), ResourceKind::Mod);
            let resource_id = resource.id.clone();
            store.register_resource(resource).unwrap();
            let version = store
                .register_version(ResourceVersion::draft(&resource_id, "1.0.0"))
                .unwrap()
                .id;
            store.publish_version(&version).unwrap();

            for parent in &previous {
                store
                    .add_edge(
                        parent,
                        NewDependency::new(DependencyType::Required, DependencyTarget::internal(&resource_id)),
                    )
                    .unwrap();
            }
            current.push(version);
        }
        previous = current;
    }

    (store, root_version)
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for (layers, width) in [(4, 4), (8, 6), (12, 8)] {
        let (store, root) = layered(layers, width);
        let resolver = ConstraintResolver::new(&store);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{layers}x{width}")), &root, |b, root| {
            b.iter(|| resolver.resolve(black_box(root)).unwrap());
        });
    }
    group.finish();
}

fn bench_build_graph(c: &mut Criterion) {
    let (store, root) = layered(10, 10);
    let builder = GraphBuilder::new(&store);
    c.bench_function("build_graph_10x10", |b| {
        b.iter(|| builder.build(black_box(&root), BuildOptions::default()).unwrap());
    });
}

criterion_group!(benches, bench_resolve, bench_build_graph);
criterion_main!(benches);
