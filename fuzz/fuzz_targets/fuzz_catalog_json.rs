// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Arbitrary deps.json contents must never panic the store or resolver

#![no_main]

use libfuzzer_sys::fuzz_target;
use resdeps::prelude::*;

fuzz_target!(|data: &[u8]| {
    let Ok(catalog) = serde_json::from_slice::<Catalog>(data) else {
        return;
    };
    let roots: Vec<String> = catalog.versions.iter().map(|v| v.id.clone()).collect();
    let store = DependencyStore::new(MemoryBackend::from_catalog(catalog));
    let resolver = ConstraintResolver::new(&store);

    for root in roots.iter().take(8) {
        let _ = resolver.run(root, ResolveOptions { include_optional: true });
    }
});
