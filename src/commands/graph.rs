// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph export command

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use super::AppContext;
use crate::graph::{BuildOptions, DependencyGraph, GraphBuilder, NodeKey};

/// Run graph command
pub fn run(
    ctx: &AppContext,
    version_id: &str,
    format: &str,
    include_optional: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = ctx.open_store()?;
    let graph = GraphBuilder::new(&store)
        .with_max_depth(ctx.config.max_depth)
        .build(
            version_id,
            BuildOptions {
                include_optional: include_optional || ctx.config.include_optional,
            },
        )?;

    let format = if ctx.json { "json" } else { format };
    let content = match format {
        "dot" => graph.to_dot(),
        "json" => graph.to_json()?,
        "tree" | "text" => render_tree(&graph),
        other => bail!("Unknown format: {}. Valid: dot, json, tree", other),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &content).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported graph to {}", path.display());
        }
        None => {
            print!("{content}");
            if !content.ends_with('\n') {
                println!();
            }
        }
    }

    Ok(())
}

/// Indented dependency tree; shared nodes are expanded once and marked after
fn render_tree(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    let mut seen = std::collections::HashSet::new();
    walk(graph, graph.root(), 0, None, &mut seen, &mut out);
    out
}

fn walk(
    graph: &DependencyGraph,
    key: &NodeKey,
    indent: usize,
    via: Option<String>,
    seen: &mut std::collections::HashSet<NodeKey>,
    out: &mut String,
) {
    let Some(node) = graph.node(key) else {
        return;
    };
    let label = match node.version() {
        Some(v) => format!("{} {}", node.name(), v.version_number),
        None => node.key.to_string(),
    };
    let via = via.map(|v| format!(" ({v})")).unwrap_or_default();
    let first = seen.insert(key.clone());
    let repeat = if first { "" } else { " *" };
    out.push_str(&format!("{}{}{}{}\n", "  ".repeat(indent), label, via, repeat));
    if !first {
        return;
    }
    for (child, edge) in graph.dependencies_of(key) {
        walk(graph, &child.key, indent + 1, Some(edge.dependency_type.to_string()), seen, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use crate::store::StorePolicy;

    #[test]
    fn test_tree_marks_repeated_nodes() {
        let store = DependencyStore::default().with_policy(StorePolicy { require_editable_version: false });
        let mut ids = Vec::new();
        for name in ["app", "left", "right", "shared"] {
            store.register_resource(Resource::new(name, ResourceKind::Mod)).unwrap();
            let id = store
                .register_version(ResourceVersion::draft(&Resource::generate_id(name), "1"))
                .unwrap()
                .id;
            store.publish_version(&id).unwrap();
            ids.push(id);
        }
        for (from, on) in [(0, "left"), (0, "right"), (1, "shared"), (2, "shared")] {
            store
                .add_edge(
                    &ids[from],
                    NewDependency::new(DependencyType::Required, DependencyTarget::internal(&Resource::generate_id(on))),
                )
                .unwrap();
        }

        let graph = GraphBuilder::new(&store).build(&ids[0], BuildOptions::default()).unwrap();
        let tree = render_tree(&graph);
        assert!(tree.starts_with("app 1\n"));
        assert!(tree.contains("  left 1 (REQUIRED)\n    shared 1 (REQUIRED)\n"));
        assert!(tree.contains("    shared 1 (REQUIRED) *\n"));
    }
}
