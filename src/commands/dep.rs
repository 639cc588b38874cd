// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Dependency edge commands

use anyhow::{anyhow, bail, Result};

use super::AppContext;
use crate::types::{DependencyEdge, DependencyTarget, DependencyType, EdgeUpdate, NewDependency};

/// Arguments for dependency edges
#[derive(Debug, Default)]
pub struct DepArgs {
    /// Internal target resource
    pub on: Option<String>,
    /// External target name
    pub external: Option<String>,
    /// External target URL
    pub url: Option<String>,
    /// Relationship (required, optional, incompatible, embedded)
    pub dependency_type: Option<String>,
    /// Minimum version
    pub min: Option<String>,
    /// Drop the minimum version on update
    pub clear_min: bool,
}

/// Run dep command
///
/// `target` is a version ID for `add`/`list` and an edge ID otherwise.
pub fn run(ctx: &AppContext, action: &str, target: &str, args: DepArgs) -> Result<()> {
    let store = ctx.open_store()?;

    match action {
        "add" | "create" => {
            let dependency_type: DependencyType = args.dependency_type.as_deref().unwrap_or("required").parse()?;
            let dep_target = match (args.on, args.external) {
                (Some(on), None) => {
                    let resource_id = super::resource_id(&on);
                    match args.min {
                        Some(min) => DependencyTarget::internal_at_least(&resource_id, &min),
                        None => DependencyTarget::internal(&resource_id),
                    }
                }
                (None, Some(name)) => {
                    let url = args.url.ok_or_else(|| anyhow!("--url is required for external dependencies"))?;
                    DependencyTarget::external(&name, &url, args.min.as_deref())
                }
                _ => bail!("Specify exactly one of --on <resource> or --external <name>"),
            };

            let edge = store.add_edge(target, NewDependency::new(dependency_type, dep_target))?;
            if ctx.json {
                return ctx.print_json(&edge);
            }
            println!("{} {} -> {}", ctx.ok("Added dependency:"), edge.version_id, edge.target);
            println!("  type: {}", edge.dependency_type);
            println!("  id: {}", edge.id);
        }

        "update" | "set" => {
            let dependency_type = args
                .dependency_type
                .as_deref()
                .map(str::parse::<DependencyType>)
                .transpose()?;
            let min_version = match (args.clear_min, args.min) {
                (true, Some(_)) => bail!("--min and --clear-min are mutually exclusive"),
                (true, None) => Some(None),
                (false, min) => min.map(Some),
            };
            if dependency_type.is_none() && min_version.is_none() {
                bail!("Nothing to update. Pass --type, --min or --clear-min");
            }

            let edge = store.update_edge(target, EdgeUpdate { dependency_type, min_version })?;
            if ctx.json {
                return ctx.print_json(&edge);
            }
            println!("{} {}", ctx.ok("Updated dependency:"), edge.id);
            print_edge(ctx, &edge);
        }

        "remove" | "delete" | "rm" => {
            if store.remove_edge(target)? {
                println!("Removed dependency {target}");
            } else {
                println!("No dependency {target}");
            }
        }

        "list" | "ls" => {
            let edges = store.list_edges(target)?;
            if ctx.json {
                return ctx.print_json(&edges);
            }
            if edges.is_empty() {
                println!("{target} has no dependencies.");
                return Ok(());
            }
            println!("{}", ctx.bold(&format!("Dependencies of {} ({}):", target, edges.len())));
            for edge in &edges {
                print_edge(ctx, edge);
            }
        }

        other => bail!("Unknown action: {}. Valid: add, update, remove, list", other),
    }

    Ok(())
}

fn print_edge(ctx: &AppContext, edge: &DependencyEdge) {
    let kind = match edge.dependency_type {
        DependencyType::Incompatible => ctx.bad(edge.dependency_type.as_str()),
        other => other.as_str().to_string(),
    };
    println!("  {:<12} {} {}", kind, edge.target, ctx.dim(&edge.id));
}
