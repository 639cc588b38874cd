// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Install planning command

use anyhow::{anyhow, Result};

use super::AppContext;
use crate::error::DependencyError;
use crate::graph::GraphBuilder;
use crate::resolver::{ConstraintResolver, InstallPlan, ResolveOptions};

/// Run resolve command
pub fn run(ctx: &AppContext, version_id: &str, include_optional: bool) -> Result<()> {
    let store = ctx.open_store()?;
    let resolver = ConstraintResolver::with_builder(GraphBuilder::new(&store).with_max_depth(ctx.config.max_depth));
    let options = ResolveOptions {
        include_optional: include_optional || ctx.config.include_optional,
    };

    let report = resolver.run(version_id, options);
    if ctx.json {
        ctx.print_json(&report)?;
        return match report.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        };
    }

    let state = report.state;
    match report.into_result() {
        Ok(plan) => {
            print_plan(ctx, &plan);
            Ok(())
        }
        Err(err) => {
            eprintln!("{} {:?}", ctx.bad("Resolution failed:"), state);
            if let DependencyError::IncompatibleDependency { conflicts } = &err {
                for c in conflicts {
                    eprintln!("  {} is incompatible with {}", c.declared_by, c.conflicts_with);
                }
            }
            Err(anyhow!(err))
        }
    }
}

fn print_plan(ctx: &AppContext, plan: &InstallPlan) {
    println!("{}", ctx.bold(&format!("Install plan for {} ({} step(s)):", plan.root, plan.len())));
    for (i, step) in plan.steps.iter().enumerate() {
        let min = step.min_version.as_deref().map(|m| format!(" (>= {m})")).unwrap_or_default();
        println!("  {}. {} {}{}", i + 1, step.resource_name, step.version_number, min);
    }

    if !plan.bundled.is_empty() {
        println!("{}", ctx.bold("Bundled:"));
        for b in &plan.bundled {
            println!("  {} {} in {}", b.resource_name, b.version_number, b.embedded_in.join(", "));
        }
    }

    if !plan.external.is_empty() {
        println!("{}", ctx.bold("External requirements:"));
        for e in &plan.external {
            let min = e.min_version.as_deref().map(|m| format!(" >= {m}")).unwrap_or_default();
            println!("  {}{} <{}>", e.name, min, e.url);
            for url in &e.other_urls {
                println!("    {} <{}>", ctx.dim("also declared at"), url);
            }
        }
    }

    if !plan.skipped_optional.is_empty() {
        println!("{}", ctx.dim("Skipped optional (use --include-optional):"));
        for s in &plan.skipped_optional {
            println!("  {}", ctx.dim(&format!("{} -> {}", s.declared_by, s.target)));
        }
    }
}
