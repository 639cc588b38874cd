// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Reverse dependency listing

use anyhow::Result;

use super::AppContext;

/// Run dependents command
pub fn run(ctx: &AppContext, resource: &str, page: usize, limit: usize) -> Result<()> {
    let store = ctx.open_store()?;
    let result = store.dependents(&super::resource_id(resource), page, limit)?;

    if ctx.json {
        return ctx.print_json(&result);
    }

    if result.total == 0 {
        println!("Nothing depends on {resource}.");
        return Ok(());
    }

    println!(
        "{}",
        ctx.bold(&format!(
            "Dependents of {} (page {}/{}, {} edge(s)):",
            resource, result.page, result.total_pages, result.total
        ))
    );
    for dependent in &result.dependents {
        let min = dependent.min_version.as_deref().map(|m| format!(" >= {m}")).unwrap_or_default();
        println!("  {} [{}{}]", dependent.resource.name, dependent.dependency_type, min);
        for v in &dependent.versions {
            println!("    {} {}", v.version_number, ctx.dim(&v.id));
        }
    }

    Ok(())
}
