// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Version lifecycle commands

use anyhow::{anyhow, bail, Result};

use super::AppContext;
use crate::types::ResourceVersion;

/// Run version command
///
/// `target` is a resource for `add`/`list` and a version ID otherwise.
pub fn run(ctx: &AppContext, action: &str, target: &str, number: Option<String>) -> Result<()> {
    let store = ctx.open_store()?;

    match action {
        "add" | "create" => {
            let number = number.ok_or_else(|| anyhow!("version number is required"))?;
            let resource_id = super::resource_id(target);
            let version = store.register_version(ResourceVersion::draft(&resource_id, &number))?;

            if ctx.json {
                return ctx.print_json(&version);
            }
            println!("{} {}", ctx.ok("Created draft version:"), version.id);
        }

        "publish" => {
            let version = store.publish_version(target)?;
            if ctx.json {
                return ctx.print_json(&version);
            }
            println!("{} {}", ctx.ok("Published:"), version.id);
        }

        "list" | "ls" => {
            let versions = store.versions_of(&super::resource_id(target))?;
            if ctx.json {
                return ctx.print_json(&versions);
            }
            if versions.is_empty() {
                println!("No versions for {target}.");
                return Ok(());
            }
            for v in &versions {
                println!("  {} {}", v.id, ctx.dim(&format!("{:?}", v.status).to_uppercase()));
            }
        }

        "remove" | "delete" | "rm" => {
            if store.delete_version(target)? {
                println!("Deleted version {target} and its dependencies");
            } else {
                println!("No version {target}");
            }
        }

        other => bail!("Unknown action: {}. Valid: add, publish, list, remove", other),
    }

    Ok(())
}
