// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Resource catalog commands

use anyhow::{anyhow, bail, Context, Result};

use super::AppContext;
use crate::types::{Resource, ResourceKind};

/// Run resource command
pub fn run(
    ctx: &AppContext,
    action: &str,
    name: Option<String>,
    kind: Option<String>,
    icon: Option<String>,
) -> Result<()> {
    let store = ctx.open_store()?;

    match action {
        "add" | "create" => {
            let name = name.ok_or_else(|| anyhow!("resource name is required"))?;
            let kind: ResourceKind = kind.as_deref().unwrap_or("mod").parse()?;

            let mut resource = Resource::new(&name, kind);
            resource.icon_url = icon;
            let resource = store
                .register_resource(resource)
                .with_context(|| format!("Failed to register {name}"))?;

            if ctx.json {
                return ctx.print_json(&resource);
            }
            println!("{} {}", ctx.ok("Registered resource:"), resource.name);
            println!("  id: {}", resource.id);
        }

        "list" | "ls" => {
            let resources = store.resources()?;
            if ctx.json {
                return ctx.print_json(&resources);
            }
            if resources.is_empty() {
                println!("No resources registered. Use 'resdeps resource add' to create one.");
                return Ok(());
            }
            println!("{}", ctx.bold(&format!("Resources ({}):", resources.len())));
            for r in &resources {
                println!("  {} {} {}", r.id, r.name, ctx.dim(&format!("({:?})", r.kind).to_lowercase()));
            }
        }

        "show" => {
            let name = name.ok_or_else(|| anyhow!("resource ID or name is required"))?;
            let resource = store.resource(&super::resource_id(&name))?;
            let versions = store.versions_of(&resource.id)?;

            if ctx.json {
                return ctx.print_json(&serde_json::json!({
                    "resource": resource,
                    "versions": versions,
                }));
            }
            println!("{}", ctx.bold(&resource.name));
            println!("  id:   {}", resource.id);
            println!("  slug: {}", resource.slug);
            if let Some(icon) = &resource.icon_url {
                println!("  icon: {icon}");
            }
            println!("  versions:");
            for v in &versions {
                println!("    {} {}", v.version_number, ctx.dim(&format!("{:?}", v.status).to_uppercase()));
            }
        }

        other => bail!("Unknown action: {}. Valid: add, list, show", other),
    }

    Ok(())
}
