// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Effective configuration

use anyhow::{bail, Result};

use super::AppContext;

/// Run config command
pub fn run(ctx: &AppContext, action: &str) -> Result<()> {
    match action {
        "show" | "get" => {
            if ctx.json {
                return ctx.print_json(&ctx.config);
            }
            print!("{}", ctx.config.to_toml()?);
        }
        "path" => match crate::config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => bail!("No configuration directory on this platform"),
        },
        other => bail!("Unknown action: {}. Valid: show, path", other),
    }
    Ok(())
}
