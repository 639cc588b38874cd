// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod config;
pub mod dep;
pub mod dependents;
pub mod graph;
pub mod resolve;
pub mod resource;
pub mod version;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::backend::JsonBackend;
use crate::config::Config;
use crate::store::DependencyStore;

/// Everything a command needs, resolved once by the binary
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Effective configuration
    pub config: Config,
    /// Emit JSON instead of text
    pub json: bool,
    /// Colorize text output
    pub color: bool,
}

impl AppContext {
    /// Open the store in the configured data directory
    pub fn open_store(&self) -> Result<DependencyStore<JsonBackend>> {
        let backend = JsonBackend::open(&self.config.data_dir)
            .with_context(|| format!("Failed to load dependencies from {}", self.config.data_dir.display()))?;
        Ok(DependencyStore::new(backend).with_policy(self.config.store_policy()))
    }

    /// Print a value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub(crate) fn bold(&self, s: &str) -> String {
        if self.color {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }

    pub(crate) fn ok(&self, s: &str) -> String {
        if self.color {
            s.green().to_string()
        } else {
            s.to_string()
        }
    }

    pub(crate) fn dim(&self, s: &str) -> String {
        if self.color {
            s.dimmed().to_string()
        } else {
            s.to_string()
        }
    }

    pub(crate) fn bad(&self, s: &str) -> String {
        if self.color {
            s.red().to_string()
        } else {
            s.to_string()
        }
    }
}

/// Accept a resource by ID, slug or name
pub(crate) fn resource_id(input: &str) -> String {
    if input.starts_with("res:") {
        input.to_string()
    } else {
        crate::types::Resource::generate_id(&crate::types::slugify(input))
    }
}
