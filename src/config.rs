// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Layers, lowest first: built-in defaults, an optional TOML file, then
//! `RESDEPS_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_MAX_DEPTH;
use crate::store::StorePolicy;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "RESDEPS";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "hyperpolymath", "resdeps")
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `deps.json`
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graph expansion depth guard
    pub max_depth: usize,
    /// Install OPTIONAL dependencies unless told otherwise
    pub include_optional: bool,
    /// Refuse edge changes on versions that are not DRAFT or REJECTED
    pub require_editable_version: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".resdeps")),
            log_level: "info".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            include_optional: false,
            require_editable_version: true,
        }
    }
}

impl Config {
    /// Write rules for the store
    #[must_use]
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            require_editable_version: self.require_editable_version,
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

/// Default location of the config file
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from `path` (or the default location) and the environment
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = ::config::Config::try_from(&Config::default()).context("Failed to seed configuration defaults")?;

    let mut builder = ::config::Config::builder().add_source(defaults);

    match path {
        Some(p) => {
            builder = builder.add_source(::config::File::from(p).format(::config::FileFormat::Toml).required(true));
        }
        None => {
            if let Some(p) = default_path() {
                builder = builder.add_source(
                    ::config::File::from(p.as_path())
                        .format(::config::FileFormat::Toml)
                        .required(false),
                );
            }
        }
    }

    let settings = builder
        .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("Failed to read configuration")?;

    settings
        .try_deserialize::<Config>()
        .context("Invalid configuration")
}
