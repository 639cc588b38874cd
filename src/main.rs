// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! resdeps CLI - dependency graphs and install plans for marketplace resources

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use resdeps::commands::{self, dep::DepArgs, AppContext};
use resdeps::config;

#[derive(Parser)]
#[command(name = "resdeps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "RESDEPS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, env = "RESDEPS_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage resources
    Resource {
        /// Action: add, list, show
        action: String,

        /// Resource name (or ID for show)
        name: Option<String>,

        /// Resource kind (mod, plugin, world, modpack, other)
        #[arg(long)]
        kind: Option<String>,

        /// Icon URL
        #[arg(long)]
        icon: Option<String>,
    },

    /// Manage resource versions
    Version {
        /// Action: add, publish, list, remove
        action: String,

        /// Resource (add, list) or version ID (publish, remove)
        target: String,

        /// Version number (add)
        number: Option<String>,
    },

    /// Manage dependency edges
    Dep {
        /// Action: add, update, remove, list
        action: String,

        /// Version ID (add, list) or edge ID (update, remove)
        target: String,

        /// Depend on a platform resource
        #[arg(long)]
        on: Option<String>,

        /// Depend on an off-platform artifact by name
        #[arg(long, conflicts_with = "on")]
        external: Option<String>,

        /// URL of the external artifact
        #[arg(long, requires = "external")]
        url: Option<String>,

        /// Relationship: required, optional, incompatible, embedded
        #[arg(short = 't', long = "type")]
        dependency_type: Option<String>,

        /// Minimum version
        #[arg(long)]
        min: Option<String>,

        /// Remove the minimum version (update)
        #[arg(long)]
        clear_min: bool,
    },

    /// List versions that depend on a resource
    Dependents {
        /// Resource ID or name
        resource: String,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Edges per page
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Export a version's dependency graph
    Graph {
        /// Root version ID
        version: String,

        /// Output format (dot, json, tree)
        #[arg(short, long, default_value = "tree")]
        format: String,

        /// Follow optional dependencies
        #[arg(long)]
        include_optional: bool,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute an install plan for a version
    Resolve {
        /// Root version ID
        version: String,

        /// Install optional dependencies too
        #[arg(long)]
        include_optional: bool,
    },

    /// Show configuration
    Config {
        /// Action: show, path
        #[arg(default_value = "show")]
        action: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Initialize logging
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = AppContext {
        config,
        json: cli.json,
        color: !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Resource { action, name, kind, icon } => {
            commands::resource::run(&ctx, &action, name, kind, icon)
        }
        Commands::Version { action, target, number } => {
            commands::version::run(&ctx, &action, &target, number)
        }
        Commands::Dep { action, target, on, external, url, dependency_type, min, clear_min } => {
            let args = DepArgs { on, external, url, dependency_type, min, clear_min };
            commands::dep::run(&ctx, &action, &target, args)
        }
        Commands::Dependents { resource, page, limit } => {
            commands::dependents::run(&ctx, &resource, page, limit)
        }
        Commands::Graph { version, format, include_optional, output } => {
            commands::graph::run(&ctx, &version, &format, include_optional, output)
        }
        Commands::Resolve { version, include_optional } => {
            commands::resolve::run(&ctx, &version, include_optional)
        }
        Commands::Config { action } => {
            commands::config::run(&ctx, &action)
        }
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
