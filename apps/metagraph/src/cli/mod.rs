//! # Metagraph CLI Module
//!
//! This module implements the CLI interface for Metagraph.
//!
//! ## Available Commands
//!
//! - `query` - Run one GQL query against the loaded model
//! - `shell` - Interactive GQL shell
//! - `check` - Load everything and report model statistics (default)
//! - `schema` - Show classes and associations, or one class in detail
//! - `ownership` - Show how an element class is attached to an owner class

mod commands;

use crate::config::{Config, OutputFormat};
use crate::workspace::{MountSource, Sources};
use clap::{Parser, Subcommand};
use metagraph_core::MetagraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Metagraph - query metamodel-driven object graphs
///
/// Loads a schema and model documents (JSON or TOML) into an in-memory
/// object graph and answers GQL pattern queries over it.
#[derive(Parser, Debug)]
#[command(name = "metagraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banners and summaries
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the config file (default: ./metagraph.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Schema document
    #[arg(short, long, global = true)]
    pub schema: Option<PathBuf>,

    /// Model document (repeatable; replaces the configured models)
    #[arg(short, long = "model", global = true)]
    pub models: Vec<PathBuf>,

    /// Mount a model read-only as ID=PATH (repeatable)
    #[arg(long = "mount", global = true, value_parser = parse_mount)]
    pub mounts: Vec<MountSource>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a GQL query
    Query {
        /// Query text
        text: Option<String>,

        /// Read the query text from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Start an interactive GQL shell; statements end with ';'
    Shell,

    /// Load schema and models and report statistics
    Check,

    /// Show the schema
    Schema {
        /// Show one class in detail
        class: Option<String>,
    },

    /// Resolve the ownership pattern for an owner and element class
    Ownership {
        /// Class of the owner
        owner: String,

        /// Class of the new element
        element: String,
    },
}

/// `ID=PATH` for `--mount`.
fn parse_mount(arg: &str) -> Result<MountSource, String> {
    let (id, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=PATH, got '{}'", arg))?;
    if id.is_empty() || path.is_empty() {
        return Err(format!("expected ID=PATH, got '{}'", arg));
    }
    Ok(MountSource {
        id: id.to_string(),
        paths: vec![PathBuf::from(path)],
    })
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Config file values with CLI flags applied on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub sources: Sources,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Settings {
    /// Merge `config` and the flags of `cli`; flags win.
    ///
    /// `--model` replaces the configured model list. A `--mount` id that is
    /// also configured replaces the configured paths for that id.
    #[must_use]
    pub fn resolve(config: Config, cli: &Cli) -> Self {
        let schema = cli.schema.clone().or(config.schema.path);
        let models = if cli.models.is_empty() {
            config.model.paths
        } else {
            cli.models.clone()
        };

        let mut mounts: Vec<MountSource> = Vec::new();
        let configured = config.mounts.into_iter().map(|m| MountSource {
            id: m.id,
            paths: m.paths,
        });
        for mount in configured {
            merge_mount(&mut mounts, mount, false);
        }
        let mut from_cli: Vec<MountSource> = Vec::new();
        for mount in &cli.mounts {
            merge_mount(&mut from_cli, mount.clone(), false);
        }
        for mount in from_cli {
            merge_mount(&mut mounts, mount, true);
        }

        let output = if cli.json {
            OutputFormat::Json
        } else {
            config.output.format
        };

        Self {
            sources: Sources {
                schema,
                models,
                mounts,
            },
            output,
            quiet: cli.quiet,
        }
    }
}

/// Add `mount`, either appending to an existing id or replacing it.
fn merge_mount(mounts: &mut Vec<MountSource>, mount: MountSource, replace: bool) {
    match mounts.iter_mut().find(|m| m.id == mount.id) {
        Some(existing) if replace => existing.paths = mount.paths,
        Some(existing) => existing.paths.extend(mount.paths),
        None => mounts.push(mount),
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: Config) -> Result<(), MetagraphError> {
    let settings = Settings::resolve(config, &cli);

    match cli.command {
        Some(Commands::Query { text, file }) => cmd_query(&settings, text, file.as_deref()),
        Some(Commands::Shell) => cmd_shell(&settings),
        Some(Commands::Schema { class }) => cmd_schema(&settings, class.as_deref()),
        Some(Commands::Ownership { owner, element }) => {
            cmd_ownership(&settings, &owner, &element)
        }
        Some(Commands::Check) | None => cmd_check(&settings),
    }
}
