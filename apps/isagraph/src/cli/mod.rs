//! # isagraph CLI Module
//!
//! ## Available Commands
//!
//! - `validate` - Check every table against the grammar, map nothing
//! - `map` - Validate and map the submission, print a graph summary
//! - `export` - Map, then render one file of the submission

mod commands;

use clap::{Parser, Subcommand};
use isagraph_core::IsaError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// isagraph - experiment metadata tables to graph and back
///
/// Validates tab-separated submission tables against a grammar, maps them
/// into a material/data/processing graph and re-renders single files.
#[derive(Parser, Debug)]
#[command(name = "isagraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Grammar definition (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true, default_value = "grammar.toml")]
    pub grammar: PathBuf,

    /// Submission manifest (TOML)
    #[arg(short, long, global = true, default_value = "manifest.toml")]
    pub manifest: PathBuf,

    /// Mapping configuration (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the submission without mapping it
    Validate,

    /// Map the submission and print a graph summary
    Map {
        /// Fold pooled rows into single processings
        #[arg(long)]
        consolidate: bool,

        /// Write a binary graph snapshot
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Map the submission, then render one file as tab-separated text
    Export {
        /// Identifier of the file to render
        #[arg(short, long)]
        file: String,

        /// Output file path (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reject pooling processings instead of rendering them
        #[arg(long)]
        no_pooling: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), IsaError> {
    let inputs = Inputs::load(&cli.grammar, &cli.manifest, cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Validate) | None => cmd_validate(&inputs, json_mode),
        Some(Commands::Map {
            consolidate,
            snapshot,
        }) => cmd_map(&inputs, json_mode, consolidate, snapshot.as_deref()),
        Some(Commands::Export {
            file,
            output,
            no_pooling,
        }) => cmd_export(&inputs, &file, output.as_deref(), no_pooling),
    }
}
