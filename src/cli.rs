// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fabrik")]
#[command(about = "Spec-driven deployments with compensating rollback")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new spec file
    New {
        /// Application name
        name: String,

        /// Public domain for the application
        #[arg(short, long)]
        domain: String,

        /// Template to use
        #[arg(short, long)]
        template: Option<String>,

        /// Directory to write the spec into
        #[arg(short, long, default_value = "specs")]
        output: PathBuf,

        /// Overwrite an existing spec
        #[arg(long)]
        force: bool,
    },

    /// Check a spec without deploying it
    Validate {
        spec: PathBuf,
    },

    /// Deploy a spec
    Deploy {
        spec: PathBuf,

        /// Validate and show what would happen without calling any platform
        #[arg(long)]
        dry_run: bool,

        /// Break an existing deploy lock and archive an unfinished run's snapshot
        #[arg(long)]
        force: bool,
    },

    /// Show the last recorded run for a spec
    Status {
        spec: PathBuf,
    },

    /// Finish an interrupted rollback or retry teardown of resources left live
    Rollback {
        spec: PathBuf,

        /// Break an existing deploy lock
        #[arg(long)]
        force: bool,
    },
}
