// ABOUTME: Entry point for the fabrik CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use fabrik::config::Settings;
use fabrik::error::Result;
use fabrik::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    if let Err(e) = run(cli.command, Output::new(mode)).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match command {
        Commands::New {
            name,
            domain,
            template,
            output: dir,
            force,
        } => commands::new_spec(&dir, &name, &domain, template.as_deref(), force, output),
        Commands::Validate { spec } => {
            let settings = Settings::discover_or_default(&cwd)?;
            commands::validate(&settings, &spec, output).await
        }
        Commands::Deploy {
            spec,
            dry_run,
            force,
        } => {
            let settings = Settings::discover_or_default(&cwd)?;
            commands::deploy(&settings, &spec, dry_run, force, output).await
        }
        Commands::Status { spec } => {
            let settings = Settings::discover_or_default(&cwd)?;
            commands::status(&settings, &spec, output)
        }
        Commands::Rollback { spec, force } => {
            let settings = Settings::discover_or_default(&cwd)?;
            commands::rollback(&settings, &spec, force, output).await
        }
    }
}
