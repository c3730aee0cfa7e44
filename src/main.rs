//! Stagemix CLI
//!
//! Command-line interface for the Stagemix stem mixer.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use stagemix::cli::commands::{self, RehearseOptions};
use stagemix::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Stagemix v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Stagemix v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Detect {
            path,
            threshold,
            json,
        } => commands::detect(&path, threshold, json)
            .with_context(|| format!("beat detection on {}", path.display())),
        Commands::Inspect { path } => {
            commands::inspect(&path).with_context(|| format!("inspecting {}", path.display()))
        }
        Commands::Rehearse {
            folder,
            marker,
            beat,
            start,
            after,
            count,
            state,
        } => {
            let opts = RehearseOptions {
                folder,
                marker,
                beat,
                start,
                after,
                count,
                state,
            };
            commands::rehearse(&opts)
                .with_context(|| format!("rehearsing in {}", opts.folder.display()))
        }
    }
}
