// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rollcall - records WhatsApp group joins and leaves.
//!
//! This is the binary entry point.

mod journal;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rollcall_config::model::RollcallConfig;

/// Rollcall - records WhatsApp group joins and leaves.
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start recording membership events.
    Serve,
    /// Validate configuration and exit.
    CheckConfig,
    /// List events waiting in the local buffer.
    Journal {
        /// List the emergency file instead.
        #[arg(long)]
        emergency: bool,
        /// Output as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Show the last status snapshot of a running instance.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> RollcallConfig {
    let result = match path {
        Some(path) => rollcall_config::load_and_validate_path(path),
        None => rollcall_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            rollcall_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CheckConfig) => {
            println!(
                "rollcall: config ok (bot.name={}, database={}, sheets={})",
                config.bot.name,
                config.storage.database_path,
                if config.sheets.enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        Some(Commands::Journal { emergency, json }) => {
            journal::run_journal(&config, emergency, json)
        }
        Some(Commands::Status { json }) => status::run_status(&config, json),
        None => {
            println!("rollcall: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
