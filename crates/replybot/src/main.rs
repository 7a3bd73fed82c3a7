// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replybot - answers Bluesky mentions with Gemini.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use replybot_config::ReplybotConfig;

/// Replybot - answers Bluesky mentions with Gemini.
#[derive(Parser, Debug)]
#[command(name = "replybot", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot until SIGINT or SIGTERM.
    Serve,
    /// Show queue sizes and quota usage from the database.
    Status {
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Validate configuration and report missing credentials.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> ReplybotConfig {
    let result = match path {
        Some(path) => replybot_config::load_and_validate_path(path),
        None => replybot_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            replybot_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Status { json, plain }) => {
            if let Err(e) = status::run_status(&config, json, plain).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => match replybot_config::validate_credentials(&config) {
            Ok(()) => println!("replybot: configuration OK (agent.name={})", config.agent.name),
            Err(errors) => {
                replybot_config::render_errors(&errors);
                std::process::exit(1);
            }
        },
        None => {
            println!("replybot: use --help for available commands");
        }
    }
}
