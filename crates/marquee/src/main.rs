// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Marquee - appliance message-delivery daemon.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod status;
mod surface;
mod workers;

use clap::{Parser, Subcommand};
use marquee_config::model::MarqueeConfig;
use marquee_core::MarqueeError;

/// Marquee - appliance message-delivery daemon.
#[derive(Parser, Debug)]
#[command(name = "marquee", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon.
    Serve,
    /// Ping the local daemon and show device status.
    Status {
        /// Output structured JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Print the resolved configuration as TOML.
    Config,
}

fn print_config(config: &MarqueeConfig) -> Result<(), MarqueeError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| MarqueeError::Config(format!("failed to render configuration: {e}")))?;
    print!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match marquee_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            marquee_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("marquee: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("marquee: {e}");
        std::process::exit(1);
    }
}
