// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Billvault - document vault and subscription mirror.
//!
//! This is the binary entry point.

mod recover;
mod serve;

use billvault_config::model::BillvaultConfig;
use billvault_core::BillvaultError;
use clap::{Parser, Subcommand};

/// Billvault - document vault and subscription mirror.
#[derive(Parser, Debug)]
#[command(name = "billvault", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Remove interrupted writes and report unreferenced payloads.
    Recover {
        /// Delete unreferenced payloads instead of only listing them.
        #[arg(long)]
        prune: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match billvault_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            billvault_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            serve::init_tracing(&config.server.log_level);
            serve::run_serve(config).await
        }
        Some(Commands::Recover { prune }) => {
            serve::init_tracing(&config.server.log_level);
            recover::run_recover(&config, prune).await
        }
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("billvault: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_config(config: &BillvaultConfig) -> Result<(), BillvaultError> {
    print!("{}", render_config(config)?);
    Ok(())
}

/// Effective configuration as TOML with the billing credentials redacted.
fn render_config(config: &BillvaultConfig) -> Result<String, BillvaultError> {
    let mut shown = config.clone();
    for secret in [&mut shown.billing.webhook_secret, &mut shown.billing.api_key] {
        if secret.is_some() {
            *secret = Some("[redacted]".to_string());
        }
    }
    toml::to_string_pretty(&shown).map_err(|e| BillvaultError::Config(e.to_string()))
}
