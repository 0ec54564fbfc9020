/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! streamcalc-server - HTTP arithmetic API and stream worker.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use streamcalc::config::{ConfigLoader, StreamcalcConfig};
use streamcalc_server::logging::{self, LogFormat};

mod commands;

/// streamcalc - arithmetic over a stream-backed task queue
#[derive(Parser)]
#[command(name = "streamcalc-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (can also be set via STREAMCALC_CONFIG)
    #[arg(long, env = "STREAMCALC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Api {
        /// Port to listen on
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Run the consumer loop
    Worker,
    /// Serve the HTTP API and run the consumer loop in one process
    All {
        /// Port to listen on
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

/// Loads configuration and installs the log subscriber for a run mode.
fn prepare(
    path: Option<&std::path::Path>,
    verbose: bool,
    log_format: Option<LogFormat>,
) -> Result<StreamcalcConfig> {
    let config = ConfigLoader::new()
        .load_config(path)
        .context("Failed to load configuration")?;

    let log_format = match log_format {
        Some(format) => format,
        None => config
            .logging
            .format
            .parse::<LogFormat>()
            .map_err(anyhow::Error::msg)?,
    };
    logging::init_tracing(verbose, &config.logging.level, log_format);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        config: config_path,
        verbose,
        log_format,
        command,
    } = Cli::parse();

    match command {
        Commands::Config { command } => {
            commands::config::handle_config_command(command, config_path).await
        }
        Commands::Api { port } => {
            let config = prepare(config_path.as_deref(), verbose, log_format)?;
            commands::run::api(config, port).await
        }
        Commands::Worker => {
            let config = prepare(config_path.as_deref(), verbose, log_format)?;
            commands::run::worker(config).await
        }
        Commands::All { port } => {
            let config = prepare(config_path.as_deref(), verbose, log_format)?;
            commands::run::all(config, port).await
        }
    }
}
