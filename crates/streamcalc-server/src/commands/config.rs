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

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use streamcalc::config::{generate_default_config_toml, ConfigLoader, Validate};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with every default spelled out
    Generate {
        /// Output path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the effective configuration
    Validate,
    /// Print the effective configuration as TOML
    Show,
}

pub async fn handle_config_command(
    command: ConfigCommands,
    config_path: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommands::Generate { output, force } => generate_config(output, force),
        ConfigCommands::Validate => validate_config(config_path.as_deref()),
        ConfigCommands::Show => show_config(config_path.as_deref()),
    }
}

fn generate_config(output: Option<PathBuf>, force: bool) -> Result<()> {
    let output_path = output.unwrap_or_else(|| PathBuf::from("streamcalc.toml"));
    write_default_config(&output_path, force)?;

    println!(
        "{} Generated default configuration: {}",
        "✓".green().bold(),
        output_path.display().to_string().cyan()
    );
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file '{}' already exists. Use --force to overwrite.",
            path.display()
        );
    }

    let content =
        generate_default_config_toml().context("Failed to generate TOML configuration")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))
}

fn validate_config(config_path: Option<&Path>) -> Result<()> {
    let config = ConfigLoader::new()
        .load_config(config_path)
        .context("Failed to load configuration")?;

    match config.validate() {
        Ok(()) => {
            println!("{} Configuration is valid", "✓".green().bold());
            Ok(())
        }
        Err(validation_error) => {
            println!("{} Configuration validation failed:", "✗".red().bold());
            println!("  {}", validation_error.to_string().red());
            Err(validation_error).context("Invalid configuration")
        }
    }
}

fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = ConfigLoader::new()
        .load_config(config_path)
        .context("Failed to load configuration")?;

    if let Err(validation_error) = config.validate() {
        println!(
            "{} Warning: Configuration has validation errors:",
            "⚠".yellow().bold()
        );
        println!("  {}", validation_error.to_string().yellow());
        println!();
    }

    let output =
        toml::to_string_pretty(&config).context("Failed to serialize configuration as TOML")?;
    println!("{}", output);
    Ok(())
}
