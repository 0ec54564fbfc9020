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

use crate::config::{ConfigError, StreamcalcConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "STREAMCALC_CONFIG";

// Matches ${VAR}, ${VAR:-default}, ${VAR:?error}
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern compiles"));

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory
        search_paths.push(PathBuf::from("./streamcalc.toml"));

        // 2. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("streamcalc").join("config.toml"));
        }

        // 3. System config directory
        search_paths.push(PathBuf::from("/etc/streamcalc/config.toml"));

        Self { search_paths }
    }

    /// Create a config loader with custom search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load configuration from the specified file, `STREAMCALC_CONFIG`, or
    /// the first file found on the search path, then apply environment
    /// overrides.
    ///
    /// An explicitly named file must exist. When nothing is named and no file
    /// is found, defaults are used.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<StreamcalcConfig, ConfigError> {
        let explicit = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from),
        };

        let mut config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::ConfigNotFound { path });
                }
                self.load_config_from_file(&path)?
            }
            None => match self.find_config_file() {
                Some(path) => self.load_config_from_file(&path)?,
                None => {
                    debug!("No configuration file found; using defaults");
                    StreamcalcConfig::default()
                }
            },
        };

        apply_env_overrides(&mut config, |name| env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_config_from_file(&self, path: &Path) -> Result<StreamcalcConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let substituted_content = substitute_env_vars(&content)?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => toml::from_str::<StreamcalcConfig>(&substituted_content)?,
            Some(ext) => {
                return Err(ConfigError::UnsupportedFormat {
                    extension: ext.to_string(),
                })
            }
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find the first existing configuration file in search paths
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    /// Get all search paths for debugging
    pub fn get_search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies `REDIS_HOST`, `REDIS_PORT` and `PORT` on top of a loaded config.
///
/// An explicit `redis.url` takes precedence over host and port, so the two
/// Redis variables are recorded but have no effect on the connection; a
/// warning says so.
pub fn apply_env_overrides<F>(config: &mut StreamcalcConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("REDIS_HOST").filter(|v| !v.is_empty());
    let port = lookup("REDIS_PORT").filter(|v| !v.is_empty());

    if config.redis.url.is_some() && (host.is_some() || port.is_some()) {
        warn!("REDIS_HOST/REDIS_PORT are ignored because redis.url is set");
    }
    if let Some(host) = host {
        config.redis.host = host;
    }
    if let Some(port) = port {
        config.redis.port = parse_port("REDIS_PORT", &port)?;
    }
    if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
        config.server.port = parse_port("PORT", &port)?;
    }
    Ok(())
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnvValue {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Substitute environment variables in configuration content
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let full_match = &cap[0];
        let var_expr = &cap[1];

        let replacement = process_var_expression(var_expr)?;
        result = result.replace(full_match, &replacement);
    }

    Ok(result)
}

/// Process a variable expression like "VAR", "VAR:-default", or "VAR:?error"
fn process_var_expression(expr: &str) -> Result<String, ConfigError> {
    if let Some((var_name, default_value)) = expr.split_once(":-") {
        Ok(env::var(var_name).unwrap_or_else(|_| default_value.to_string()))
    } else if let Some((var_name, error_msg)) = expr.split_once(":?") {
        env::var(var_name).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!(
                "Required environment variable '{}' is not set: {}",
                var_name, error_msg
            ))
        })
    } else {
        env::var(expr).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!(
                "Required environment variable '{}' is not set",
                expr
            ))
        })
    }
}
