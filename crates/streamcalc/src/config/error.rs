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

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read configuration file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Environment variable substitution failed: {0}")]
    EnvSubstitutionError(String),

    #[error("Invalid value for environment variable {name}: '{value}'")]
    InvalidEnvValue { name: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Unsupported configuration file format: {extension}")]
    UnsupportedFormat { extension: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid Redis URL: {url} (expected redis://, rediss:// or memory://)")]
    InvalidRedisUrl { url: String },

    #[error("Invalid Redis host: host cannot be empty")]
    EmptyHost,

    #[error("Invalid port for {field}: port cannot be 0")]
    InvalidPort { field: String },

    #[error("Invalid log level: {level} (must be one of: error, warn, info, debug, trace)")]
    InvalidLogLevel { level: String },

    #[error("Invalid log format: {format} (must be one of: text, json)")]
    InvalidLogFormat { format: String },

    #[error("Invalid duration for {field}: {value} (must be positive)")]
    InvalidDuration { field: String, value: u64 },

    #[error("Invalid stream key: key cannot be empty")]
    EmptyStreamKey,

    #[error("Invalid bind address: {address}")]
    InvalidBindAddress { address: String },

    #[error("Multiple validation errors: {errors:?}")]
    Multiple { errors: Vec<ValidationError> },
}
