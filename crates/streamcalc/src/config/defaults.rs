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

use crate::config::types::*;
use crate::DEFAULT_STREAM_KEY;

impl Default for StreamcalcConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            server: ServerConfig::default(),
            producer: ProducerConfig::default(),
            consumer: ConsumerSettings::default(),
            results: ResultsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "redis".to_string(),
            port: 6379,
            url: None,
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            retry_step_ms: 2000,
            retry_max_delay_ms: 30000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            graceful_shutdown_timeout_secs: 30,
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 10000,
            poll_interval_ms: 100,
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            block_ms: 5000,
            error_backoff_ms: 2000,
            batch_size: None, // Read everything available
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Generate a complete default configuration as TOML string
pub fn generate_default_config_toml() -> Result<String, toml::ser::Error> {
    let config = StreamcalcConfig::default();
    toml::to_string_pretty(&config)
}
