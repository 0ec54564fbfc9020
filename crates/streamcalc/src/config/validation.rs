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

use std::net::IpAddr;

use crate::backend::BackendType;
use crate::config::{types::*, ValidationError};

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for StreamcalcConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors: Vec<ValidationError> = [
            self.redis.validate(),
            self.server.validate(),
            self.producer.validate(),
            self.consumer.validate(),
            self.results.validate(),
            self.logging.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

fn positive(field: &str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidDuration {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

impl Validate for RedisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.url {
            Some(url) => {
                if BackendType::from_url(url).is_err() {
                    return Err(ValidationError::InvalidRedisUrl { url: url.clone() });
                }
            }
            None => {
                if self.host.trim().is_empty() {
                    return Err(ValidationError::EmptyHost);
                }
                if self.port == 0 {
                    return Err(ValidationError::InvalidPort {
                        field: "redis.port".to_string(),
                    });
                }
            }
        }

        if self.stream_key.is_empty() {
            return Err(ValidationError::EmptyStreamKey);
        }

        positive("redis.retry_step_ms", self.retry_step_ms)?;
        positive("redis.retry_max_delay_ms", self.retry_max_delay_ms)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.bind_address.parse::<IpAddr>().is_err() {
            return Err(ValidationError::InvalidBindAddress {
                address: self.bind_address.clone(),
            });
        }

        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                field: "server.port".to_string(),
            });
        }

        positive(
            "server.graceful_shutdown_timeout_secs",
            self.graceful_shutdown_timeout_secs,
        )
    }
}

impl Validate for ProducerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        positive("producer.wait_timeout_ms", self.wait_timeout_ms)?;
        positive("producer.poll_interval_ms", self.poll_interval_ms)
    }
}

impl Validate for ConsumerSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        positive("consumer.block_ms", self.block_ms)?;
        positive("consumer.error_backoff_ms", self.error_backoff_ms)?;
        if let Some(size) = self.batch_size {
            positive("consumer.batch_size", size as u64)?;
        }
        Ok(())
    }
}

impl Validate for ResultsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        positive("results.ttl_secs", self.ttl_secs)
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ValidationError::InvalidLogLevel {
                    level: self.level.clone(),
                });
            }
        }

        match self.format.as_str() {
            "text" | "json" => Ok(()),
            _ => Err(ValidationError::InvalidLogFormat {
                format: self.format.clone(),
            }),
        }
    }
}
