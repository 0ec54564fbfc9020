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

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::connection::RetryPolicy;
use crate::consumer::ConsumerConfig;
use crate::producer::WaitOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamcalcConfig {
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerSettings,
    pub results: ResultsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Full connection URL; overrides `host` and `port` when set.
    /// `memory://` selects the in-process backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub stream_key: String,
    pub retry_step_ms: u64,
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub block_ms: u64,
    pub error_backoff_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl RedisConfig {
    /// Connection URL built from `url`, or from `host` and `port`.
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            step: Duration::from_millis(self.retry_step_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

impl StreamcalcConfig {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_millis(self.producer.wait_timeout_ms),
            poll_interval: Duration::from_millis(self.producer.poll_interval_ms),
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig::builder()
            .stream_key(self.redis.stream_key.clone())
            .block(Duration::from_millis(self.consumer.block_ms))
            .error_backoff(Duration::from_millis(self.consumer.error_backoff_ms))
            .batch_size(self.consumer.batch_size)
            .result_ttl(Duration::from_secs(self.results.ttl_secs))
            .build()
    }
}
