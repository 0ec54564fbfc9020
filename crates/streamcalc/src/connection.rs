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

//! Redis connection management.
//!
//! Connections are opened once at process start and handed to the components
//! that need them. Establishing the first connection is retried indefinitely
//! with a capped linear backoff:
//!
//! ```text
//! delay(attempt) = min(attempt × step, max_delay)     // 2s, 4s, 6s, ... 30s
//! ```
//!
//! After that, `redis::aio::ConnectionManager` re-establishes a dropped
//! connection on the next command; the failing command itself surfaces as a
//! transport error to the caller. Reconnects follow redis-rs's own schedule,
//! configured from the same [`RetryPolicy`] by [`RetryPolicy::manager_config`]:
//! the delay doubles from one second (with jitter) and is capped at
//! `max_delay`, so only the cap is shared with the startup curve. A cycle makes
//! [`RECONNECT_ATTEMPTS`] tries; when it gives up, the next command starts a
//! new cycle, so reconnection never stops for good.

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::shutdown::Shutdown;

/// Errors that can occur while opening a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid Redis URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Connection attempt cancelled by shutdown")]
    Cancelled,
}

/// Attempts per reconnect cycle. Six doublings from one second reach the
/// default 30s cap.
pub const RECONNECT_ATTEMPTS: usize = 6;

const RECONNECT_GROWTH: u64 = 2;

/// Backoff policy for connection establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub step: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }

    /// Reconnect settings for the managed connection.
    pub fn manager_config(&self) -> ConnectionManagerConfig {
        let max_delay_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        ConnectionManagerConfig::new()
            .set_exponent_base(RECONNECT_GROWTH)
            .set_factor(RECONNECT_GROWTH)
            .set_number_of_retries(RECONNECT_ATTEMPTS)
            .set_max_delay(max_delay_ms)
    }
}

/// Opens a managed connection, retrying until connected or shut down.
///
/// # Arguments
///
/// * `url` - Redis connection URL (`redis://host:port/`)
/// * `name` - Label used in log lines, e.g. `"api"` or `"worker"`
/// * `policy` - Retry backoff policy
/// * `shutdown` - Aborts the retry loop when triggered
pub async fn connect(
    url: &str,
    name: &str,
    policy: RetryPolicy,
    shutdown: &Shutdown,
) -> Result<ConnectionManager, ConnectionError> {
    let client = redis::Client::open(url).map_err(|e| ConnectionError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let mut attempt: u32 = 0;
    loop {
        let opened = tokio::select! {
            opened = open_manager(&client, &policy) => opened,
            _ = shutdown.wait() => return Err(ConnectionError::Cancelled),
        };

        match opened {
            Ok(conn) => {
                info!("[Redis {}] connected to {}", name, redacted(url));
                return Ok(conn);
            }
            Err(e) => {
                attempt = attempt.saturating_add(1);
                let delay = policy.delay(attempt);
                warn!(
                    "[Redis {}] connection failed ({}); retry #{} in {}ms",
                    name,
                    e,
                    attempt,
                    delay.as_millis()
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.wait() => return Err(ConnectionError::Cancelled),
                }
            }
        }
    }
}

/// One plain connection attempt, then the managed connection. The manager's
/// own retries are kept for reconnects; startup pacing stays with the caller.
async fn open_manager(
    client: &redis::Client,
    policy: &RetryPolicy,
) -> redis::RedisResult<ConnectionManager> {
    client.get_multiplexed_async_connection().await?;
    client
        .get_connection_manager_with_config(policy.manager_config())
        .await
}

/// Strips credentials from a URL before it is logged.
fn redacted(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => url.to_string(),
    }
}
