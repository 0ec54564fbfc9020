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

//! Result store abstraction.
//!
//! Key-value operations with per-key expiry. Expiry is enforced by the
//! backend; abandoned results (a producer that never polls) are garbage
//! collected by the TTL alone.

use async_trait::async_trait;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

use crate::models::result_record::ResultRecord;

/// Key prefix for published results.
pub const RESULT_KEY_PREFIX: &str = "results";

/// Default lifetime of a published result.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(60);

/// Errors returned by result store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Result store transport failure: {0}")]
    Transport(String),

    #[error("Stored value under '{key}' is not a valid result record: {message}")]
    Corrupt { key: String, message: String },

    #[error("Failed to serialize result record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for the expiring key-value store results are published to.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Writes `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Reads a live value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Removes a key. Returns `true` when a live value was removed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;
}

/// Store key a request's result is published under: `results:{requestId}`.
pub fn result_key(request_id: impl Display) -> String {
    format!("{}:{}", RESULT_KEY_PREFIX, request_id)
}

/// Serializes and publishes a result record.
pub async fn put_record(
    store: &dyn ResultStore,
    key: &str,
    record: &ResultRecord,
    ttl: Duration,
) -> Result<(), StoreError> {
    let body = serde_json::to_string(record)?;
    store.set(key, &body, ttl).await
}

/// Reads and deserializes a result record, if one is live.
pub async fn get_record(store: &dyn ResultStore, key: &str) -> Result<Option<ResultRecord>, StoreError> {
    match store.get(key).await? {
        Some(body) => serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
