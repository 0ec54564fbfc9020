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

//! Task submission.
//!
//! Two modes:
//!
//! - [`Producer::submit_and_wait`] appends a task and polls the result store
//!   until the result appears or the wait times out. A result read this way is
//!   deleted, so it can only be collected once.
//! - [`Producer::submit_async`] appends a task and returns its request id. The
//!   result is later read with [`ResultQuery`](crate::query::ResultQuery),
//!   which never deletes.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::envelope::{encode, Addition, TaskPayload};
use crate::models::entry_id::EntryId;
use crate::models::result_record::ResultRecord;
use crate::models::task_envelope::TaskEnvelope;
use crate::models::RequestId;
use crate::store::{get_record, result_key, ResultStore, StoreError};
use crate::stream::{StreamError, TaskLog};

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Polling parameters for [`Producer::submit_and_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10000),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A task that has been appended to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub request_id: RequestId,
    pub entry_id: EntryId,
}

/// Outcome of a blocking submission.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Completed {
        request_id: RequestId,
        record: ResultRecord,
    },
    /// No result appeared within the timeout. The task stays queued and may
    /// still complete; its result then expires unread.
    TimedOut { request_id: RequestId },
}

impl WaitOutcome {
    pub fn request_id(&self) -> RequestId {
        match self {
            WaitOutcome::Completed { request_id, .. } | WaitOutcome::TimedOut { request_id } => {
                *request_id
            }
        }
    }
}

/// Extracts finite numeric operands `a` and `b` from a JSON object.
///
/// Numeric strings, booleans and nulls are rejected.
pub fn parse_operands(body: &Value) -> Result<Addition, ProducerError> {
    let operand = |name: &str| {
        body.get(name)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| ProducerError::InvalidArgument("a and b must be numbers".to_string()))
    };
    Ok(Addition::new(operand("a")?, operand("b")?))
}

/// Appends tasks and collects their results.
#[derive(Clone)]
pub struct Producer {
    log: Arc<dyn TaskLog>,
    store: Arc<dyn ResultStore>,
    stream_key: String,
    wait: WaitOptions,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("stream_key", &self.stream_key)
            .field("wait", &self.wait)
            .finish()
    }
}

impl Producer {
    pub fn new(
        log: Arc<dyn TaskLog>,
        store: Arc<dyn ResultStore>,
        stream_key: impl Into<String>,
    ) -> Self {
        Self {
            log,
            store,
            stream_key: stream_key.into(),
            wait: WaitOptions::default(),
        }
    }

    /// Overrides the default wait timeout and poll interval.
    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    pub fn wait_options(&self) -> WaitOptions {
        self.wait
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Appends a typed task under a fresh request id.
    pub async fn submit<P: TaskPayload>(&self, payload: P) -> Result<Submission, ProducerError> {
        let envelope = TaskEnvelope::new(payload);
        let entry_id = self.log.append(&self.stream_key, &encode(&envelope)).await?;

        metrics::counter!("streamcalc_tasks_enqueued_total").increment(1);
        debug!(
            "Enqueued {} task {} (request {})",
            envelope.task_type, entry_id, envelope.request_id
        );
        Ok(Submission {
            request_id: envelope.request_id,
            entry_id,
        })
    }

    /// Appends an addition task and returns without waiting.
    pub async fn submit_async(&self, a: f64, b: f64) -> Result<Submission, ProducerError> {
        self.submit(finite_addition(a, b)?).await
    }

    /// Appends an addition task and waits for its result with the default options.
    pub async fn submit_and_wait(&self, a: f64, b: f64) -> Result<WaitOutcome, ProducerError> {
        self.submit_and_wait_with(finite_addition(a, b)?, self.wait)
            .await
    }

    /// Appends a typed task and waits for its result.
    pub async fn submit_and_wait_with<P: TaskPayload>(
        &self,
        payload: P,
        options: WaitOptions,
    ) -> Result<WaitOutcome, ProducerError> {
        let submission = self.submit(payload).await?;
        self.wait_for_result(submission.request_id, options).await
    }

    /// Polls for a result, deleting it once read.
    ///
    /// Polls every `poll_interval` while less than `timeout` has elapsed. A
    /// store error ends the wait immediately.
    pub async fn wait_for_result(
        &self,
        request_id: RequestId,
        options: WaitOptions,
    ) -> Result<WaitOutcome, ProducerError> {
        let key = result_key(request_id);
        let started = Instant::now();

        while started.elapsed() < options.timeout {
            if let Some(record) = get_record(self.store.as_ref(), &key).await? {
                self.store.del(&key).await?;
                return Ok(WaitOutcome::Completed { request_id, record });
            }
            tokio::time::sleep(options.poll_interval).await;
        }

        debug!(
            "Timed out after {}ms waiting for request {}",
            options.timeout.as_millis(),
            request_id
        );
        Ok(WaitOutcome::TimedOut { request_id })
    }
}

fn finite_addition(a: f64, b: f64) -> Result<Addition, ProducerError> {
    if !a.is_finite() || !b.is_finite() {
        return Err(ProducerError::InvalidArgument(
            "a and b must be numbers".to_string(),
        ));
    }
    Ok(Addition::new(a, b))
}
