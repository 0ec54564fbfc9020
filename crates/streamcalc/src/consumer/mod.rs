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

//! # Consumer Loop
//!
//! A single consumer drains the task log in id order:
//!
//! ```text
//! loop {
//!     entries = read(after = cursor, block = 5s)
//!     for entry in entries {
//!         decode -> dispatch -> publish result (TTL) -> delete entry -> cursor = entry.id
//!     }
//! } on error: back off 2s, keep cursor
//! ```
//!
//! ## Delivery
//!
//! The result is published before the entry is deleted, and the cursor only
//! moves past an entry once both steps succeed. A crash or transport error in
//! between leaves the entry to be read again on the next pass, so a task may
//! be computed more than once; republishing overwrites the same key with the
//! same value.
//!
//! ## Skipped entries
//!
//! Entries that cannot be decoded, that carry a task type with no registered
//! handler, or whose payload the handler rejects are logged and skipped: the
//! cursor moves past them and they are left in the log. Nothing publishes a
//! result for them, so a producer waiting on one times out.
//!
//! ## Cursor
//!
//! The cursor lives only in this process and starts at `0-0`. A restarted
//! consumer re-reads every entry still in the log, including skipped ones.

pub mod registry;

pub use registry::{AdditionHandler, FnHandler, HandlerError, HandlerRegistry, TaskHandler};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::envelope::decode;
use crate::models::entry_id::EntryId;
use crate::models::result_record::ResultRecord;
use crate::shutdown::Shutdown;
use crate::store::{put_record, result_key, ResultStore, StoreError, DEFAULT_RESULT_TTL};
use crate::stream::{ReadOptions, StreamEntry, StreamError, TaskLog};
use crate::DEFAULT_STREAM_KEY;

/// Errors that interrupt a consumer pass. Each one triggers a backoff.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Log error: {0}")]
    Stream(#[from] StreamError),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),

    #[error("Handler for entry {id} failed: {message}")]
    Handler { id: EntryId, message: String },
}

/// Configuration for the consumer loop.
///
/// ```rust,ignore
/// let config = ConsumerConfig::builder()
///     .block(Duration::from_secs(1))
///     .batch_size(Some(100))
///     .build();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ConsumerConfig {
    stream_key: String,
    block: Duration,
    error_backoff: Duration,
    batch_size: Option<usize>,
    result_ttl: Duration,
}

impl ConsumerConfig {
    pub fn builder() -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::default()
    }

    /// Log stream the consumer reads.
    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// How long one read waits for new entries.
    pub fn block(&self) -> Duration {
        self.block
    }

    /// Pause after a failed pass.
    pub fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    /// Maximum entries per read; `None` reads everything available.
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Lifetime of published results.
    pub fn result_ttl(&self) -> Duration {
        self.result_ttl
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfigBuilder::default().build()
    }
}

/// Builder for [`ConsumerConfig`].
#[derive(Debug, Clone)]
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl Default for ConsumerConfigBuilder {
    fn default() -> Self {
        Self {
            config: ConsumerConfig {
                stream_key: DEFAULT_STREAM_KEY.to_string(),
                block: Duration::from_millis(5000),
                error_backoff: Duration::from_millis(2000),
                batch_size: None,
                result_ttl: DEFAULT_RESULT_TTL,
            },
        }
    }
}

impl ConsumerConfigBuilder {
    pub fn stream_key(mut self, value: impl Into<String>) -> Self {
        self.config.stream_key = value.into();
        self
    }

    pub fn block(mut self, value: Duration) -> Self {
        self.config.block = value;
        self
    }

    pub fn error_backoff(mut self, value: Duration) -> Self {
        self.config.error_backoff = value;
        self
    }

    pub fn batch_size(mut self, value: Option<usize>) -> Self {
        self.config.batch_size = value;
        self
    }

    pub fn result_ttl(mut self, value: Duration) -> Self {
        self.config.result_ttl = value;
        self
    }

    pub fn build(self) -> ConsumerConfig {
        self.config
    }
}

/// Counters kept by a consumer over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Entries whose result was published and which were deleted from the log.
    pub processed: u64,
    /// Entries passed over without a result.
    pub skipped: u64,
    /// Passes that ended in an error and a backoff.
    pub failures: u64,
}

/// The consumer loop. Owns the cursor.
pub struct ConsumerLoop {
    log: Arc<dyn TaskLog>,
    store: Arc<dyn ResultStore>,
    registry: HandlerRegistry,
    config: ConsumerConfig,
    cursor: EntryId,
    stats: ConsumerStats,
}

impl ConsumerLoop {
    pub fn new(
        log: Arc<dyn TaskLog>,
        store: Arc<dyn ResultStore>,
        registry: HandlerRegistry,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            log,
            store,
            registry,
            config,
            cursor: EntryId::START,
            stats: ConsumerStats::default(),
        }
    }

    /// Id of the last entry handled; reads resume strictly after it.
    pub fn cursor(&self) -> EntryId {
        self.cursor
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Runs until `shutdown` fires and returns the final counters.
    ///
    /// Shutdown interrupts a pending read or backoff. A batch that has
    /// already been read is finished first.
    pub async fn run(mut self, shutdown: Shutdown) -> ConsumerStats {
        info!(
            "Consumer started on stream '{}' (handlers: {:?})",
            self.config.stream_key,
            self.registry.task_types()
        );

        while !shutdown.is_triggered() {
            let read = tokio::select! {
                _ = shutdown.wait() => break,
                read = self.read_batch() => read,
            };

            let pass = match read {
                Ok(entries) => self.process_batch(entries).await,
                Err(e) => Err(e),
            };

            if let Err(e) = pass {
                self.stats.failures += 1;
                metrics::counter!("streamcalc_consumer_errors_total").increment(1);
                error!(
                    "Consumer pass failed at cursor {}: {}; retrying in {}ms",
                    self.cursor,
                    e,
                    self.config.error_backoff.as_millis()
                );

                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = tokio::time::sleep(self.config.error_backoff) => {}
                }
            }
        }

        info!(
            "Consumer stopped at cursor {} (processed: {}, skipped: {}, failures: {})",
            self.cursor, self.stats.processed, self.stats.skipped, self.stats.failures
        );
        self.stats
    }

    /// One read and the processing of whatever it returned.
    ///
    /// Returns the number of entries read. Does not back off on error.
    pub async fn poll_once(&mut self) -> Result<usize, ConsumerError> {
        let entries = self.read_batch().await?;
        let count = entries.len();
        self.process_batch(entries).await?;
        Ok(count)
    }

    async fn read_batch(&self) -> Result<Vec<StreamEntry>, ConsumerError> {
        let options = ReadOptions::blocking(self.config.block).with_count(self.config.batch_size);
        Ok(self
            .log
            .read(&self.config.stream_key, self.cursor, options)
            .await?)
    }

    async fn process_batch(&mut self, entries: Vec<StreamEntry>) -> Result<(), ConsumerError> {
        for entry in entries {
            self.process_entry(entry).await?;
        }
        Ok(())
    }

    async fn process_entry(&mut self, entry: StreamEntry) -> Result<(), ConsumerError> {
        let decoded = match decode(&entry.fields) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Skipping entry {}: {}", entry.id, e);
                self.skip(entry.id);
                return Ok(());
            }
        };

        let Some(handler) = self.registry.get(&decoded.task_type) else {
            warn!(
                "Unknown task type '{}' in entry {} (request {}); skipping",
                decoded.task_type, entry.id, decoded.request_id
            );
            self.skip(entry.id);
            return Ok(());
        };

        let value = match handler.handle(&decoded).await {
            Ok(value) => value,
            Err(HandlerError::Payload(e)) => {
                warn!(
                    "Skipping entry {} (request {}): {}",
                    entry.id, decoded.request_id, e
                );
                self.skip(entry.id);
                return Ok(());
            }
            Err(HandlerError::Failed(message)) => {
                return Err(ConsumerError::Handler {
                    id: entry.id,
                    message,
                });
            }
        };

        let key = result_key(&decoded.request_id);
        put_record(
            self.store.as_ref(),
            &key,
            &ResultRecord::completed(value),
            self.config.result_ttl,
        )
        .await?;
        self.log.delete(&self.config.stream_key, entry.id).await?;

        self.cursor = entry.id;
        self.stats.processed += 1;
        metrics::counter!("streamcalc_tasks_processed_total").increment(1);
        debug!(
            "Processed {} task {} (request {})",
            decoded.task_type, entry.id, decoded.request_id
        );
        Ok(())
    }

    fn skip(&mut self, id: EntryId) {
        self.cursor = id;
        self.stats.skipped += 1;
        metrics::counter!("streamcalc_tasks_skipped_total").increment(1);
    }
}
