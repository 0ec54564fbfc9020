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

//! # streamcalc
//!
//! A small task queue built on an append-only, per-entry-acknowledged log.
//!
//! Producers append typed task envelopes to a stream and either poll a
//! short-lived result store for the outcome or return immediately with a
//! request id. A single consumer blocks on the stream, dispatches each entry
//! to a registered [`TaskHandler`](consumer::TaskHandler), publishes the result
//! with a fixed TTL and only then deletes the entry. Delivery is at-least-once.
//!
//! ## Layout
//!
//! - [`stream`]: the [`TaskLog`](stream::TaskLog) contract (append / read / delete)
//! - [`store`]: the [`ResultStore`](store::ResultStore) contract (set-with-TTL / get / del)
//! - [`backend`]: Redis and in-memory implementations of both contracts
//! - [`envelope`]: flat field codec for task envelopes
//! - [`producer`]: submit-and-wait and fire-and-forget submission
//! - [`query`]: idempotent result lookup
//! - [`consumer`]: the consumer loop and handler registry
//! - [`config`]: configuration types, defaults, loading and validation
//!
//! ## Example
//!
//! ```rust,ignore
//! use streamcalc::backend::MemoryBackend;
//! use streamcalc::consumer::{ConsumerConfig, ConsumerLoop, HandlerRegistry};
//! use streamcalc::producer::Producer;
//! use std::sync::Arc;
//!
//! let backend = MemoryBackend::new();
//! let (trigger, shutdown) = streamcalc::shutdown::channel();
//!
//! let consumer = ConsumerLoop::new(
//!     Arc::new(backend.clone()),
//!     Arc::new(backend.clone()),
//!     HandlerRegistry::with_defaults(),
//!     ConsumerConfig::default(),
//! );
//! tokio::spawn(consumer.run(shutdown));
//!
//! let producer = Producer::new(Arc::new(backend.clone()), Arc::new(backend), "tasks");
//! let outcome = producer.submit_and_wait(2.0, 3.0).await?;
//! trigger.trigger();
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod envelope;
pub mod models;
pub mod producer;
pub mod query;
pub mod shutdown;
pub mod store;
pub mod stream;

pub use backend::{BackendType, Handles, MemoryBackend, RedisBackend};
pub use config::StreamcalcConfig;
pub use consumer::{ConsumerConfig, ConsumerLoop, ConsumerStats, HandlerRegistry, TaskHandler};
pub use envelope::{Addition, DecodedEnvelope, EnvelopeError, TaskPayload};
pub use models::entry_id::EntryId;
pub use models::result_record::{ResultRecord, ResultStatus};
pub use models::task_envelope::TaskEnvelope;
pub use producer::{Producer, ProducerError, Submission, WaitOptions, WaitOutcome};
pub use query::{QueryOutcome, ResultQuery};
pub use store::{ResultStore, StoreError};
pub use stream::{ReadOptions, StreamEntry, StreamError, TaskLog};

/// Default stream key tasks are appended to.
pub const DEFAULT_STREAM_KEY: &str = "tasks";
