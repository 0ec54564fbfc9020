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

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamcalc::consumer::{ConsumerConfig, ConsumerLoop, HandlerRegistry};
use streamcalc::shutdown::{self, ShutdownTrigger};
use streamcalc::store::{ResultStore, StoreError};
use streamcalc::stream::{ReadOptions, StreamEntry, StreamError, TaskLog};
use streamcalc::{ConsumerStats, EntryId, MemoryBackend, Producer};
use tokio::task::JoinHandle;

/// A memory-backed stack with a consumer running in the background.
pub struct Harness {
    pub backend: MemoryBackend,
    pub producer: Producer,
    trigger: ShutdownTrigger,
    consumer: JoinHandle<ConsumerStats>,
}

impl Harness {
    pub fn start() -> Self {
        let backend = MemoryBackend::new();
        let producer = Producer::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            "tasks",
        );
        let (trigger, shutdown) = shutdown::channel();
        let consumer = ConsumerLoop::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            HandlerRegistry::with_defaults(),
            ConsumerConfig::builder()
                .block(Duration::from_millis(200))
                .build(),
        );
        let consumer = tokio::spawn(consumer.run(shutdown));

        Self {
            backend,
            producer,
            trigger,
            consumer,
        }
    }

    pub async fn stop(self) -> ConsumerStats {
        self.trigger.trigger();
        self.consumer.await.expect("consumer task panicked")
    }
}

/// A log that delegates to a memory backend but fails the first
/// `fail_deletes` calls to `delete`.
#[derive(Clone)]
pub struct FlakyLog {
    pub inner: MemoryBackend,
    fail_deletes: Arc<AtomicUsize>,
    pub delete_calls: Arc<AtomicUsize>,
}

impl FlakyLog {
    pub fn new(inner: MemoryBackend, fail_deletes: usize) -> Self {
        Self {
            inner,
            fail_deletes: Arc::new(AtomicUsize::new(fail_deletes)),
            delete_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TaskLog for FlakyLog {
    async fn append(&self, stream: &str, fields: &[(String, String)]) -> Result<EntryId, StreamError> {
        self.inner.append(stream, fields).await
    }

    async fn read(
        &self,
        stream: &str,
        after: EntryId,
        options: ReadOptions,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        self.inner.read(stream, after, options).await
    }

    async fn delete(&self, stream: &str, id: EntryId) -> Result<bool, StreamError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_deletes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_deletes.store(remaining - 1, Ordering::SeqCst);
            return Err(StreamError::Transport("connection reset".to_string()));
        }
        self.inner.delete(stream, id).await
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        self.inner.len(stream).await
    }
}

/// A result store that delegates to a memory backend but fails the first
/// `fail_sets` calls to `set`.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: MemoryBackend,
    fail_sets: Arc<AtomicUsize>,
    pub set_calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryBackend, fail_sets: usize) -> Self {
        Self {
            inner,
            fail_sets: Arc::new(AtomicUsize::new(fail_sets)),
            set_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ResultStore for FlakyStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_sets.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_sets.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.del(key).await
    }
}
