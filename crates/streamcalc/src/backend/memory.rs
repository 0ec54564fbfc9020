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

//! In-process backend.
//!
//! Implements both [`TaskLog`] and [`ResultStore`] over plain maps guarded by
//! a mutex. Blocking reads park on a [`Notify`] that every append signals, so
//! a consumer wakes as soon as work arrives instead of polling. Expiry uses
//! tokio's clock, which lets tests drive TTLs with paused time. Expired keys
//! are dropped when read and swept on every write, so results nobody collects
//! do not accumulate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::envelope::Fields;
use crate::models::entry_id::EntryId;
use crate::store::{ResultStore, StoreError};
use crate::stream::{ReadOptions, StreamEntry, StreamError, TaskLog};

#[derive(Debug, Default)]
struct StreamState {
    entries: BTreeMap<EntryId, Fields>,
    last_id: EntryId,
}

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    streams: HashMap<String, StreamState>,
    keys: HashMap<String, StoredValue>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    appended: Notify,
}

/// Shared in-memory log and result store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(last: EntryId) -> EntryId {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        if now_ms > last.ms() {
            EntryId::new(now_ms, 0)
        } else {
            last.successor()
        }
    }

    fn collect(&self, stream: &str, after: EntryId, count: Option<usize>) -> Vec<StreamEntry> {
        let state = self.inner.state.lock();
        let Some(log) = state.streams.get(stream) else {
            return Vec::new();
        };

        let limit = count.unwrap_or(usize::MAX);
        log.entries
            .range(after.successor()..)
            .take(limit)
            .map(|(id, fields)| StreamEntry {
                id: *id,
                fields: fields.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl TaskLog for MemoryBackend {
    async fn append(&self, stream: &str, fields: &[(String, String)]) -> Result<EntryId, StreamError> {
        let id = {
            let mut state = self.inner.state.lock();
            let log = state.streams.entry(stream.to_string()).or_default();
            let id = Self::next_id(log.last_id);
            log.entries.insert(id, fields.to_vec());
            log.last_id = id;
            id
        };
        self.inner.appended.notify_waiters();
        Ok(id)
    }

    async fn read(
        &self,
        stream: &str,
        after: EntryId,
        options: ReadOptions,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let Some(block) = options.block else {
            return Ok(self.collect(stream, after, options.count));
        };

        let deadline = Instant::now() + block;
        loop {
            // Register interest before checking so an append between the
            // check and the wait is not missed.
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let entries = self.collect(stream, after, options.count);
            if !entries.is_empty() {
                return Ok(entries);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn delete(&self, stream: &str, id: EntryId) -> Result<bool, StreamError> {
        let mut state = self.inner.state.lock();
        Ok(state
            .streams
            .get_mut(stream)
            .map(|log| log.entries.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        let state = self.inner.state.lock();
        Ok(state
            .streams
            .get(stream)
            .map(|log| log.entries.len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl ResultStore for MemoryBackend {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        state.keys.retain(|_, stored| stored.expires_at > now);
        state.keys.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        match state.keys.get(key) {
            Some(stored) if stored.expires_at > now => Ok(Some(stored.value.clone())),
            Some(_) => {
                state.keys.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        Ok(state
            .keys
            .remove(key)
            .map(|stored| stored.expires_at > now)
            .unwrap_or(false))
    }
}
