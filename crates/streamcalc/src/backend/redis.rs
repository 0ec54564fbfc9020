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

//! Redis backend.
//!
//! | Operation          | Command                                          |
//! |--------------------|--------------------------------------------------|
//! | `TaskLog::append`  | `XADD stream * field value ...`                  |
//! | `TaskLog::read`    | `XREAD [COUNT n] [BLOCK ms] STREAMS stream after`|
//! | `TaskLog::delete`  | `XDEL stream id`                                 |
//! | `TaskLog::len`     | `XLEN stream`                                    |
//! | `ResultStore::set` | `SET key value EX secs`                          |
//! | `ResultStore::get` | `GET key`                                        |
//! | `ResultStore::del` | `DEL key`                                        |
//!
//! Field order within an entry is not preserved on read; the envelope codec
//! looks fields up by name.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::time::Duration;

use crate::envelope::{flatten, Fields};
use crate::models::entry_id::EntryId;
use crate::store::{ResultStore, StoreError};
use crate::stream::{ReadOptions, StreamEntry, StreamError, TaskLog};

/// Log and result store over one managed Redis connection.
///
/// `ConnectionManager` is a cheap handle onto a multiplexed connection, so
/// each command clones it.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RedisBackend(...)")
    }
}

impl RedisBackend {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn stream_err(e: redis::RedisError) -> StreamError {
    StreamError::Transport(e.to_string())
}

fn store_err(e: redis::RedisError) -> StoreError {
    StoreError::Transport(e.to_string())
}

/// Converts a typed `XREAD` reply into entries for one stream.
fn entries_from_reply(reply: StreamReadReply) -> Result<Vec<StreamEntry>, StreamError> {
    let mut entries = Vec::new();
    for key in reply.keys {
        for raw in key.ids {
            let id = raw
                .id
                .parse::<EntryId>()
                .map_err(|_| StreamError::InvalidEntryId(raw.id.clone()))?;

            let mut fields = Fields::with_capacity(raw.map.len());
            for (name, value) in raw.map {
                let value: String =
                    redis::from_redis_value(&value).map_err(|e| StreamError::InvalidEntry {
                        id: raw.id.clone(),
                        message: format!("field '{}': {}", name, e),
                    })?;
                fields.push((name, value));
            }
            entries.push(StreamEntry { id, fields });
        }
    }
    Ok(entries)
}

#[async_trait]
impl TaskLog for RedisBackend {
    async fn append(&self, stream: &str, fields: &[(String, String)]) -> Result<EntryId, StreamError> {
        let mut conn = self.conn.clone();
        let id: String = redis::cmd("XADD")
            .arg(stream)
            .arg("*")
            .arg(flatten(fields))
            .query_async(&mut conn)
            .await
            .map_err(stream_err)?;

        id.parse::<EntryId>()
            .map_err(|_| StreamError::InvalidEntryId(id))
    }

    async fn read(
        &self,
        stream: &str,
        after: EntryId,
        options: ReadOptions,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let mut conn = self.conn.clone();

        let mut opts = StreamReadOptions::default();
        if let Some(block) = options.block {
            // BLOCK 0 means "forever" to Redis.
            opts = opts.block(block.as_millis().max(1) as usize);
        }
        if let Some(count) = options.count {
            opts = opts.count(count);
        }

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[after.to_string()], &opts)
            .await
            .map_err(stream_err)?;

        match reply {
            Some(reply) => entries_from_reply(reply),
            None => Ok(Vec::new()),
        }
    }

    async fn delete(&self, stream: &str, id: EntryId) -> Result<bool, StreamError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .xdel(stream, &[id.to_string()])
            .await
            .map_err(stream_err)?;
        Ok(removed > 0)
    }

    async fn len(&self, stream: &str) -> Result<u64, StreamError> {
        let mut conn = self.conn.clone();
        conn.xlen(stream).await.map_err(stream_err)
    }
}

#[async_trait]
impl ResultStore for RedisBackend {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(store_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(store_err)
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(store_err)?;
        Ok(removed > 0)
    }
}
