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

//! Log client abstraction.
//!
//! This module provides the `TaskLog` trait: the thin set of operations the
//! producer and consumer need from an append-only ordered log. Backends live
//! in [`crate::backend`]:
//!
//! - Redis: `XADD` / `XREAD BLOCK` / `XDEL` against a stream key
//! - Memory: an in-process ordered map with the same blocking semantics
//!
//! The log client performs no retries. Transport failures are returned to the
//! caller, and reconnection is handled by the connection layer.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::envelope::Fields;
use crate::models::entry_id::EntryId;

/// Errors returned by log operations.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Log transport failure: {0}")]
    Transport(String),

    #[error("Log returned an unparseable entry id: {0}")]
    InvalidEntryId(String),

    #[error("Log returned an unreadable entry {id}: {message}")]
    InvalidEntry { id: String, message: String },
}

/// A single entry read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Fields,
}

/// Options for [`TaskLog::read`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Wait up to this long for new entries when none are available.
    /// `None` returns immediately.
    pub block: Option<Duration>,
    /// Upper bound on the number of entries returned. `None` returns all
    /// entries after the cursor.
    pub count: Option<usize>,
}

impl ReadOptions {
    /// Non-blocking, unbounded read.
    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn blocking(block: Duration) -> Self {
        Self {
            block: Some(block),
            count: None,
        }
    }

    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }
}

/// Trait for the ordered task log.
///
/// Implementations must hand out entries in strictly increasing id order and
/// must never return an entry whose id is less than or equal to `after`.
#[async_trait]
pub trait TaskLog: Send + Sync {
    /// Appends an entry and returns the id the log assigned to it.
    async fn append(&self, stream: &str, fields: &[(String, String)]) -> Result<EntryId, StreamError>;

    /// Reads entries with ids strictly greater than `after`.
    ///
    /// When nothing is available and `options.block` is set, waits up to that
    /// long for an append before returning an empty batch.
    async fn read(
        &self,
        stream: &str,
        after: EntryId,
        options: ReadOptions,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Deletes one entry. Returns `false` when no such entry exists.
    async fn delete(&self, stream: &str, id: EntryId) -> Result<bool, StreamError>;

    /// Number of entries currently held in the stream.
    async fn len(&self, stream: &str) -> Result<u64, StreamError>;
}
