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

//! Backend types and runtime backend selection.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

use std::sync::Arc;
use thiserror::Error;

use crate::connection::{self, ConnectionError, RetryPolicy};
use crate::shutdown::Shutdown;
use crate::store::ResultStore;
use crate::stream::TaskLog;

// =============================================================================
// Runtime Backend Selection
// =============================================================================

/// Represents the backend type, detected at runtime from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Redis streams and keys
    Redis,
    /// In-process backend; state lives and dies with the process
    Memory,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(
        "Unable to detect backend from URL '{0}'. Expected redis://, rediss:// or memory://"
    )]
    UnsupportedUrl(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl BackendType {
    /// Detect the backend type from a connection URL.
    pub fn from_url(url: &str) -> Result<Self, BackendError> {
        if url.starts_with("redis://") || url.starts_with("rediss://") {
            return Ok(BackendType::Redis);
        }
        if url.starts_with("memory://") {
            return Ok(BackendType::Memory);
        }
        Err(BackendError::UnsupportedUrl(url.to_string()))
    }
}

/// The client handles one component works with.
///
/// Each component receives its own `Handles` at construction; nothing is
/// reached through process-wide state.
#[derive(Clone)]
pub struct Handles {
    pub log: Arc<dyn TaskLog>,
    pub store: Arc<dyn ResultStore>,
}

impl std::fmt::Debug for Handles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handles {{ .. }}")
    }
}

impl Handles {
    /// Handles backed by a single in-memory backend.
    pub fn memory(backend: &MemoryBackend) -> Self {
        Self {
            log: Arc::new(backend.clone()),
            store: Arc::new(backend.clone()),
        }
    }
}

/// Opens named client handles against one backend URL.
///
/// With Redis every call opens a separate managed connection, so a blocking
/// `XREAD` on the worker connection never stalls API traffic. With the memory
/// backend every call shares the same in-process state.
#[derive(Debug, Clone)]
pub struct Connector {
    url: String,
    policy: RetryPolicy,
    memory: Option<MemoryBackend>,
}

impl Connector {
    pub fn new(url: impl Into<String>, policy: RetryPolicy) -> Result<Self, BackendError> {
        let url = url.into();
        let memory = match BackendType::from_url(&url)? {
            BackendType::Memory => Some(MemoryBackend::new()),
            BackendType::Redis => None,
        };
        Ok(Self {
            url,
            policy,
            memory,
        })
    }

    pub fn backend_type(&self) -> BackendType {
        if self.memory.is_some() {
            BackendType::Memory
        } else {
            BackendType::Redis
        }
    }

    /// Opens handles for the named client, retrying until connected.
    pub async fn connect(&self, name: &str, shutdown: &Shutdown) -> Result<Handles, BackendError> {
        if let Some(memory) = &self.memory {
            return Ok(Handles::memory(memory));
        }

        let conn = connection::connect(&self.url, name, self.policy, shutdown).await?;
        let backend = RedisBackend::new(conn);
        Ok(Handles {
            log: Arc::new(backend.clone()),
            store: Arc::new(backend),
        })
    }
}
