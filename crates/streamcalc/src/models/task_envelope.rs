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

//! Task Envelope Model
//!
//! One unit of work appended to the log. The envelope carries the dispatch
//! tag, the caller-visible request id and a typed payload; the log entry id is
//! only known once the envelope has been appended.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::entry_id::EntryId;
use super::RequestId;
use crate::envelope::TaskPayload;

/// A typed task ready to be appended to (or just read from) the log.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEnvelope<P> {
    /// Log-assigned identifier; `None` until appended.
    pub id: Option<EntryId>,
    /// Dispatch tag. Always `P::TASK_TYPE` for envelopes built with [`TaskEnvelope::new`].
    pub task_type: String,
    pub request_id: RequestId,
    pub payload: P,
    pub enqueued_at: DateTime<Utc>,
}

impl<P: TaskPayload> TaskEnvelope<P> {
    /// Wraps a payload with a fresh random request id and the current time.
    pub fn new(payload: P) -> Self {
        Self::with_request_id(Uuid::new_v4(), payload)
    }

    pub fn with_request_id(request_id: RequestId, payload: P) -> Self {
        Self {
            id: None,
            task_type: P::TASK_TYPE.to_string(),
            request_id,
            payload,
            enqueued_at: Utc::now(),
        }
    }
}
