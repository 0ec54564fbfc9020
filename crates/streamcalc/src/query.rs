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

//! Result lookup by request id.

use std::sync::Arc;

use crate::models::result_record::ResultRecord;
use crate::store::{get_record, result_key, ResultStore, StoreError};

/// What a lookup found.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No live result: the task is queued, in progress, unknown, expired or
    /// already collected by a waiting producer. These cases are not
    /// distinguished.
    Pending,
    Completed { record: ResultRecord },
}

/// Read-only access to published results. Lookups never delete.
#[derive(Clone)]
pub struct ResultQuery {
    store: Arc<dyn ResultStore>,
}

impl std::fmt::Debug for ResultQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResultQuery(...)")
    }
}

impl ResultQuery {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Looks up a result. Any string is accepted as a request id.
    pub async fn query(&self, request_id: &str) -> Result<QueryOutcome, StoreError> {
        let key = result_key(request_id);
        Ok(match get_record(self.store.as_ref(), &key).await? {
            Some(record) => QueryOutcome::Completed { record },
            None => QueryOutcome::Pending,
        })
    }
}
