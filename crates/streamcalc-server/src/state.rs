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

//! Shared state for HTTP handlers.

use std::sync::Arc;

use streamcalc::{Handles, Producer, ResultQuery, ResultStore, WaitOptions};

/// Everything a handler needs, built once from the API client's handles.
#[derive(Clone)]
pub struct AppState {
    pub producer: Producer,
    pub query: ResultQuery,
    /// Used directly by the `/redis` probe.
    pub store: Arc<dyn ResultStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("producer", &self.producer)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(handles: Handles, stream_key: impl Into<String>, wait: WaitOptions) -> Self {
        let producer = Producer::new(handles.log.clone(), handles.store.clone(), stream_key)
            .with_wait_options(wait);
        Self {
            producer,
            query: ResultQuery::new(handles.store.clone()),
            store: handles.store,
        }
    }
}
