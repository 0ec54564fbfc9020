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

//! # Handler Registry
//!
//! Maps task type tags to the handlers that compute them. The registry is an
//! ordinary value handed to the consumer at construction, so tests and
//! embedders can run consumers with different handler sets side by side.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

use crate::envelope::{Addition, DecodedEnvelope, EnvelopeError, TaskPayload};
use crate::models::result_record::number_value;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The entry's payload could not be decoded. Not retried.
    #[error(transparent)]
    Payload(#[from] EnvelopeError),

    /// Computation failed. The consumer backs off and re-reads the entry.
    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Computes the result for one task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The `type` tag this handler accepts.
    fn task_type(&self) -> &str;

    async fn handle(&self, envelope: &DecodedEnvelope) -> Result<Value, HandlerError>;
}

/// Handler for `addition` tasks: returns `a + b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditionHandler;

#[async_trait]
impl TaskHandler for AdditionHandler {
    fn task_type(&self) -> &str {
        Addition::TASK_TYPE
    }

    async fn handle(&self, envelope: &DecodedEnvelope) -> Result<Value, HandlerError> {
        let addition: Addition = envelope.payload()?;
        Ok(number_value(addition.sum()))
    }
}

/// Adapts a synchronous function over a typed payload into a [`TaskHandler`].
pub struct FnHandler<P, F> {
    func: F,
    _payload: PhantomData<fn() -> P>,
}

impl<P, F> FnHandler<P, F>
where
    P: TaskPayload,
    F: Fn(P) -> Result<Value, String> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F> TaskHandler for FnHandler<P, F>
where
    P: TaskPayload,
    F: Fn(P) -> Result<Value, String> + Send + Sync,
{
    fn task_type(&self) -> &str {
        P::TASK_TYPE
    }

    async fn handle(&self, envelope: &DecodedEnvelope) -> Result<Value, HandlerError> {
        let payload: P = envelope.payload()?;
        (self.func)(payload).map_err(HandlerError::Failed)
    }
}

/// Task type to handler mapping. Clones share the same table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn TaskHandler>>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `addition` handler.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(AdditionHandler);
        registry
    }

    /// Registers a handler under its own task type, replacing any previous one.
    pub fn register<H: TaskHandler + 'static>(&self, handler: H) {
        let task_type = handler.task_type().to_string();
        let mut handlers = self.handlers.write();
        if handlers.insert(task_type.clone(), Arc::new(handler)).is_some() {
            tracing::warn!("Replaced handler for task type: {}", task_type);
        } else {
            tracing::debug!("Registered handler for task type: {}", task_type);
        }
    }

    /// Registers a plain function over payload `P`.
    pub fn register_fn<P, F>(&self, func: F)
    where
        P: TaskPayload + 'static,
        F: Fn(P) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(FnHandler::<P, F>::new(func));
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().get(task_type).cloned()
    }

    /// Registered task types, sorted.
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }
}
