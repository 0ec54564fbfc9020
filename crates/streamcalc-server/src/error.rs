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

//! API error types and their JSON response bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use streamcalc::models::RequestId;
use streamcalc::{ProducerError, StoreError};

pub const INVALID_INPUT_MESSAGE: &str = "Invalid input: a and b must be numbers";
pub const TIMEOUT_MESSAGE: &str = "Timeout waiting for result";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body is not JSON or `a` / `b` are not numbers.
    #[error("Invalid input: a and b must be numbers")]
    InvalidInput,

    /// No result within the wait timeout. The task is still queued.
    #[error("Timeout waiting for result")]
    Timeout { request_id: RequestId },

    /// The `/redis` probe could not reach the store.
    #[error("{message}")]
    Unavailable { message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl ApiError {
    fn to_status_and_payload(&self) -> (StatusCode, Value) {
        match self {
            Self::InvalidInput => (
                StatusCode::BAD_REQUEST,
                json!({ "error": INVALID_INPUT_MESSAGE, "status": "error" }),
            ),
            Self::Timeout { request_id } => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({
                    "requestId": request_id.to_string(),
                    "error": TIMEOUT_MESSAGE,
                    "status": "timeout",
                }),
            ),
            Self::Unavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "ok": false, "error": message }),
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "status": "error" }),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, payload) = self.to_status_and_payload();
        if status.is_server_error() {
            tracing::error!("{} {}", status, self);
        }
        (status, axum::Json(payload)).into_response()
    }
}

impl From<ProducerError> for ApiError {
    fn from(err: ProducerError) -> Self {
        match err {
            ProducerError::InvalidArgument(_) => Self::InvalidInput,
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
