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

//! HTTP handlers.
//!
//! | Route                    | Handler            |
//! |--------------------------|--------------------|
//! | `GET /`                  | [`root`]           |
//! | `GET /health`            | [`health`]         |
//! | `GET /redis`             | [`redis_probe`]    |
//! | `POST /calculate`        | [`calculate`]      |
//! | `POST /calculate/async`  | [`calculate_async`]|
//! | `GET /result/{id}`       | [`get_result`]     |

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::time::Duration;
use streamcalc::producer::parse_operands;
use streamcalc::{Addition, QueryOutcome, ResultStore, WaitOutcome};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Key written and read back by the `/redis` probe.
pub const PROBE_KEY: &str = "demo:ts";
const PROBE_TTL: Duration = Duration::from_secs(60);

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/redis", get(redis_probe))
        .route("/calculate", post(calculate))
        .route("/calculate/async", post(calculate_async))
        .route("/result/{request_id}", get(get_result))
}

pub async fn root() -> &'static str {
    "Hello from streamcalc!"
}

pub async fn health() -> &'static str {
    "OK"
}

/// Writes the current time under [`PROBE_KEY`] and reads it back.
pub async fn redis_probe(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let unavailable = |e: streamcalc::StoreError| ApiError::Unavailable {
        message: e.to_string(),
    };

    state
        .store
        .set(PROBE_KEY, &now, PROBE_TTL)
        .await
        .map_err(unavailable)?;
    let value = state.store.get(PROBE_KEY).await.map_err(unavailable)?;

    Ok(Json(json!({ "ok": true, "key": PROBE_KEY, "result": value })))
}

/// Parses a JSON body into addition operands. Anything else is a 400.
fn operands(body: &[u8]) -> ApiResult<Addition> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidInput)?;
    Ok(parse_operands(&value)?)
}

/// Submits an addition and waits for the result.
pub async fn calculate(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let addition = operands(&body)?;
    let wait = state.producer.wait_options();

    match state
        .producer
        .submit_and_wait_with(addition, wait)
        .await?
    {
        WaitOutcome::Completed { request_id, record } => Ok(Json(json!({
            "requestId": request_id.to_string(),
            "result": record.result,
            "status": record.status.as_str(),
        }))),
        WaitOutcome::TimedOut { request_id } => Err(ApiError::Timeout { request_id }),
    }
}

/// Submits an addition and returns immediately.
pub async fn calculate_async(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let addition = operands(&body)?;
    let submission = state.producer.submit(addition).await?;
    let request_id = submission.request_id.to_string();

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "requestId": request_id,
            "status": "accepted",
            "message": "Task has been queued for processing",
            "checkResultUrl": format!("/result/{}", request_id),
        })),
    ))
}

/// Looks up a result without consuming it.
pub async fn get_result(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let body = match state.query.query(&request_id).await? {
        QueryOutcome::Pending => json!({
            "requestId": request_id,
            "status": "pending",
            "message": "Task is still being processed or does not exist",
        }),
        QueryOutcome::Completed { record } => json!({
            "requestId": request_id,
            "result": record.result,
            "status": record.status.as_str(),
            "timestamp": record.timestamp_string(),
        }),
    };
    Ok(Json(body))
}
