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

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use streamcalc::{TaskLog, WaitOptions};
use streamcalc_server::error::INVALID_INPUT_MESSAGE;

use crate::fixtures::TestApp;

async fn poll_until_completed(app: &TestApp, uri: &str) -> Value {
    for _ in 0..100 {
        let (status, body) = app.get_json(uri).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} never completed", uri);
}

#[tokio::test]
async fn test_health_and_greeting() {
    let app = TestApp::without_consumer(WaitOptions::default());

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());
}

#[tokio::test]
async fn test_calculate_returns_sum() {
    let app = TestApp::with_consumer();

    let (status, body) = app.post_json("/calculate", r#"{"a": 2, "b": 3}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(5));
    assert_eq!(body["status"], "completed");
    assert!(uuid::Uuid::parse_str(body["requestId"].as_str().unwrap()).is_ok());

    // The waiting caller consumed the result.
    let uri = format!("/result/{}", body["requestId"].as_str().unwrap());
    let (status, body) = app.get_json(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    let stats = app.stop().await.unwrap();
    assert_eq!(stats.processed, 1);
}

#[tokio::test]
async fn test_calculate_rejects_non_numeric_operands() {
    let app = TestApp::without_consumer(WaitOptions::default());

    for body in [r#"{"a": "x", "b": 3}"#, r#"{"a": 1}"#, "not json", ""] {
        let (status, json) = app.post_json("/calculate", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], INVALID_INPUT_MESSAGE);
    }

    let (status, _) = app
        .post_json("/calculate/async", r#"{"a": null, "b": 3}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.backend.len("tasks").await.unwrap(), 0);
}

#[tokio::test]
async fn test_calculate_times_out_without_consumer() {
    let app = TestApp::without_consumer(WaitOptions {
        timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(20),
    });

    let (status, body) = app.post_json("/calculate", r#"{"a": 1, "b": 1}"#).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["status"], "timeout");
    assert!(body["requestId"].is_string());

    // The task stays queued for a later consumer.
    assert_eq!(app.backend.len("tasks").await.unwrap(), 1);
}

#[tokio::test]
async fn test_async_submission_then_repeated_queries() {
    let app = TestApp::with_consumer();

    let (status, body) = app
        .post_json("/calculate/async", r#"{"a": 10, "b": 5}"#)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    let request_id = body["requestId"].as_str().unwrap().to_string();
    let uri = body["checkResultUrl"].as_str().unwrap().to_string();
    assert_eq!(uri, format!("/result/{}", request_id));

    let first = poll_until_completed(&app, &uri).await;
    assert_eq!(first["result"], json!(15));
    assert_eq!(first["requestId"], json!(request_id));
    assert!(first["timestamp"].as_str().unwrap().ends_with('Z'));

    // Querying does not consume the result.
    let (_, second) = app.get_json(&uri).await;
    assert_eq!(first, second);

    app.stop().await;
}

#[tokio::test]
async fn test_unknown_result_is_pending() {
    let app = TestApp::without_consumer(WaitOptions::default());

    let (status, body) = app.get_json("/result/does-not-exist").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["requestId"], "does-not-exist");
}

#[tokio::test]
async fn test_redis_probe_round_trips_timestamp() {
    let app = TestApp::without_consumer(WaitOptions::default());

    let (status, body) = app.get_json("/redis").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["key"], "demo:ts");
    assert!(body["result"].as_str().unwrap().ends_with('Z'));
}
