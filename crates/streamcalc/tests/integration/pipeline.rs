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

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use streamcalc::consumer::{ConsumerConfig, ConsumerLoop, HandlerRegistry};
use streamcalc::envelope::{encode, Addition};
use streamcalc::{
    MemoryBackend, QueryOutcome, ResultQuery, ResultStatus, TaskEnvelope, TaskLog, WaitOutcome,
};

use crate::fixtures::Harness;

async fn eventually_completed(query: &ResultQuery, request_id: &str) -> QueryOutcome {
    for _ in 0..100 {
        let outcome = query.query(request_id).await.unwrap();
        if outcome != QueryOutcome::Pending {
            return outcome;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("result for {} never appeared", request_id);
}

#[tokio::test]
async fn test_submit_and_wait_returns_sum() {
    let harness = Harness::start();

    for (a, b, expected) in [
        (2.0, 3.0, json!(5)),
        (-1.5, 0.25, json!(-1.25)),
        (1e3, 24.0, json!(1024)),
    ] {
        match harness.producer.submit_and_wait(a, b).await.unwrap() {
            WaitOutcome::Completed { record, .. } => {
                assert_eq!(record.result, expected);
                assert_eq!(record.status, ResultStatus::Completed);
            }
            other => panic!("expected completion for {} + {}, got {:?}", a, b, other),
        }
    }

    assert_eq!(harness.backend.len("tasks").await.unwrap(), 0);
    let stats = harness.stop().await;
    assert_eq!(stats.processed, 3);
}

#[tokio::test]
async fn test_async_result_is_queryable_repeatedly() {
    let harness = Harness::start();
    let query = ResultQuery::new(Arc::new(harness.backend.clone()));

    let submission = harness.producer.submit_async(1.0, 1.0).await.unwrap();
    let id = submission.request_id.to_string();

    let first = eventually_completed(&query, &id).await;
    let second = query.query(&id).await.unwrap();
    assert_eq!(first, second);
    match first {
        QueryOutcome::Completed { record } => assert_eq!(record.result, json!(2)),
        QueryOutcome::Pending => unreachable!(),
    }

    harness.stop().await;
}

#[tokio::test]
async fn test_waiting_consumes_the_result() {
    let harness = Harness::start();
    let query = ResultQuery::new(Arc::new(harness.backend.clone()));

    let outcome = harness.producer.submit_and_wait(4.0, 5.0).await.unwrap();
    let request_id = outcome.request_id().to_string();
    assert!(matches!(outcome, WaitOutcome::Completed { .. }));

    assert_eq!(query.query(&request_id).await.unwrap(), QueryOutcome::Pending);
    harness.stop().await;
}

#[tokio::test]
async fn test_batch_is_processed_in_log_order() {
    let backend = MemoryBackend::new();
    let registry = HandlerRegistry::new();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        registry.register_fn(move |add: Addition| {
            seen.lock().push(add.a);
            Ok(json!(add.sum()))
        });
    }

    for a in [1.0, 2.0, 3.0] {
        backend
            .append("tasks", &encode(&TaskEnvelope::new(Addition::new(a, 0.0))))
            .await
            .unwrap();
    }

    let mut consumer = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        registry,
        ConsumerConfig::builder()
            .block(Duration::from_millis(10))
            .build(),
    );
    assert_eq!(consumer.poll_once().await.unwrap(), 3);
    assert_eq!(*seen.lock(), vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn test_batch_size_caps_each_read() {
    let backend = MemoryBackend::new();
    for _ in 0..5 {
        backend
            .append("tasks", &encode(&TaskEnvelope::new(Addition::new(1.0, 1.0))))
            .await
            .unwrap();
    }

    let mut consumer = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        ConsumerConfig::builder()
            .block(Duration::from_millis(10))
            .batch_size(Some(2))
            .build(),
    );
    assert_eq!(consumer.poll_once().await.unwrap(), 2);
    assert_eq!(consumer.poll_once().await.unwrap(), 2);
    assert_eq!(consumer.poll_once().await.unwrap(), 1);
    assert_eq!(consumer.poll_once().await.unwrap(), 0);
    assert_eq!(consumer.stats().processed, 5);
}
