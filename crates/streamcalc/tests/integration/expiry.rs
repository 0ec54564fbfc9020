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

use std::sync::Arc;
use std::time::Duration;
use streamcalc::consumer::{ConsumerConfig, ConsumerLoop, HandlerRegistry};
use streamcalc::{MemoryBackend, Producer, QueryOutcome, ResultQuery};

#[tokio::test(start_paused = true)]
async fn test_unread_result_expires_to_pending() {
    let backend = MemoryBackend::new();
    let producer = Producer::new(Arc::new(backend.clone()), Arc::new(backend.clone()), "tasks");
    let query = ResultQuery::new(Arc::new(backend.clone()));

    let submission = producer.submit_async(3.0, 4.0).await.unwrap();
    let id = submission.request_id.to_string();

    let mut consumer = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        ConsumerConfig::default(),
    );
    assert_eq!(consumer.poll_once().await.unwrap(), 1);
    assert!(matches!(
        query.query(&id).await.unwrap(),
        QueryOutcome::Completed { .. }
    ));

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(query.query(&id).await.unwrap(), QueryOutcome::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_configured_ttl_is_honoured() {
    let backend = MemoryBackend::new();
    let producer = Producer::new(Arc::new(backend.clone()), Arc::new(backend.clone()), "tasks");
    let query = ResultQuery::new(Arc::new(backend.clone()));

    let id = producer
        .submit_async(1.0, 1.0)
        .await
        .unwrap()
        .request_id
        .to_string();

    let mut consumer = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        ConsumerConfig::builder()
            .result_ttl(Duration::from_secs(5))
            .build(),
    );
    consumer.poll_once().await.unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(matches!(
        query.query(&id).await.unwrap(),
        QueryOutcome::Completed { .. }
    ));
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(query.query(&id).await.unwrap(), QueryOutcome::Pending);
}
