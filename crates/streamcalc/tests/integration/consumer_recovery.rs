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

//! Redelivery after a failure while publishing or deleting, within one
//! consumer and across restarts.

use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use streamcalc::consumer::{ConsumerConfig, ConsumerLoop, HandlerRegistry};
use streamcalc::envelope::{encode, Addition};
use streamcalc::store::{get_record, result_key};
use streamcalc::stream::ReadOptions;
use streamcalc::{EntryId, MemoryBackend, ResultStore, TaskEnvelope, TaskLog};

use crate::fixtures::{FlakyLog, FlakyStore};

fn quick_config() -> ConsumerConfig {
    ConsumerConfig::builder()
        .block(Duration::from_millis(10))
        .build()
}

#[tokio::test]
async fn test_failed_delete_redelivers_entry() {
    let backend = MemoryBackend::new();
    let log = FlakyLog::new(backend.clone(), 1);

    let envelope = TaskEnvelope::new(Addition::new(20.0, 22.0));
    let id = backend.append("tasks", &encode(&envelope)).await.unwrap();

    let mut consumer = ConsumerLoop::new(
        Arc::new(log.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        ConsumerConfig::builder()
            .block(Duration::from_millis(10))
            .build(),
    );

    // Result is published, then the delete fails: cursor must not move.
    assert!(consumer.poll_once().await.is_err());
    assert_eq!(consumer.cursor(), EntryId::START);
    assert_eq!(backend.len("tasks").await.unwrap(), 1);
    let published = get_record(&backend, &result_key(envelope.request_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.result, json!(42));

    // Second pass reads the same entry again and finishes it.
    assert_eq!(consumer.poll_once().await.unwrap(), 1);
    assert_eq!(consumer.cursor(), id);
    assert_eq!(backend.len("tasks").await.unwrap(), 0);
    assert_eq!(log.delete_calls.load(Ordering::SeqCst), 2);
    assert_eq!(consumer.stats().processed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_backs_off_then_recovers() {
    let backend = MemoryBackend::new();
    let log = FlakyLog::new(backend.clone(), 2);

    let envelope = TaskEnvelope::new(Addition::new(1.0, 2.0));
    backend.append("tasks", &encode(&envelope)).await.unwrap();

    let consumer = ConsumerLoop::new(
        Arc::new(log.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        ConsumerConfig::default(),
    );
    let (trigger, shutdown) = streamcalc::shutdown::channel();
    let handle = tokio::spawn(consumer.run(shutdown));

    // Two failures, two 2s backoffs, then success.
    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(backend.len("tasks").await.unwrap(), 0);

    trigger.trigger();
    let stats = handle.await.unwrap();
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.processed, 1);
    assert_eq!(log.delete_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_earlier_entries_in_batch_stay_processed() {
    let backend = MemoryBackend::new();
    let first = TaskEnvelope::new(Addition::new(1.0, 1.0));
    let second = TaskEnvelope::new(Addition::new(2.0, 2.0));
    let first_id = backend.append("tasks", &encode(&first)).await.unwrap();
    backend.append("tasks", &encode(&second)).await.unwrap();

    // Deletes succeed for the first entry only.
    let log = FlakyLog::new(backend.clone(), 0);
    let registry = HandlerRegistry::new();
    registry.register_fn(|add: Addition| {
        if add.a == 2.0 {
            Err("rejected".to_string())
        } else {
            Ok(json!(add.sum()))
        }
    });

    let mut consumer = ConsumerLoop::new(
        Arc::new(log),
        Arc::new(backend.clone()),
        registry,
        ConsumerConfig::builder()
            .block(Duration::from_millis(10))
            .build(),
    );
    assert!(consumer.poll_once().await.is_err());
    assert_eq!(consumer.cursor(), first_id);
    assert_eq!(consumer.stats().processed, 1);
    assert_eq!(backend.len("tasks").await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_result_write_keeps_entry() {
    let backend = MemoryBackend::new();
    let log = FlakyLog::new(backend.clone(), 0);
    let store = FlakyStore::new(backend.clone(), 1);

    let envelope = TaskEnvelope::new(Addition::new(3.0, 4.0));
    let id = backend.append("tasks", &encode(&envelope)).await.unwrap();

    let mut consumer = ConsumerLoop::new(
        Arc::new(log.clone()),
        Arc::new(store.clone()),
        HandlerRegistry::with_defaults(),
        quick_config(),
    );

    assert!(consumer.poll_once().await.is_err());
    assert_eq!(backend.len("tasks").await.unwrap(), 1);
    assert_eq!(log.delete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(consumer.cursor(), EntryId::START);
    assert!(get_record(&backend, &result_key(envelope.request_id))
        .await
        .unwrap()
        .is_none());

    // Once the store recovers the same entry is published and deleted.
    assert_eq!(consumer.poll_once().await.unwrap(), 1);
    assert_eq!(consumer.cursor(), id);
    assert_eq!(store.set_calls.load(Ordering::SeqCst), 2);
    assert_eq!(log.delete_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.len("tasks").await.unwrap(), 0);
}

#[tokio::test]
async fn test_restarted_consumer_reprocesses_undeleted_entry() {
    let backend = MemoryBackend::new();
    let envelope = TaskEnvelope::new(Addition::new(5.0, 6.0));
    let id = backend.append("tasks", &encode(&envelope)).await.unwrap();
    let key = result_key(envelope.request_id);

    {
        let mut first = ConsumerLoop::new(
            Arc::new(FlakyLog::new(backend.clone(), 1)),
            Arc::new(backend.clone()),
            HandlerRegistry::with_defaults(),
            quick_config(),
        );
        assert!(first.poll_once().await.is_err());
        assert_eq!(backend.len("tasks").await.unwrap(), 1);
    }

    // Simulate the published result having been collected before the restart.
    assert!(backend.del(&key).await.unwrap());

    let mut second = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        quick_config(),
    );
    assert_eq!(second.cursor(), EntryId::START);
    assert_eq!(second.poll_once().await.unwrap(), 1);

    assert_eq!(second.cursor(), id);
    assert_eq!(second.stats().processed, 1);
    assert_eq!(backend.len("tasks").await.unwrap(), 0);
    let republished = get_record(&backend, &key).await.unwrap().unwrap();
    assert_eq!(republished.result, json!(11));
}

#[tokio::test]
async fn test_restarted_consumer_rereads_skipped_entry() {
    let backend = MemoryBackend::new();
    let unknown = vec![
        ("type".to_string(), "multiply".to_string()),
        ("requestId".to_string(), "job-9".to_string()),
        ("a".to_string(), "2".to_string()),
        ("b".to_string(), "3".to_string()),
    ];
    let skipped_id = backend.append("tasks", &unknown).await.unwrap();

    let mut first = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        quick_config(),
    );
    assert_eq!(first.poll_once().await.unwrap(), 1);
    assert_eq!(first.cursor(), skipped_id);
    assert_eq!(first.stats().skipped, 1);
    // Past the cursor there is nothing left for this consumer.
    assert!(backend
        .read("tasks", first.cursor(), ReadOptions::immediate())
        .await
        .unwrap()
        .is_empty());
    drop(first);

    let mut second = ConsumerLoop::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        HandlerRegistry::with_defaults(),
        quick_config(),
    );
    assert_eq!(second.poll_once().await.unwrap(), 1);
    assert_eq!(second.stats().skipped, 1);
    assert_eq!(second.cursor(), skipped_id);
    assert_eq!(backend.len("tasks").await.unwrap(), 1);
}
