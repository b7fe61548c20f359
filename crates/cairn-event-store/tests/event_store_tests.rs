//! Integration tests for `EventStore` over the in-memory stream store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cairn_core::context::Context;
use cairn_core::error::DomainError;
use cairn_core::event::EventMetadata;
use cairn_core::stream::ExpectedRevision;
use cairn_event_store::{EventStore, InMemoryStreamStore, StoreConfig};
use cairn_test_support::{FailingStreamStore, RecordingStreamStore, StalledStreamStore};
use uuid::Uuid;

use common::{ItemRepriced, PRICE_CHANGED, event_store, raw_event};

#[tokio::test]
async fn test_load_events_returns_empty_vec_for_absent_stream() {
    // Arrange
    let store = event_store(Arc::new(InMemoryStreamStore::new()));

    // Act
    let events = store
        .load_events(&Context::background(), "missing")
        .await
        .unwrap();

    // Assert
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_save_and_load_preserves_order_and_payloads() {
    // Arrange
    let store = event_store(Arc::new(InMemoryStreamStore::new()));
    let ctx = Context::background();
    let batch = vec![
        raw_event("s-1", PRICE_CHANGED, 10),
        raw_event("s-1", PRICE_CHANGED, 20),
        raw_event("s-1", PRICE_CHANGED, 30),
    ];
    let ids: Vec<Uuid> = batch.iter().map(|e| e.event_id).collect();

    // Act
    store.save_events(&ctx, "s-1", &batch).await.unwrap();
    let loaded = store.load_events(&ctx, "s-1").await.unwrap();

    // Assert
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.iter().map(|e| e.event_id).collect::<Vec<_>>(), ids);
    assert_eq!(
        loaded.iter().map(|e| e.version).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let prices: Vec<u64> = loaded
        .iter()
        .map(|e| e.json_data::<ItemRepriced>().unwrap().price)
        .collect();
    assert_eq!(prices, vec![10, 20, 30]);
    assert!(loaded.iter().all(|e| e.aggregate_id == "s-1"));
}

#[tokio::test]
async fn test_save_appends_without_revision_check() {
    // Arrange
    let recording = Arc::new(RecordingStreamStore::new(Arc::new(
        InMemoryStreamStore::new(),
    )));
    let store = event_store(recording.clone());
    let ctx = Context::background();

    // Act
    store
        .save_events(&ctx, "s-2", &[raw_event("s-2", PRICE_CHANGED, 1)])
        .await
        .unwrap();
    store
        .save_events(&ctx, "s-2", &[raw_event("s-2", PRICE_CHANGED, 2)])
        .await
        .unwrap();

    // Assert
    let appends = recording.appends();
    assert_eq!(appends.len(), 2);
    assert!(appends.iter().all(|a| a.expected == ExpectedRevision::Any));
    assert_eq!(store.load_events(&ctx, "s-2").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_resaving_recorded_event_is_infrastructure_error_not_conflict() {
    // Arrange
    let store = event_store(Arc::new(InMemoryStreamStore::new()));
    let ctx = Context::background();
    let event = raw_event("s-dup", PRICE_CHANGED, 1);
    store
        .save_events(&ctx, "s-dup", &[event.clone()])
        .await
        .unwrap();

    // Act
    let result = store.save_events(&ctx, "s-dup", &[event]).await;

    // Assert
    match result {
        Err(e) => {
            assert!(!e.is_concurrency_conflict());
            match e.root() {
                DomainError::Infrastructure(msg) => assert!(msg.contains("already recorded")),
                other => panic!("expected Infrastructure, got {other:?}"),
            }
        }
        other => panic!("expected Infrastructure, got {other:?}"),
    }
    assert_eq!(store.load_events(&ctx, "s-dup").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_loaded_events_carry_no_aggregate_type() {
    // Arrange
    let store = event_store(Arc::new(InMemoryStreamStore::new()));
    let ctx = Context::background();
    let event = raw_event("s-8", PRICE_CHANGED, 1);
    assert_eq!(event.aggregate_type.as_str(), "catalog-item");

    // Act
    store.save_events(&ctx, "s-8", &[event]).await.unwrap();
    let loaded = store.load_events(&ctx, "s-8").await.unwrap();

    // Assert
    assert!(loaded[0].aggregate_type.as_str().is_empty());
}

#[tokio::test]
async fn test_save_of_empty_batch_is_noop() {
    // Arrange
    let recording = Arc::new(RecordingStreamStore::new(Arc::new(
        InMemoryStreamStore::new(),
    )));
    let store = event_store(recording.clone());

    // Act
    let result = store.save_events(&Context::background(), "s-3", &[]).await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(recording.call_count(), 0);
}

#[tokio::test]
async fn test_metadata_survives_round_trip() {
    // Arrange
    let store = event_store(Arc::new(InMemoryStreamStore::new()));
    let ctx = Context::background();
    let correlation_id = Uuid::new_v4();
    let event = raw_event("s-4", PRICE_CHANGED, 5)
        .with_json_metadata(&EventMetadata::correlated(correlation_id))
        .unwrap();

    // Act
    store.save_events(&ctx, "s-4", &[event]).await.unwrap();
    let loaded = store.load_events(&ctx, "s-4").await.unwrap();

    // Assert
    let metadata: EventMetadata = loaded[0].json_metadata().unwrap();
    assert_eq!(metadata.correlation_id, Some(correlation_id));
}

#[tokio::test]
async fn test_load_pages_with_small_page_size() {
    // Arrange
    let streams = Arc::new(InMemoryStreamStore::new());
    let recording = Arc::new(RecordingStreamStore::new(streams));
    let config = StoreConfig {
        page_size: 2,
        ..StoreConfig::default()
    };
    let store = EventStore::new(recording.clone(), &config);
    let ctx = Context::background();
    let batch: Vec<_> = (1..=4).map(|p| raw_event("s-5", PRICE_CHANGED, p)).collect();
    store.save_events(&ctx, "s-5", &batch).await.unwrap();

    // Act
    let loaded = store.load_events(&ctx, "s-5").await.unwrap();

    // Assert
    assert_eq!(loaded.len(), 4);
    // Two full pages, then an empty one ends the read.
    assert_eq!(recording.reads().len(), 3);
}

#[tokio::test]
async fn test_store_failure_is_wrapped_with_operation() {
    // Arrange
    let store = event_store(Arc::new(FailingStreamStore));
    let ctx = Context::background();

    // Act
    let load = store.load_events(&ctx, "s-6").await;
    let save = store
        .save_events(&ctx, "s-6", &[raw_event("s-6", PRICE_CHANGED, 1)])
        .await;

    // Assert
    match load {
        Err(e) => {
            assert!(matches!(e.root(), DomainError::Infrastructure(_)));
            assert!(e.to_string().starts_with("EventStore::load_events [s-6]"));
        }
        other => panic!("expected Infrastructure, got {other:?}"),
    }
    match save {
        Err(e) => assert!(e.to_string().starts_with("EventStore::save_events [s-6]")),
        other => panic!("expected Infrastructure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deadline_interrupts_stalled_load() {
    // Arrange
    let store = event_store(Arc::new(StalledStreamStore));
    let ctx = Context::background().with_timeout(Duration::from_millis(20));

    // Act
    let result = store.load_events(&ctx, "s-7").await;

    // Assert
    match result {
        Err(e) => assert!(matches!(e.root(), DomainError::DeadlineExceeded)),
        other => panic!("expected DeadlineExceeded, got {other:?}"),
    }
}
