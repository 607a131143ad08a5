//! Integration tests for the order transaction coordinator against the
//! in-memory store.

use std::sync::Arc;

use common::RecordId;
use domain::{Money, NewRecord, RecordFormat};
use futures_util::future::join_all;
use orders::{OrderError, OrderTransactionCoordinator};
use store::{InMemoryStore, RecordRepository};

async fn seed(store: &InMemoryStore, qty: u32) -> RecordId {
    RecordRepository::create(
        store,
        NewRecord::new(
            "Nina Simone",
            "Pastel Blues",
            RecordFormat::Vinyl,
            Money::from_cents(3199),
            qty,
            "Soul",
        ),
    )
    .await
    .unwrap()
    .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    let store = InMemoryStore::new();
    let record_id = seed(&store, 10).await;
    let coordinator = Arc::new(OrderTransactionCoordinator::new(store.clone()));

    let tasks = (0..20).map(|_| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.create_order(record_id, 3).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::InsufficientStock { .. })))
        .count();

    assert_eq!(succeeded, 3);
    assert_eq!(short, 17);

    let record = RecordRepository::find_by_id(&store, record_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.qty, 1);
    assert_eq!(store.order_count().await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn prior_quantities_reported_by_concurrent_orders_are_distinct() {
    let store = InMemoryStore::new();
    let record_id = seed(&store, 5).await;
    let coordinator = Arc::new(OrderTransactionCoordinator::new(store.clone()));

    let tasks = (0..5).map(|_| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.create_order(record_id, 1).await })
    });
    let mut seen: Vec<u32> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().available_quantity)
        .collect();
    seen.sort();

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn sequential_mode_still_places_single_orders() {
    let store = InMemoryStore::sequential();
    let record_id = seed(&store, 3).await;
    let coordinator = OrderTransactionCoordinator::new(store.clone());

    let result = coordinator.create_order(record_id, 2).await.unwrap();
    assert_eq!(result.available_quantity, 3);

    let err = coordinator.create_order(record_id, 2).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Insufficient stock. Available: 1, Requested: 2"
    );
}
