mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use rpc_core::error::RpcError;
use rpc_core::InFlightRequests;

use common::{config, response};

#[tokio::test(start_paused = true)]
async fn blocked_register_proceeds_after_completion() {
    let table = Arc::new(InFlightRequests::new(&config(2, 10, 10)));
    let first = table.register(1).await.unwrap();
    let _second = table.register(2).await.unwrap();
    assert_eq!(table.available_slots(), 0);

    let started = Instant::now();
    let waiter = tokio::spawn({
        let table = table.clone();
        async move {
            let slot = table.register(3).await;
            (slot, started.elapsed())
        }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!waiter.is_finished());
    assert!(table.complete(1, response(1, b"one")));

    let (third, waited) = waiter.await.unwrap();
    assert!(third.is_ok());
    assert!(waited >= Duration::from_secs(1));
    assert!(waited < Duration::from_secs(10));

    let first = first.await.unwrap();
    assert_eq!(first.payload().as_ref(), b"one");
    assert!(table.contains(3));
    assert!(!table.contains(1));
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_frees_its_slot() {
    let table = InFlightRequests::new(&config(10, 10, 10));
    let pending = table.register(5).await.unwrap();
    assert_eq!(table.available_slots(), 9);

    tokio::time::sleep(Duration::from_secs(21)).await;

    let err = pending.await.unwrap_err();
    assert!(matches!(err, RpcError::Timeout(5)));
    assert!(table.is_empty());
    assert_eq!(table.available_slots(), table.capacity());
}

#[tokio::test(start_paused = true)]
async fn register_gives_up_when_no_slot_frees() {
    let table = InFlightRequests::new(&config(1, 3, 60));
    let _held = table.register(1).await.unwrap();

    let started = Instant::now();
    let err = table.register(2).await.unwrap_err();
    assert!(matches!(err, RpcError::BackpressureTimeout(_)));
    assert!(err.is_not_sent());
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(!table.contains(2));
    assert_eq!(table.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn sweep_releases_capacity_to_blocked_register() {
    let table = Arc::new(InFlightRequests::new(&config(1, 60, 10)));
    let abandoned = table.register(1).await.unwrap();

    let started = Instant::now();
    let second = tokio::spawn({
        let table = table.clone();
        async move { table.register(2).await }
    });

    assert!(second.await.unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(matches!(abandoned.await, Err(RpcError::Timeout(1))));
    assert!(table.contains(2));
}

#[tokio::test(start_paused = true)]
async fn each_request_is_resolved_exactly_once() {
    let table = InFlightRequests::new(&config(4, 10, 10));
    table.shutdown();

    let answered = table.register(1).await.unwrap();
    assert!(table.complete(1, response(1, b"ok")));
    assert!(!table.complete(1, response(1, b"again")));
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(table.sweep(), 0);
    assert_eq!(answered.await.unwrap().payload().as_ref(), b"ok");

    let expired = table.register(2).await.unwrap();
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(table.sweep(), 1);
    assert!(!table.complete(2, response(2, b"late")));
    assert!(!table.fail(2, RpcError::ConnectionClosed));
    assert!(matches!(expired.await, Err(RpcError::Timeout(2))));
    assert_eq!(table.available_slots(), 4);
}

#[tokio::test(start_paused = true)]
async fn table_never_exceeds_capacity() {
    let table = Arc::new(InFlightRequests::new(&config(3, 60, 60)));
    let mut tasks = Vec::new();
    for id in 0..12 {
        let table = table.clone();
        tasks.push(tokio::spawn(async move {
            let pending = table.register(id).await.unwrap();
            assert!(table.len() <= 3);
            tokio::time::sleep(Duration::from_millis(10 * (id as u64 % 4 + 1))).await;
            assert!(table.len() <= 3);
            table.complete(id, response(id, b"done"));
            pending.await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert!(table.is_empty());
    assert_eq!(table.available_slots(), 3);
}

#[tokio::test]
async fn duplicate_id_is_rejected_without_leaking_a_slot() {
    let table = InFlightRequests::new(&config(2, 1, 10));
    let _first = table.register(9).await.unwrap();
    let err = table.register(9).await.unwrap_err();
    assert!(matches!(err, RpcError::DuplicateRequestId(9)));
    assert_eq!(table.available_slots(), 1);
}

#[tokio::test]
async fn completing_unknown_id_is_a_no_op() {
    let table = InFlightRequests::new(&config(2, 1, 10));
    assert!(!table.complete(42, response(42, b"stray")));
    assert_eq!(table.available_slots(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_periodic_sweep() {
    let table = InFlightRequests::new(&config(2, 1, 10));
    let _pending = table.register(1).await.unwrap();
    table.shutdown();

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(table.contains(1));

    assert_eq!(table.sweep(), 1);
    assert!(table.is_empty());
}

#[tokio::test]
async fn dropping_the_table_resolves_pending_futures() {
    let table = InFlightRequests::new(&config(2, 1, 10));
    let pending = table.register(1).await.unwrap();
    drop(table);
    assert!(matches!(pending.await, Err(RpcError::ConnectionClosed)));
}
