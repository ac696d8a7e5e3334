mod common;

use common::{ClaimingStore, ConflictingStore, SlowStore, fast_config, harness, pending_order};
use order_reconciler::application::{Disposition, Outcome, ReconcileError, Reconciler};
use order_reconciler::domain::event::PaymentEvent;
use order_reconciler::domain::dispute::Alert;
use order_reconciler::domain::order::{Order, OrderId, PaymentStatus};
use order_reconciler::domain::ports::OrderStore;
use order_reconciler::error::Error;
use order_reconciler::infrastructure::in_memory::{
    InMemoryAlertSink, InMemoryDisputeStore, InMemoryOrderStore,
};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeliveries_write_once() {
    let h = harness(vec![pending_order("o-1", "pi_1")]).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let reconciler = Arc::clone(&h.reconciler);
        // Half of the deliveries reuse the same event id.
        let event_id = if i % 2 == 0 { "E1".to_string() } else { format!("E{i}") };
        handles.push(tokio::spawn(async move {
            reconciler
                .process_event(&PaymentEvent::succeeded(&event_id, "pi_1"))
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        match Disposition::of(&result) {
            Disposition::Applied => applied += 1,
            Disposition::Duplicate => {}
            other => panic!("unexpected disposition {other:?}: {result:?}"),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(h.orders.write_count().await, 1);
    let order = h.orders.get(&OrderId::new("o-1")).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Succeeded);
    assert_eq!(order.version, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conflicting_terminal_events_settle_once() {
    let h = harness(vec![pending_order("o-1", "pi_1")]).await;

    let succeeded = {
        let reconciler = Arc::clone(&h.reconciler);
        tokio::spawn(async move {
            reconciler
                .process_event(&PaymentEvent::succeeded("E1", "pi_1"))
                .await
        })
    };
    let failed = {
        let reconciler = Arc::clone(&h.reconciler);
        tokio::spawn(async move {
            reconciler
                .process_event(&PaymentEvent::failed("E2", "pi_1"))
                .await
        })
    };

    let results = [succeeded.await.unwrap(), failed.await.unwrap()];
    let winners: Vec<PaymentStatus> = results
        .iter()
        .filter_map(|r| match r {
            Ok(Outcome::Applied { to, .. }) => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(ReconcileError::InvalidTransition { .. })))
            .count(),
        1
    );

    let order = h.orders.get(&OrderId::new("o-1")).await.unwrap().unwrap();
    assert_eq!(order.payment_status, winners[0]);
    assert_eq!(h.orders.write_count().await, 1);
}

#[tokio::test]
async fn test_shuffled_redelivery_converges() {
    let mut deliveries = vec![
        PaymentEvent::processing("E1", "pi_1"),
        PaymentEvent::processing("E1", "pi_1"),
        PaymentEvent::succeeded("E2", "pi_1"),
        PaymentEvent::succeeded("E2", "pi_1"),
        PaymentEvent::succeeded("E2", "pi_1"),
    ];

    for _ in 0..20 {
        deliveries.shuffle(&mut rand::thread_rng());
        let h = harness(vec![pending_order("o-1", "pi_1")]).await;

        for event in &deliveries {
            let result = h.reconciler.process_event(event).await;
            assert!(
                matches!(
                    Disposition::of(&result),
                    Disposition::Applied | Disposition::Duplicate
                ),
                "{result:?}"
            );
        }

        let order = h.orders.get(&OrderId::new("o-1")).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Succeeded);
        assert!(h.orders.write_count().await <= 2);
    }
}

async fn reconciler_over(store: Box<dyn OrderStore>, max_attempts: u32, deadline: Duration) -> Reconciler {
    store.insert(pending_order("o-1", "pi_1")).await.unwrap();
    Reconciler::new(
        store,
        Box::new(InMemoryDisputeStore::new()),
        Box::new(InMemoryAlertSink::new()),
    )
    .with_config(fast_config(max_attempts, deadline))
}

#[tokio::test]
async fn test_single_conflict_is_retried() {
    let store = ConflictingStore::new(InMemoryOrderStore::new(), 1);
    let calls = Arc::clone(&store.update_calls);
    let reconciler = reconciler_over(Box::new(store), 3, Duration::from_secs(5)).await;

    let result = reconciler
        .process_event(&PaymentEvent::succeeded("E1", "pi_1"))
        .await;
    assert!(matches!(result, Ok(Outcome::Applied { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_conflict_is_retryable_failure() {
    let store = ConflictingStore::new(InMemoryOrderStore::new(), usize::MAX);
    let calls = Arc::clone(&store.update_calls);
    let reconciler = reconciler_over(Box::new(store), 3, Duration::from_secs(5)).await;

    let result = reconciler
        .process_event(&PaymentEvent::succeeded("E1", "pi_1"))
        .await;
    assert!(matches!(
        result,
        Err(ReconcileError::PersistenceFailure {
            source: Error::Conflict { .. },
            ..
        })
    ));
    assert_eq!(Disposition::of(&result), Disposition::RetryableFailure);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let order = reconciler
        .orders()
        .get(&OrderId::new("o-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_deadline_exceeded_is_retryable_failure() {
    let store = SlowStore::new(InMemoryOrderStore::new(), Duration::from_millis(500));
    let reconciler = reconciler_over(Box::new(store), 3, Duration::from_millis(20)).await;

    let result = reconciler
        .process_event(&PaymentEvent::succeeded("E1", "pi_1"))
        .await;
    assert!(matches!(result, Err(ReconcileError::PersistenceFailure { .. })));
    assert!(result.as_ref().unwrap_err().is_retryable());
    assert_eq!(Disposition::of(&result), Disposition::RetryableFailure);
}

#[tokio::test]
async fn test_reference_claimed_mid_bind_is_reresolved() {
    let inner = InMemoryOrderStore::new();
    inner.insert(Order::new("o-1", rust_decimal_macros::dec!(5), "usd")).await.unwrap();
    inner.insert(Order::new("o-2", rust_decimal_macros::dec!(5), "usd")).await.unwrap();
    let alerts = InMemoryAlertSink::new();
    let reconciler = Reconciler::new(
        Box::new(ClaimingStore::new(inner.clone(), "o-2", "pi_9")),
        Box::new(InMemoryDisputeStore::new()),
        Box::new(alerts.clone()),
    )
    .with_config(fast_config(3, Duration::from_secs(5)));

    let event = PaymentEvent::succeeded("E1", "pi_9").with_order_hint("o-1");
    let result = reconciler.process_event(&event).await;

    // The second attempt finds o-2 through the reference instead of handing the
    // event back to the provider.
    assert!(
        matches!(&result, Ok(Outcome::Applied { order_id, .. }) if order_id.as_str() == "o-2"),
        "{result:?}"
    );
    let winner = inner.get(&OrderId::new("o-2")).await.unwrap().unwrap();
    assert_eq!(winner.payment_status, PaymentStatus::Succeeded);
    let loser = inner.get(&OrderId::new("o-1")).await.unwrap().unwrap();
    assert_eq!(loser.payment_reference, None);
    assert_eq!(loser.payment_status, PaymentStatus::Pending);
    assert!(matches!(
        alerts.alerts().await.as_slice(),
        [Alert::HintMismatch { .. }]
    ));
}
