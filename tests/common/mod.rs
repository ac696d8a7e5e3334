#![allow(dead_code)]

use async_trait::async_trait;
use order_reconciler::application::Reconciler;
use order_reconciler::config::ReconcilerConfig;
use order_reconciler::domain::order::{Order, OrderId, OrderPatch};
use order_reconciler::domain::ports::OrderStore;
use order_reconciler::error::{Error, Result};
use order_reconciler::infrastructure::in_memory::{
    InMemoryAlertSink, InMemoryDisputeStore, InMemoryOrderStore,
};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::{Error as IoError, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub fn pending_order(id: &str, reference: &str) -> Order {
    Order::new(id, dec!(42.50), "usd").with_payment_reference(reference)
}

/// Stores and sinks behind a reconciler, kept around for assertions.
pub struct Harness {
    pub reconciler: Arc<Reconciler>,
    pub orders: InMemoryOrderStore,
    pub disputes: InMemoryDisputeStore,
    pub alerts: InMemoryAlertSink,
}

pub async fn harness(orders: Vec<Order>) -> Harness {
    let store = InMemoryOrderStore::new();
    for order in orders {
        store.insert(order).await.unwrap();
    }
    let disputes = InMemoryDisputeStore::new();
    let alerts = InMemoryAlertSink::new();
    let reconciler = Reconciler::new(
        Box::new(store.clone()),
        Box::new(disputes.clone()),
        Box::new(alerts.clone()),
    );
    Harness {
        reconciler: Arc::new(reconciler),
        orders: store,
        disputes,
        alerts,
    }
}

pub fn fast_config(max_attempts: u32, deadline: Duration) -> ReconcilerConfig {
    ReconcilerConfig::new(max_attempts, Duration::from_millis(1), deadline).unwrap()
}

/// Wraps an order store and fails the first `conflicts` updates with a version
/// conflict, as if another writer got there first.
pub struct ConflictingStore {
    inner: InMemoryOrderStore,
    conflicts: AtomicUsize,
    pub update_calls: Arc<AtomicUsize>,
}

impl ConflictingStore {
    pub fn new(inner: InMemoryOrderStore, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts: AtomicUsize::new(conflicts),
            update_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl OrderStore for ConflictingStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        self.inner.get(order_id).await
    }

    async fn get_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        self.inner.get_by_payment_reference(reference).await
    }

    async fn update(&self, order_id: &OrderId, expected_version: u64, patch: OrderPatch) -> Result<Order> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Conflict {
                order_id: order_id.to_string(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.update(order_id, expected_version, patch).await
    }

    async fn all(&self) -> Result<Vec<Order>> {
        self.inner.all().await
    }
}

/// Wraps an order store so that, just before the first update lands, `rival`
/// claims `reference` as if a concurrent event had bound it.
pub struct ClaimingStore {
    inner: InMemoryOrderStore,
    rival: OrderId,
    reference: String,
    claimed: AtomicBool,
}

impl ClaimingStore {
    pub fn new(inner: InMemoryOrderStore, rival: &str, reference: &str) -> Self {
        Self {
            inner,
            rival: OrderId::new(rival),
            reference: reference.to_string(),
            claimed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl OrderStore for ClaimingStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        self.inner.get(order_id).await
    }

    async fn get_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        self.inner.get_by_payment_reference(reference).await
    }

    async fn update(&self, order_id: &OrderId, expected_version: u64, patch: OrderPatch) -> Result<Order> {
        if !self.claimed.swap(true, Ordering::SeqCst) {
            let rival = self.inner.get(&self.rival).await?.ok_or_else(|| Error::OrderNotFound {
                order_id: self.rival.to_string(),
            })?;
            let claim = OrderPatch {
                payment_reference: Some(self.reference.clone()),
                ..OrderPatch::default()
            };
            self.inner.update(&self.rival, rival.version, claim).await?;
        }
        self.inner.update(order_id, expected_version, patch).await
    }

    async fn all(&self) -> Result<Vec<Order>> {
        self.inner.all().await
    }
}

/// An order store whose reads hang for `delay`.
pub struct SlowStore {
    inner: InMemoryOrderStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: InMemoryOrderStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl OrderStore for SlowStore {
    async fn insert(&self, order: Order) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(order_id).await
    }

    async fn get_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_payment_reference(reference).await
    }

    async fn update(&self, order_id: &OrderId, expected_version: u64, patch: OrderPatch) -> Result<Order> {
        self.inner.update(order_id, expected_version, patch).await
    }

    async fn all(&self) -> Result<Vec<Order>> {
        self.inner.all().await
    }
}

/// One provider envelope as a JSON line.
pub fn envelope(event_id: &str, event_type: &str, reference: &str) -> String {
    format!(
        r#"{{"id": "{event_id}", "type": "{event_type}", "data": {{"object": {{"id": "{reference}"}}}}}}"#
    )
}

pub fn dispute_envelope(event_id: &str, dispute_id: &str, reference: &str) -> String {
    format!(
        r#"{{"id": "{event_id}", "type": "charge.dispute.created", "data": {{"object": {{"id": "{dispute_id}", "payment_intent": "{reference}", "charge": "ch_1", "amount": 4250, "currency": "usd", "reason": "fraudulent"}}}}}}"#
    )
}

pub fn write_orders(path: &Path, rows: &[(&str, &str, &str)]) -> std::result::Result<(), IoError> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["id", "payment_reference", "amount", "currency"])?;
    for (id, reference, amount) in rows {
        wtr.write_record([*id, *reference, *amount, "usd"])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_events(path: &Path, lines: &[String]) -> std::result::Result<(), IoError> {
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}
