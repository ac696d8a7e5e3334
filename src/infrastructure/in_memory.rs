use crate::domain::dispute::{Alert, DisputeRecord};
use crate::domain::order::{Order, OrderId, OrderPatch};
use crate::domain::ports::{AlertSink, DisputeStore, OrderStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    /// payment reference -> order id
    references: HashMap<String, OrderId>,
    writes: usize,
}

impl OrderTable {
    fn claim_reference(&self, reference: &str, order_id: &OrderId) -> Result<()> {
        match self.references.get(reference) {
            Some(owner) if owner != order_id => Err(Error::ReferenceTaken {
                reference: reference.to_string(),
                order_id: owner.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// A thread-safe in-memory order store.
///
/// Orders and the payment reference index live behind one `RwLock`, so the
/// version check and the write of `update` happen under the same guard.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `update` calls so far.
    pub async fn write_count(&self) -> usize {
        self.table.read().await.writes
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut table = self.table.write().await;
        if table.orders.contains_key(&order.id) {
            return Err(Error::DuplicateOrder(order.id.to_string()));
        }
        if let Some(reference) = &order.payment_reference {
            table.claim_reference(reference, &order.id)?;
            table.references.insert(reference.clone(), order.id.clone());
        }
        table.orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table.orders.get(order_id).cloned())
    }

    async fn get_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table
            .references
            .get(reference)
            .and_then(|id| table.orders.get(id))
            .cloned())
    }

    async fn update(&self, order_id: &OrderId, expected_version: u64, patch: OrderPatch) -> Result<Order> {
        let mut table = self.table.write().await;
        if let Some(reference) = &patch.payment_reference {
            table.claim_reference(reference, order_id)?;
        }

        let order = table
            .orders
            .get_mut(order_id)
            .ok_or_else(|| Error::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        if order.version != expected_version {
            return Err(Error::Conflict {
                order_id: order_id.to_string(),
                expected: expected_version,
                actual: order.version,
            });
        }
        order.apply(&patch, Utc::now())?;
        let updated = order.clone();

        if let Some(reference) = patch.payment_reference {
            table.references.insert(reference, order_id.clone());
        }
        table.writes += 1;
        Ok(updated)
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let table = self.table.read().await;
        let mut orders: Vec<Order> = table.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(orders)
    }
}

/// A thread-safe in-memory dispute log keyed by dispute id.
#[derive(Default, Clone)]
pub struct InMemoryDisputeStore {
    disputes: Arc<RwLock<HashMap<String, DisputeRecord>>>,
}

impl InMemoryDisputeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DisputeStore for InMemoryDisputeStore {
    async fn record(&self, dispute: DisputeRecord) -> Result<bool> {
        let mut disputes = self.disputes.write().await;
        match disputes.entry(dispute.dispute_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(dispute);
                Ok(true)
            }
        }
    }

    async fn get(&self, dispute_id: &str) -> Result<Option<DisputeRecord>> {
        let disputes = self.disputes.read().await;
        Ok(disputes.get(dispute_id).cloned())
    }
}

/// Keeps raised alerts in memory so tests can assert on them.
#[derive(Default, Clone)]
pub struct InMemoryAlertSink {
    alerts: Arc<RwLock<Vec<Alert>>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn raise(&self, alert: Alert) {
        self.alerts.write().await.push(alert);
    }
}
