use super::dispute::{Alert, DisputeRecord};
use super::order::{Order, OrderId, OrderPatch};
use crate::error::Result;
use async_trait::async_trait;

/// Record store holding orders.
///
/// `update` is a conditional write: it only lands if the stored order is still at
/// `expected_version`, otherwise it fails with [`crate::error::Error::Conflict`].
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>>;
    async fn get_by_payment_reference(&self, reference: &str) -> Result<Option<Order>>;
    async fn update(
        &self,
        order_id: &OrderId,
        expected_version: u64,
        patch: OrderPatch,
    ) -> Result<Order>;
    async fn all(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait DisputeStore: Send + Sync {
    /// Stores `dispute` unless one with the same id exists. Returns whether it was new.
    async fn record(&self, dispute: DisputeRecord) -> Result<bool>;
    async fn get(&self, dispute_id: &str) -> Result<Option<DisputeRecord>>;
}

/// Operator-facing channel for conditions that need a human.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise(&self, alert: Alert);
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type DisputeStoreBox = Box<dyn DisputeStore>;
pub type AlertSinkBox = Box<dyn AlertSink>;
