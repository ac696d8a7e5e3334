use crate::domain::dispute::DisputeRecord;
use crate::domain::order::{Order, OrderId, OrderPatch};
use crate::domain::ports::{DisputeStore, OrderStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for storing orders, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family mapping payment references to order ids.
pub const CF_ORDER_REFS: &str = "order_refs";
/// Column Family for storing dispute records, keyed by dispute id.
pub const CF_DISPUTES: &str = "disputes";

/// A persistent store implementation using RocksDB.
///
/// Orders, the payment reference index and disputes live in separate Column
/// Families. Conditional writes (version check + write batch) are serialized by
/// an in-process lock; the order and its reference index entry are committed in
/// one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "orders", "order_refs" and "disputes" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ORDERS, CF_ORDER_REFS, CF_DISPUTES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            Error::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| {
            Error::InternalError(Box::new(std::io::Error::other("write lock poisoned")))
        })
    }

    fn reference_owner(&self, reference: &str) -> Result<Option<OrderId>> {
        let cf = self.cf(CF_ORDER_REFS)?;
        Ok(self
            .db
            .get_cf(&cf, reference.as_bytes())?
            .map(|bytes| OrderId::new(String::from_utf8_lossy(&bytes).into_owned())))
    }

    fn write_order(&self, order: &Order, new_reference: Option<&str>) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(&self.cf(CF_ORDERS)?, order.id.as_str(), to_json(order)?);
        if let Some(reference) = new_reference {
            batch.put_cf(&self.cf(CF_ORDER_REFS)?, reference, order.id.as_str());
        }
        self.db.write(batch)?;
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn ensure_unclaimed(owner: Option<OrderId>, reference: &str, order_id: &OrderId) -> Result<()> {
    match owner {
        Some(owner) if &owner != order_id => Err(Error::ReferenceTaken {
            reference: reference.to_string(),
            order_id: owner.to_string(),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.lock()?;
        if self.read::<Order>(CF_ORDERS, order.id.as_str().as_bytes())?.is_some() {
            return Err(Error::DuplicateOrder(order.id.to_string()));
        }
        if let Some(reference) = &order.payment_reference {
            ensure_unclaimed(self.reference_owner(reference)?, reference, &order.id)?;
        }
        self.write_order(&order, order.payment_reference.as_deref())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, order_id.as_str().as_bytes())
    }

    async fn get_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        match self.reference_owner(reference)? {
            Some(order_id) => self.read(CF_ORDERS, order_id.as_str().as_bytes()),
            None => Ok(None),
        }
    }

    async fn update(&self, order_id: &OrderId, expected_version: u64, patch: OrderPatch) -> Result<Order> {
        let _guard = self.lock()?;
        let mut order: Order = self
            .read(CF_ORDERS, order_id.as_str().as_bytes())?
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
        if let Some(reference) = &patch.payment_reference {
            ensure_unclaimed(self.reference_owner(reference)?, reference, order_id)?;
        }

        order.apply(&patch, Utc::now())?;
        self.write_order(&order, patch.payment_reference.as_deref())?;
        Ok(order)
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            orders.push(serde_json::from_slice::<Order>(&value)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl DisputeStore for RocksDBStore {
    async fn record(&self, dispute: DisputeRecord) -> Result<bool> {
        let _guard = self.lock()?;
        let key = dispute.dispute_id.as_bytes();
        if self.read::<DisputeRecord>(CF_DISPUTES, key)?.is_some() {
            return Ok(false);
        }
        let cf = self.cf(CF_DISPUTES)?;
        self.db.put_cf(&cf, key, to_json(&dispute)?)?;
        Ok(true)
    }

    async fn get(&self, dispute_id: &str) -> Result<Option<DisputeRecord>> {
        self.read(CF_DISPUTES, dispute_id.as_bytes())
    }
}
