use thiserror::Error;

/// Errors raised by the storage adapters and the input/output interfaces.
///
/// Reconciliation decisions have their own taxonomy in
/// [`crate::application::outcome::ReconcileError`]; this type covers the plumbing
/// underneath it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: String },
    #[error("Duplicate order: {0}")]
    DuplicateOrder(String),
    #[error("Payment reference {reference} already bound to order {order_id}")]
    ReferenceTaken { reference: String, order_id: String },
    #[error("Version conflict on order {order_id}: expected {expected}, found {actual}")]
    Conflict {
        order_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Whether retrying the same read-decide-write cycle may succeed.
    ///
    /// A reference claimed by another order between the read and the write is a
    /// conflict like any other: the next read finds the order that owns it.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Conflict { .. }
            | Error::ReferenceTaken { .. }
            | Error::Unavailable(_)
            | Error::IoError(_) => true,
            #[cfg(feature = "storage-rocksdb")]
            Error::RocksDbError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
