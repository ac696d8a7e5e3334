//! Adapters implementing the domain ports.

pub mod in_memory;
pub mod log_alerts;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
