//! Adapters between the outside world and the reconciler: the provider's event
//! envelope, the webhook acknowledgment, and CSV seeding and reporting.

pub mod csv;
pub mod provider;
pub mod webhook;
