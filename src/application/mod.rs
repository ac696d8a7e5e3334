//! Application layer containing the reconciliation logic.
//!
//! [`reconciler::Reconciler`] is the entry point: it takes verified payment
//! events, resolves the order they refer to, and applies the payment state
//! machine through conditional writes on the order store.

pub mod outcome;
pub mod reconciler;

pub use outcome::{Disposition, Outcome, ReconcileError};
pub use reconciler::Reconciler;
