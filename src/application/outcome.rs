use crate::domain::order::{OrderId, PaymentStatus};
use crate::error;
use thiserror::Error;

/// What a successfully handled event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The order's payment moved along an edge of the state machine.
    Applied {
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// The event had already been applied; nothing was written.
    Duplicate { order_id: OrderId },
    /// A non-terminal event arrived after the payment settled; nothing was written.
    Stale {
        order_id: OrderId,
        current: PaymentStatus,
        target: PaymentStatus,
    },
    DisputeRecorded {
        order_id: OrderId,
        dispute_id: String,
    },
    /// An event type the reconciler does not act on.
    Ignored { event_type: String },
}

/// Why an event could not be applied.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("event {event_id} carries no payment reference")]
    MissingCorrelation { event_id: String },
    #[error("event {event_id} references unknown payment {correlation_id}")]
    OrderNotFound {
        event_id: String,
        correlation_id: String,
    },
    #[error("event {event_id} cannot move order {order_id} from {from} to {to}")]
    InvalidTransition {
        event_id: String,
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("event {event_id} names order {order_id}, which is bound to payment {bound}, not {received}")]
    ReferenceMismatch {
        event_id: String,
        order_id: OrderId,
        bound: String,
        received: String,
    },
    #[error("event {event_id} could not be persisted: {source}")]
    PersistenceFailure {
        event_id: String,
        #[source]
        source: error::Error,
    },
}

impl ReconcileError {
    /// Only store failures are worth a redelivery; everything else would fail the
    /// same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::PersistenceFailure { .. })
    }

    /// Whether the reconciler itself may retry before giving up.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            ReconcileError::PersistenceFailure { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// How a failed event is reported to the webhook endpoint.
    pub fn disposition(&self) -> Disposition {
        if self.is_retryable() {
            Disposition::RetryableFailure
        } else {
            Disposition::Unprocessable
        }
    }
}

impl Outcome {
    /// How a handled event is reported to the webhook endpoint.
    pub fn disposition(&self) -> Disposition {
        match self {
            Outcome::Applied { .. } | Outcome::DisputeRecorded { .. } => Disposition::Applied,
            Outcome::Duplicate { .. } | Outcome::Stale { .. } => Disposition::Duplicate,
            Outcome::Ignored { .. } => Disposition::Unprocessable,
        }
    }
}

/// The outcome reported to the webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    Duplicate,
    Unprocessable,
    RetryableFailure,
}

impl Disposition {
    /// Collapses a reconciliation result into its disposition.
    pub fn of(result: &Result<Outcome, ReconcileError>) -> Self {
        match result {
            Ok(outcome) => outcome.disposition(),
            Err(err) => err.disposition(),
        }
    }

    /// Whether the provider should deliver the event again.
    pub fn wants_redelivery(&self) -> bool {
        matches!(self, Disposition::RetryableFailure)
    }
}
