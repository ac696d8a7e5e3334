use super::order::PaymentStatus;
use serde::{Deserialize, Serialize};

/// Dispute facts carried by a dispute-created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeDetails {
    pub dispute_id: String,
    pub charge_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub reason: Option<String>,
}

/// The kinds of provider events the reconciler understands, each with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PaymentSucceeded {
        amount_minor: Option<i64>,
        currency: Option<String>,
    },
    PaymentProcessing,
    PaymentFailed {
        failure_code: Option<String>,
        failure_message: Option<String>,
    },
    PaymentCanceled {
        cancellation_reason: Option<String>,
    },
    DisputeCreated(DisputeDetails),
    Unrecognized {
        event_type: String,
    },
}

impl EventKind {
    /// The payment status this event drives the order into, if it takes part
    /// in the payment state machine at all.
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            EventKind::PaymentSucceeded { .. } => Some(PaymentStatus::Succeeded),
            EventKind::PaymentProcessing => Some(PaymentStatus::Processing),
            EventKind::PaymentFailed { .. } => Some(PaymentStatus::Failed),
            EventKind::PaymentCanceled { .. } => Some(PaymentStatus::Cancelled),
            EventKind::DisputeCreated(_) | EventKind::Unrecognized { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EventKind::PaymentSucceeded { .. } => "payment_succeeded",
            EventKind::PaymentProcessing => "payment_processing",
            EventKind::PaymentFailed { .. } => "payment_failed",
            EventKind::PaymentCanceled { .. } => "payment_canceled",
            EventKind::DisputeCreated(_) => "dispute_created",
            EventKind::Unrecognized { event_type } => event_type,
        }
    }
}

/// A verified, typed payment lifecycle event.
///
/// `correlation_id` is the provider's payment reference. `order_hint` is the order
/// id the checkout flow stamped into the provider metadata; it is only consulted
/// when no order is bound to the reference yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub correlation_id: Option<String>,
    pub order_hint: Option<String>,
    pub kind: EventKind,
}

impl PaymentEvent {
    pub fn new(event_id: impl Into<String>, correlation_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            event_id: event_id.into(),
            correlation_id: Some(correlation_id.into()),
            order_hint: None,
            kind,
        }
    }

    pub fn with_order_hint(mut self, order_id: impl Into<String>) -> Self {
        self.order_hint = Some(order_id.into());
        self
    }

    pub fn succeeded(event_id: &str, correlation_id: &str) -> Self {
        Self::new(
            event_id,
            correlation_id,
            EventKind::PaymentSucceeded {
                amount_minor: None,
                currency: None,
            },
        )
    }

    pub fn failed(event_id: &str, correlation_id: &str) -> Self {
        Self::new(
            event_id,
            correlation_id,
            EventKind::PaymentFailed {
                failure_code: None,
                failure_message: None,
            },
        )
    }

    pub fn canceled(event_id: &str, correlation_id: &str) -> Self {
        Self::new(
            event_id,
            correlation_id,
            EventKind::PaymentCanceled {
                cancellation_reason: None,
            },
        )
    }

    pub fn processing(event_id: &str, correlation_id: &str) -> Self {
        Self::new(event_id, correlation_id, EventKind::PaymentProcessing)
    }

    pub fn dispute_created(event_id: &str, correlation_id: &str, dispute_id: &str) -> Self {
        Self::new(
            event_id,
            correlation_id,
            EventKind::DisputeCreated(DisputeDetails {
                dispute_id: dispute_id.to_string(),
                charge_id: None,
                amount_minor: None,
                currency: None,
                reason: None,
            }),
        )
    }
}
