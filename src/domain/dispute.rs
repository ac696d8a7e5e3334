use super::event::DisputeDetails;
use super::order::{OrderId, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dispute opened against an order's payment. Recorded once per `dispute_id`;
/// it never changes the order itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRecord {
    pub dispute_id: String,
    pub order_id: OrderId,
    pub event_id: String,
    pub payment_reference: String,
    pub charge_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl DisputeRecord {
    pub fn new(
        order_id: OrderId,
        event_id: impl Into<String>,
        payment_reference: impl Into<String>,
        details: DisputeDetails,
    ) -> Self {
        Self {
            dispute_id: details.dispute_id,
            order_id,
            event_id: event_id.into(),
            payment_reference: payment_reference.into(),
            charge_id: details.charge_id,
            amount_minor: details.amount_minor,
            currency: details.currency,
            reason: details.reason,
            recorded_at: Utc::now(),
        }
    }
}

/// Something an operator has to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A payment event pointed at an order that does not exist.
    OrphanEvent {
        event_id: String,
        correlation_id: String,
    },
    /// An event tried to move a settled payment somewhere else.
    InvalidTransition {
        event_id: String,
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// The order named by the event metadata is bound to another payment.
    ReferenceMismatch {
        event_id: String,
        order_id: OrderId,
        bound: String,
        received: String,
    },
    /// The payment reference is bound to one order but the event metadata names another.
    HintMismatch {
        event_id: String,
        correlation_id: String,
        bound_order: OrderId,
        hinted_order: String,
    },
    DisputeOpened(DisputeRecord),
    /// A dispute that could not be tied to any order. Nothing was recorded.
    UnmatchedDispute {
        event_id: String,
        correlation_id: Option<String>,
        details: DisputeDetails,
    },
}

impl Alert {
    pub fn event_id(&self) -> &str {
        match self {
            Alert::OrphanEvent { event_id, .. }
            | Alert::InvalidTransition { event_id, .. }
            | Alert::ReferenceMismatch { event_id, .. }
            | Alert::HintMismatch { event_id, .. }
            | Alert::UnmatchedDispute { event_id, .. } => event_id,
            Alert::DisputeOpened(record) => &record.event_id,
        }
    }
}
