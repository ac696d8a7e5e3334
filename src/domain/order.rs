use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of an order, assigned by the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Fulfillment lifecycle. Past `Processing` it is driven by downstream processes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Ordered,
    Processing,
    Ready,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ordered => "ordered",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment lifecycle of an order. Owned by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
}

/// Result of asking the state machine whether `from -> to` may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The edge exists and must be written.
    Apply {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// The order already sits in the target state.
    AlreadyApplied,
    /// A non-terminal target arriving after the order settled.
    Stale {
        current: PaymentStatus,
        target: PaymentStatus,
    },
    /// No such edge.
    Invalid {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Decides the edge from `self` to `target`.
    ///
    /// ```text
    /// pending    -> processing | succeeded | failed | cancelled
    /// processing -> succeeded | failed | cancelled
    /// succeeded, failed, cancelled: terminal
    /// ```
    ///
    /// Nothing ever leads back to `pending`. A `processing` target on a settled
    /// order is reported as stale rather than invalid: it names no terminal state,
    /// it only arrived late.
    pub fn transition_to(self, target: PaymentStatus) -> Transition {
        use PaymentStatus::*;

        if self == target {
            return Transition::AlreadyApplied;
        }

        match (self, target) {
            (Pending, Processing | Succeeded | Failed | Cancelled)
            | (Processing, Succeeded | Failed | Cancelled) => Transition::Apply {
                from: self,
                to: target,
            },
            (current, Processing) if current.is_terminal() => Transition::Stale {
                current,
                target,
            },
            (from, to) => Transition::Invalid { from, to },
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field changes carried by one conditional write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<OrderStatus>,
    pub payment_reference: Option<String>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.payment_status.is_none() && self.status.is_none() && self.payment_reference.is_none()
    }
}

/// The aggregate being reconciled.
///
/// `amount` and `currency` are fixed at checkout. `version` is the optimistic
/// concurrency token; stores bump it on every successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: impl Into<OrderId>, amount: Decimal, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: OrderStatus::Ordered,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            amount,
            currency: currency.into(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_payment_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    /// Builds the patch that moves this order's payment into `to`.
    ///
    /// A succeeded payment hands a freshly placed order to fulfillment by moving
    /// `status` to processing; later fulfillment states are left alone.
    pub fn patch_for(&self, to: PaymentStatus) -> OrderPatch {
        let status = (to == PaymentStatus::Succeeded && self.status == OrderStatus::Ordered)
            .then_some(OrderStatus::Processing);
        OrderPatch {
            payment_status: Some(to),
            status,
            payment_reference: None,
        }
    }

    /// Applies `patch`, bumping `version` and `updated_at`.
    ///
    /// Fails without touching the order if the patch tries to rebind an already
    /// set payment reference.
    pub fn apply(&mut self, patch: &OrderPatch, now: DateTime<Utc>) -> Result<()> {
        if let (Some(current), Some(requested)) =
            (&self.payment_reference, &patch.payment_reference)
            && current != requested
        {
            return Err(Error::ValidationError(format!(
                "payment reference of order {} is already {current}, refusing {requested}",
                self.id
            )));
        }

        if let Some(payment_status) = patch.payment_status {
            self.payment_status = payment_status;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(reference) = &patch.payment_reference {
            self.payment_reference = Some(reference.clone());
        }
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }
}
