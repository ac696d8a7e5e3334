//! Decoding of the payment provider's event envelope into [`PaymentEvent`].
//!
//! The envelope is the provider's JSON shape, `{"id", "type", "data": {"object"}}`.
//! Authenticity is settled before this point; decoding only maps fields.

use crate::domain::event::{DisputeDetails, EventKind, PaymentEvent};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::BufRead;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_PROCESSING: &str = "payment_intent.processing";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";
pub const PAYMENT_INTENT_CANCELED: &str = "payment_intent.canceled";
pub const CHARGE_DISPUTE_CREATED: &str = "charge.dispute.created";

/// Metadata key the checkout flow uses to stamp the order id on a payment.
pub const ORDER_ID_METADATA_KEY: &str = "orderId";

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    metadata: Option<HashMap<String, String>>,
    last_payment_error: Option<PaymentErrorObject>,
    cancellation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentErrorObject {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisputeObject {
    id: String,
    payment_intent: Option<String>,
    charge: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    reason: Option<String>,
    metadata: Option<HashMap<String, String>>,
}

fn order_hint(metadata: Option<HashMap<String, String>>) -> Option<String> {
    metadata
        .and_then(|mut m| m.remove(ORDER_ID_METADATA_KEY))
        .filter(|id| !id.is_empty())
}

impl TryFrom<ProviderEnvelope> for PaymentEvent {
    type Error = Error;

    fn try_from(envelope: ProviderEnvelope) -> Result<Self> {
        let ProviderEnvelope {
            id: event_id,
            event_type,
            data,
        } = envelope;

        if event_type == CHARGE_DISPUTE_CREATED {
            let dispute: DisputeObject = serde_json::from_value(data.object)?;
            return Ok(PaymentEvent {
                event_id,
                correlation_id: dispute.payment_intent,
                order_hint: order_hint(dispute.metadata),
                kind: EventKind::DisputeCreated(DisputeDetails {
                    dispute_id: dispute.id,
                    charge_id: dispute.charge,
                    amount_minor: dispute.amount,
                    currency: dispute.currency,
                    reason: dispute.reason,
                }),
            });
        }

        let is_payment_intent = matches!(
            event_type.as_str(),
            PAYMENT_INTENT_SUCCEEDED
                | PAYMENT_INTENT_PROCESSING
                | PAYMENT_INTENT_FAILED
                | PAYMENT_INTENT_CANCELED
        );
        if !is_payment_intent {
            return Ok(PaymentEvent {
                event_id,
                correlation_id: None,
                order_hint: None,
                kind: EventKind::Unrecognized { event_type },
            });
        }

        let intent: PaymentIntentObject = serde_json::from_value(data.object)?;
        let kind = match event_type.as_str() {
            PAYMENT_INTENT_SUCCEEDED => EventKind::PaymentSucceeded {
                amount_minor: intent.amount,
                currency: intent.currency,
            },
            PAYMENT_INTENT_PROCESSING => EventKind::PaymentProcessing,
            PAYMENT_INTENT_FAILED => {
                let (failure_code, failure_message) = intent
                    .last_payment_error
                    .map(|e| (e.code, e.message))
                    .unwrap_or_default();
                EventKind::PaymentFailed {
                    failure_code,
                    failure_message,
                }
            }
            _ => EventKind::PaymentCanceled {
                cancellation_reason: intent.cancellation_reason,
            },
        };

        Ok(PaymentEvent {
            event_id,
            correlation_id: intent.id,
            order_hint: order_hint(intent.metadata),
            kind,
        })
    }
}

/// Decodes one envelope from raw bytes.
pub fn decode_event(body: &[u8]) -> Result<PaymentEvent> {
    let envelope: ProviderEnvelope = serde_json::from_slice(body)?;
    PaymentEvent::try_from(envelope)
}

/// Reads provider envelopes from a JSON-lines source, one per line.
///
/// Blank lines are skipped. A malformed line yields an error for that line only,
/// so a caller can log it and keep going.
pub struct EventReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    pub fn events(self) -> impl Iterator<Item = Result<PaymentEvent>> {
        self.source.lines().filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(decode_event(line.as_bytes())),
            Err(e) => Some(Err(Error::from(e))),
        })
    }
}
