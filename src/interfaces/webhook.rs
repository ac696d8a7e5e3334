//! The webhook boundary: signature check, envelope decoding, reconciliation, and
//! the acknowledgment handed back to the provider.

use super::provider::decode_event;
use crate::application::{Disposition, Reconciler};
use crate::domain::event::PaymentEvent;
use crate::error;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),
    #[error("malformed event: {0}")]
    Malformed(#[from] error::Error),
}

/// Checks that a raw webhook body was signed by the payment provider.
///
/// Implemented by the provider SDK integration; this crate only consumes it.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, body: &[u8], signature: &str) -> Result<(), WebhookError>;
}

/// Transport-level answer to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Stop delivering this event.
    Received(Disposition),
    /// Deliver it again later.
    Redeliver,
    /// The request itself was unacceptable.
    Rejected(String),
}

impl Acknowledgement {
    /// Maps a disposition to the answer handed back to the provider.
    pub fn from_disposition(disposition: Disposition) -> Self {
        if disposition.wants_redelivery() {
            Acknowledgement::Redeliver
        } else {
            Acknowledgement::Received(disposition)
        }
    }

    /// HTTP status of the response.
    pub fn status_code(&self) -> u16 {
        match self {
            Acknowledgement::Received(_) => 200,
            Acknowledgement::Redeliver => 500,
            Acknowledgement::Rejected(_) => 400,
        }
    }

    /// JSON body of the response.
    pub fn body(&self) -> Value {
        match self {
            Acknowledgement::Received(_) => json!({ "received": true }),
            Acknowledgement::Redeliver => json!({ "error": "Webhook handler failed" }),
            Acknowledgement::Rejected(reason) => json!({ "error": reason }),
        }
    }
}

pub struct WebhookHandler {
    verifier: Box<dyn SignatureVerifier>,
    reconciler: Arc<Reconciler>,
}

impl WebhookHandler {
    pub fn new(verifier: Box<dyn SignatureVerifier>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            verifier,
            reconciler,
        }
    }

    /// Verifies and decodes a raw delivery.
    pub fn verify_event(&self, body: &[u8], signature: Option<&str>) -> Result<PaymentEvent, WebhookError> {
        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        self.verifier.verify(body, signature)?;
        Ok(decode_event(body)?)
    }

    /// Verifies, decodes, and reconciles one delivery. Never fails: every
    /// problem ends up in the acknowledgement.
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Acknowledgement {
        let event = match self.verify_event(body, signature) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Rejecting webhook delivery");
                let reason = match e {
                    WebhookError::MissingSignature => "Missing signature",
                    WebhookError::InvalidSignature(_) => "Invalid signature",
                    WebhookError::Malformed(_) => "Malformed event",
                };
                return Acknowledgement::Rejected(reason.to_string());
            }
        };

        info!(event_id = %event.event_id, kind = %event.kind.name(), "Webhook received");
        let result = self.reconciler.process_event(&event).await;
        if let Err(e) = &result {
            error!(event_id = %event.event_id, retryable = e.is_retryable(), error = %e, "Webhook handler error");
        }
        Acknowledgement::from_disposition(Disposition::of(&result))
    }
}
