use super::outcome::{Outcome, ReconcileError};
use crate::config::ReconcilerConfig;
use crate::domain::dispute::{Alert, DisputeRecord};
use crate::domain::event::{DisputeDetails, EventKind, PaymentEvent};
use crate::domain::order::{Order, OrderId, PaymentStatus, Transition};
use crate::domain::ports::{AlertSinkBox, DisputeStore, DisputeStoreBox, OrderStore, OrderStoreBox};
use crate::error::Error;
use tracing::{error, info, warn};

/// Applies verified payment events to orders.
///
/// Every event goes through a read-decide-write cycle against the order store.
/// The write is conditional on the version read, so two events racing on the same
/// order serialize: the loser sees a conflict, re-reads, and decides again against
/// the winner's state. Redelivered events find the order already in their target
/// state and are acknowledged without a write.
pub struct Reconciler {
    orders: OrderStoreBox,
    disputes: DisputeStoreBox,
    alerts: AlertSinkBox,
    config: ReconcilerConfig,
}

/// The order an event resolved to, and whether the write must bind the event's
/// payment reference to it.
struct Resolved {
    order: Order,
    bind_reference: bool,
}

impl Reconciler {
    /// Creates a reconciler over the given stores with the default configuration.
    pub fn new(orders: OrderStoreBox, disputes: DisputeStoreBox, alerts: AlertSinkBox) -> Self {
        Self {
            orders,
            disputes,
            alerts,
            config: ReconcilerConfig::default(),
        }
    }

    /// Replaces the retry budget and deadline.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration events are processed with.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// The underlying order store, for seeding and reporting.
    pub fn orders(&self) -> &dyn OrderStore {
        self.orders.as_ref()
    }

    /// The underlying dispute log.
    pub fn disputes(&self) -> &dyn DisputeStore {
        self.disputes.as_ref()
    }

    /// Processes one verified event.
    ///
    /// Conflicts and transient store failures are retried up to
    /// `config.max_attempts` times. Running past `config.deadline` yields
    /// [`ReconcileError::PersistenceFailure`]; in that case the write may or may
    /// not have landed, and a redelivery will settle it either way.
    #[tracing::instrument(
        name = "process_event",
        skip_all,
        fields(event_id = %event.event_id, kind = %event.kind.name())
    )]
    pub async fn process_event(&self, event: &PaymentEvent) -> Result<Outcome, ReconcileError> {
        match tokio::time::timeout(self.config.deadline, self.reconcile(event)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    correlation_id = event.correlation_id.as_deref().unwrap_or_default(),
                    deadline_ms = self.config.deadline.as_millis() as u64,
                    "Deadline exceeded while reconciling event"
                );
                Err(ReconcileError::PersistenceFailure {
                    event_id: event.event_id.clone(),
                    source: Error::Unavailable(format!(
                        "deadline of {} ms exceeded",
                        self.config.deadline.as_millis()
                    )),
                })
            }
        }
    }

    async fn reconcile(&self, event: &PaymentEvent) -> Result<Outcome, ReconcileError> {
        if let EventKind::Unrecognized { event_type } = &event.kind {
            info!(event_type = %event_type, "Unhandled event type, acknowledging");
            return Ok(Outcome::Ignored {
                event_type: event_type.clone(),
            });
        }

        let Some(correlation_id) = event.correlation_id.as_deref().filter(|c| !c.is_empty()) else {
            if let EventKind::DisputeCreated(details) = &event.kind {
                self.unmatched_dispute(event, details).await;
            } else {
                warn!("Payment event missing payment reference");
            }
            return Err(ReconcileError::MissingCorrelation {
                event_id: event.event_id.clone(),
            });
        };

        let mut attempt = 1;
        loop {
            match self.attempt(event, correlation_id).await {
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    warn!(
                        correlation_id,
                        attempt,
                        error = %err,
                        "Transient store failure, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err @ ReconcileError::PersistenceFailure { .. }) => {
                    error!(correlation_id, attempt, error = %err, "Giving up on event");
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    async fn attempt(&self, event: &PaymentEvent, correlation_id: &str) -> Result<Outcome, ReconcileError> {
        let resolved = self.resolve_order(event, correlation_id).await?;

        if let EventKind::DisputeCreated(details) = &event.kind {
            return self
                .record_dispute(event, &resolved.order, correlation_id, details)
                .await;
        }

        match event.kind.target_status() {
            Some(target) => self.transition(event, resolved, correlation_id, target).await,
            None => Ok(Outcome::Ignored {
                event_type: event.kind.name().to_string(),
            }),
        }
    }

    async fn resolve_order(&self, event: &PaymentEvent, correlation_id: &str) -> Result<Resolved, ReconcileError> {
        let by_reference = self
            .orders
            .get_by_payment_reference(correlation_id)
            .await
            .map_err(|source| persistence(event, source))?;
        if let Some(order) = by_reference {
            if let Some(hint) = event.order_hint.as_deref()
                && hint != order.id.as_str()
            {
                warn!(
                    correlation_id,
                    order_id = %order.id,
                    order_hint = hint,
                    "Payment metadata names a different order than the bound one"
                );
                self.alerts
                    .raise(Alert::HintMismatch {
                        event_id: event.event_id.clone(),
                        correlation_id: correlation_id.to_string(),
                        bound_order: order.id.clone(),
                        hinted_order: hint.to_string(),
                    })
                    .await;
            }
            return Ok(Resolved {
                order,
                bind_reference: false,
            });
        }

        if let Some(hint) = event.order_hint.as_deref() {
            let by_id = self
                .orders
                .get(&OrderId::new(hint))
                .await
                .map_err(|source| persistence(event, source))?;
            if let Some(order) = by_id {
                return match order.payment_reference.clone() {
                    None => Ok(Resolved {
                        order,
                        bind_reference: true,
                    }),
                    // Bound by a concurrent event between the two reads.
                    Some(bound) if bound == correlation_id => Ok(Resolved {
                        order,
                        bind_reference: false,
                    }),
                    Some(bound) => {
                        warn!(
                            correlation_id,
                            order_id = %order.id,
                            bound_reference = %bound,
                            "Order already bound to a different payment"
                        );
                        self.alerts
                            .raise(Alert::ReferenceMismatch {
                                event_id: event.event_id.clone(),
                                order_id: order.id.clone(),
                                bound: bound.clone(),
                                received: correlation_id.to_string(),
                            })
                            .await;
                        Err(ReconcileError::ReferenceMismatch {
                            event_id: event.event_id.clone(),
                            order_id: order.id,
                            bound,
                            received: correlation_id.to_string(),
                        })
                    }
                };
            }
        }

        if let EventKind::DisputeCreated(details) = &event.kind {
            self.unmatched_dispute(event, details).await;
        } else {
            warn!(
                correlation_id,
                order_hint = event.order_hint.as_deref().unwrap_or_default(),
                "Payment event references unknown order"
            );
            self.alerts
                .raise(Alert::OrphanEvent {
                    event_id: event.event_id.clone(),
                    correlation_id: correlation_id.to_string(),
                })
                .await;
        }
        Err(ReconcileError::OrderNotFound {
            event_id: event.event_id.clone(),
            correlation_id: correlation_id.to_string(),
        })
    }

    async fn transition(
        &self,
        event: &PaymentEvent,
        resolved: Resolved,
        correlation_id: &str,
        target: PaymentStatus,
    ) -> Result<Outcome, ReconcileError> {
        let Resolved {
            order,
            bind_reference,
        } = resolved;

        match order.payment_status.transition_to(target) {
            Transition::AlreadyApplied => {
                info!(
                    correlation_id,
                    order_id = %order.id,
                    payment_status = %order.payment_status,
                    "Event already applied"
                );
                Ok(Outcome::Duplicate { order_id: order.id })
            }
            Transition::Stale { current, target } => {
                info!(
                    correlation_id,
                    order_id = %order.id,
                    current = %current,
                    target = %target,
                    "Late event for settled payment"
                );
                Ok(Outcome::Stale {
                    order_id: order.id,
                    current,
                    target,
                })
            }
            Transition::Invalid { from, to } => {
                warn!(
                    correlation_id,
                    order_id = %order.id,
                    from = %from,
                    to = %to,
                    "Rejected payment status transition"
                );
                self.alerts
                    .raise(Alert::InvalidTransition {
                        event_id: event.event_id.clone(),
                        order_id: order.id.clone(),
                        from,
                        to,
                    })
                    .await;
                Err(ReconcileError::InvalidTransition {
                    event_id: event.event_id.clone(),
                    order_id: order.id,
                    from,
                    to,
                })
            }
            Transition::Apply { from, to } => {
                let mut patch = order.patch_for(to);
                if bind_reference {
                    patch.payment_reference = Some(correlation_id.to_string());
                }

                let updated = self
                    .orders
                    .update(&order.id, order.version, patch)
                    .await
                    .map_err(|source| persistence(event, source))?;

                log_applied(event, &updated, from);
                Ok(Outcome::Applied {
                    order_id: updated.id,
                    from,
                    to,
                })
            }
        }
    }

    async fn record_dispute(
        &self,
        event: &PaymentEvent,
        order: &Order,
        correlation_id: &str,
        details: &DisputeDetails,
    ) -> Result<Outcome, ReconcileError> {
        let record = DisputeRecord::new(
            order.id.clone(),
            event.event_id.clone(),
            correlation_id,
            details.clone(),
        );
        let is_new = self
            .disputes
            .record(record.clone())
            .await
            .map_err(|source| persistence(event, source))?;

        if !is_new {
            info!(
                dispute_id = %details.dispute_id,
                order_id = %order.id,
                "Dispute already recorded"
            );
            return Ok(Outcome::Duplicate {
                order_id: order.id.clone(),
            });
        }

        warn!(
            dispute_id = %details.dispute_id,
            order_id = %order.id,
            charge_id = details.charge_id.as_deref().unwrap_or_default(),
            amount = details.amount_minor.unwrap_or_default(),
            reason = details.reason.as_deref().unwrap_or_default(),
            payment_status = %order.payment_status,
            "Charge dispute created"
        );
        self.alerts.raise(Alert::DisputeOpened(record)).await;

        Ok(Outcome::DisputeRecorded {
            order_id: order.id.clone(),
            dispute_id: details.dispute_id.clone(),
        })
    }

    /// Reports a dispute no order could be found for. The dispute log is left alone,
    /// since a record must name its order.
    async fn unmatched_dispute(&self, event: &PaymentEvent, details: &DisputeDetails) {
        warn!(
            correlation_id = event.correlation_id.as_deref().unwrap_or_default(),
            dispute_id = %details.dispute_id,
            charge_id = details.charge_id.as_deref().unwrap_or_default(),
            amount = details.amount_minor.unwrap_or_default(),
            reason = details.reason.as_deref().unwrap_or_default(),
            "Charge dispute created for unknown order"
        );
        self.alerts
            .raise(Alert::UnmatchedDispute {
                event_id: event.event_id.clone(),
                correlation_id: event.correlation_id.clone(),
                details: details.clone(),
            })
            .await;
    }
}

fn persistence(event: &PaymentEvent, source: Error) -> ReconcileError {
    ReconcileError::PersistenceFailure {
        event_id: event.event_id.clone(),
        source,
    }
}

fn log_applied(event: &PaymentEvent, order: &Order, from: PaymentStatus) {
    match &event.kind {
        EventKind::PaymentSucceeded {
            amount_minor,
            currency,
        } => info!(
            order_id = %order.id,
            from = %from,
            status = %order.status,
            amount = amount_minor.unwrap_or_default(),
            currency = currency.as_deref().unwrap_or(order.currency.as_str()),
            "Payment succeeded"
        ),
        EventKind::PaymentFailed {
            failure_code,
            failure_message,
        } => info!(
            order_id = %order.id,
            from = %from,
            failure_code = failure_code.as_deref().unwrap_or_default(),
            failure_message = failure_message.as_deref().unwrap_or_default(),
            "Payment failed"
        ),
        EventKind::PaymentCanceled { cancellation_reason } => info!(
            order_id = %order.id,
            from = %from,
            reason = cancellation_reason.as_deref().unwrap_or_default(),
            "Payment canceled"
        ),
        _ => info!(
            order_id = %order.id,
            from = %from,
            to = %order.payment_status,
            "Payment status updated"
        ),
    }
}
