use crate::domain::dispute::Alert;
use crate::domain::ports::AlertSink;
use async_trait::async_trait;

/// Target under which operator alerts are logged, so they can be routed separately.
pub const ALERT_TARGET: &str = "order_reconciler::alert";

/// Raises alerts as `tracing` events on [`ALERT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise(&self, alert: Alert) {
        match &alert {
            Alert::OrphanEvent {
                event_id,
                correlation_id,
            } => tracing::warn!(
                target: ALERT_TARGET,
                event_id = %event_id,
                correlation_id = %correlation_id,
                "ALERT: payment event for unknown order"
            ),
            Alert::InvalidTransition {
                event_id,
                order_id,
                from,
                to,
            } => tracing::error!(
                target: ALERT_TARGET,
                event_id = %event_id,
                order_id = %order_id,
                from = %from,
                to = %to,
                "ALERT: invalid payment status transition"
            ),
            Alert::ReferenceMismatch {
                event_id,
                order_id,
                bound,
                received,
            } => tracing::error!(
                target: ALERT_TARGET,
                event_id = %event_id,
                order_id = %order_id,
                bound = %bound,
                received = %received,
                "ALERT: payment reference mismatch"
            ),
            Alert::HintMismatch {
                event_id,
                correlation_id,
                bound_order,
                hinted_order,
            } => tracing::warn!(
                target: ALERT_TARGET,
                event_id = %event_id,
                correlation_id = %correlation_id,
                bound_order = %bound_order,
                hinted_order = %hinted_order,
                "ALERT: payment metadata names a different order"
            ),
            Alert::UnmatchedDispute {
                event_id,
                correlation_id,
                details,
            } => tracing::error!(
                target: ALERT_TARGET,
                event_id = %event_id,
                correlation_id = correlation_id.as_deref().unwrap_or_default(),
                dispute_id = %details.dispute_id,
                charge_id = details.charge_id.as_deref().unwrap_or_default(),
                amount = details.amount_minor.unwrap_or_default(),
                reason = details.reason.as_deref().unwrap_or_default(),
                "ALERT: charge dispute for unknown order"
            ),
            Alert::DisputeOpened(record) => tracing::warn!(
                target: ALERT_TARGET,
                event_id = %record.event_id,
                dispute_id = %record.dispute_id,
                order_id = %record.order_id,
                amount = record.amount_minor.unwrap_or_default(),
                reason = record.reason.as_deref().unwrap_or_default(),
                "ALERT: charge dispute opened"
            ),
        }
    }
}
